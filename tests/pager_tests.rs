mod common;

use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use koboflow::Error;
use koboflow::api::{ApiRequest, fetch_all};

const DATA_PATH: &str = "/api/v2/assets/aBc123/data/";

fn record(id: u64) -> Value {
    json!({ "_id": id, "name": format!("respondent {id}") })
}

async fn mount_three_pages(server: &MockServer) {
    let base = format!("{}{DATA_PATH}", server.uri());

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("start"))
        .and(header("Authorization", "Token test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 5,
            "next": format!("{base}?limit=2&start=2"),
            "previous": null,
            "results": [record(1), record(2)]
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("start", "2"))
        .and(header("Authorization", "Token test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 5,
            "next": format!("{base}?limit=2&start=4"),
            "previous": format!("{base}?limit=2"),
            "results": [record(3), record(4)]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("start", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 5,
            "next": null,
            "previous": format!("{base}?limit=2&start=2"),
            "results": [record(5)]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn follows_next_links_until_exhausted() {
    let server = MockServer::start().await;
    mount_three_pages(&server).await;

    let client = common::kobo_client(&server.uri());
    let records = fetch_all(&client, &ApiRequest::get(DATA_PATH), 2, true).await.unwrap();

    let ids: Vec<u64> = records.iter().map(|r| r["_id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn first_page_only_without_follow_all() {
    let server = MockServer::start().await;
    mount_three_pages(&server).await;

    let client = common::kobo_client(&server.uri());
    let records = fetch_all(&client, &ApiRequest::get(DATA_PATH), 2, false).await.unwrap();

    assert_eq!(records, vec![record(1), record(2)]);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn caller_query_is_kept_on_first_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("limit", "10"))
        .and(query_param("sort", r#"{"_id":-1}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "next": null,
            "results": [record(9)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::kobo_client(&server.uri());
    let request = ApiRequest::get(DATA_PATH).query("sort", r#"{"_id":-1}"#);
    let records = fetch_all(&client, &request, 10, true).await.unwrap();

    assert_eq!(records, vec![record(9)]);
}

#[tokio::test]
async fn error_status_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string(r#"{"detail":"forbidden"}"#))
        .mount(&server)
        .await;

    let client = common::kobo_client(&server.uri());
    let err = fetch_all(&client, &ApiRequest::get(DATA_PATH), 2, true).await.unwrap_err();

    match err {
        Error::Request { status, body, method, .. } => {
            assert_eq!(status, 403);
            assert_eq!(method, "GET");
            assert!(body.contains("forbidden"));
        }
        other => panic!("expected a request error, got {other:?}"),
    }
}

#[tokio::test]
async fn next_without_results_is_a_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": format!("{}{DATA_PATH}?start=2", server.uri())
        })))
        .mount(&server)
        .await;

    let client = common::kobo_client(&server.uri());
    let err = fetch_all(&client, &ApiRequest::get(DATA_PATH), 2, true).await.unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }), "{err:?}");
}

#[tokio::test]
async fn empty_page_with_next_is_a_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": format!("{}{DATA_PATH}?start=0", server.uri()),
            "results": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::kobo_client(&server.uri());
    let err = fetch_all(&client, &ApiRequest::get(DATA_PATH), 2, true).await.unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }), "{err:?}");
}

#[tokio::test]
async fn invalid_json_is_a_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let client = common::kobo_client(&server.uri());
    let err = fetch_all(&client, &ApiRequest::get(DATA_PATH), 2, true).await.unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }), "{err:?}");
}

#[tokio::test]
async fn zero_page_size_is_rejected_before_any_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let client = common::kobo_client(&server.uri());
    let err = fetch_all(&client, &ApiRequest::get(DATA_PATH), 0, true).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn unpaginated_object_is_returned_as_one_record() {
    let server = MockServer::start().await;
    let status = json!({ "uid": "validation_status_approved", "label": "Approved" });

    Mock::given(method("GET"))
        .and(path("/api/v2/assets/aBc123/data/7/validation_status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status.clone()))
        .mount(&server)
        .await;

    let client = common::kobo_client(&server.uri());
    let records = fetch_all(
        &client,
        &ApiRequest::get("/api/v2/assets/aBc123/data/7/validation_status/"),
        100,
        true,
    )
    .await
    .unwrap();

    assert_eq!(records, vec![status]);
}

#[tokio::test]
async fn short_result_against_count_is_a_protocol_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 5,
            "next": null,
            "results": [record(1), record(2)]
        })))
        .mount(&server)
        .await;

    let client = common::kobo_client(&server.uri());
    let err = fetch_all(&client, &ApiRequest::get(DATA_PATH), 2, true).await.unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }), "{err:?}");

    // Without follow_all a short first page is expected.
    let records = fetch_all(&client, &ApiRequest::get(DATA_PATH), 2, false).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn repeated_next_link_is_a_protocol_error() {
    let server = MockServer::start().await;
    let looping = format!("{}{DATA_PATH}?limit=2&start=2", server.uri());

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 100,
            "next": looping,
            "results": [record(1), record(2)]
        })))
        .mount(&server)
        .await;

    let client = common::kobo_client(&server.uri());
    let err = fetch_all(&client, &ApiRequest::get(DATA_PATH), 2, true).await.unwrap_err();

    assert!(matches!(err, Error::Protocol { ref message, .. } if message.contains("repeats")), "{err:?}");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
