#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use koboflow::api::{Credentials, KoboClient};
use koboflow::config::Config;
use koboflow::operations::{OperationContext, OperationOutput, OperationRegistry};
use koboflow::submission::{DownloadOptions, FormatOptions};

pub const TOKEN: &str = "test-token";

/// A running receiver instance.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a JSON document to the webhook, return (body, status).
    pub async fn submit_json(&self, data: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/webhook"))
            .json(data)
            .send()
            .await
            .expect("submit json failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// POST a raw body with the given content type, return (body, status).
    pub async fn submit_raw(&self, content_type: &str, data: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/webhook"))
            .header("content-type", content_type)
            .body(data.to_string())
            .send()
            .await
            .expect("submit raw failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

pub fn credentials(api_root: &str) -> Credentials {
    Credentials {
        url: api_root.to_string(),
        token: TOKEN.to_string(),
    }
}

/// Client pointed at a mock platform.
pub fn kobo_client(api_root: &str) -> KoboClient {
    KoboClient::new(credentials(api_root), Duration::from_secs(5)).unwrap()
}

pub fn test_config(api_root: &str, relay_url: Option<String>) -> Config {
    Config {
        credentials: credentials(api_root),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        log_level: "warn".to_string(),
        page_size: 1000,
        timeout: Duration::from_secs(5),
        max_body_size: 64 * 1024,
        format: FormatOptions::default(),
        download: DownloadOptions::default(),
        relay_url,
    }
}

/// Run `resource`/`operation` with `params` against a mock platform.
pub async fn run(
    api_root: &str,
    resource: &str,
    operation: &str,
    params: Value,
) -> koboflow::error::Result<OperationOutput> {
    run_with(&test_config(api_root, None), resource, operation, params).await
}

pub async fn run_with(
    config: &Config,
    resource: &str,
    operation: &str,
    params: Value,
) -> koboflow::error::Result<OperationOutput> {
    let ctx = OperationContext::from_config(config, params)?;
    OperationRegistry::standard()
        .dispatch_named(resource, operation, &ctx)
        .await
}

/// Spawn the receiver on a random port.
pub async fn spawn_app(config: Config) -> TestApp {
    let app = koboflow::build_app(config).expect("Failed to build app");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        client: Client::new(),
    }
}
