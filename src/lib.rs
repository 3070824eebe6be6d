pub mod api;
pub mod binary;
pub mod config;
pub mod error;
pub mod operations;
pub mod relay;
pub mod routes;
pub mod state;
pub mod submission;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode, header};
use serde_json::json;
use tower::util::MapResponseLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::KoboClient;
use crate::config::Config;
use crate::error::Result;
use crate::relay::Relay;
use crate::state::{AppState, SharedState};

pub use crate::error::Error;

pub fn build_app(config: Config) -> Result<Router> {
    let client = KoboClient::new(config.credentials.clone(), config.timeout)?;

    let relay = match &config.relay_url {
        Some(url) => {
            tracing::info!("Relaying submissions to {url}");
            Some(Relay::new(url.clone(), config.timeout)?)
        }
        None => None,
    };

    let max_body_size = config.max_body_size;

    let state: SharedState = Arc::new(AppState {
        config,
        client,
        relay,
    });

    let app = Router::new()
        .merge(routes::webhook_routes())
        .route("/health", axum::routing::get(health))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(MapResponseLayer::new(payload_too_large_as_json))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Give oversized request rejections the same `{"error": ...}` body as other errors.
fn payload_too_large_as_json(mut response: Response<Body>) -> Response<Body> {
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
        *response.body_mut() = Body::from(json!({ "error": "Payload too large" }).to_string());
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    response
}

async fn health() -> &'static str {
    "ok"
}
