pub mod webhook;

use axum::Router;
use axum::routing::post;

use crate::state::SharedState;

pub fn webhook_routes() -> Router<SharedState> {
    Router::new().route("/webhook", post(webhook::receive))
}
