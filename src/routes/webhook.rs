use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::state::SharedState;
use crate::submission::{parser, reformat, resolve_attachments};

/// Receive a submission pushed by a platform hook.
pub async fn receive(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok());

    let raw = parser::parse_body(content_type, &body).map_err(AppError::BadRequest)?;
    let Value::Object(raw) = raw else {
        return Err(AppError::BadRequest(
            "Submission must be a JSON object".to_string(),
        ));
    };

    let submission_id = raw
        .get("_id")
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<unknown>".to_string());

    let submission = reformat(&raw, &state.config.format);
    let attachments = resolve_attachments(&state.client, &raw, &state.config.download).await?;

    let mut document = json!({
        "submission": submission,
        "attachments": attachments
            .payloads
            .iter()
            .map(|p| p.summary())
            .collect::<Vec<_>>(),
        "failures": attachments
            .failures
            .iter()
            .map(|e| json!({ "filename": e.attachment(), "error": e.to_string() }))
            .collect::<Vec<_>>(),
    });

    tracing::info!(
        "Received submission {submission_id} ({} attachments, {} failed)",
        attachments.payloads.len(),
        attachments.failures.len()
    );

    if let Some(relay) = &state.relay {
        // Downstream gets the downloaded content too, the caller only the summaries.
        let mut relayed_document = document.clone();
        relayed_document["attachments"] = attachments
            .payloads
            .iter()
            .map(|p| p.to_json())
            .collect();

        let relayed = match relay.send(&relayed_document).await {
            Ok(resp) if resp.is_success() => true,
            Ok(resp) => {
                tracing::warn!(
                    "Relay to {} answered {}: {}",
                    relay.url(),
                    resp.status_code,
                    resp.body
                );
                false
            }
            Err(e) => {
                tracing::warn!("Relay failed: {e}");
                false
            }
        };
        document["relayed"] = json!(relayed);
    }

    Ok(Json(document))
}
