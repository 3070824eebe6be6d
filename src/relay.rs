use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};

const RESPONSE_BODY_LIMIT: usize = 1024;

/// Forwards processed submissions to a downstream URL.
#[derive(Debug, Clone)]
pub struct Relay {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse {
    pub status_code: u16,
    pub body: String,
}

impl RelayResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

impl Relay {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build relay client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `body` as JSON. Non-2xx answers are returned, not raised.
    pub async fn send(&self, body: &Value) -> Result<RelayResponse> {
        let resp = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|source| Error::Transport {
                method: "POST".to_string(),
                url: self.url.clone(),
                source,
            })?;

        let status_code = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(RESPONSE_BODY_LIMIT)
            .collect::<String>();

        Ok(RelayResponse { status_code, body })
    }
}
