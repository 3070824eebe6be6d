use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::{Response, Url};
use serde_json::Value;

use super::request::ApiRequest;
use crate::error::{Error, Result};

/// Redirect hops followed when downloading binary content.
pub const MAX_REDIRECTS: usize = 5;

const ERROR_BODY_LIMIT: usize = 1024;

/// API root and token for the survey platform.
#[derive(Clone)]
pub struct Credentials {
    pub url: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Raw bytes returned by a content download.
#[derive(Debug, Clone)]
pub struct Download {
    pub data: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KoboClient {
    http: reqwest::Client,
    /// Same settings as `http` but never follows redirects on its own.
    raw: reqwest::Client,
    base: Url,
    credentials: Credentials,
}

impl KoboClient {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        let base = Url::parse(&credentials.url)
            .map_err(|e| Error::Config(format!("Invalid API root URL '{}': {e}", credentials.url)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        let raw = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            raw,
            base,
            credentials,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.credentials.token)
    }

    /// Resolve a path against the API root. Absolute URLs are returned as-is.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|e| Error::InvalidInput(format!("Invalid URL '{path}': {e}")));
        }

        let root = self.base.as_str().trim_end_matches('/');
        let joined = format!("{root}/{}", path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| Error::InvalidInput(format!("Invalid URL '{joined}': {e}")))
    }

    /// Send a request and fail on any non-2xx status.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response> {
        let url = self.url_for(&request.path)?;
        let method = request.method.clone();

        tracing::debug!("{method} {url}");

        let mut builder = self
            .http
            .request(method.clone(), url.clone())
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|source| Error::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source,
        })?;

        ensure_success(&method.to_string(), resp).await
    }

    /// Send a request and decode its JSON body. An empty body decodes to `null`.
    pub async fn request_json(&self, request: &ApiRequest) -> Result<Value> {
        let resp = self.send(request).await?;
        let url = resp.url().to_string();
        let method = request.method.to_string();

        let text = resp.text().await.map_err(|source| Error::Transport {
            method,
            url: url.clone(),
            source,
        })?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| Error::protocol(&url, format!("Invalid JSON: {e}")))
    }

    /// Check that the credentials are accepted by listing one asset.
    pub async fn check_credentials(&self) -> Result<()> {
        self.send(&ApiRequest::get("/api/v2/assets/").query("limit", 1))
            .await
            .map(|_| ())
    }

    /// Whether `url` has the API root's scheme, host and port.
    pub fn is_api_origin(&self, url: &Url) -> bool {
        url.scheme() == self.base.scheme()
            && url.host_str() == self.base.host_str()
            && url.port_or_known_default() == self.base.port_or_known_default()
    }

    /// Download binary content, following up to [`MAX_REDIRECTS`] redirects.
    /// The token is only sent to hops on the API root's origin.
    pub async fn fetch_binary(&self, url: &str) -> Result<Download> {
        let mut current = self.url_for(url)?;

        for hop in 0..=MAX_REDIRECTS {
            let mut builder = self.raw.get(current.clone());
            if self.is_api_origin(&current) {
                builder = builder.header(AUTHORIZATION, self.auth_header());
            }

            let resp = builder
                .send()
                .await
                .map_err(|source| Error::Transport {
                    method: "GET".to_string(),
                    url: current.to_string(),
                    source,
                })?;

            if resp.status().is_redirection() {
                let location = resp
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| Error::protocol(current.as_str(), "Redirect without Location header"))?;
                let next = current
                    .join(location)
                    .map_err(|e| Error::protocol(current.as_str(), format!("Invalid redirect target: {e}")))?;
                tracing::debug!("Following redirect {} of {MAX_REDIRECTS} to {next}", hop + 1);
                current = next;
                continue;
            }

            let resp = ensure_success("GET", resp).await?;
            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let data = resp.bytes().await.map_err(|source| Error::Transport {
                method: "GET".to_string(),
                url: current.to_string(),
                source,
            })?;

            return Ok(Download { data, content_type });
        }

        Err(Error::protocol(url, format!("Too many redirects (max {MAX_REDIRECTS})")))
    }
}

async fn ensure_success(method: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let url = resp.url().to_string();
    let body = resp
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(ERROR_BODY_LIMIT)
        .collect::<String>();

    tracing::debug!("{method} {url} returned {status}");

    Err(Error::Request {
        method: method.to_string(),
        url,
        status: status.as_u16(),
        body,
    })
}
