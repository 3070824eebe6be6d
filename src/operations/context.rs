use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::{DEFAULT_PAGE_SIZE, KoboClient};
use crate::config::Config;
use crate::error::{Error, Result};

/// Everything an operation needs: the client (with its credentials) and the
/// parameters of this call.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub client: KoboClient,
    pub params: Value,
    /// Page size used when the parameters carry no `limit`.
    pub page_size: u32,
}

impl OperationContext {
    pub fn new(client: KoboClient, params: Value) -> Self {
        Self {
            client,
            params,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Context for the configured credentials and page size.
    pub fn from_config(config: &Config, params: Value) -> Result<Self> {
        let client = KoboClient::new(config.credentials.clone(), config.timeout)?;
        Ok(Self::new(client, params).with_page_size(config.page_size))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Decode the parameters into an operation's typed input.
    pub fn input<T: DeserializeOwned>(&self) -> Result<T> {
        let params = match &self.params {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(params).map_err(|e| Error::InvalidInput(e.to_string()))
    }

    pub fn limit(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.page_size)
    }
}
