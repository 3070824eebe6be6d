pub mod context;
pub mod file;
pub mod form;
pub mod hook;
pub mod submission;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use context::OperationContext;

use crate::binary::BinaryItem;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    File,
    Form,
    Hook,
    Submission,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::File => "file",
            Resource::Form => "form",
            Resource::Hook => "hook",
            Resource::Submission => "submission",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(Resource::File),
            "form" => Ok(Resource::Form),
            "hook" => Ok(Resource::Hook),
            "submission" => Ok(Resource::Submission),
            other => Err(Error::InvalidInput(format!("unknown resource '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Create,
    Delete,
    Get,
    GetAll,
    GetLogs,
    GetValidation,
    Redeploy,
    RetryAll,
    RetryOne,
    SetValidation,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Delete => "delete",
            Operation::Get => "get",
            Operation::GetAll => "getAll",
            Operation::GetLogs => "getLogs",
            Operation::GetValidation => "getValidation",
            Operation::Redeploy => "redeploy",
            Operation::RetryAll => "retryAll",
            Operation::RetryOne => "retryOne",
            Operation::SetValidation => "setValidation",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Operation::Create),
            "delete" => Ok(Operation::Delete),
            "get" => Ok(Operation::Get),
            "getAll" => Ok(Operation::GetAll),
            "getLogs" => Ok(Operation::GetLogs),
            "getValidation" => Ok(Operation::GetValidation),
            "redeploy" => Ok(Operation::Redeploy),
            "retryAll" => Ok(Operation::RetryAll),
            "retryOne" => Ok(Operation::RetryOne),
            "setValidation" => Ok(Operation::SetValidation),
            other => Err(Error::InvalidInput(format!("unknown operation '{other}'"))),
        }
    }
}

/// What an operation hands back: JSON records, plus any downloaded content.
#[derive(Debug, Default)]
pub struct OperationOutput {
    pub items: Vec<Value>,
    pub binaries: Vec<BinaryItem>,
    /// Attachment downloads that failed without aborting the operation.
    pub failures: Vec<Error>,
}

impl OperationOutput {
    pub fn items(items: Vec<Value>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn single(item: Value) -> Self {
        Self::items(vec![item])
    }
}

#[async_trait]
pub trait OperationHandler: Send + Sync {
    fn resource(&self) -> Resource;
    fn operation(&self) -> Operation;
    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput>;
}

/// Dispatch table from `(resource, operation)` to its handler.
pub struct OperationRegistry {
    handlers: HashMap<(Resource, Operation), Arc<dyn OperationHandler>>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry holding every built-in operation.
    pub fn standard() -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(form::GetForm));
        registry.register(Arc::new(form::ListForms));
        registry.register(Arc::new(form::RedeployForm));

        registry.register(Arc::new(submission::ListSubmissions));
        registry.register(Arc::new(submission::GetSubmission));
        registry.register(Arc::new(submission::DeleteSubmission));
        registry.register(Arc::new(submission::GetValidation));
        registry.register(Arc::new(submission::SetValidation));

        registry.register(Arc::new(hook::ListHooks));
        registry.register(Arc::new(hook::GetHook));
        registry.register(Arc::new(hook::RetryAll));
        registry.register(Arc::new(hook::GetLogs));
        registry.register(Arc::new(hook::RetryOne));

        registry.register(Arc::new(file::ListFiles));
        registry.register(Arc::new(file::GetFile));
        registry.register(Arc::new(file::DeleteFile));
        registry.register(Arc::new(file::CreateFile));

        registry
    }

    pub fn register(&mut self, handler: Arc<dyn OperationHandler>) {
        self.handlers
            .insert((handler.resource(), handler.operation()), handler);
    }

    pub fn get(&self, resource: Resource, operation: Operation) -> Option<&Arc<dyn OperationHandler>> {
        self.handlers.get(&(resource, operation))
    }

    /// Registered pairs, sorted.
    pub fn list(&self) -> Vec<(Resource, Operation)> {
        let mut pairs: Vec<_> = self.handlers.keys().copied().collect();
        pairs.sort();
        pairs
    }

    pub async fn dispatch(
        &self,
        resource: Resource,
        operation: Operation,
        ctx: &OperationContext,
    ) -> Result<OperationOutput> {
        let handler = self
            .get(resource, operation)
            .ok_or_else(|| Error::UnsupportedOperation {
                resource: resource.to_string(),
                operation: operation.to_string(),
            })?;

        tracing::debug!("Dispatching {resource}/{operation}");
        handler.execute(ctx).await
    }

    /// Like [`dispatch`](Self::dispatch), with names as the platform integration spells them.
    pub async fn dispatch_named(
        &self,
        resource: &str,
        operation: &str,
        ctx: &OperationContext,
    ) -> Result<OperationOutput> {
        self.dispatch(resource.parse()?, operation.parse()?, ctx).await
    }
}

/// Reject empty identifiers before they end up in a URL path.
pub(crate) fn require<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{name} is required")));
    }
    Ok(trimmed)
}
