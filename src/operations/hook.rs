use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use super::{Operation, OperationContext, OperationHandler, OperationOutput, Resource, require};
use crate::api::{ApiRequest, fetch_all};
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct HookRef {
    form_id: String,
    hook_id: String,
}

#[derive(Debug, Deserialize)]
struct ListHooksInput {
    form_id: String,
    #[serde(default)]
    return_all: bool,
    #[serde(default)]
    limit: Option<u32>,
}

/// Delivery state of a hook log entry, sent as the platform's numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookLogStatus {
    Failed,
    Pending,
    Success,
}

impl HookLogStatus {
    pub fn code(&self) -> u8 {
        match self {
            HookLogStatus::Failed => 0,
            HookLogStatus::Pending => 1,
            HookLogStatus::Success => 2,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetLogsInput {
    form_id: String,
    hook_id: String,
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
    #[serde(default)]
    status: Option<HookLogStatus>,
    #[serde(default)]
    return_all: bool,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LogRef {
    form_id: String,
    hook_id: String,
    log_id: String,
}

fn timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

pub struct ListHooks;

#[async_trait]
impl OperationHandler for ListHooks {
    fn resource(&self) -> Resource {
        Resource::Hook
    }

    fn operation(&self) -> Operation {
        Operation::GetAll
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: ListHooksInput = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;

        let request = ApiRequest::get(format!("/api/v2/assets/{form_id}/hooks/"));
        let hooks = fetch_all(&ctx.client, &request, ctx.limit(input.limit), input.return_all).await?;

        Ok(OperationOutput::items(hooks))
    }
}

pub struct GetHook;

#[async_trait]
impl OperationHandler for GetHook {
    fn resource(&self) -> Resource {
        Resource::Hook
    }

    fn operation(&self) -> Operation {
        Operation::Get
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: HookRef = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;
        let hook_id = require(&input.hook_id, "hook_id")?;

        let hook = ctx
            .client
            .request_json(&ApiRequest::get(format!("/api/v2/assets/{form_id}/hooks/{hook_id}")))
            .await?;

        Ok(OperationOutput::single(hook))
    }
}

pub struct RetryAll;

#[async_trait]
impl OperationHandler for RetryAll {
    fn resource(&self) -> Resource {
        Resource::Hook
    }

    fn operation(&self) -> Operation {
        Operation::RetryAll
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: HookRef = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;
        let hook_id = require(&input.hook_id, "hook_id")?;

        let result = ctx
            .client
            .request_json(&ApiRequest::patch(format!(
                "/api/v2/assets/{form_id}/hooks/{hook_id}/retry/"
            )))
            .await?;

        tracing::info!("Retrying failed deliveries of hook {hook_id}");
        Ok(OperationOutput::single(result))
    }
}

pub struct GetLogs;

#[async_trait]
impl OperationHandler for GetLogs {
    fn resource(&self) -> Resource {
        Resource::Hook
    }

    fn operation(&self) -> Operation {
        Operation::GetLogs
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: GetLogsInput = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;
        let hook_id = require(&input.hook_id, "hook_id")?;

        let request = ApiRequest::get(format!("/api/v2/assets/{form_id}/hooks/{hook_id}/logs/"))
            .query_opt("start", timestamp(input.start))
            .query_opt("end", timestamp(input.end))
            .query_opt("status", input.status.map(|s| s.code()));

        let logs = fetch_all(&ctx.client, &request, ctx.limit(input.limit), input.return_all).await?;
        Ok(OperationOutput::items(logs))
    }
}

pub struct RetryOne;

#[async_trait]
impl OperationHandler for RetryOne {
    fn resource(&self) -> Resource {
        Resource::Hook
    }

    fn operation(&self) -> Operation {
        Operation::RetryOne
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: LogRef = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;
        let hook_id = require(&input.hook_id, "hook_id")?;
        let log_id = require(&input.log_id, "log_id")?;

        let result = ctx
            .client
            .request_json(&ApiRequest::patch(format!(
                "/api/v2/assets/{form_id}/hooks/{hook_id}/logs/{log_id}/retry/"
            )))
            .await?;

        Ok(OperationOutput::single(result))
    }
}
