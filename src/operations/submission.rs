use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Operation, OperationContext, OperationHandler, OperationOutput, Resource, require};
use crate::api::{ApiRequest, fetch_all};
use crate::binary::BinaryItem;
use crate::error::{Error, Result};
use crate::submission::{
    DownloadOptions, FormatOptions, parse_string_list, reformat, resolve_attachments,
};

#[derive(Debug, Deserialize)]
struct ListSubmissionsInput {
    form_id: String,
    #[serde(default)]
    return_all: bool,
    #[serde(default)]
    limit: Option<u32>,
    /// Platform filter expression (JSON), sent as `query`.
    #[serde(default)]
    filter_json: Option<String>,
    /// Sort specification (JSON), sent as `sort`.
    #[serde(default)]
    sort: Option<String>,
    /// Comma-separated list of fields the server should return.
    #[serde(default)]
    fields: Option<String>,
    #[serde(default)]
    format: FormatOptions,
    #[serde(default)]
    download: DownloadOptions,
}

#[derive(Debug, Deserialize)]
struct GetSubmissionInput {
    form_id: String,
    submission_id: String,
    #[serde(default)]
    fields: Option<String>,
    #[serde(default)]
    format: FormatOptions,
    #[serde(default)]
    download: DownloadOptions,
}

#[derive(Debug, Deserialize)]
struct SubmissionRef {
    form_id: String,
    submission_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    #[serde(rename = "validation_status_approved", alias = "approved")]
    Approved,
    #[serde(rename = "validation_status_not_approved", alias = "not_approved")]
    NotApproved,
    #[serde(rename = "validation_status_on_hold", alias = "on_hold")]
    OnHold,
}

impl ValidationStatus {
    pub fn uid(&self) -> &'static str {
        match self {
            ValidationStatus::Approved => "validation_status_approved",
            ValidationStatus::NotApproved => "validation_status_not_approved",
            ValidationStatus::OnHold => "validation_status_on_hold",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SetValidationInput {
    form_id: String,
    submission_id: String,
    status: ValidationStatus,
}

fn fields_param(fields: Option<&str>) -> Option<String> {
    let fields = parse_string_list(fields?);
    if fields.is_empty() {
        return None;
    }
    serde_json::to_string(&fields).ok()
}

/// Make sure a caller-supplied JSON parameter is valid before sending it.
fn json_param(name: &str, value: Option<String>) -> Result<Option<String>> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    serde_json::from_str::<Value>(&value)
        .map_err(|e| Error::InvalidInput(format!("{name} is not valid JSON: {e}")))?;
    Ok(Some(value))
}

/// Reformat fetched records and download their attachments when asked to.
/// Attachments are resolved against the record as fetched, so masks never hide them.
async fn shape(
    ctx: &OperationContext,
    records: Vec<Value>,
    format: &FormatOptions,
    download: &DownloadOptions,
) -> Result<OperationOutput> {
    let mut output = OperationOutput::default();

    for record in records {
        let Value::Object(raw) = record else {
            output.items.push(record);
            continue;
        };

        let formatted = Value::Object(reformat(&raw, format));

        if download.download {
            let attachments = resolve_attachments(&ctx.client, &raw, download).await?;
            output.failures.extend(attachments.failures);
            output.binaries.push(BinaryItem {
                json: formatted.clone(),
                binary: attachments.payloads,
            });
        }

        output.items.push(formatted);
    }

    Ok(output)
}

pub struct ListSubmissions;

#[async_trait]
impl OperationHandler for ListSubmissions {
    fn resource(&self) -> Resource {
        Resource::Submission
    }

    fn operation(&self) -> Operation {
        Operation::GetAll
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: ListSubmissionsInput = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;

        let request = ApiRequest::get(format!("/api/v2/assets/{form_id}/data/"))
            .query_opt("query", json_param("filter_json", input.filter_json)?)
            .query_opt("sort", json_param("sort", input.sort)?)
            .query_opt("fields", fields_param(input.fields.as_deref()));

        let records = fetch_all(&ctx.client, &request, ctx.limit(input.limit), input.return_all).await?;
        tracing::info!("Fetched {} submissions of form {form_id}", records.len());

        shape(ctx, records, &input.format, &input.download).await
    }
}

pub struct GetSubmission;

#[async_trait]
impl OperationHandler for GetSubmission {
    fn resource(&self) -> Resource {
        Resource::Submission
    }

    fn operation(&self) -> Operation {
        Operation::Get
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: GetSubmissionInput = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;
        let submission_id = require(&input.submission_id, "submission_id")?;

        let request = ApiRequest::get(format!("/api/v2/assets/{form_id}/data/{submission_id}"))
            .query_opt("fields", fields_param(input.fields.as_deref()));
        let record = ctx.client.request_json(&request).await?;

        shape(ctx, vec![record], &input.format, &input.download).await
    }
}

pub struct DeleteSubmission;

#[async_trait]
impl OperationHandler for DeleteSubmission {
    fn resource(&self) -> Resource {
        Resource::Submission
    }

    fn operation(&self) -> Operation {
        Operation::Delete
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: SubmissionRef = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;
        let submission_id = require(&input.submission_id, "submission_id")?;

        ctx.client
            .send(&ApiRequest::delete(format!("/api/v2/assets/{form_id}/data/{submission_id}")))
            .await?;

        tracing::info!("Deleted submission {submission_id} of form {form_id}");
        Ok(OperationOutput::single(json!({ "success": true })))
    }
}

pub struct GetValidation;

#[async_trait]
impl OperationHandler for GetValidation {
    fn resource(&self) -> Resource {
        Resource::Submission
    }

    fn operation(&self) -> Operation {
        Operation::GetValidation
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: SubmissionRef = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;
        let submission_id = require(&input.submission_id, "submission_id")?;

        let status = ctx
            .client
            .request_json(&ApiRequest::get(format!(
                "/api/v2/assets/{form_id}/data/{submission_id}/validation_status/"
            )))
            .await?;

        Ok(OperationOutput::single(status))
    }
}

pub struct SetValidation;

#[async_trait]
impl OperationHandler for SetValidation {
    fn resource(&self) -> Resource {
        Resource::Submission
    }

    fn operation(&self) -> Operation {
        Operation::SetValidation
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: SetValidationInput = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;
        let submission_id = require(&input.submission_id, "submission_id")?;

        let request = ApiRequest::patch(format!(
            "/api/v2/assets/{form_id}/data/{submission_id}/validation_status/"
        ))
        .json(json!({ "validation_status.uid": input.status.uid() }));

        let status = ctx.client.request_json(&request).await?;
        Ok(OperationOutput::single(status))
    }
}
