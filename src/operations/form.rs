use async_trait::async_trait;
use serde::Deserialize;

use super::{Operation, OperationContext, OperationHandler, OperationOutput, Resource, require};
use crate::api::{ApiRequest, fetch_all};
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct FormRef {
    form_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FormSort {
    ordering: String,
    descending: bool,
}

impl FormSort {
    fn to_param(&self) -> Option<String> {
        let ordering = self.ordering.trim();
        if ordering.is_empty() {
            return None;
        }
        Some(if self.descending {
            format!("-{ordering}")
        } else {
            ordering.to_string()
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListFormsInput {
    return_all: bool,
    limit: Option<u32>,
    /// Platform query expression passed as `q`.
    filter: Option<String>,
    sort: Option<FormSort>,
}

pub struct GetForm;

#[async_trait]
impl OperationHandler for GetForm {
    fn resource(&self) -> Resource {
        Resource::Form
    }

    fn operation(&self) -> Operation {
        Operation::Get
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: FormRef = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;

        let form = ctx
            .client
            .request_json(&ApiRequest::get(format!("/api/v2/assets/{form_id}")))
            .await?;

        Ok(OperationOutput::single(form))
    }
}

pub struct ListForms;

#[async_trait]
impl OperationHandler for ListForms {
    fn resource(&self) -> Resource {
        Resource::Form
    }

    fn operation(&self) -> Operation {
        Operation::GetAll
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: ListFormsInput = ctx.input()?;

        let request = ApiRequest::get("/api/v2/assets/")
            .query_opt("q", input.filter.filter(|f| !f.trim().is_empty()))
            .query_opt("ordering", input.sort.as_ref().and_then(FormSort::to_param));

        let forms = fetch_all(&ctx.client, &request, ctx.limit(input.limit), input.return_all).await?;
        tracing::info!("Fetched {} forms", forms.len());

        Ok(OperationOutput::items(forms))
    }
}

pub struct RedeployForm;

#[async_trait]
impl OperationHandler for RedeployForm {
    fn resource(&self) -> Resource {
        Resource::Form
    }

    fn operation(&self) -> Operation {
        Operation::Redeploy
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: FormRef = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;

        let deployment = ctx
            .client
            .request_json(&ApiRequest::patch(format!("/api/v2/assets/{form_id}/deployment/")))
            .await?;

        tracing::info!("Redeployed form {form_id}");
        Ok(OperationOutput::single(deployment))
    }
}
