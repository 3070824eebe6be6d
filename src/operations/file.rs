use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Operation, OperationContext, OperationHandler, OperationOutput, Resource, require};
use crate::api::{ApiRequest, KoboClient, fetch_all};
use crate::binary::{BinaryItem, BinaryPayload};
use crate::error::{Error, Result};

const FORM_MEDIA: &str = "form_media";

fn default_property() -> String {
    "data".to_string()
}

/// Identifies a form media file either by uid or by file name.
#[derive(Debug, Deserialize)]
struct FileSelector {
    form_id: String,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListFilesInput {
    form_id: String,
    #[serde(default)]
    download: bool,
    #[serde(default = "default_property")]
    binary_property_name: String,
}

#[derive(Debug, Deserialize)]
struct GetFileInput {
    #[serde(flatten)]
    selector: FileSelector,
    #[serde(default)]
    download: bool,
    #[serde(default = "default_property")]
    binary_property_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FileSource {
    /// Content already encoded as base64.
    Binary {
        file_name: String,
        mime_type: String,
        data: String,
    },
    Text {
        file_name: String,
        #[serde(default = "default_text_mime")]
        mime_type: String,
        content: String,
    },
    /// The platform fetches the file from this URL.
    Url { url: String },
}

fn default_text_mime() -> String {
    "text/plain".to_string()
}

impl FileSource {
    fn file_name(&self) -> Option<&str> {
        match self {
            FileSource::Binary { file_name, .. } | FileSource::Text { file_name, .. } => {
                Some(file_name.as_str())
            }
            FileSource::Url { .. } => None,
        }
    }

    /// Request body for the file upload endpoint.
    fn upload_body(&self, description: &str) -> Result<Value> {
        let mut body = json!({
            "description": description,
            "file_type": FORM_MEDIA,
        });

        match self {
            FileSource::Binary {
                file_name,
                mime_type,
                data,
            } => {
                STANDARD
                    .decode(data.trim())
                    .map_err(|e| Error::InvalidInput(format!("data is not valid base64: {e}")))?;
                body["base64Encoded"] = json!(format!("data:{mime_type};base64,{}", data.trim()));
                body["metadata"] = json!({ "filename": require(file_name, "file_name")? });
            }
            FileSource::Text {
                file_name,
                mime_type,
                content,
            } => {
                body["base64Encoded"] = json!(format!("data:{mime_type};base64,{}", STANDARD.encode(content)));
                body["metadata"] = json!({ "filename": require(file_name, "file_name")? });
            }
            FileSource::Url { url } => {
                body["metadata"] = json!({ "redirect_url": require(url, "url")? });
            }
        }

        Ok(body)
    }
}

fn default_description() -> String {
    "Uploaded file".to_string()
}

#[derive(Debug, Deserialize)]
struct CreateFileInput {
    form_id: String,
    source: FileSource,
    #[serde(default)]
    overwrite: bool,
    #[serde(default = "default_description")]
    description: String,
}

fn files_path(form_id: &str) -> String {
    format!("/api/v2/assets/{form_id}/files")
}

fn file_name_of(file: &Value) -> Option<&str> {
    file.get("metadata")
        .and_then(|m| m.get("filename"))
        .and_then(Value::as_str)
}

fn uid_of(file: &Value) -> Option<&str> {
    file.get("uid").and_then(Value::as_str)
}

/// Every form media file attached to a form.
pub async fn list_files(client: &KoboClient, form_id: &str) -> Result<Vec<Value>> {
    let request = ApiRequest::get(files_path(form_id)).query("file_type", FORM_MEDIA);
    fetch_all(client, &request, crate::api::DEFAULT_PAGE_SIZE, true).await
}

/// First form media file whose `metadata.filename` equals `file_name`.
pub async fn find_file_by_name(client: &KoboClient, form_id: &str, file_name: &str) -> Result<Option<Value>> {
    let files = list_files(client, form_id).await?;
    Ok(files.into_iter().find(|f| file_name_of(f) == Some(file_name)))
}

async fn resolve_file_id(client: &KoboClient, selector: &FileSelector) -> Result<String> {
    let form_id = require(&selector.form_id, "form_id")?;

    if let Some(file_id) = selector.file_id.as_deref().filter(|id| !id.trim().is_empty()) {
        return Ok(file_id.trim().to_string());
    }

    let Some(file_name) = selector.file_name.as_deref().filter(|n| !n.trim().is_empty()) else {
        return Err(Error::InvalidInput("file_id or file_name is required".to_string()));
    };

    find_file_by_name(client, form_id, file_name)
        .await?
        .as_ref()
        .and_then(uid_of)
        .map(str::to_string)
        .ok_or_else(|| Error::NotFound(format!("No file found matching name \"{file_name}\"")))
}

async fn download_file(
    client: &KoboClient,
    form_id: &str,
    file: Value,
    property: &str,
) -> Result<BinaryItem> {
    let uid = uid_of(&file)
        .ok_or_else(|| Error::protocol(&files_path(form_id), "file entry without uid"))?;

    let url = client.url_for(&format!("{}/{uid}/content", files_path(form_id)))?;
    let download = client.fetch_binary(url.as_str()).await?;

    let filename = file_name_of(&file).unwrap_or(uid).to_string();
    let mime_type = download
        .content_type
        .or_else(|| {
            file.get("metadata")
                .and_then(|m| m.get("mimetype"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(BinaryItem {
        binary: vec![BinaryPayload {
            property: property.to_string(),
            filename,
            mime_type,
            data: download.data,
        }],
        json: file,
    })
}

pub struct ListFiles;

#[async_trait]
impl OperationHandler for ListFiles {
    fn resource(&self) -> Resource {
        Resource::File
    }

    fn operation(&self) -> Operation {
        Operation::GetAll
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: ListFilesInput = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;

        let files = list_files(&ctx.client, form_id).await?;
        let mut output = OperationOutput::items(files.clone());

        if input.download {
            for file in files {
                output
                    .binaries
                    .push(download_file(&ctx.client, form_id, file, &input.binary_property_name).await?);
            }
        }

        Ok(output)
    }
}

pub struct GetFile;

#[async_trait]
impl OperationHandler for GetFile {
    fn resource(&self) -> Resource {
        Resource::File
    }

    fn operation(&self) -> Operation {
        Operation::Get
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: GetFileInput = ctx.input()?;
        let form_id = require(&input.selector.form_id, "form_id")?;
        let file_id = resolve_file_id(&ctx.client, &input.selector).await?;

        let file = ctx
            .client
            .request_json(&ApiRequest::get(format!("{}/{file_id}", files_path(form_id))))
            .await?;
        let mut output = OperationOutput::single(file.clone());

        if input.download {
            output
                .binaries
                .push(download_file(&ctx.client, form_id, file, &input.binary_property_name).await?);
        }

        Ok(output)
    }
}

pub struct DeleteFile;

#[async_trait]
impl OperationHandler for DeleteFile {
    fn resource(&self) -> Resource {
        Resource::File
    }

    fn operation(&self) -> Operation {
        Operation::Delete
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let selector: FileSelector = ctx.input()?;
        let form_id = require(&selector.form_id, "form_id")?;
        let file_id = resolve_file_id(&ctx.client, &selector).await?;

        ctx.client
            .send(&ApiRequest::delete(format!("{}/{file_id}", files_path(form_id))))
            .await?;

        tracing::info!("Deleted file {file_id} of form {form_id}");
        Ok(OperationOutput::single(json!({ "success": true, "uid": file_id })))
    }
}

pub struct CreateFile;

#[async_trait]
impl OperationHandler for CreateFile {
    fn resource(&self) -> Resource {
        Resource::File
    }

    fn operation(&self) -> Operation {
        Operation::Create
    }

    async fn execute(&self, ctx: &OperationContext) -> Result<OperationOutput> {
        let input: CreateFileInput = ctx.input()?;
        let form_id = require(&input.form_id, "form_id")?;
        let body = input.source.upload_body(&input.description)?;

        if input.overwrite {
            if let Some(file_name) = input.source.file_name() {
                let existing = find_file_by_name(&ctx.client, form_id, file_name).await?;
                if let Some(uid) = existing.as_ref().and_then(uid_of) {
                    tracing::info!("Replacing existing file {file_name} ({uid}) of form {form_id}");
                    ctx.client
                        .send(&ApiRequest::delete(format!("{}/{uid}", files_path(form_id))))
                        .await?;
                }
            }
        }

        let created = ctx
            .client
            .request_json(&ApiRequest::post(format!("{}/", files_path(form_id))).json(body))
            .await?;

        Ok(OperationOutput::single(created))
    }
}
