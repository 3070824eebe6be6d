use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use super::Submission;
use super::mask::leaf_segment;
use crate::api::KoboClient;
use crate::binary::BinaryPayload;
use crate::error::{Error, Result};

/// Reserved submission key listing uploaded media.
pub const ATTACHMENTS_KEY: &str = "_attachments";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// How downloaded attachments are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryNaming {
    /// After the question whose answer is the file, falling back to index naming.
    #[default]
    Question,
    /// `prefix` followed by the position in `_attachments`.
    Index,
}

impl FromStr for BinaryNaming {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "question" => Ok(BinaryNaming::Question),
            "index" => Ok(BinaryNaming::Index),
            other => Err(format!("unknown binary naming scheme '{other}'")),
        }
    }
}

/// Which rendition of an attachment to download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum AttachmentVersion {
    #[default]
    #[serde(rename = "download_url")]
    Original,
    #[serde(rename = "download_large_url")]
    Large,
    #[serde(rename = "download_medium_url")]
    Medium,
    #[serde(rename = "download_small_url")]
    Small,
}

impl AttachmentVersion {
    pub fn field(&self) -> &'static str {
        match self {
            AttachmentVersion::Original => "download_url",
            AttachmentVersion::Large => "download_large_url",
            AttachmentVersion::Medium => "download_medium_url",
            AttachmentVersion::Small => "download_small_url",
        }
    }
}

impl FromStr for AttachmentVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "download_url" => Ok(AttachmentVersion::Original),
            "download_large_url" => Ok(AttachmentVersion::Large),
            "download_medium_url" => Ok(AttachmentVersion::Medium),
            "download_small_url" => Ok(AttachmentVersion::Small),
            other => Err(format!("unknown attachment version '{other}'")),
        }
    }
}

/// What to do when one attachment fails to download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going and report the failure next to the successful payloads.
    #[default]
    BestEffort,
    /// Stop at the first failure.
    FailFast,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    pub download: bool,
    pub naming: BinaryNaming,
    pub prefix: String,
    pub version: AttachmentVersion,
    pub policy: FailurePolicy,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            download: false,
            naming: BinaryNaming::default(),
            prefix: "attachment_".to_string(),
            version: AttachmentVersion::default(),
            policy: FailurePolicy::default(),
        }
    }
}

/// Entry of a submission's `_attachments` list.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentRef {
    pub filename: String,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub download_large_url: Option<String>,
    #[serde(default)]
    pub download_medium_url: Option<String>,
    #[serde(default)]
    pub download_small_url: Option<String>,
}

impl AttachmentRef {
    /// URL of the requested rendition, falling back to the original.
    pub fn url_for(&self, version: AttachmentVersion) -> Option<&str> {
        let preferred = match version {
            AttachmentVersion::Original => None,
            AttachmentVersion::Large => self.download_large_url.as_deref(),
            AttachmentVersion::Medium => self.download_medium_url.as_deref(),
            AttachmentVersion::Small => self.download_small_url.as_deref(),
        };

        preferred
            .or(self.download_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// File name without the storage path.
    pub fn basename(&self) -> &str {
        leaf_segment(&self.filename)
    }
}

/// Result of resolving a submission's attachments.
#[derive(Debug, Default)]
pub struct AttachmentSet {
    pub payloads: Vec<BinaryPayload>,
    /// One [`Error::Fetch`] per attachment that could not be downloaded.
    pub failures: Vec<Error>,
}

impl AttachmentSet {
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty() && self.failures.is_empty()
    }

    pub fn get(&self, property: &str) -> Option<&BinaryPayload> {
        self.payloads.iter().find(|p| p.property == property)
    }
}

/// Attachments declared by a submission, with their position in `_attachments`.
/// Entries without a `filename` are skipped.
pub fn attachment_refs(submission: &Submission) -> Vec<(usize, AttachmentRef)> {
    let Some(entries) = submission.get(ATTACHMENTS_KEY).and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<AttachmentRef>(entry.clone()) {
            Ok(attachment) => Some((index, attachment)),
            Err(e) => {
                tracing::warn!("Skipping malformed attachment entry {index}: {e}");
                None
            }
        })
        .collect()
}

/// Leaf name of the question whose answer names `filename`.
///
/// An answer owns the file when the filename ends with the answer, with
/// whitespace replaced by `_`. The last matching question wins. The full key
/// is used when its leaf name is ambiguous.
pub fn related_question(submission: &Submission, filename: &str) -> Option<String> {
    let mut related = None;

    for (key, value) in submission {
        if key.starts_with('_') {
            continue;
        }

        let answer = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        if answer.is_empty() {
            continue;
        }

        let sanitized: String = answer
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        if filename.ends_with(&sanitized) {
            related = Some(key.as_str());
        }
    }

    related.map(|key| question_property(submission, key))
}

/// Leaf segment of `key`, or the full key when another question in the
/// submission shares that leaf (`grp1/photo` next to `grp2/photo`).
fn question_property(submission: &Submission, key: &str) -> String {
    let leaf = leaf_segment(key);
    let shared = submission
        .keys()
        .filter(|other| !other.starts_with('_') && leaf_segment(other) == leaf)
        .count();

    if shared > 1 { key.to_string() } else { leaf.to_string() }
}

/// Download every attachment of `submission` and key it by property name.
///
/// Does nothing unless `options.download` is set. Downloads run one after
/// another in `_attachments` order.
pub async fn resolve_attachments(
    client: &KoboClient,
    submission: &Submission,
    options: &DownloadOptions,
) -> Result<AttachmentSet> {
    let mut set = AttachmentSet::default();
    if !options.download {
        return Ok(set);
    }

    for (index, attachment) in attachment_refs(submission) {
        let property = match options.naming {
            BinaryNaming::Question => related_question(submission, &attachment.filename),
            BinaryNaming::Index => None,
        }
        .filter(|property| set.get(property).is_none())
        .unwrap_or_else(|| format!("{}{index}", options.prefix));

        match fetch_attachment(client, &attachment, options.version, property).await {
            Ok(payload) => {
                tracing::debug!(
                    "Downloaded attachment {} as '{}' ({} bytes)",
                    attachment.filename,
                    payload.property,
                    payload.size()
                );
                set.payloads.push(payload);
            }
            Err(e) if options.policy == FailurePolicy::FailFast => return Err(e),
            Err(e) => {
                tracing::warn!("{e}");
                set.failures.push(e);
            }
        }
    }

    Ok(set)
}

async fn fetch_attachment(
    client: &KoboClient,
    attachment: &AttachmentRef,
    version: AttachmentVersion,
    property: String,
) -> Result<BinaryPayload> {
    let fetch_error = |message: String| Error::Fetch {
        filename: attachment.filename.clone(),
        message,
    };

    let url = attachment
        .url_for(version)
        .ok_or_else(|| fetch_error(format!("no {} available", version.field())))?;

    let download = client
        .fetch_binary(url)
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    let mime_type = download
        .content_type
        .or_else(|| attachment.mimetype.clone())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

    Ok(BinaryPayload {
        property,
        filename: attachment.basename().to_string(),
        mime_type,
        data: download.data,
    })
}
