use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde_json::{Value, json};

/// Downloaded content tied to a property name.
#[derive(Debug, Clone)]
pub struct BinaryPayload {
    pub property: String,
    pub filename: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl BinaryPayload {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// JSON description of the payload without its content.
    pub fn summary(&self) -> Value {
        json!({
            "property": self.property,
            "filename": self.filename,
            "mime_type": self.mime_type,
            "size": self.size(),
        })
    }

    /// [`summary`](Self::summary) plus the content as base64 under `data`.
    pub fn to_json(&self) -> Value {
        let mut value = self.summary();
        value["data"] = Value::String(STANDARD.encode(&self.data));
        value
    }
}

/// A JSON record together with the binaries downloaded for it.
#[derive(Debug, Clone)]
pub struct BinaryItem {
    pub json: Value,
    pub binary: Vec<BinaryPayload>,
}

impl BinaryItem {
    pub fn get(&self, property: &str) -> Option<&BinaryPayload> {
        self.binary.iter().find(|p| p.property == property)
    }
}
