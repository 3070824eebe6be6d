pub mod attachments;
pub mod format;
pub mod mask;
pub mod normalize;
pub mod parser;

use serde_json::{Map, Value};

/// One survey response. Key order follows the source document.
pub type Submission = Map<String, Value>;

pub use attachments::{
    AttachmentSet, AttachmentVersion, BinaryNaming, DownloadOptions, FailurePolicy,
    resolve_attachments,
};
pub use format::{FormatOptions, reformat};
pub use mask::{KeyMask, NumberMask, SelectMask, parse_string_list};
pub use normalize::normalize;
