use rmcp::model::{Annotated, RawResource, Resource};

use super::export::Encoding;
use crate::google::DriveFile;

pub const URI_PREFIX: &str = "gdrive:///";

/// Marker placed before base64 bodies so readers can tell them apart from text.
pub const BINARY_PREFIX: &str = "[Binary file - Base64 encoded]\n";

pub fn file_uri(file_id: &str) -> String {
    format!("{}{}", URI_PREFIX, file_id)
}

/// File id from a `gdrive:///{id}` URI.
pub fn parse_uri(uri: &str) -> Option<&str> {
    uri.strip_prefix(URI_PREFIX)
        .map(|id| id.trim_end_matches('/'))
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

pub fn to_resource(file: DriveFile) -> Option<Resource> {
    let id = file.id?;
    Some(Annotated {
        raw: RawResource {
            uri: file_uri(&id),
            name: file.name.unwrap_or_else(|| id.clone()),
            title: None,
            description: file.modified_time.map(|t| format!("Modified {}", t)),
            mime_type: file.mime_type,
            size: None,
            icons: None,
        },
        annotations: None,
    })
}

pub fn resource_text(content: String, encoding: Encoding) -> String {
    match encoding {
        Encoding::Utf8 => content,
        Encoding::Base64 => format!("{}{}", BINARY_PREFIX, content),
    }
}
