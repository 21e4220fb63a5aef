//! How a Drive file turns into agent-readable content: query building,
//! export targets for Workspace-native files, and text vs base64 encoding.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;

pub const NATIVE_PREFIX: &str = "application/vnd.google-apps.";

/// Export target used when the caller does not override it.
pub fn default_export_mime(source_mime: &str) -> Option<&'static str> {
    match source_mime {
        "application/vnd.google-apps.document" => Some("text/markdown"),
        "application/vnd.google-apps.spreadsheet" => Some("text/csv"),
        "application/vnd.google-apps.presentation" => Some("text/plain"),
        "application/vnd.google-apps.drawing" => Some("image/png"),
        _ => None,
    }
}

pub fn is_native(mime: &str) -> bool {
    mime.starts_with(NATIVE_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    Export { target: String },
    Download,
}

impl Fetch {
    /// MIME type of the bytes this fetch produces.
    pub fn content_mime<'a>(&'a self, stored_mime: &'a str) -> &'a str {
        match self {
            Fetch::Export { target } => target,
            Fetch::Download => stored_mime,
        }
    }
}

/// Decides between export and raw download for a file of `source_mime`.
pub fn plan_fetch(source_mime: &str, export_override: Option<&str>) -> Result<Fetch, ConnectorError> {
    let export_override = export_override.map(str::trim).filter(|m| !m.is_empty());
    if !is_native(source_mime) {
        if let Some(target) = export_override {
            return Err(ConnectorError::InvalidParams(format!(
                "unsupported export target: '{}' files cannot be exported to '{}'",
                source_mime, target
            )));
        }
        return Ok(Fetch::Download);
    }
    match (default_export_mime(source_mime), export_override) {
        (Some(_), Some(target)) => Ok(Fetch::Export {
            target: target.to_string(),
        }),
        (Some(default), None) => Ok(Fetch::Export {
            target: default.to_string(),
        }),
        (None, _) => Err(ConnectorError::InvalidParams(format!(
            "unsupported export target: '{}' has no readable export",
            source_mime
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

pub fn is_text_mime(mime: &str) -> bool {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("text/")
        || essence == "application/json"
        || essence.ends_with("+json")
        || essence == "application/xml"
        || essence.ends_with("+xml")
}

/// UTF-8 for text content types, base64 for everything else or when the
/// bytes are not valid UTF-8.
pub fn encode_content(bytes: Vec<u8>, content_mime: &str) -> (String, Encoding) {
    if is_text_mime(content_mime) {
        match String::from_utf8(bytes) {
            Ok(text) => return (text, Encoding::Utf8),
            Err(e) => {
                let bytes = e.into_bytes();
                return (
                    base64::engine::general_purpose::STANDARD.encode(bytes),
                    Encoding::Base64,
                );
            }
        }
    }
    (
        base64::engine::general_purpose::STANDARD.encode(bytes),
        Encoding::Base64,
    )
}

/// Escapes a value for use inside a single-quoted Drive query literal.
pub fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn search_query(text: &str, folder_id: Option<&str>) -> String {
    let full_text = format!("fullText contains '{}'", escape_query_literal(text));
    match folder_id {
        Some(folder) => format!("'{}' in parents and {}", escape_query_literal(folder), full_text),
        None => full_text,
    }
}

/// Direct, non-trashed children of a folder, optionally of one MIME type.
pub fn children_query(folder_id: &str, mime_type: Option<&str>) -> String {
    let mut q = format!(
        "'{}' in parents and trashed = false",
        escape_query_literal(folder_id)
    );
    if let Some(mime) = mime_type.map(str::trim).filter(|m| !m.is_empty()) {
        q.push_str(&format!(" and mimeType = '{}'", escape_query_literal(mime)));
    }
    q
}
