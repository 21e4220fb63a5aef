//! Wire types for the Drive v3 and Sheets v4 REST APIs.
//!
//! Only the fields this crate reads or writes are modelled; unknown fields
//! are ignored on the way in and `None`s are skipped on the way out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Drive ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Drive reports sizes as decimal strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<Value>>,
}

impl DriveFile {
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// One `files.list` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ListFilesRequest {
    pub q: String,
    pub page_size: u32,
    pub page_token: Option<String>,
    pub fields: String,
}

// --- Sheets values ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRenderOption {
    Formatted,
    Unformatted,
}

impl ValueRenderOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueRenderOption::Formatted => "FORMATTED_VALUE",
            ValueRenderOption::Unformatted => "UNFORMATTED_VALUE",
        }
    }
}

/// How date and time cells come back when values are unformatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeRenderOption {
    /// Day count since 1899-12-30, fraction for the time of day.
    SerialNumber,
    FormattedString,
}

impl DateTimeRenderOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateTimeRenderOption::SerialNumber => "SERIAL_NUMBER",
            DateTimeRenderOption::FormattedString => "FORMATTED_STRING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInputOption {
    Raw,
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RAW" => Some(ValueInputOption::Raw),
            "USER_ENTERED" => Some(ValueInputOption::UserEntered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    /// Trailing empty rows and cells are omitted by the API.
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub updated_range: Option<String>,
    #[serde(default)]
    pub updated_rows: u64,
    #[serde(default)]
    pub updated_columns: u64,
    #[serde(default)]
    pub updated_cells: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppendValuesResponse {
    #[serde(default)]
    pub table_range: Option<String>,
    #[serde(default)]
    pub updates: Option<UpdateValuesResponse>,
}

// --- Spreadsheet ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spreadsheet {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub properties: Option<SpreadsheetProperties>,
    #[serde(default)]
    pub sheets: Vec<Sheet>,
    #[serde(default)]
    pub spreadsheet_url: Option<String>,
}

impl Spreadsheet {
    pub fn title(&self) -> Option<&str> {
        self.properties.as_ref().and_then(|p| p.title.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetProperties {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    #[serde(default)]
    pub properties: Option<SheetProperties>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub replies: Vec<Value>,
}

// --- Developer metadata ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedDeveloperMetadata {
    #[serde(default)]
    pub developer_metadata: Option<DeveloperMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDeveloperMetadataResponse {
    #[serde(default)]
    pub matched_developer_metadata: Vec<MatchedDeveloperMetadata>,
}

// --- Errors ---

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorEnvelope {
    pub error: GoogleErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drive_file_reads_camel_case_and_string_sizes() {
        let f: DriveFile = serde_json::from_value(json!({
            "id": "1abc",
            "name": "report.pdf",
            "mimeType": "application/pdf",
            "size": "2048",
            "webViewLink": "https://drive.google.com/file/d/1abc/view"
        }))
        .unwrap();
        assert_eq!(f.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(f.size_bytes(), Some(2048));

        let out = serde_json::to_value(&f).unwrap();
        assert_eq!(out["webViewLink"], "https://drive.google.com/file/d/1abc/view");
        assert!(out.get("parents").is_none());
    }

    #[test]
    fn value_range_defaults_to_empty_grid() {
        let vr: ValueRange = serde_json::from_value(json!({"range": "Sheet1!A1:Z1000"})).unwrap();
        assert!(vr.values.is_empty());
    }

    #[test]
    fn input_option_parsing() {
        assert_eq!(ValueInputOption::parse("raw"), Some(ValueInputOption::Raw));
        assert_eq!(
            ValueInputOption::parse("USER_ENTERED"),
            Some(ValueInputOption::UserEntered)
        );
        assert_eq!(ValueInputOption::parse("FORMULA"), None);
    }
}
