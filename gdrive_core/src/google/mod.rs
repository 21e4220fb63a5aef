//! Thin REST client for Google Drive v3 and Sheets v4.
//!
//! Connectors depend on the [`DriveApi`] and [`SheetsApi`] traits rather than
//! on [`GoogleClient`] so a single authenticated client can be shared and so
//! tests can substitute an in-memory implementation.

pub mod types;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::credentials::TokenProvider;
use crate::error::ConnectorError;
pub use types::*;

pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3/files";
pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn list_files(&self, request: &ListFilesRequest) -> Result<FileList, ConnectorError>;

    async fn get_file(&self, file_id: &str, fields: &str) -> Result<DriveFile, ConnectorError>;

    /// Converts a Workspace-native file to `mime_type`.
    async fn export_file(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, ConnectorError>;

    /// Raw bytes of a stored (non-native) file.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ConnectorError>;

    /// Creates a metadata-only file (e.g. an empty spreadsheet) and returns
    /// its `id`, `name` and `webViewLink`.
    async fn create_file(&self, metadata: &DriveFile) -> Result<DriveFile, ConnectorError>;
}

#[async_trait]
pub trait SheetsApi: Send + Sync {
    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        render: ValueRenderOption,
        date_time: DateTimeRenderOption,
    ) -> Result<ValueRange, ConnectorError>;

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
        input: ValueInputOption,
    ) -> Result<UpdateValuesResponse, ConnectorError>;

    /// Appends below the last row of the table found in `range`, inserting rows.
    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
        input: ValueInputOption,
    ) -> Result<AppendValuesResponse, ConnectorError>;

    async fn get_spreadsheet(
        &self,
        spreadsheet_id: &str,
        fields: &str,
    ) -> Result<Spreadsheet, ConnectorError>;

    /// Applies all `requests` atomically.
    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Value>,
    ) -> Result<BatchUpdateResponse, ConnectorError>;

    async fn search_developer_metadata(
        &self,
        spreadsheet_id: &str,
        data_filters: Vec<Value>,
    ) -> Result<SearchDeveloperMetadataResponse, ConnectorError>;
}

/// Authenticated HTTP client for both APIs.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    drive_base: String,
    sheets_base: String,
}

impl GoogleClient {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Result<Self, ConnectorError> {
        Self::with_endpoints(tokens, DRIVE_BASE_URL, SHEETS_BASE_URL)
    }

    /// Points the client at alternative endpoints (proxies, emulators).
    pub fn with_endpoints(
        tokens: Arc<dyn TokenProvider>,
        drive_base: &str,
        sheets_base: &str,
    ) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gdrive-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConnectorError::Other(e.to_string()))?;
        Ok(Self {
            http,
            tokens,
            drive_base: drive_base.trim_end_matches('/').to_string(),
            sheets_base: sheets_base.trim_end_matches('/').to_string(),
        })
    }

    async fn bearer(&self) -> Result<String, ConnectorError> {
        Ok(format!("Bearer {}", self.tokens.access_token().await?))
    }

    fn drive_url(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            self.drive_base.clone()
        } else {
            format!("{}/{}", self.drive_base, suffix)
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str, action: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            self.sheets_base,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range),
            action
        )
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str, action: &str) -> String {
        format!(
            "{}/{}{}",
            self.sheets_base,
            urlencoding::encode(spreadsheet_id),
            action
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ConnectorError> {
        let response = request
            .header(AUTHORIZATION, self.bearer().await?)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = api_error(status.as_u16(), &body);
        warn!(status = status.as_u16(), error = %err, "Google API request failed");
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ConnectorError> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        debug!(bytes = body.len(), "Google API response");
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_bytes(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ConnectorError> {
        let response = self.send(request).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Maps a non-success response to [`ConnectorError::Api`], preferring the
/// message from Google's `{"error": {"message": ...}}` envelope.
pub fn api_error(status: u16, body: &str) -> ConnectorError {
    let message = serde_json::from_str::<GoogleErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error.message)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {}", status)
            } else {
                trimmed.chars().take(500).collect()
            }
        });
    ConnectorError::Api { status, message }
}

#[async_trait]
impl DriveApi for GoogleClient {
    async fn list_files(&self, request: &ListFilesRequest) -> Result<FileList, ConnectorError> {
        let mut query: Vec<(&str, String)> = vec![
            ("q", request.q.clone()),
            ("pageSize", request.page_size.to_string()),
            ("fields", request.fields.clone()),
            ("supportsAllDrives", "true".to_string()),
            ("includeItemsFromAllDrives", "true".to_string()),
        ];
        if let Some(token) = &request.page_token {
            query.push(("pageToken", token.clone()));
        }
        debug!(q = %request.q, "drive files.list");
        self.send_json(self.http.get(self.drive_url("")).query(&query))
            .await
    }

    async fn get_file(&self, file_id: &str, fields: &str) -> Result<DriveFile, ConnectorError> {
        let url = self.drive_url(&urlencoding::encode(file_id));
        self.send_json(
            self.http
                .get(url)
                .query(&[("fields", fields), ("supportsAllDrives", "true")]),
        )
        .await
    }

    async fn export_file(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, ConnectorError> {
        let url = self.drive_url(&format!("{}/export", urlencoding::encode(file_id)));
        debug!(file_id, mime_type, "drive files.export");
        self.send_bytes(self.http.get(url).query(&[("mimeType", mime_type)]))
            .await
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ConnectorError> {
        let url = self.drive_url(&urlencoding::encode(file_id));
        debug!(file_id, "drive files.get alt=media");
        self.send_bytes(
            self.http
                .get(url)
                .query(&[("alt", "media"), ("supportsAllDrives", "true")]),
        )
        .await
    }

    async fn create_file(&self, metadata: &DriveFile) -> Result<DriveFile, ConnectorError> {
        self.send_json(
            self.http
                .post(self.drive_url(""))
                .query(&[
                    ("fields", "id,name,mimeType,webViewLink,parents"),
                    ("supportsAllDrives", "true"),
                ])
                .json(metadata),
        )
        .await
    }
}

#[async_trait]
impl SheetsApi for GoogleClient {
    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        render: ValueRenderOption,
        date_time: DateTimeRenderOption,
    ) -> Result<ValueRange, ConnectorError> {
        let url = self.values_url(spreadsheet_id, range, "");
        self.send_json(self.http.get(url).query(&[
            ("valueRenderOption", render.as_str()),
            ("dateTimeRenderOption", date_time.as_str()),
        ]))
        .await
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
        input: ValueInputOption,
    ) -> Result<UpdateValuesResponse, ConnectorError> {
        let url = self.values_url(spreadsheet_id, range, "");
        let body = ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".to_string()),
            values,
        };
        self.send_json(
            self.http
                .put(url)
                .query(&[("valueInputOption", input.as_str())])
                .json(&body),
        )
        .await
    }

    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
        input: ValueInputOption,
    ) -> Result<AppendValuesResponse, ConnectorError> {
        let url = self.values_url(spreadsheet_id, range, ":append");
        let body = ValueRange {
            range: None,
            major_dimension: Some("ROWS".to_string()),
            values,
        };
        self.send_json(
            self.http
                .post(url)
                .query(&[
                    ("valueInputOption", input.as_str()),
                    ("insertDataOption", "INSERT_ROWS"),
                ])
                .json(&body),
        )
        .await
    }

    async fn get_spreadsheet(
        &self,
        spreadsheet_id: &str,
        fields: &str,
    ) -> Result<Spreadsheet, ConnectorError> {
        let url = self.spreadsheet_url(spreadsheet_id, "");
        self.send_json(self.http.get(url).query(&[("fields", fields)]))
            .await
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Value>,
    ) -> Result<BatchUpdateResponse, ConnectorError> {
        let url = self.spreadsheet_url(spreadsheet_id, ":batchUpdate");
        debug!(spreadsheet_id, count = requests.len(), "sheets batchUpdate");
        self.send_json(self.http.post(url).json(&json!({ "requests": requests })))
            .await
    }

    async fn search_developer_metadata(
        &self,
        spreadsheet_id: &str,
        data_filters: Vec<Value>,
    ) -> Result<SearchDeveloperMetadataResponse, ConnectorError> {
        let url = self.spreadsheet_url(spreadsheet_id, "/developerMetadata:search");
        self.send_json(
            self.http
                .post(url)
                .json(&json!({ "dataFilters": data_filters })),
        )
        .await
    }
}
