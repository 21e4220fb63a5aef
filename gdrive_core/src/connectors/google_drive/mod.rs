pub mod export;
pub mod resources;

use async_trait::async_trait;
use rmcp::model::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ConnectorError;
use crate::google::{DriveApi, DriveFile, ListFilesRequest, FOLDER_MIME_TYPE};
use crate::utils::{format_bytes, structured_result_with_text};
use crate::Connector;
use export::{encode_content, plan_fetch, Encoding, Fetch};

const SEARCH_PAGE_SIZE: u32 = 20;
const SEARCH_FIELDS: &str = "files(id,name,mimeType,modifiedTime,size,webViewLink)";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,size,modifiedTime,webViewLink)";
const FOLDER_FIELDS: &str =
    "id,name,mimeType,createdTime,modifiedTime,webViewLink,owners,description";
const CHILD_FIELDS: &str = "nextPageToken,files(id,name,mimeType,size,createdTime,modifiedTime,webViewLink,owners,parents)";
const RESOURCE_PAGE_SIZE: u32 = 50;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchInput {
    /// Full-text search terms.
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReadFileInput {
    /// Drive file id.
    pub file_id: String,
    /// Export target for Google Docs/Sheets/Slides/Drawings (e.g. application/pdf).
    /// Defaults to markdown, CSV, plain text or PNG respectively.
    #[serde(default)]
    pub export_mime_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListFilesInput {
    /// Folder to list. Defaults to the configured folder.
    #[serde(default)]
    pub folder_id: Option<String>,
    /// Only return files of this MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Page size used while paging through the folder (1-1000).
    #[serde(default = "default_page_size")]
    #[schemars(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    100
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FolderMetadataInput {
    /// Folder to describe. Defaults to the configured folder.
    #[serde(default)]
    pub folder_id: Option<String>,
}

/// Bytes of one file, decoded for an agent.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub file_id: String,
    pub name: String,
    pub mime_type: String,
    pub content_mime_type: String,
    pub content: String,
    pub encoding: Encoding,
    pub size: u64,
}

#[derive(Debug, Serialize)]
struct FolderStatistics {
    total_files: usize,
    total_size_bytes: u64,
    total_size_readable: String,
    mime_type_distribution: BTreeMap<String, usize>,
}

/// Google Drive search, read and folder listing, plus `gdrive:///` resources.
pub struct DriveConnector {
    api: Arc<dyn DriveApi>,
    folder_id: Option<String>,
}

impl DriveConnector {
    pub fn new(api: Arc<dyn DriveApi>, folder_id: Option<String>) -> Self {
        Self {
            api,
            folder_id: folder_id.filter(|f| !f.trim().is_empty()),
        }
    }

    fn resolve_folder(&self, folder_id: Option<String>) -> Result<String, ConnectorError> {
        folder_id
            .filter(|f| !f.trim().is_empty())
            .or_else(|| self.folder_id.clone())
            .ok_or_else(|| {
                ConnectorError::InvalidParams(
                    "folder_id is required when no default folder is configured".to_string(),
                )
            })
    }

    /// Fetches and decodes a file, exporting Workspace-native formats.
    pub async fn read_file(
        &self,
        file_id: &str,
        export_mime_type: Option<&str>,
    ) -> Result<FileContent, ConnectorError> {
        let meta = self.api.get_file(file_id, "id,name,mimeType,size").await?;
        let mime_type = meta.mime_type.unwrap_or_default();
        let fetch = plan_fetch(&mime_type, export_mime_type)?;
        let bytes = match &fetch {
            Fetch::Export { target } => self.api.export_file(file_id, target).await?,
            Fetch::Download => self.api.download_file(file_id).await?,
        };
        let content_mime_type = fetch.content_mime(&mime_type).to_string();
        let size = bytes.len() as u64;
        let (content, encoding) = encode_content(bytes, &content_mime_type);
        debug!(file_id, content_mime_type = %content_mime_type, ?encoding, size, "Read drive file");
        Ok(FileContent {
            file_id: file_id.to_string(),
            name: meta.name.unwrap_or_else(|| "Unknown".to_string()),
            mime_type,
            content_mime_type,
            content,
            encoding,
            size,
        })
    }

    /// Every direct child of `folder_id`, following page tokens.
    async fn list_children(
        &self,
        folder_id: &str,
        mime_type: Option<&str>,
        page_size: u32,
        fields: &str,
    ) -> Result<Vec<DriveFile>, ConnectorError> {
        let mut request = ListFilesRequest {
            q: export::children_query(folder_id, mime_type),
            page_size: page_size.clamp(1, 1000),
            page_token: None,
            fields: fields.to_string(),
        };
        let mut files = Vec::new();
        loop {
            let page = self.api.list_files(&request).await?;
            files.extend(page.files);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => request.page_token = Some(token),
                None => break,
            }
        }
        Ok(files)
    }

    async fn search(&self, input: SearchInput) -> Result<CallToolResult, ConnectorError> {
        let request = ListFilesRequest {
            q: export::search_query(&input.query, self.folder_id.as_deref()),
            page_size: SEARCH_PAGE_SIZE,
            page_token: None,
            fields: SEARCH_FIELDS.to_string(),
        };
        let files = self.api.list_files(&request).await?.files;
        let count = files.len();
        let body = json!({ "query": input.query, "results": files, "count": count });
        structured_result_with_text(&body, None)
    }

    async fn list_files(&self, input: ListFilesInput) -> Result<CallToolResult, ConnectorError> {
        let folder_id = self.resolve_folder(input.folder_id)?;
        let files = self
            .list_children(
                &folder_id,
                input.mime_type.as_deref(),
                input.page_size,
                LIST_FIELDS,
            )
            .await?;
        let count = files.len();
        let body = json!({ "folder_id": folder_id, "count": count, "files": files });
        structured_result_with_text(&body, Some(format!("{} files", count)))
    }

    async fn folder_metadata(
        &self,
        input: FolderMetadataInput,
    ) -> Result<CallToolResult, ConnectorError> {
        let folder_id = self.resolve_folder(input.folder_id)?;
        let folder = self.api.get_file(&folder_id, FOLDER_FIELDS).await?;
        if folder.mime_type.as_deref() != Some(FOLDER_MIME_TYPE) {
            return Err(ConnectorError::InvalidParams(format!(
                "{} is not a folder",
                folder_id
            )));
        }
        let files = self
            .list_children(&folder_id, None, 1000, CHILD_FIELDS)
            .await?;

        let total_size_bytes: u64 = files.iter().filter_map(DriveFile::size_bytes).sum();
        let mut distribution = BTreeMap::new();
        for f in &files {
            let mime = f.mime_type.clone().unwrap_or_else(|| "unknown".to_string());
            *distribution.entry(mime).or_insert(0usize) += 1;
        }
        let statistics = FolderStatistics {
            total_files: files.len(),
            total_size_bytes,
            total_size_readable: format_bytes(total_size_bytes),
            mime_type_distribution: distribution,
        };
        let text = format!(
            "{}: {} files, {}",
            folder.name.as_deref().unwrap_or(&folder_id),
            statistics.total_files,
            statistics.total_size_readable
        );
        let body = json!({ "folder": folder, "statistics": statistics, "files": files });
        structured_result_with_text(&body, Some(text))
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(
    args: Option<serde_json::Map<String, Value>>,
) -> Result<T, ConnectorError> {
    serde_json::from_value(Value::Object(args.unwrap_or_default()))
        .map_err(|e| ConnectorError::InvalidParams(e.to_string()))
}

fn schema_of<T: JsonSchema>() -> Result<Arc<serde_json::Map<String, Value>>, ConnectorError> {
    Ok(Arc::new(
        serde_json::to_value(schemars::schema_for!(T))
            .map_err(|e| ConnectorError::Other(e.to_string()))?
            .as_object()
            .expect("Schema object")
            .clone(),
    ))
}

#[async_trait]
impl Connector for DriveConnector {
    fn name(&self) -> &'static str {
        "gdrive"
    }

    fn description(&self) -> &'static str {
        "Google Drive: full-text search, file reading with Workspace export, and folder listings."
    }

    async fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: Some(Default::default()),
            resources: Some(Default::default()),
            ..Default::default()
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
    ) -> Result<InitializeResult, ConnectorError> {
        Ok(InitializeResult {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: self.capabilities().await,
            server_info: Implementation {
                name: self.name().to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Files are addressed by Drive id. Docs export as markdown, Sheets as CSV, Slides as plain text."
                    .to_string(),
            ),
        })
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
    ) -> Result<ListResourcesResult, ConnectorError> {
        let q = match &self.folder_id {
            Some(folder) => export::children_query(folder, None),
            None => "trashed = false".to_string(),
        };
        let request = ListFilesRequest {
            q,
            page_size: RESOURCE_PAGE_SIZE,
            page_token: None,
            fields: "files(id,name,mimeType,modifiedTime)".to_string(),
        };
        let page = self.api.list_files(&request).await?;
        Ok(ListResourcesResult {
            resources: page
                .files
                .into_iter()
                .filter_map(resources::to_resource)
                .collect(),
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
    ) -> Result<Vec<ResourceContents>, ConnectorError> {
        let file_id = resources::parse_uri(&request.uri).ok_or(ConnectorError::ResourceNotFound)?;
        let file = self.read_file(file_id, None).await?;
        let body = resources::resource_text(file.content, file.encoding);
        Ok(vec![ResourceContents::text(body, request.uri.clone())])
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
    ) -> Result<ListToolsResult, ConnectorError> {
        let tools = vec![
            Tool {
                name: Cow::Borrowed("search"),
                title: None,
                description: Some(Cow::Borrowed(
                    "Full-text search across Drive (scoped to the configured folder when set). Returns up to 20 files with id, name, mimeType, modifiedTime, size and webViewLink.",
                )),
                input_schema: schema_of::<SearchInput>()?,
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("read_file"),
                title: None,
                description: Some(Cow::Borrowed(
                    "Read a file's contents. Google Docs/Sheets/Slides/Drawings are exported; other files are downloaded. Text comes back as UTF-8, binary as base64; check `encoding`.",
                )),
                input_schema: schema_of::<ReadFileInput>()?,
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("list_files"),
                title: None,
                description: Some(Cow::Borrowed(
                    "List every file directly inside a folder, optionally filtered by MIME type.",
                )),
                input_schema: schema_of::<ListFilesInput>()?,
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("get_folder_metadata"),
                title: None,
                description: Some(Cow::Borrowed(
                    "Folder details plus statistics over its direct children: file count, total size and MIME type distribution.",
                )),
                input_schema: schema_of::<FolderMetadataInput>()?,
                output_schema: None,
                annotations: None,
                icons: None,
            },
        ];

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, ConnectorError> {
        let name = request.name.as_ref();
        info!(tool = name, "gdrive tool call");
        match name {
            "search" => self.search(parse_args(request.arguments)?).await,
            "read_file" => {
                let input: ReadFileInput = parse_args(request.arguments)?;
                let file = self
                    .read_file(&input.file_id, input.export_mime_type.as_deref())
                    .await?;
                let text = match file.encoding {
                    Encoding::Utf8 => Some(file.content.clone()),
                    Encoding::Base64 => None,
                };
                structured_result_with_text(&file, text)
            }
            "list_files" => self.list_files(parse_args(request.arguments)?).await,
            "get_folder_metadata" => self.folder_metadata(parse_args(request.arguments)?).await,
            _ => Err(ConnectorError::ToolNotFound),
        }
    }
}
