// src/lib.rs
pub mod a1;
pub mod connectors;
pub mod credentials;
pub mod error;
pub mod google;
pub mod mcp_server;
pub mod transport;
pub mod utils;
use std::sync::Arc;

// Re-export types from rmcp that callers and tests need
pub use rmcp::model::{
    Annotated, CallToolRequestParam, CallToolResult, Content, Implementation,
    InitializeRequestParam, InitializeResult, ListResourcesResult, ListToolsResult,
    PaginatedRequestParam, ProtocolVersion, RawContent, RawResource, ReadResourceRequestParam,
    Resource, ResourceContents, ServerCapabilities, TextContent, Tool,
};

use crate::error::ConnectorError;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[async_trait]
pub trait Connector: Send + Sync {
    /// Unique name of the connector; also the tool-name prefix (`gdrive/search`).
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Returns the MCP capabilities of this connector.
    async fn capabilities(&self) -> ServerCapabilities;

    // --- MCP request handlers ---
    async fn initialize(
        &self,
        request: InitializeRequestParam,
    ) -> Result<InitializeResult, ConnectorError>;
    async fn list_resources(
        &self,
        request: Option<PaginatedRequestParam>,
    ) -> Result<ListResourcesResult, ConnectorError>;
    /// `ResourceNotFound` means "not my URI"; the server then tries the next connector.
    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
    ) -> Result<Vec<ResourceContents>, ConnectorError>;
    async fn list_tools(
        &self,
        request: Option<PaginatedRequestParam>,
    ) -> Result<ListToolsResult, ConnectorError>;
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, ConnectorError>;
}

/// Connectors keyed by name. Connectors are immutable after registration and
/// shared without locking; each request works on its own futures.
pub struct ProviderRegistry {
    pub providers: BTreeMap<String, Arc<dyn Connector>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: BTreeMap::new(),
        }
    }

    pub fn register_provider(&mut self, provider: Arc<dyn Connector>) {
        self.providers
            .insert(provider.name().to_string(), provider);
    }

    pub fn get_provider(&self, name: &str) -> Option<&Arc<dyn Connector>> {
        self.providers.get(name)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers every connector enabled via Cargo features against one shared
/// client. `folder_id` scopes search, listings, resources and new sheets.
#[allow(unused_variables)]
pub fn build_registry<C>(client: Arc<C>, folder_id: Option<String>) -> ProviderRegistry
where
    C: google::DriveApi + google::SheetsApi + 'static,
{
    #[allow(unused_mut)]
    let mut registry = ProviderRegistry::new();

    #[cfg(feature = "google-drive")]
    {
        let connector =
            connectors::google_drive::DriveConnector::new(client.clone(), folder_id.clone());
        registry.register_provider(Arc::new(connector));
    }

    #[cfg(feature = "google-sheets")]
    {
        let connector = connectors::google_sheets::SheetsConnector::new(
            client.clone(),
            client.clone(),
            folder_id.clone(),
        );
        registry.register_provider(Arc::new(connector));
    }

    registry
}
