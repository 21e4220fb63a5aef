use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{utils::structured_error_result, ConnectorError, ProviderRegistry};
use rmcp::model::*;

/// MCP Server implementation that wraps the ProviderRegistry
pub struct McpServer {
    registry: Arc<ProviderRegistry>,
}

impl McpServer {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Get aggregated capabilities from all connectors
    pub async fn get_capabilities(&self) -> ServerCapabilities {
        let mut capabilities = ServerCapabilities::default();
        for connector in self.registry.providers.values() {
            let conn_caps = connector.capabilities().await;
            if conn_caps.tools.is_some() {
                capabilities.tools = conn_caps.tools;
            }
            if conn_caps.resources.is_some() {
                capabilities.resources = conn_caps.resources;
            }
        }
        capabilities
    }

    pub async fn handle_initialize(
        &self,
        request: InitializeRequestParam,
    ) -> Result<InitializeResult, ConnectorError> {
        info!(client = %request.client_info.name, "MCP Server initializing");

        Ok(InitializeResult {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: self.get_capabilities().await,
            server_info: Implementation {
                name: "gdrive-mcp".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some("Google Drive search/read and Google Sheets expense tracking. Tools are named <connector>/<tool>; Drive files are also readable as gdrive:///<file_id> resources.".to_string()),
        })
    }

    /// Aggregates resources from all connectors
    pub async fn handle_list_resources(
        &self,
        request: Option<PaginatedRequestParam>,
    ) -> Result<ListResourcesResult, ConnectorError> {
        let mut all_resources = Vec::new();
        for (name, connector) in self.registry.providers.iter() {
            match connector.list_resources(request.clone()).await {
                Ok(response) => all_resources.extend(response.resources),
                Err(e) => error!(connector = %name, error = %e, "Error listing resources"),
            }
        }

        Ok(ListResourcesResult {
            resources: all_resources,
            next_cursor: None,
        })
    }

    /// Routes to the first connector that recognises the URI
    pub async fn handle_read_resource(
        &self,
        request: ReadResourceRequestParam,
    ) -> Result<ReadResourceResult, ConnectorError> {
        for connector in self.registry.providers.values() {
            match connector.read_resource(request.clone()).await {
                Ok(contents) => return Ok(ReadResourceResult { contents }),
                Err(ConnectorError::ResourceNotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(ConnectorError::ResourceNotFound)
    }

    /// Aggregates tools, prefixing each with its connector name
    pub async fn handle_list_tools(
        &self,
        request: Option<PaginatedRequestParam>,
    ) -> Result<ListToolsResult, ConnectorError> {
        let mut all_tools = Vec::new();
        for (connector_name, connector) in self.registry.providers.iter() {
            match connector.list_tools(request.clone()).await {
                Ok(response) => {
                    all_tools.extend(response.tools.into_iter().map(|mut tool| {
                        tool.name = format!("{}/{}", connector_name, tool.name).into();
                        tool
                    }));
                }
                Err(e) => {
                    error!(connector = %connector_name, error = %e, "Error listing tools");
                }
            }
        }

        Ok(ListToolsResult {
            tools: all_tools,
            next_cursor: None,
        })
    }

    /// Routes `connector/tool` to the connector. Failures inside a known tool
    /// come back as an error result; only unknown tools are protocol errors.
    pub async fn handle_call_tool(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, ConnectorError> {
        let Some((connector_name, tool_name)) = request.name.split_once('/') else {
            return Err(ConnectorError::InvalidParams(format!(
                "Tool name must be in format 'connector/tool', got: {}",
                request.name
            )));
        };
        let connector = self
            .registry
            .get_provider(connector_name)
            .ok_or(ConnectorError::ToolNotFound)?;

        let unprefixed_request = CallToolRequestParam {
            name: tool_name.to_string().into(),
            arguments: request.arguments.clone(),
        };
        match connector.call_tool(unprefixed_request).await {
            Ok(result) => Ok(result),
            Err(ConnectorError::ToolNotFound) => Err(ConnectorError::ToolNotFound),
            Err(e) => {
                warn!(tool = %request.name, code = e.code_str(), error = %e, "Tool call failed");
                Ok(structured_error_result(e.to_tool_error()))
            }
        }
    }
}

/// JSON-RPC message handler for the MCP server
pub struct JsonRpcHandler {
    server: McpServer,
}

impl JsonRpcHandler {
    pub fn new(server: McpServer) -> Self {
        Self { server }
    }

    /// Processes one JSON-RPC message. Notifications and stray responses
    /// (no `id`) produce no reply.
    pub async fn handle_request(&self, request: Value) -> Option<Value> {
        debug!("Handling JSON-RPC request: {}", request);
        let id = request.get("id").cloned().filter(|id| !id.is_null());
        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = request.get("params").cloned().unwrap_or(json!({}));

        let Some(id) = id else {
            if !method.is_empty() {
                debug!(method, "Ignoring notification");
            }
            return None;
        };

        let result = match method {
            "initialize" => match serde_json::from_value::<InitializeRequestParam>(params) {
                Ok(req) => to_response(self.server.handle_initialize(req).await),
                Err(e) => Err(ConnectorError::InvalidParams(e.to_string()).to_jsonrpc_error()),
            },
            "ping" => Ok(json!({})),
            "resources/list" => match paginated(params) {
                Ok(req) => to_response(self.server.handle_list_resources(req).await),
                Err(e) => Err(e.to_jsonrpc_error()),
            },
            "resources/read" => match serde_json::from_value::<ReadResourceRequestParam>(params) {
                Ok(req) => to_response(self.server.handle_read_resource(req).await),
                Err(e) => Err(ConnectorError::InvalidParams(e.to_string()).to_jsonrpc_error()),
            },
            "tools/list" => match paginated(params) {
                Ok(req) => to_response(self.server.handle_list_tools(req).await),
                Err(e) => Err(e.to_jsonrpc_error()),
            },
            "tools/call" => match serde_json::from_value::<CallToolRequestParam>(params) {
                Ok(req) => to_response(self.server.handle_call_tool(req).await),
                Err(e) => Err(ConnectorError::InvalidParams(e.to_string()).to_jsonrpc_error()),
            },
            _ => Err(ConnectorError::MethodNotFound.to_jsonrpc_error()),
        };

        Some(match result {
            Ok(result) => json!({
                "jsonrpc": "2.0",
                "result": result,
                "id": id,
            }),
            Err(error) => json!({
                "jsonrpc": "2.0",
                "error": error,
                "id": id,
            }),
        })
    }
}

/// Empty params (`{}` or absent) mean "first page".
fn paginated(params: Value) -> Result<Option<PaginatedRequestParam>, ConnectorError> {
    match &params {
        Value::Null => Ok(None),
        Value::Object(m) if m.is_empty() => Ok(None),
        _ => serde_json::from_value::<Option<PaginatedRequestParam>>(params)
            .map_err(|e| ConnectorError::InvalidParams(e.to_string())),
    }
}

fn to_response<T: serde::Serialize>(result: Result<T, ConnectorError>) -> Result<Value, Value> {
    result
        .and_then(|r| serde_json::to_value(r).map_err(ConnectorError::SerdeJson))
        .map_err(|e| e.to_jsonrpc_error())
}
