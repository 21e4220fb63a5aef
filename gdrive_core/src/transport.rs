use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::ConnectorError;
use crate::mcp_server::JsonRpcHandler;

/// Newline-delimited JSON-RPC over stdio.
///
/// Each request runs on its own task; replies go through one writer task so
/// frames never interleave. Replies may arrive out of request order.
pub struct StdioTransport {
    handler: Arc<JsonRpcHandler>,
}

impl StdioTransport {
    pub fn new(handler: JsonRpcHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Run the stdio transport, reading from stdin and writing to stdout
    pub async fn run(&self) -> io::Result<()> {
        info!("Starting stdio transport");
        let stdin = BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await?;
        Ok(())
    }

    /// Serves until `reader` hits EOF and every in-flight request has been
    /// answered, then hands the writer back.
    pub async fn serve<R, W>(&self, mut reader: R, writer: W) -> io::Result<W>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Value>();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!("EOF reached on input");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    debug!("Processing line: {}", trimmed);
                    match serde_json::from_str::<Value>(trimmed) {
                        Ok(request) => {
                            let handler = self.handler.clone();
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                let id = request.get("id").cloned().filter(|id| !id.is_null());
                                let worker =
                                    tokio::spawn(async move { handler.handle_request(request).await });
                                let response = match worker.await {
                                    Ok(response) => response,
                                    Err(e) => {
                                        error!(error = %e, "Request handler failed");
                                        id.map(|id| handler_failure(id, &e))
                                    }
                                };
                                if let Some(response) = response {
                                    let _ = tx.send(response);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to parse JSON-RPC request: {}", e);
                            let _ = tx.send(parse_error(&e));
                        }
                    }
                }
                Err(e) => {
                    error!("Error reading input: {}", e);
                    break;
                }
            }
        }

        // The writer finishes once the last in-flight request drops its sender.
        drop(tx);
        writer_task
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

fn parse_error(e: &serde_json::Error) -> Value {
    let mut error = ConnectorError::ParseError.to_jsonrpc_error();
    error["data"] = json!(e.to_string());
    json!({
        "jsonrpc": "2.0",
        "error": error,
        "id": null
    })
}

/// Reply for a request whose handler task died, so the caller is not left waiting.
fn handler_failure(id: Value, e: &tokio::task::JoinError) -> Value {
    let error = ConnectorError::InternalError(format!("request handler failed: {}", e));
    json!({
        "jsonrpc": "2.0",
        "error": error.to_jsonrpc_error(),
        "id": id
    })
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<Value>, mut writer: W) -> io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let response_str = serde_json::to_string(&response)?;
        writer.write_all(response_str.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        debug!("Sent response: {}", response_str);
    }
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp_server::McpServer;
    use crate::{Connector, ProviderRegistry};
    use async_trait::async_trait;
    use rmcp::model::{
        CallToolRequestParam, CallToolResult, InitializeRequestParam, InitializeResult,
        ListResourcesResult, ListToolsResult, PaginatedRequestParam, ReadResourceRequestParam,
        ResourceContents, ServerCapabilities,
    };

    /// Connector whose tool listing panics.
    struct Broken;

    #[async_trait]
    impl Connector for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn description(&self) -> &'static str {
            "panics while listing tools"
        }
        async fn capabilities(&self) -> ServerCapabilities {
            ServerCapabilities::default()
        }
        async fn initialize(
            &self,
            _r: InitializeRequestParam,
        ) -> Result<InitializeResult, ConnectorError> {
            Err(ConnectorError::MethodNotFound)
        }
        async fn list_resources(
            &self,
            _r: Option<PaginatedRequestParam>,
        ) -> Result<ListResourcesResult, ConnectorError> {
            Ok(ListResourcesResult {
                resources: vec![],
                next_cursor: None,
            })
        }
        async fn read_resource(
            &self,
            _r: ReadResourceRequestParam,
        ) -> Result<Vec<ResourceContents>, ConnectorError> {
            Err(ConnectorError::ResourceNotFound)
        }
        async fn list_tools(
            &self,
            _r: Option<PaginatedRequestParam>,
        ) -> Result<ListToolsResult, ConnectorError> {
            panic!("tool listing exploded")
        }
        async fn call_tool(
            &self,
            _r: CallToolRequestParam,
        ) -> Result<CallToolResult, ConnectorError> {
            Err(ConnectorError::ToolNotFound)
        }
    }

    fn transport() -> StdioTransport {
        let server = McpServer::new(Arc::new(ProviderRegistry::new()));
        StdioTransport::new(JsonRpcHandler::new(server))
    }

    fn lines(out: Vec<u8>) -> Vec<Value> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn answers_requests_and_skips_notifications() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
            "\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n",
        );
        let out = transport()
            .serve(BufReader::new(input.as_bytes()), Vec::new())
            .await
            .unwrap();
        let mut replies = lines(out);
        replies.sort_by_key(|r| r["id"].as_i64());
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["result"]["tools"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn malformed_lines_get_parse_errors() {
        let out = transport()
            .serve(BufReader::new("{not json\n".as_bytes()), Vec::new())
            .await
            .unwrap();
        let replies = lines(out);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["error"]["code"], -32700);
        assert!(replies[0]["id"].is_null());
    }

    #[tokio::test]
    async fn crashed_handlers_still_get_a_reply() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(Arc::new(Broken));
        let transport =
            StdioTransport::new(JsonRpcHandler::new(McpServer::new(Arc::new(registry))));
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"method\":\"tools/list\"}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":\"b\",\"method\":\"ping\"}\n",
        );
        let out = transport
            .serve(BufReader::new(input.as_bytes()), Vec::new())
            .await
            .unwrap();
        let mut replies = lines(out);
        replies.sort_by_key(|r| r["id"].as_str().map(str::to_string));
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], "a");
        assert_eq!(replies[0]["error"]["code"], -32603);
        assert_eq!(replies[1]["id"], "b");
        assert_eq!(replies[1]["result"], json!({}));
    }
}
