// src/error.rs
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Resource not found")]
    ResourceNotFound,

    #[error("Tool not found")]
    ToolNotFound,

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method not found")]
    MethodNotFound,

    #[error("Parse error")]
    ParseError,

    #[error("Other error: {0}")]
    Other(String),

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Non-success response from a Google API, with the provider's message.
    #[error("Google API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl ConnectorError {
    pub fn code_str(&self) -> &'static str {
        match self {
            ConnectorError::InvalidParams(_) => "invalid_params",
            ConnectorError::Authentication(_) => "auth_failed",
            ConnectorError::ResourceNotFound => "not_found",
            ConnectorError::ToolNotFound => "tool_not_found",
            ConnectorError::MethodNotFound => "method_not_found",
            ConnectorError::ParseError => "parse_error",
            ConnectorError::HttpRequest(_) => "upstream_error",
            ConnectorError::Api { status, .. } => match status {
                400 => "invalid_request",
                401 => "auth_failed",
                403 => "permission_denied",
                404 => "not_found",
                429 => "rate_limited",
                _ => "upstream_error",
            },
            ConnectorError::InternalError(_) => "internal_error",
            ConnectorError::Other(_) => "internal_error",
            _ => "internal_error",
        }
    }

    /// HTTP status reported by the provider, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ConnectorError::Api { status, .. } => Some(*status),
            ConnectorError::HttpRequest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short remediation hint for agent-facing error payloads.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self.status() {
            Some(400) => Some("Check request parameters"),
            Some(401) => Some("Check the service account credentials"),
            Some(403) => Some("Check service account permissions and folder access"),
            Some(404) => Some("Verify the file/folder ID exists and is accessible"),
            Some(429) => Some("Too many requests, please try again later"),
            _ => match self {
                ConnectorError::Authentication(_) => {
                    Some("Check the service account credentials")
                }
                _ => None,
            },
        }
    }

    pub fn to_jsonrpc_error(&self) -> serde_json::Value {
        let (code, message) = match self {
            ConnectorError::ResourceNotFound => (-32602, "Resource not found".to_string()),
            ConnectorError::ToolNotFound => (-32602, "Tool not found".to_string()),
            ConnectorError::InternalError(msg) => (-32603, msg.to_string()),
            ConnectorError::InvalidParams(msg) => (-32602, msg.to_string()),
            ConnectorError::MethodNotFound => (-32601, "Method not found".to_string()),
            ConnectorError::ParseError => (-32700, "Parse error".to_string()),
            ConnectorError::Other(msg) => (-32603, msg.to_string()),
            err => (-32603, err.to_string()),
        };

        json!({
            "code": code,
            "message": message,
        })
    }

    /// Structured body used when a tool call fails.
    pub fn to_tool_error(&self) -> serde_json::Value {
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code_str(),
        });
        if let Some(status) = self.status() {
            body["status"] = json!(status);
        }
        if let Some(hint) = self.suggestion() {
            body["suggestion"] = json!(hint);
        }
        body
    }
}
