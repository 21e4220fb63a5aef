mod cli;

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use gdrive_core::{
    build_registry,
    credentials::{ServiceAccountTokens, TokenProvider, DEFAULT_SCOPES},
    google::GoogleClient,
    mcp_server::{JsonRpcHandler, McpServer},
    transport::StdioTransport,
};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; real environment variables still apply.
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // stdout carries protocol frames only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("Starting Google Drive MCP Server");

    let Some(key_path) = cli.service_account.filter(|p| p.is_file()) else {
        eprintln!(
            "Service account key not found. Set GOOGLE_APPLICATION_CREDENTIALS or pass --service-account <PATH>."
        );
        return ExitCode::from(1);
    };

    let tokens = match ServiceAccountTokens::from_key_file(&key_path, DEFAULT_SCOPES).await {
        Ok(tokens) => tokens,
        Err(e) => {
            error!("Failed to load credentials: {}", e);
            eprintln!("{}", e);
            return ExitCode::from(1);
        }
    };
    // Fail at startup rather than on the first tool call.
    if let Err(e) = tokens.access_token().await {
        error!("Failed to obtain an access token: {}", e);
        eprintln!("{}", e);
        return ExitCode::from(1);
    }
    info!(client_email = %tokens.client_email(), "Authenticated with Google");

    let client = match GoogleClient::new(Arc::new(tokens)) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::from(1);
        }
    };

    let folder_id = cli.folder_id.filter(|f| !f.trim().is_empty());
    match &folder_id {
        Some(folder) => info!(folder_id = %folder, "Scoped to folder"),
        None => info!("No folder configured; searching everything the account can see"),
    }

    let registry = build_registry(Arc::new(client), folder_id);
    let server = McpServer::new(Arc::new(registry));
    let handler = JsonRpcHandler::new(server);
    let transport = StdioTransport::new(handler);

    info!("MCP Server ready, listening on stdio");

    if let Err(e) = transport.run().await {
        error!("Transport error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
