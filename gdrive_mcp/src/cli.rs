use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gdrive_mcp")]
#[command(about = "MCP server for Google Drive search/read and Google Sheets expense tracking")]
#[command(version)]
#[command(after_help = "\x1b[1;36mSetup:\x1b[0m
  Share the Drive folder (or individual files) with the service account's
  client_email, then point --service-account at its JSON key.

\x1b[1;36mExample client entry:\x1b[0m
  gdrive_mcp --service-account ~/keys/expenses.json --folder-id 1AbC...")]
pub struct Cli {
    /// Service-account JSON key file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS", value_name = "PATH")]
    pub service_account: Option<PathBuf>,

    /// Drive folder that scopes search, listings, resources and new sheets
    #[arg(long, env = "FOLDER_ID", value_name = "ID")]
    pub folder_id: Option<String>,

    /// tracing filter, e.g. `info` or `gdrive_core=debug`
    #[arg(long, env = "RUST_LOG", default_value = "info", value_name = "FILTER")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from([
            "gdrive_mcp",
            "--service-account",
            "/tmp/key.json",
            "--folder-id",
            "F1",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.service_account, Some(PathBuf::from("/tmp/key.json")));
        assert_eq!(cli.folder_id.as_deref(), Some("F1"));
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
