use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use connector_slack::router::get_openapi_spec;
use connector_slack::{DEFAULT_SLACK_API_BASE, SlackConnectorConfig};

use crate::server::run_server;

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(version = CLI_VERSION, about = "Slack connector: events, notifications and OAuth")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the connector HTTP server
    Serve(ServeParams),
    /// Print the OpenAPI document
    Openapi,
}

#[derive(Debug, Args)]
pub struct ServeParams {
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,
    /// Public URL of this connector, used for self-dispatch. Defaults to http://{host}:{port}
    #[arg(long, env = "CONNECTOR_BASE_URL")]
    pub base_url: Option<String>,
    #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    pub signing_secret: Option<String>,
    #[arg(long, env = "SLACK_CLIENT_ID")]
    pub client_id: Option<String>,
    #[arg(long, env = "SLACK_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
    /// Comma-separated bot scopes requested on /authorize
    #[arg(long, env = "SLACK_SCOPE")]
    pub scope: Option<String>,
    /// Comma-separated user scopes requested on /authorize
    #[arg(long, env = "SLACK_USER_SCOPE")]
    pub user_scope: Option<String>,
    /// Delay before acknowledging a relayed event, e.g. `100ms`
    #[arg(long, env = "SLACK_ACK_DELAY", default_value = "100ms", value_parser = humantime::parse_duration)]
    pub ack_delay: Duration,
    #[arg(long, env = "SLACK_API_BASE", default_value = DEFAULT_SLACK_API_BASE)]
    pub slack_api_base: String,
    /// Key-value storage service for user records. Users are kept in memory without it.
    #[arg(long, env = "STORAGE_URL")]
    pub storage_url: Option<String>,
    #[arg(long, env = "STORAGE_TOKEN", hide_env_values = true)]
    pub storage_token: Option<String>,
}

impl ServeParams {
    pub fn connector_config(&self) -> SlackConnectorConfig {
        SlackConnectorConfig {
            signing_secret: self.signing_secret.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scope: self.scope.clone(),
            user_scope: self.user_scope.clone(),
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port)),
            ack_delay: self.ack_delay,
            slack_api_base: self.slack_api_base.clone(),
            storage_url: self.storage_url.clone(),
            storage_token: self.storage_token.clone(),
        }
    }
}

pub async fn run_cli(cli: Cli) -> Result<(), anyhow::Error> {
    match cli.command {
        Commands::Serve(params) => run_server(params).await,
        Commands::Openapi => {
            println!("{}", serde_json::to_string_pretty(&get_openapi_spec())?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        #[test]
        fn test_serve_params_defaults() {
            let cli = Cli::try_parse_from(["slack-connector", "serve"]).unwrap();
            let Commands::Serve(params) = cli.command else {
                panic!("expected serve");
            };
            let config = params.connector_config();
            assert_eq!(config.ack_delay, Duration::from_millis(100));
            assert_eq!(config.slack_api_base, DEFAULT_SLACK_API_BASE);
        }

        #[test]
        fn test_serve_params_from_flags() {
            let cli = Cli::try_parse_from([
                "slack-connector",
                "serve",
                "--port",
                "8080",
                "--signing-secret",
                "s3cret",
                "--ack-delay",
                "250ms",
                "--base-url",
                "https://conn.example.com",
            ])
            .unwrap();
            let Commands::Serve(params) = cli.command else {
                panic!("expected serve");
            };
            let config = params.connector_config();
            assert_eq!(params.port, 8080);
            assert_eq!(config.signing_secret.as_deref(), Some("s3cret"));
            assert_eq!(config.ack_delay, Duration::from_millis(250));
            assert_eq!(config.base_url, "https://conn.example.com");
        }
    }
}
