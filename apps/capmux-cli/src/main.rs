//! Capmux CLI entry point
//!
//! Subcommands:
//! - `validate` - Classify endpoint strings
//! - `config` - Show the loaded configuration or its deployment form
//! - `security` - Run the security policy over `MCP_SERVERS`
//! - `status` - Connect every server and report its state
//! - `query` - Route one request through the client
//!
//! All output to stdout is JSON. Logs go to stderr.

use std::process::ExitCode;

use anyhow::Context;
use capmux_core::{
    error_response, success_response, ConfigManager, ConfigOptions, EndpointValidator,
    ErrorContext, ErrorHandler, McpError, McpResult, SecurityValidator, MCP_SERVERS_ENV,
};
use capmux_mcp::{ClientOptions, McpClient};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Capmux - capability-routed MCP client
#[derive(Parser)]
#[command(name = "capmux")]
#[command(about = "Route requests to MCP servers by capability")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify and validate endpoint strings
    Validate {
        #[arg(required = true)]
        endpoints: Vec<String>,
    },

    /// Print the loaded configuration
    Config {
        /// Print the flat deployment environment instead of the summary
        #[arg(long)]
        export: bool,
    },

    /// Run the security policy over the configured source
    Security {
        /// Apply production rules regardless of MCP_PRODUCTION_MODE
        #[arg(long)]
        production: bool,
    },

    /// Connect every enabled server and print its status
    Status {
        /// Use in-memory connections
        #[arg(long)]
        mock: bool,
    },

    /// Route one request and print the reply
    Query {
        text: String,

        /// Skip detection and target this capability
        #[arg(long)]
        capability: Option<String>,

        /// Use in-memory connections
        #[arg(long)]
        mock: bool,
    },
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    dotenvy::dotenv().ok();

    // RUST_LOG takes precedence
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,capmux_core=debug,capmux_mcp=debug"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}

impl Commands {
    /// Operation name recorded on errors
    fn operation(&self) -> &'static str {
        match self {
            Commands::Validate { .. } => "validate",
            Commands::Config { .. } => "config",
            Commands::Security { .. } => "security",
            Commands::Status { .. } => "status",
            Commands::Query { .. } => "query",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let errors = ErrorHandler::new();
    let (body, ok) = execute(cli.command, &errors).await;
    println!("{}", body);
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Run `command` and render its envelope; the flag is false on error
async fn execute(command: Commands, errors: &ErrorHandler) -> (Value, bool) {
    let context = ErrorContext::new(command.operation());
    render(errors.wrap(context, run(command)).await)
}

fn render(result: McpResult<Value>) -> (Value, bool) {
    match result {
        Ok(data) => (success_response(data), true),
        Err(err) => (error_response(&err), false),
    }
}

async fn run(command: Commands) -> anyhow::Result<Value> {
    let source = std::env::var(MCP_SERVERS_ENV).ok();

    match command {
        Commands::Validate { endpoints } => {
            let results = EndpointValidator::validate_configuration(
                endpoints.iter().map(|e| (e.as_str(), e.as_str())),
            );
            let all_valid = results.values().all(|r| r.valid);
            let results = serde_json::to_value(results).context("serialize validation results")?;
            if !all_valid {
                return Err(McpError::validation("One or more endpoints are invalid")
                    .with_context(ErrorContext::new("validate").with_extra("results", results))
                    .into());
            }
            Ok(results)
        }

        Commands::Config { export } => {
            let config = ConfigManager::from_env()?;
            if export {
                Ok(serde_json::to_value(config.to_deployment_env())
                    .context("serialize deployment environment")?)
            } else {
                Ok(json!({
                    "summary": config.summary(),
                    "servers": Value::Object(config.servers_json()),
                }))
            }
        }

        Commands::Security { production } => {
            let mut options = ConfigOptions::from_env()?;
            options.production_mode |= production;
            let validator = SecurityValidator::new(options.production_mode);

            let Some(source) = source.filter(|s| !s.trim().is_empty()) else {
                info!("{} is not set, nothing to check", MCP_SERVERS_ENV);
                return Ok(json!({ "errors": [], "warnings": [] }));
            };

            let mut report = validator.validate_source(&source);
            if report.is_secure() {
                options.enforce_security = false;
                let config = ConfigManager::new(options).load(Some(&source))?;
                report = validator.validate(&config);
            }
            let body = serde_json::to_value(&report).context("serialize security report")?;
            report.into_result()?;
            Ok(body)
        }

        Commands::Status { mock } => {
            let client = McpClient::new(client_options(source, mock)?)?;
            let summary = client.connect_all().await;
            debug!(connected = summary.success_count(), "Collected connection summary");

            let status = client.get_server_status().await;
            client.disconnect_all().await;
            Ok(json!({
                "connect": serde_json::to_value(&summary).context("serialize connect summary")?,
                "servers": serde_json::to_value(&status).context("serialize server status")?,
            }))
        }

        Commands::Query {
            text,
            capability,
            mock,
        } => {
            let client = McpClient::new(client_options(source, mock)?)?;
            client.connect_all().await;

            let reply = client.query(&text, capability.as_deref()).await;
            client.disconnect_all().await;
            Ok(serde_json::to_value(reply?).context("serialize query response")?)
        }
    }
}

fn client_options(source: Option<String>, use_mock: bool) -> anyhow::Result<ClientOptions> {
    Ok(ClientOptions {
        config: ConfigOptions::from_env()?,
        source,
        ..Default::default()
    }
    .with_mock(use_mock))
}
