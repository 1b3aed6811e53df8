use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use agiles::config::{RequestMethod, ServiceOverrides, ShapeKind};
use agiles::web_server::{self, WebServerConfig};
use agiles::{chat, constants, AnswerService, HttpAnswerService, ServiceConfig, Variant};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,

    #[command(subcommand)]
    command: Commands,
}

/// How to reach the remote answer service.
#[derive(clap::Args, Debug)]
struct ServiceArgs {
    /// Base URL of the answer service.
    #[arg(long, global = true, default_value_t = constants::ANSWER_SERVICE_URL.clone())]
    api_url: String,
    /// Request/response contract preset.
    #[arg(long, global = true, value_enum, env = "AGILES_VARIANT", default_value_t = Variant::Prompt)]
    variant: Variant,
    /// Override the request path of the preset.
    #[arg(long, global = true)]
    path: Option<String>,
    /// Override the HTTP method of the preset.
    #[arg(long, global = true, value_enum)]
    method: Option<RequestMethod>,
    /// Send the question as this query parameter.
    #[arg(long, global = true, conflicts_with = "question_in_path")]
    question_param: Option<String>,
    /// Send the question as the last path segment.
    #[arg(long, global = true)]
    question_in_path: bool,
    /// Override the response shape of the preset.
    #[arg(long, global = true, value_enum)]
    shape: Option<ShapeKind>,
    /// JSON field holding the answer.
    #[arg(long, global = true)]
    answer_field: Option<String>,
    /// Transport timeout in seconds (none by default).
    #[arg(long, global = true, env = "AGILES_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl ServiceArgs {
    fn into_config(self) -> ServiceConfig {
        let preset = ServiceConfig::for_variant(self.variant, self.api_url);
        ServiceOverrides {
            path: self.path,
            method: self.method,
            question_param: self.question_param,
            question_in_path: self.question_in_path,
            shape: self.shape,
            answer_field: self.answer_field,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
        .apply(preset)
    }
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the landing page and the chat page over HTTP.
    Serve {
        #[arg(long, env = "AGILES_PORT", default_value_t = 9900, help = "Port for the web server.")]
        port: u16,
        #[arg(long, help = "Load templates from this directory and reload them on change.")]
        templates_dir: Option<PathBuf>,
        #[arg(long, help = "Serve files from this directory under /static.")]
        static_dir: Option<PathBuf>,
    },
    /// Chat with the answer service in the terminal.
    Chat,
    /// Ask a single question and print the answer.
    Ask {
        #[arg(help = "The question to ask.")]
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (AGILES_API_URL, AGILES_PORT, ...)
    dotenvy::dotenv().ok();

    // Logs go to stderr so `ask` output stays clean; RUST_LOG overrides the default level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("agiles=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Agiles starting with command: {:?}", cli.command);

    let http_service = HttpAnswerService::new(cli.service.into_config())
        .context("Failed to build answer service client")?;
    let config = http_service.config();
    info!(endpoint = %config.endpoint(), method = ?config.method, "Answer service configured");
    let service: Arc<dyn AnswerService> = Arc::new(http_service);

    match cli.command {
        Commands::Serve {
            port,
            templates_dir,
            static_dir,
        } => {
            info!("Starting web server on port {}...", port);
            let web_config = WebServerConfig {
                port,
                templates_dir,
                static_dir,
            };
            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(web_config, service).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat => {
            chat::run_terminal_chat(service)
                .await
                .context("Chat session failed")?;
        }
        Commands::Ask { question } => match chat::ask_once(service, &question).await {
            Some(answer) => println!("{}", answer),
            None => warn!("Question is empty, nothing to ask"),
        },
    }

    Ok(())
}
