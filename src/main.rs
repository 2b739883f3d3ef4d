//! DirectReach workflow service - Main Entry Point
//!
//! Wires configuration, the HTTP provider adapter, the CMS asset source,
//! and the graph executor together, then serves the CMS webhook until
//! shutdown.

use clap::{Parser, Subcommand};
use directreach::adapter::{HttpAdapterConfig, HttpCompletionAdapter};
use directreach::assets::CmsAssetSource;
use directreach::config::AppConfig;
use directreach::graph::GraphExecutor;
use directreach::observability::init_default_logging;
use directreach::pipeline::email_generation_graph;
use directreach::webhook::WebhookServer;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

/// DirectReach email-generation workflow service
#[derive(Parser)]
#[command(name = "directreach")]
#[command(about = "Workflow graph engine for DirectReach prospect email generation")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the CMS webhook and run workflows
    Serve,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!(
        "Starting DirectReach workflow service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Service shutdown complete");
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(AppConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = vec!["directreach.toml", "config/directreach.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(AppConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Provide one with -c/--config or create directreach.toml"
            );
            process::exit(1);
        }
    }
}

/// Bootstrap factory - builds the executor with injected dependencies.
fn build_executor(config: &AppConfig) -> Result<GraphExecutor, Box<dyn std::error::Error>> {
    let adapter_config = HttpAdapterConfig {
        api_key: config.get_llm_api_key()?,
        model: config.llm.model.clone(),
        base_url: config
            .llm
            .base_url
            .clone()
            .unwrap_or_else(|| HttpAdapterConfig::default().base_url),
        timeout: Duration::from_millis(config.pipeline.timeout_ms),
    };
    let adapter = Arc::new(HttpCompletionAdapter::new(adapter_config)?);

    let assets = Arc::new(CmsAssetSource::new(
        config.cms.base_url.clone(),
        config.get_cms_api_key()?,
        config.cms_timeout(),
    )?);

    let graph = email_generation_graph(adapter, assets, &config.pipeline)?;
    Ok(GraphExecutor::new(graph))
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(service_id = %config.service.id, "building workflow executor");

    let executor = Arc::new(build_executor(&config)?);
    let server = WebhookServer::new(executor, config.service.port);

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = server.start() => {}
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }

    Ok(())
}

fn handle_config_command(config: AppConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
