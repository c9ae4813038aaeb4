//! Dealflow binary entry point
//!
//! Loads configuration and either serves the HTTP API, runs a single
//! workflow in-process, or validates the configuration file.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dealflow_common::{DealInfo, SystemConfig};
use dealflow_network::WorkflowService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dealflow-server")]
#[command(version = "0.1.0")]
#[command(about = "Deal workflow orchestration engine")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one workflow in-process and print the final snapshot as JSON
    Run {
        /// The request to analyze
        query: String,

        /// Company name for the deal metadata
        #[arg(long)]
        company: Option<String>,

        /// Industry for the deal metadata
        #[arg(long)]
        industry: Option<String>,

        /// Indicative deal size, e.g. "$250M"
        #[arg(long)]
        deal_size: Option<String>,
    },
    /// Validate configuration
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.as_deref().unwrap_or("info");
    dealflow_common::tracing_setup::init_tracing_with_level(log_level)?;

    info!("Dealflow v0.1.0 starting");

    let config = SystemConfig::load(&cli.config).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    info!("Configuration loaded from {}", cli.config);

    match cli.command {
        Some(Commands::ValidateConfig) => {
            println!("✓ Configuration is valid");
            println!("  LLM: {} at {}", config.llm.model, config.llm.base_url);
            println!(
                "  Market data: {}",
                config.market_data.base_url.as_deref().unwrap_or("disabled")
            );
            println!("  Database: {}", config.storage.database_url);
            println!(
                "  Engine: {} workers, queue {}, budget {}s",
                config.engine.workers, config.engine.queue_capacity, config.engine.run_budget_secs
            );
            Ok(())
        }
        Some(Commands::Run {
            query,
            company,
            industry,
            deal_size,
        }) => {
            let deal = DealInfo {
                company_name: company,
                industry,
                deal_size,
            };
            run_once(config, &query, deal).await
        }
        Some(Commands::Serve { host, port }) => {
            let mut config = config;
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            start_server(config).await
        }
        None => start_server(config).await,
    }
}

/// Start, poll to a terminal status and print the snapshot
async fn run_once(config: SystemConfig, query: &str, deal: DealInfo) -> Result<()> {
    let service = WorkflowService::from_config(&config)
        .await
        .context("failed to initialize workflow service")?;

    let workflow_id = service.start_with_deal(query, deal).await?;
    info!("Started workflow {}", workflow_id);

    let snapshot = loop {
        // Sampled before the read so a run that just finished is not misreported
        let idle = service.in_flight() == 0;
        match service.get_status(&workflow_id).await? {
            Some(snapshot) if snapshot.workflow.status.is_terminal() => break snapshot,
            Some(snapshot) if idle => {
                service.shutdown().await;
                bail!(
                    "workflow {} stopped while {}; see the log for the storage error",
                    workflow_id,
                    snapshot.workflow.status
                );
            }
            Some(_) => tokio::time::sleep(Duration::from_millis(250)).await,
            None => bail!("workflow {} disappeared from the store", workflow_id),
        }
    };
    service.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn start_server(config: SystemConfig) -> Result<()> {
    info!(
        "Starting Dealflow API on {}:{}",
        config.server.host, config.server.port
    );

    let service = WorkflowService::from_config(&config)
        .await
        .context("failed to initialize workflow service")?;
    let server = dealflow_api::DealflowServer::new(Arc::new(service), &config.server);
    server.run().await
}
