use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use anyhow::anyhow;
use clap::{Parser, Subcommand};

use loadstorm::core::metrics::{JsonFileSink, LogSink, MetricsSink};
use loadstorm::runner::crawl_site_pages;
use loadstorm::{LoadTestConfig, Profile, Runner};

/// Loadstorm - traffic simulation for WordPress and WooCommerce sites
#[derive(Parser, Debug)]
#[command(name = "loadstorm")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Test profile (overrides PROFILE and the YAML `profile` key)
    #[arg(short = 'p', long = "profile", value_enum)]
    profile: Option<Profile>,

    /// Write the final metrics summary to this file as JSON
    #[arg(long = "summary-export", value_name = "FILE")]
    summary_export: Option<PathBuf>,

    /// Subcommand to run (defaults to `run`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the configured scenarios
    Run,

    /// Crawl the sitemap and print the page list the wordpress profile would browse
    Sitemap,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        info!("Loading configuration from {}", path.display());
    }
    let config = LoadTestConfig::load(cli.config.as_deref(), cli.profile)
        .map_err(|e| anyhow!("Invalid configuration: {e}"))?;

    if let Some(Commands::Sitemap) = cli.command {
        let settings = config.session_settings()?;
        let pages = crawl_site_pages(&settings).await?;
        for page in &pages {
            println!("{page}");
        }
        return Ok(());
    }

    let runner = Runner::new(config);

    let shutdown = runner.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping all scenarios");
            shutdown.cancel();
        }
    });

    let summary = runner.run().await?;

    let mut sinks: Vec<Box<dyn MetricsSink>> = vec![Box::new(LogSink)];
    if let Some(path) = cli.summary_export {
        sinks.push(Box::new(JsonFileSink::new(path)));
    }
    for sink in &sinks {
        sink.export(&summary)
            .map_err(|e| anyhow!("Failed to export summary: {e}"))?;
    }

    Ok(())
}
