//! depthlink-publisher — entry point.
//!
//! ```text
//! depthlink-publisher                  Run against the configured bridge
//! depthlink-publisher --config <path>  Load a custom config TOML
//! depthlink-publisher --url <ws-url>   Override the bridge URL
//! depthlink-publisher --dry-run        Log envelopes instead of sending
//! depthlink-publisher --gen-config     Write default config to --config
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use depthlink_publisher::config::PublisherConfig;
use depthlink_publisher::service::DepthPublisherService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "depthlink-publisher", about = "Stream depth frames to a rosbridge server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "depthlink.toml")]
    config: PathBuf,

    /// rosbridge WebSocket URL (overrides `bridge.url`).
    #[arg(long)]
    url: Option<String>,

    /// Log envelopes instead of connecting to a bridge.
    #[arg(long)]
    dry_run: bool,

    /// Write the default configuration to `--config` and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: write defaults and exit.
    if cli.gen_config {
        PublisherConfig::write_default(&cli.config)?;
        println!("wrote default config to {}", cli.config.display());
        return Ok(());
    }

    // Load config.
    let mut config = PublisherConfig::load(&cli.config);
    if let Some(url) = cli.url {
        config.bridge.url = url;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("depthlink-publisher v{}", env!("CARGO_PKG_VERSION"));
    info!("bridge: {}", config.bridge.url);
    info!("topic: {} ({})", config.topic.name, config.topic.message_type);
    info!(
        "capture: {}x{} every {}s",
        config.capture.width, config.capture.height, config.capture.publish_interval_secs
    );

    let service = DepthPublisherService::new(config).with_dry_run(cli.dry_run);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    let stats = service.run().await?;
    info!("final: {stats}");

    Ok(())
}
