//! Frameline viewer entry point.
//!
//! ```text
//! frameline-viewer                   Connect with defaults
//! frameline-viewer --config <path>   Use custom config TOML
//! frameline-viewer --host <addr>     Override the host address
//! frameline-viewer --frames <n>      Stop after n frames
//! frameline-viewer --gen-config      Dump default config and exit
//! frameline-viewer --write-config    Write default config to --config
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use frameline_viewer::config::ViewerConfig;
use frameline_viewer::service::ViewerService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "frameline-viewer", about = "Receive streamed frames and composite them locally")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "frameline-viewer.toml")]
    config: PathBuf,

    /// Host address (overrides config). Example: 192.168.1.100:1234
    #[arg(long)]
    host: Option<String>,

    /// Stop after this many frames (overrides config).
    #[arg(short, long)]
    frames: Option<u64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to the --config path and exit.
    #[arg(long)]
    write_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }
    if cli.write_config {
        ViewerConfig::write_default(&cli.config)?;
        println!("Default config written to {}", cli.config.display());
        return Ok(());
    }

    let loaded = ViewerConfig::read(&cli.config);
    let mut config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => ViewerConfig::default(),
    };
    if let Some(addr) = cli.host {
        config.network.host_address = addr;
    }
    if let Some(frames) = cli.frames {
        config.performance.max_frames = frames;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match loaded {
        Ok(Some(_)) => info!("config loaded from {}", cli.config.display()),
        Ok(None) => info!("no config at {}; using defaults", cli.config.display()),
        Err(e) => warn!("{e}; using defaults"),
    }

    info!("frameline-viewer v{}", env!("CARGO_PKG_VERSION"));
    info!("host address: {}", config.network.host_address);
    info!(
        "stream: {}x{} in {} chunks, {} frame(s) in flight",
        config.stream.width,
        config.stream.height,
        config.stream.chunks,
        config.stream.frames_in_flight
    );

    let service = ViewerService::new(config);
    match service.run() {
        Ok(report) => {
            info!(
                "shutting down after {} frame(s), {} rebuild(s)",
                report.frames, report.rebuilds
            );
            Ok(())
        }
        Err(e) => {
            error!(kind = %e.kind(), "session failed: {e}");
            Err(e.into())
        }
    }
}
