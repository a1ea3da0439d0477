//! Frameline host entry point.
//!
//! ```text
//! frameline-host                    Listen with defaults
//! frameline-host --config <path>    Load a custom config TOML
//! frameline-host --listen <addr>    Override the listen address
//! frameline-host --frames <n>       Stop after n frames
//! frameline-host --gen-config       Write default config to stdout
//! frameline-host --write-config     Write default config to --config
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use frameline_host::config::HostConfig;
use frameline_host::service::HostService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "frameline-host", about = "Render frames and stream them to one viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "frameline-host.toml")]
    config: PathBuf,

    /// Listen address (overrides config). Example: 0.0.0.0:1234
    #[arg(short, long)]
    listen: Option<String>,

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

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&HostConfig::default())?;
        println!("{text}");
        return Ok(());
    }
    if cli.write_config {
        HostConfig::write_default(&cli.config)?;
        println!("Default config written to {}", cli.config.display());
        return Ok(());
    }

    // Load config.
    let loaded = HostConfig::read(&cli.config);
    let mut config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => HostConfig::default(),
    };
    if let Some(addr) = cli.listen {
        config.network.listen_address = addr;
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

    info!("frameline-host v{}", env!("CARGO_PKG_VERSION"));
    info!("listen address: {}", config.network.listen_address);
    info!(
        "stream: {}x{} in {} chunks, {} frame(s) in flight",
        config.stream.width,
        config.stream.height,
        config.stream.chunks,
        config.stream.frames_in_flight
    );
    info!("pose telemetry: {}", config.stream.pose_telemetry);

    let service = HostService::new(config);
    if let Err(e) = service.run() {
        error!(kind = %e.kind(), "session failed: {e}");
        return Err(e.into());
    }

    Ok(())
}
