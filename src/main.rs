// src/main.rs
//! GPS Reader - forwards gpsd fixes or a manual location to named pipes

use anyhow::Context;
use clap::Parser;
use gps_reader::{ModeArbiter, ReaderConfig};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/gps-reader/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// gpsd host
    #[arg(long)]
    host: Option<String>,
    /// gpsd port
    #[arg(short, long)]
    port: Option<u16>,
    /// Manual location override file
    #[arg(short = 'o', long)]
    override_file: Option<PathBuf>,
    /// Named pipe read by the UI
    #[arg(long)]
    ui_sink: Option<PathBuf>,
    /// Named pipe read by the mesh service
    #[arg(long)]
    mesh_sink: Option<PathBuf>,
    /// Do not create missing sink FIFOs at startup
    #[arg(long)]
    no_create_fifos: bool,
    /// Save the effective configuration and exit
    #[arg(long)]
    write_config: bool,
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut ReaderConfig) {
        if let Some(host) = &self.host {
            config.gpsd_host = host.clone();
        }
        if let Some(port) = self.port {
            config.gpsd_port = port;
        }
        if let Some(path) = &self.override_file {
            config.override_path = path.clone();
        }
        if let Some(path) = &self.ui_sink {
            config.ui_sink_path = path.clone();
        }
        if let Some(path) = &self.mesh_sink {
            config.mesh_sink_path = path.clone();
        }
        if self.no_create_fifos {
            config.create_fifos = false;
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = ReaderConfig::resolve_path(cli.config.as_deref());
    if config_path.is_none() {
        warn!("HOME is not set and no --config given, using built-in defaults");
    }
    let mut config = ReaderConfig::load_or_default(config_path.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    if cli.write_config {
        let config_path = config_path.context("No configuration path, pass --config")?;
        config.save(&config_path)?;
        info!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    info!("Starting GPS Reader...");
    info!("gpsd: {}", config.gpsd_address());
    info!("Override file: {}", config.override_path.display());
    info!(
        "Sinks: ui={} mesh={}",
        config.ui_sink_path.display(),
        config.mesh_sink_path.display()
    );

    let mut arbiter = ModeArbiter::new(config);
    arbiter.provision_sinks();

    if let Err(e) = arbiter.run().await {
        error!("{}", e);
        return Err(e).context("gpsd session could not be opened");
    }
    Ok(())
}
