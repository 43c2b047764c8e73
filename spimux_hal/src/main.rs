//! # spimux HAL Binary
//!
//! Opens the SPI devices listed in the configuration on the selected driver,
//! optionally probes them and prints a JSON report, then closes everything.
//!
//! # Usage
//!
//! ```bash
//! # Run with the simulation driver
//! spimux_hal --config config/spimux.toml --simulate
//!
//! # Override the configured driver
//! spimux_hal --config config/spimux.toml --driver null
//!
//! # Loopback probe and JSON report, verbose logging
//! spimux_hal --config config/spimux.toml -s --probe --report -v
//! ```

use clap::Parser;
use spimux_common::config::{ConfigError, LogLevel};
use spimux_common::spi::config::SpiMuxConfig;
use spimux_common::spi::consts::DEFAULT_CONFIG_PATH;
use spimux_hal::drivers::simulation;
use spimux_hal::{DriverRegistry, SpiService};
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// spimux HAL - logical SPI device multiplexer with pluggable drivers
#[derive(Parser, Debug)]
#[command(name = "spimux_hal")]
#[command(version)]
#[command(about = "Logical SPI device multiplexer with pluggable driver architecture")]
#[command(long_about = None)]
struct Args {
    /// Path to the service configuration file (spimux.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force simulation driver (a missing config file falls back to defaults)
    #[arg(short = 's', long)]
    simulate: bool,

    /// Driver to load instead of the configured one
    #[arg(short, long)]
    driver: Option<String>,

    /// Run a loopback write/read on every opened device
    #[arg(long)]
    probe: bool,

    /// Print the bus report as JSON on stdout
    #[arg(long)]
    report: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("spimux startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = SpiMuxConfig::load_validated(&args.config);
    let log_level = loaded
        .as_ref()
        .map(|config| config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("spimux HAL v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => config,
        Err(ConfigError::FileNotFound) if args.simulate => {
            warn!(
                "Config {:?} not found, using simulation defaults",
                args.config
            );
            SpiMuxConfig::default()
        }
        Err(e) => return Err(format!("{}: {}", args.config.display(), e).into()),
    };

    if args.simulate {
        info!("Simulation mode enabled (exclusive)");
        config.driver.name = simulation::DRIVER_NAME.to_string();
    } else if let Some(driver) = &args.driver {
        info!("Driver from CLI: {}", driver);
        config.driver.name = driver.clone();
    }

    let registry = DriverRegistry::with_builtin_drivers();
    info!("Available drivers: {:?}", registry.list_drivers());

    let mut service = SpiService::start(&config, &registry)?;

    if args.probe {
        let results = service.probe()?;
        let failed = results.iter().filter(|r| !r.loopback).count();
        if failed > 0 {
            warn!("{} of {} device(s) did not loop back", failed, results.len());
        }
    }

    if args.report {
        println!("{}", serde_json::to_string_pretty(&service.report())?);
    }

    service.stop()?;
    info!("spimux HAL shutdown complete");
    Ok(())
}

/// Setup tracing subscriber from CLI arguments and the configured level.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::from(log_level)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
