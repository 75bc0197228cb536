use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use windsock_core::{
    ConnectionSupervisor, DeviceDescriptor, StandardTransport, StationEvent, SupervisorConfig,
};
use windsock_types::ConnectionState;

mod config;

#[derive(Parser)]
#[command(name = "windsock")]
#[command(author, version, about = "CLI for windsock weather stations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a station and stream analyzed samples
    Watch {
        /// Station to connect to: `host:port` or `simulator`.
        /// Defaults to the last connected device.
        device: Option<String>,

        /// Print raw frames as they arrive
        #[arg(long)]
        raw: bool,

        /// Emit one JSON object per sample instead of columns
        #[arg(long)]
        json: bool,
    },

    /// Stream samples from the built-in simulator
    Simulate {
        /// Print raw frames as they arrive
        #[arg(long)]
        raw: bool,

        /// Emit one JSON object per sample instead of columns
        #[arg(long)]
        json: bool,
    },

    /// Set calibration offsets applied to every sample
    Calibrate {
        /// Wind speed offset in m/s
        #[arg(long, default_value = "0.0")]
        wind: f64,

        /// Temperature offset in °C
        #[arg(long, default_value = "0.0")]
        temp: f64,
    },

    /// Configure the thermal launch detector
    Detector {
        /// Enable or disable launch scoring
        #[arg(long)]
        enabled: Option<bool>,

        /// Score sensitivity multiplier (1.0 is neutral)
        #[arg(long)]
        sensitivity: Option<f64>,
    },

    /// Show the effective configuration
    Config {
        /// Print the config file path instead
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Watch { device, raw, json } => {
            let station = config::load();
            let device = match device {
                Some(spec) => parse_device(&spec)?,
                None => match station.last_device.clone() {
                    Some(device) => device,
                    None => bail!("no device given and no previous device remembered"),
                },
            };
            watch(device, station, raw, json).await
        }
        Commands::Simulate { raw, json } => {
            watch(DeviceDescriptor::Simulator, config::load(), raw, json).await
        }
        Commands::Calibrate { wind, temp } => {
            let mut station = config::load();
            station.calibration.wind_offset = wind;
            station.calibration.temp_offset = temp;
            station.validate()?;
            config::save(&station)?;
            println!("calibration: wind {wind:+.2} m/s, temp {temp:+.2} °C");
            Ok(())
        }
        Commands::Detector {
            enabled,
            sensitivity,
        } => {
            let mut station = config::load();
            if let Some(enabled) = enabled {
                station.detector.enabled = enabled;
            }
            if let Some(sensitivity) = sensitivity {
                station.detector.sensitivity = sensitivity;
            }
            station.validate()?;
            config::save(&station)?;
            println!(
                "detector: {} (sensitivity {:.2})",
                if station.detector.enabled {
                    "enabled"
                } else {
                    "disabled"
                },
                station.detector.sensitivity
            );
            Ok(())
        }
        Commands::Config { path } => {
            if path {
                println!("{}", config::config_path().display());
            } else {
                print!("{}", toml::to_string_pretty(&config::load())?);
            }
            Ok(())
        }
    }
}

/// Parse a device spec: `simulator` or a `host:port` socket address.
fn parse_device(spec: &str) -> Result<DeviceDescriptor> {
    if spec.eq_ignore_ascii_case("simulator") || spec.eq_ignore_ascii_case("sim") {
        return Ok(DeviceDescriptor::Simulator);
    }
    match spec.parse() {
        Ok(addr) => Ok(DeviceDescriptor::Tcp { addr }),
        Err(_) => bail!("invalid device '{spec}': expected `simulator` or `host:port`"),
    }
}

/// Connect and print events until interrupted.
async fn watch(
    device: DeviceDescriptor,
    station: windsock_core::StationConfig,
    raw: bool,
    json: bool,
) -> Result<()> {
    station.validate()?;
    let supervisor = ConnectionSupervisor::new(
        Arc::new(StandardTransport::new()),
        SupervisorConfig {
            auto_reconnect: station.reconnect.auto,
            reconnect: station.reconnect.options(),
        },
    );
    supervisor.set_calibration(station.calibration.into()).await;
    supervisor
        .set_detector_enabled(station.detector.enabled)
        .await;
    supervisor
        .set_sensitivity(station.detector.sensitivity)
        .await;

    let mut events = supervisor.subscribe();
    supervisor.connect(device).await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("stopping");
                supervisor.stop().await;
                break;
            }
            event = events.recv() => match event {
                Ok(StationEvent::StateChanged(state)) => {
                    if state != ConnectionState::Connected {
                        println!("[{state}]");
                    }
                }
                Ok(StationEvent::Connected(device)) => {
                    println!("[connected to {device}]");
                    // Remember the device for `watch` with no argument.
                    let mut station = config::load();
                    station.last_device = Some(device);
                    if let Err(err) = config::save(&station) {
                        tracing::warn!(error = %err, "could not persist config");
                    }
                }
                Ok(StationEvent::RawFrame(frame)) => {
                    if raw {
                        println!("  {frame}");
                    }
                }
                Ok(StationEvent::Sample(processed)) => {
                    if json {
                        println!("{}", serde_json::to_string(&processed)?);
                        continue;
                    }
                    let sample = processed.sample;
                    let analysis = processed.analysis;
                    println!(
                        "node {}  {:5.1} m/s  {:5.1} °C  {:>9}  score {:3}",
                        sample.node_id,
                        sample.wind_speed,
                        sample.temperature,
                        analysis.decision,
                        analysis.score,
                    );
                }
                Ok(StationEvent::Notice(text)) => println!("! {text}"),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "event stream ended");
                    break;
                }
            },
        }
    }
    Ok(())
}
