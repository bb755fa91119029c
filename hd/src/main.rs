//! HomeDaemon - registry of simulated temperature devices
//!
//! CLI entry point: `hd serve` runs the registry, every other command talks to
//! it over the local socket.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use homedaemon::cli::{Cli, Command, OutputFormat, get_log_path};
use homedaemon::config::Config;
use homedaemon::heating::HeatingStatus;
use homedaemon::ipc::{self, DaemonClient, IpcServer};
use homedaemon::registry::{DeviceManager, HomeCreation};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    let client = DaemonClient::from_config(&config.ipc);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve => cmd_serve(&config).await,
        Command::Ping => cmd_ping(&client).await,
        Command::Stop => cmd_stop(&client).await,
        Command::Homes { format } => cmd_homes(&client, format).await,
        Command::Create { home, devices, format } => cmd_create(&client, &home, devices, format).await,
        Command::Exists { home } => cmd_exists(&client, &home).await,
        Command::Temps { home, format } => cmd_temps(&client, &home, format).await,
        Command::Record {
            home,
            readings,
            format,
        } => cmd_record(&client, &home, readings, format).await,
        Command::Track { home, device } => {
            let device = client.track_device(&home, &device).await?;
            println!("Device {} registered in {}", device, home);
            Ok(())
        }
        Command::Heating {
            home,
            block,
            unblock,
            format,
        } => cmd_heating(&client, &home, block, unblock, format).await,
        Command::Reheat { home, format } => cmd_reheat(&client, home, format).await,
        Command::Devices { format } => cmd_devices(&client, format).await,
        Command::RemoveDevice { home, device } => {
            client.remove_device(&home, &device).await?;
            println!("Device {} removed from {}", device, home);
            Ok(())
        }
        Command::RemoveHome { home } => {
            client.remove_home(&home).await?;
            println!("Home {} removed", home);
            Ok(())
        }
        Command::Stats { format } => {
            let metrics = client.gather_stats().await?;
            match format {
                OutputFormat::Json => print_json(&metrics),
                OutputFormat::Text => {
                    println!("Gathers started:   {}", metrics.started);
                    println!("Gathers completed: {}", metrics.completed);
                    println!("Gathers timed out: {}", metrics.timed_out);
                    println!("Gathers in flight: {}", metrics.in_flight());
                    println!("Ignored replies:   {}", metrics.ignored_replies);
                    Ok(())
                }
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn format_reading(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => "unavailable".to_string(),
    }
}

fn print_heating(home: &str, status: &HeatingStatus, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(status),
        OutputFormat::Text => {
            println!("{}: {} ({}, offset {:+.1})", home, status.setting, status.label, status.value);
            if status.user_turned_off {
                println!("  heating blocked by user");
            }
            Ok(())
        }
    }
}

/// Run the registry and serve it until a signal or a `Shutdown` request
async fn cmd_serve(config: &Config) -> Result<()> {
    debug!("cmd_serve: called");
    config.validate()?;

    let registry = DeviceManager::spawn(config.registry.clone());

    let (listener, socket_path) = ipc::create_listener_at(&config.ipc.socket_path())?;
    info!(?socket_path, "IPC socket listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let server = IpcServer::new(registry.clone(), config.ipc.max_message_size, shutdown_tx.clone());
    let mut server_handle = tokio::spawn(async move {
        if let Err(e) = server.run(listener, shutdown_rx).await {
            tracing::error!(error = %e, "IPC server error");
        }
    });

    println!("homedaemon listening on {}", socket_path.display());
    info!("Daemon running. Press Ctrl+C to stop.");

    let server_done = {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                warn!("SIGINT received");
                let _ = shutdown_tx.send(()).await;
                false
            }
            _ = sigterm.recv() => {
                warn!("SIGTERM received");
                let _ = shutdown_tx.send(()).await;
                false
            }
            _ = &mut server_handle => {
                info!("Shutdown requested over IPC");
                true
            }
        }
    };

    info!("Daemon shutting down...");
    if !server_done {
        let _ = server_handle.await;
    }

    if let Err(e) = registry.shutdown().await {
        warn!(error = %e, "Registry did not shut down cleanly");
    }

    ipc::cleanup_socket(&socket_path);
    info!("Daemon stopped");
    Ok(())
}

async fn cmd_ping(client: &DaemonClient) -> Result<()> {
    debug!("cmd_ping: called");
    if !client.socket_exists() {
        println!("Daemon is not running (no socket)");
        return Ok(());
    }
    match client.ping().await {
        Ok(version) => {
            println!("Daemon is alive (version {})", version);
            Ok(())
        }
        Err(e) => Err(e.wrap_err("Daemon did not answer")),
    }
}

async fn cmd_stop(client: &DaemonClient) -> Result<()> {
    debug!("cmd_stop: called");
    client.shutdown().await?;
    println!("Daemon stopping");
    Ok(())
}

async fn cmd_homes(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_homes: called");
    let homes = client.list_homes().await?;
    match format {
        OutputFormat::Json => print_json(&homes),
        OutputFormat::Text => {
            println!("{} home(s)", homes.len());
            for home in homes {
                println!("  {}", home);
            }
            Ok(())
        }
    }
}

async fn cmd_create(client: &DaemonClient, home: &str, devices: Vec<String>, format: OutputFormat) -> Result<()> {
    debug!(%home, ?devices, "cmd_create: called");
    let outcome = client.create_home(home, devices).await?;
    match (format, outcome) {
        (OutputFormat::Json, outcome) => print_json(&outcome),
        (OutputFormat::Text, HomeCreation::Created { home, devices }) => {
            let devices: Vec<String> = devices.into_iter().collect();
            println!("Created {} with devices: {}", home, devices.join(", "));
            Ok(())
        }
        (OutputFormat::Text, HomeCreation::AlreadyExists) => {
            println!("Home {} already exists", home);
            Ok(())
        }
    }
}

async fn cmd_exists(client: &DaemonClient, home: &str) -> Result<()> {
    debug!(%home, "cmd_exists: called");
    let exists = client.home_exists(home).await?;
    println!("{}", exists);
    Ok(())
}

async fn cmd_temps(client: &DaemonClient, home: &str, format: OutputFormat) -> Result<()> {
    debug!(%home, "cmd_temps: called");
    let temperatures = client.home_temperatures(home).await?;
    match (format, temperatures) {
        (OutputFormat::Json, temperatures) => print_json(&temperatures),
        (OutputFormat::Text, None) => {
            println!("Unknown home: {}", home);
            Ok(())
        }
        (OutputFormat::Text, Some(temperatures)) => {
            for (device, value) in temperatures {
                println!("{}: {}", device, format_reading(value));
            }
            Ok(())
        }
    }
}

async fn cmd_record(client: &DaemonClient, home: &str, readings: Vec<(String, f64)>, format: OutputFormat) -> Result<()> {
    debug!(%home, count = readings.len(), "cmd_record: called");
    let temperatures: HashMap<String, f64> = readings.into_iter().collect();
    let acked = client.record_temperatures(home, temperatures).await?;
    match (format, acked) {
        (OutputFormat::Json, acked) => print_json(&acked),
        (OutputFormat::Text, None) => {
            println!("Unknown home: {}", home);
            Ok(())
        }
        (OutputFormat::Text, Some(devices)) => {
            println!("Recorded: {}", devices.join(", "));
            Ok(())
        }
    }
}

async fn cmd_heating(client: &DaemonClient, home: &str, block: bool, unblock: bool, format: OutputFormat) -> Result<()> {
    debug!(%home, block, unblock, "cmd_heating: called");
    let status = if block || unblock {
        client.set_heating(home, block).await?
    } else {
        client.heating(home).await?
    };
    print_heating(home, &status, format)
}

async fn cmd_reheat(client: &DaemonClient, home: Option<String>, format: OutputFormat) -> Result<()> {
    debug!(?home, "cmd_reheat: called");
    match home {
        Some(home) => {
            let status = client.reevaluate_home(&home).await?;
            print_heating(&home, &status, format)
        }
        None => {
            client.alter_heating().await?;
            println!("Heating re-evaluation sent to every home");
            Ok(())
        }
    }
}

async fn cmd_devices(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    debug!("cmd_devices: called");
    let homes = client.list_devices().await?;
    match format {
        OutputFormat::Json => print_json(&homes),
        OutputFormat::Text => {
            if homes.is_empty() {
                println!("No homes");
            }
            for (home, devices) in homes {
                println!("{}", home);
                for reading in devices {
                    println!("  {}: {}", reading.device, format_reading(reading.value));
                }
            }
            Ok(())
        }
    }
}
