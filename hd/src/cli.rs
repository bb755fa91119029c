//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

/// HomeDaemon - registry of simulated temperature devices
#[derive(Parser)]
#[command(
    name = "hd",
    about = "Registry of simulated temperature devices grouped into homes",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the registry and its socket in the foreground
    Serve,

    /// Ping the daemon to check if it's alive and responsive
    Ping,

    /// Ask the daemon to shut down
    Stop,

    /// Show the number of homes and their names
    Homes {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a home with an initial set of devices
    Create {
        home: String,

        #[arg(required = true)]
        devices: Vec<String>,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Check whether a home exists
    Exists { home: String },

    /// Read every device of a home
    Temps {
        home: String,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Record temperatures, e.g. `hd record kitchen dev1=21.5 dev2=19`
    Record {
        home: String,

        #[arg(required = true, value_parser = parse_reading, value_name = "DEVICE=VALUE")]
        readings: Vec<(String, f64)>,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Register a device under a home, creating either if needed
    Track { home: String, device: String },

    /// Show or change a home's heating settings
    Heating {
        home: String,

        /// Turn heating off and keep it off
        #[arg(long, conflicts_with = "unblock")]
        block: bool,

        /// Let heating follow the temperatures again
        #[arg(long)]
        unblock: bool,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Re-evaluate heating in every home, or in one home when given
    Reheat {
        home: Option<String>,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List every device of every home
    Devices {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Stop a device and remove it from its home
    RemoveDevice { home: String, device: String },

    /// Stop a home and all of its devices
    RemoveHome { home: String },

    /// Show scatter/gather counters
    Stats {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Parse a `DEVICE=VALUE` pair
pub fn parse_reading(s: &str) -> Result<(String, f64), String> {
    debug!(%s, "parse_reading: called");
    let (device, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected DEVICE=VALUE, got '{}'", s))?;
    if device.is_empty() {
        return Err(format!("Missing device id in '{}'", s));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid temperature '{}' for {}", value, device))?;
    Ok((device.to_string(), value))
}

/// Output format for read commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

/// Path of the log file shared by the daemon and the CLI
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("homedaemon")
        .join("logs")
        .join("homedaemon.log")
}
