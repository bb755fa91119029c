//! IPC message types
//!
//! Simple JSON-over-newline protocol. Each message is a single line of JSON followed by `\n`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::gather::GatherMetrics;
use crate::heating::HeatingStatus;
use crate::registry::{DevicesByHome, Readings};

/// Requests from the CLI to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DaemonMessage {
    /// Ping to check if daemon is alive
    Ping,

    /// Request daemon to stop gracefully
    Shutdown,

    HomeCount,

    ListHomes,

    CreateHome { home: String, devices: Vec<String> },

    HomeExists { home: String },

    HomeTemperatures { home: String },

    RecordTemperatures {
        home: String,
        temperatures: HashMap<String, f64>,
    },

    TrackDevice { home: String, device: String },

    GetHeating { home: String },

    SetHeating { home: String, block: bool },

    /// Re-evaluate heating in every home
    AlterHeating,

    /// Re-evaluate heating in one home and report the result
    ReevaluateHome { home: String },

    ListDevices,

    RemoveDevice { home: String, device: String },

    RemoveHome { home: String },

    GatherStats,
}

/// Responses from the daemon to the CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DaemonResponse {
    /// Acknowledgment
    Ok,

    /// Pong response to ping
    Pong { version: String },

    /// Error response
    Error { message: String },

    HomeCount { count: usize },

    Homes { homes: Vec<String> },

    HomeCreated { home: String, devices: Vec<String> },

    HomeAlreadyExists { home: String },

    Exists { exists: bool },

    /// `temperatures` is null for an unknown home
    Temperatures {
        home: String,
        temperatures: Option<Readings>,
    },

    /// `devices` is null for an unknown home
    Recorded { devices: Option<Vec<String>> },

    DeviceRegistered { device: String },

    Heating(HeatingStatus),

    Devices { homes: DevicesByHome },

    Stats(GatherMetrics),
}
