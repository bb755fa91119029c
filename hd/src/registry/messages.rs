//! Registry messages
//!
//! Commands for the device, group and manager actors plus the typed outcomes
//! returned through [`super::ManagerHandle`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gather::{GatherMetrics, ReplyTo};
use crate::heating::HeatingStatus;

/// Errors from registry requests
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry not found: {0}")]
    NotFound(String),

    #[error("No reply within {0:?}")]
    AskTimeout(Duration),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Response from registry requests
pub type RegistryResponse<T> = Result<T, RegistryError>;

/// Device id to reading, absent when the device could not answer
pub type Readings = BTreeMap<String, Option<f64>>;

/// Home name to its devices, sorted by device id
pub type DevicesByHome = BTreeMap<String, Vec<DeviceReading>>;

/// One device in a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReading {
    pub device: String,
    pub value: Option<f64>,
}

/// Outcome of creating a home
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomeCreation {
    /// Home created; `devices` are the ids registered before the deadline
    Created { home: String, devices: BTreeSet<String> },
    AlreadyExists,
}

/// Commands sent to a TemperatureDevice actor
#[derive(Debug)]
pub enum DeviceCommand {
    TrackDevice {
        home: String,
        device: String,
        reply_to: ReplyTo<String>,
    },
    ReadTemperature {
        reply_to: ReplyTo<f64>,
    },
    RecordTemperature {
        value: f64,
        reply_to: ReplyTo<()>,
    },
    Stop,
}

/// Commands sent to a DeviceGroup actor
#[derive(Debug)]
pub enum GroupCommand {
    TrackDevice {
        home: String,
        device: String,
        reply_to: ReplyTo<String>,
    },
    ReadTemperatures {
        reply_to: ReplyTo<Readings>,
    },
    RecordTemperatures {
        temperatures: HashMap<String, f64>,
        reply_to: ReplyTo<BTreeSet<String>>,
    },
    DeviceIds {
        reply_to: ReplyTo<Vec<String>>,
    },
    GetHeating {
        reply_to: ReplyTo<HeatingStatus>,
    },
    SetHeatingBlock {
        block: bool,
        reply_to: ReplyTo<HeatingStatus>,
    },
    /// Re-read every device and recompute the heating setting
    AlterHeating {
        reply_to: Option<ReplyTo<HeatingStatus>>,
    },
    /// Fresh readings for a pending AlterHeating
    ApplyHeating {
        readings: Readings,
        reply_to: Option<ReplyTo<HeatingStatus>>,
    },
    StopDevice {
        device: String,
        reply_to: ReplyTo<bool>,
    },
    Stop,
}

/// Commands sent to the DeviceManager actor
#[derive(Debug)]
pub enum ManagerCommand {
    TrackDevice {
        home: String,
        device: String,
        reply_to: ReplyTo<String>,
    },
    CreateHome {
        home: String,
        devices: Vec<String>,
        reply_to: ReplyTo<HomeCreation>,
    },
    HomeCount {
        reply_to: ReplyTo<usize>,
    },
    HomeNames {
        reply_to: ReplyTo<Vec<String>>,
    },
    HomeExists {
        home: String,
        reply_to: ReplyTo<bool>,
    },
    HomeTemperatures {
        home: String,
        reply_to: ReplyTo<Option<Readings>>,
    },
    RecordTemperatures {
        home: String,
        temperatures: HashMap<String, f64>,
        reply_to: ReplyTo<Option<BTreeSet<String>>>,
    },
    DeviceIds {
        home: String,
        reply_to: ReplyTo<Option<Vec<String>>>,
    },
    GetHeating {
        home: String,
        reply_to: ReplyTo<HeatingStatus>,
    },
    SetHeatingBlock {
        home: String,
        block: bool,
        reply_to: ReplyTo<Option<HeatingStatus>>,
    },
    AlterHeating {
        reply_to: ReplyTo<usize>,
    },
    ReevaluateHome {
        home: String,
        reply_to: ReplyTo<Option<HeatingStatus>>,
    },
    ListDevices {
        reply_to: ReplyTo<DevicesByHome>,
    },
    RemoveDevice {
        home: String,
        device: String,
        reply_to: ReplyTo<bool>,
    },
    RemoveHome {
        home: String,
        reply_to: ReplyTo<bool>,
    },
    GatherStats {
        reply_to: ReplyTo<GatherMetrics>,
    },
    Shutdown,
}
