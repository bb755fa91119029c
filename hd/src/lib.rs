//! HomeDaemon - message-driven registry of simulated temperature devices
//!
//! Devices are grouped into homes. Every home and device is an actor; reads
//! and writes that span several devices are answered by short-lived
//! scatter/gather coordinators bounded by a deadline. Each home derives a
//! heating setting from its average temperature.

pub mod cli;
pub mod config;
pub mod gather;
pub mod heating;
pub mod ipc;
pub mod lifecycle;
pub mod registry;
pub mod validation;

pub use config::{Config, IpcConfig, RegistryConfig};
pub use gather::{Gather, GatherMetrics, GatherPolicy, GatherStats, ReplyTo};
pub use heating::{HeatingSetting, HeatingState, HeatingStatus};
pub use ipc::{DaemonClient, DaemonMessage, DaemonResponse, IpcServer};
pub use registry::{
    DeviceManager, DeviceReading, DevicesByHome, HomeCreation, ManagerHandle, Readings, RegistryError,
    RegistryResponse,
};
pub use validation::ValidationError;
