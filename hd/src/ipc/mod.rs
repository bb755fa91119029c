//! Local IPC for the registry daemon
//!
//! Unix Domain Socket, one JSON request per line and one JSON response per
//! line. The `serve` command runs an [`IpcServer`] in front of the registry;
//! every other CLI command is a [`DaemonClient`] call.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;
pub mod server;

pub use client::DaemonClient;
pub use listener::{cleanup_socket, create_listener_at, read_message, send_response};
pub use messages::{DaemonMessage, DaemonResponse};
pub use server::IpcServer;

/// Default socket path for daemon IPC
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("homedaemon")
        .join("daemon.sock")
}
