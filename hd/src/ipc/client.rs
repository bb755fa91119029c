//! IPC client for talking to a running daemon

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::get_socket_path;
use super::messages::{DaemonMessage, DaemonResponse};
use crate::config::IpcConfig;
use crate::gather::GatherMetrics;
use crate::heating::HeatingStatus;
use crate::registry::{DevicesByHome, HomeCreation, Readings};

/// Default timeout for IPC operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest response accepted from the daemon
const MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;

/// Client for communicating with the daemon via IPC
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
    max_message_size: usize,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new()
    }
}

fn unexpected(response: DaemonResponse) -> eyre::Report {
    match response {
        DaemonResponse::Error { message } => eyre::eyre!("Daemon error: {}", message),
        other => eyre::eyre!("Unexpected response: {:?}", other),
    }
}

impl DaemonClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(get_socket_path())
    }

    /// Create a client with a custom socket path
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
            max_message_size: IpcConfig::default().max_message_size,
        }
    }

    /// Create a client from the `ipc` config section
    pub fn from_config(config: &IpcConfig) -> Self {
        Self {
            socket_path: config.socket_path(),
            timeout: config.timeout(),
            max_message_size: config.max_message_size,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Check if daemon is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("DaemonClient: pinging daemon");
        match self.send_message(DaemonMessage::Ping).await? {
            DaemonResponse::Pong { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon to shutdown gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("DaemonClient: requesting daemon shutdown");
        match self.send_message(DaemonMessage::Shutdown).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn home_count(&self) -> Result<usize> {
        debug!("DaemonClient: home_count");
        match self.send_message(DaemonMessage::HomeCount).await? {
            DaemonResponse::HomeCount { count } => Ok(count),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_homes(&self) -> Result<Vec<String>> {
        debug!("DaemonClient: list_homes");
        match self.send_message(DaemonMessage::ListHomes).await? {
            DaemonResponse::Homes { homes } => Ok(homes),
            other => Err(unexpected(other)),
        }
    }

    pub async fn create_home(&self, home: &str, devices: Vec<String>) -> Result<HomeCreation> {
        debug!(%home, ?devices, "DaemonClient: create_home");
        let msg = DaemonMessage::CreateHome {
            home: home.to_string(),
            devices,
        };
        match self.send_message(msg).await? {
            DaemonResponse::HomeCreated { home, devices } => Ok(HomeCreation::Created {
                home,
                devices: devices.into_iter().collect(),
            }),
            DaemonResponse::HomeAlreadyExists { .. } => Ok(HomeCreation::AlreadyExists),
            other => Err(unexpected(other)),
        }
    }

    pub async fn home_exists(&self, home: &str) -> Result<bool> {
        debug!(%home, "DaemonClient: home_exists");
        let msg = DaemonMessage::HomeExists { home: home.to_string() };
        match self.send_message(msg).await? {
            DaemonResponse::Exists { exists } => Ok(exists),
            other => Err(unexpected(other)),
        }
    }

    pub async fn home_temperatures(&self, home: &str) -> Result<Option<Readings>> {
        debug!(%home, "DaemonClient: home_temperatures");
        let msg = DaemonMessage::HomeTemperatures { home: home.to_string() };
        match self.send_message(msg).await? {
            DaemonResponse::Temperatures { temperatures, .. } => Ok(temperatures),
            other => Err(unexpected(other)),
        }
    }

    pub async fn record_temperatures(
        &self,
        home: &str,
        temperatures: HashMap<String, f64>,
    ) -> Result<Option<Vec<String>>> {
        debug!(%home, count = temperatures.len(), "DaemonClient: record_temperatures");
        let msg = DaemonMessage::RecordTemperatures {
            home: home.to_string(),
            temperatures,
        };
        match self.send_message(msg).await? {
            DaemonResponse::Recorded { devices } => Ok(devices),
            other => Err(unexpected(other)),
        }
    }

    pub async fn track_device(&self, home: &str, device: &str) -> Result<String> {
        debug!(%home, %device, "DaemonClient: track_device");
        let msg = DaemonMessage::TrackDevice {
            home: home.to_string(),
            device: device.to_string(),
        };
        match self.send_message(msg).await? {
            DaemonResponse::DeviceRegistered { device } => Ok(device),
            other => Err(unexpected(other)),
        }
    }

    pub async fn heating(&self, home: &str) -> Result<HeatingStatus> {
        debug!(%home, "DaemonClient: heating");
        let msg = DaemonMessage::GetHeating { home: home.to_string() };
        match self.send_message(msg).await? {
            DaemonResponse::Heating(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn set_heating(&self, home: &str, block: bool) -> Result<HeatingStatus> {
        debug!(%home, block, "DaemonClient: set_heating");
        let msg = DaemonMessage::SetHeating {
            home: home.to_string(),
            block,
        };
        match self.send_message(msg).await? {
            DaemonResponse::Heating(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn alter_heating(&self) -> Result<()> {
        debug!("DaemonClient: alter_heating");
        match self.send_message(DaemonMessage::AlterHeating).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn reevaluate_home(&self, home: &str) -> Result<HeatingStatus> {
        debug!(%home, "DaemonClient: reevaluate_home");
        let msg = DaemonMessage::ReevaluateHome { home: home.to_string() };
        match self.send_message(msg).await? {
            DaemonResponse::Heating(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_devices(&self) -> Result<DevicesByHome> {
        debug!("DaemonClient: list_devices");
        match self.send_message(DaemonMessage::ListDevices).await? {
            DaemonResponse::Devices { homes } => Ok(homes),
            other => Err(unexpected(other)),
        }
    }

    pub async fn remove_device(&self, home: &str, device: &str) -> Result<()> {
        debug!(%home, %device, "DaemonClient: remove_device");
        let msg = DaemonMessage::RemoveDevice {
            home: home.to_string(),
            device: device.to_string(),
        };
        match self.send_message(msg).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn remove_home(&self, home: &str) -> Result<()> {
        debug!(%home, "DaemonClient: remove_home");
        let msg = DaemonMessage::RemoveHome { home: home.to_string() };
        match self.send_message(msg).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn gather_stats(&self) -> Result<GatherMetrics> {
        debug!("DaemonClient: gather_stats");
        match self.send_message(DaemonMessage::GatherStats).await? {
            DaemonResponse::Stats(metrics) => Ok(metrics),
            other => Err(unexpected(other)),
        }
    }

    /// Send a message to the daemon and wait for response
    pub async fn send_message(&self, msg: DaemonMessage) -> Result<DaemonResponse> {
        debug!(?self.socket_path, ?msg, "DaemonClient: sending message");

        let msg_json = serde_json::to_string(&msg).context("Failed to serialize message")?;
        if msg_json.len() > self.max_message_size {
            return Err(eyre::eyre!("Message too large: {} bytes", msg_json.len()));
        }

        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to daemon socket")?;

        self.send_on_stream(stream, &msg_json).await
    }

    async fn send_on_stream(&self, mut stream: UnixStream, msg_json: &str) -> Result<DaemonResponse> {
        tokio::time::timeout(self.timeout, async {
            stream
                .write_all(msg_json.as_bytes())
                .await
                .context("Failed to write message")?;
            stream.write_all(b"\n").await.context("Failed to write newline")?;
            stream.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")??;

        let mut reader = BufReader::new(&mut stream).take(MAX_RESPONSE_SIZE as u64 + 1);
        let mut response_line = String::new();

        tokio::time::timeout(self.timeout, async {
            let bytes_read = reader
                .read_line(&mut response_line)
                .await
                .context("Failed to read response")?;

            if bytes_read > MAX_RESPONSE_SIZE {
                return Err(eyre::eyre!("Response too large: {} bytes", bytes_read));
            }

            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Read timeout")??;

        let response: DaemonResponse =
            serde_json::from_str(response_line.trim()).context("Failed to parse daemon response")?;

        debug!(?response, "DaemonClient: received response");
        Ok(response)
    }
}
