//! ManagerHandle - the registry's public request/reply surface

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use super::messages::{
    DevicesByHome, HomeCreation, ManagerCommand, Readings, RegistryError, RegistryResponse,
};
use crate::gather::{GatherMetrics, ReplyTo};
use crate::heating::HeatingStatus;
use crate::lifecycle::Addr;

/// Handle to send commands to the DeviceManager
///
/// Every request is bounded by the ask timeout; a registry that does not
/// answer in time yields [`RegistryError::AskTimeout`].
#[derive(Clone)]
pub struct ManagerHandle {
    addr: Addr<ManagerCommand>,
    ask_timeout: Duration,
}

impl ManagerHandle {
    pub(super) fn new(addr: Addr<ManagerCommand>, ask_timeout: Duration) -> Self {
        Self { addr, ask_timeout }
    }

    async fn ask<T: Send + 'static>(&self, make: impl FnOnce(ReplyTo<T>) -> ManagerCommand) -> RegistryResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.addr
            .tell(make(ReplyTo::oneshot(reply_tx)))
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;
        match tokio::time::timeout(self.ask_timeout, reply_rx).await {
            Ok(reply) => reply.map_err(|_| RegistryError::ChannelClosed),
            Err(_) => Err(RegistryError::AskTimeout(self.ask_timeout)),
        }
    }

    /// Whether the manager actor is still running
    pub fn is_running(&self) -> bool {
        !self.addr.is_closed()
    }

    // === Homes ===

    /// Register a device, creating its home and the device on first use
    pub async fn track_device(&self, home: &str, device: &str) -> RegistryResponse<String> {
        debug!(%home, %device, "track_device: called");
        self.ask(|reply_to| ManagerCommand::TrackDevice {
            home: home.to_string(),
            device: device.to_string(),
            reply_to,
        })
        .await
    }

    /// Create a home pre-populated with devices
    pub async fn create_home(&self, home: &str, devices: Vec<String>) -> RegistryResponse<HomeCreation> {
        debug!(%home, ?devices, "create_home: called");
        self.ask(|reply_to| ManagerCommand::CreateHome {
            home: home.to_string(),
            devices,
            reply_to,
        })
        .await
    }

    pub async fn home_count(&self) -> RegistryResponse<usize> {
        debug!("home_count: called");
        self.ask(|reply_to| ManagerCommand::HomeCount { reply_to }).await
    }

    pub async fn home_names(&self) -> RegistryResponse<Vec<String>> {
        debug!("home_names: called");
        self.ask(|reply_to| ManagerCommand::HomeNames { reply_to }).await
    }

    pub async fn home_exists(&self, home: &str) -> RegistryResponse<bool> {
        debug!(%home, "home_exists: called");
        self.ask(|reply_to| ManagerCommand::HomeExists {
            home: home.to_string(),
            reply_to,
        })
        .await
    }

    /// Stop a home and all of its devices
    pub async fn remove_home(&self, home: &str) -> RegistryResponse<()> {
        debug!(%home, "remove_home: called");
        let removed = self
            .ask(|reply_to| ManagerCommand::RemoveHome {
                home: home.to_string(),
                reply_to,
            })
            .await?;
        if removed {
            Ok(())
        } else {
            Err(RegistryError::NotFound(home.to_string()))
        }
    }

    // === Devices ===

    /// Read every device of a home; `None` for an unknown home
    pub async fn home_temperatures(&self, home: &str) -> RegistryResponse<Option<Readings>> {
        debug!(%home, "home_temperatures: called");
        self.ask(|reply_to| ManagerCommand::HomeTemperatures {
            home: home.to_string(),
            reply_to,
        })
        .await
    }

    /// Write a batch of temperatures; returns the devices that acknowledged
    pub async fn record_temperatures(
        &self,
        home: &str,
        temperatures: HashMap<String, f64>,
    ) -> RegistryResponse<Option<BTreeSet<String>>> {
        debug!(%home, count = temperatures.len(), "record_temperatures: called");
        self.ask(|reply_to| ManagerCommand::RecordTemperatures {
            home: home.to_string(),
            temperatures,
            reply_to,
        })
        .await
    }

    pub async fn device_ids(&self, home: &str) -> RegistryResponse<Option<Vec<String>>> {
        debug!(%home, "device_ids: called");
        self.ask(|reply_to| ManagerCommand::DeviceIds {
            home: home.to_string(),
            reply_to,
        })
        .await
    }

    pub async fn device_count(&self, home: &str) -> RegistryResponse<Option<usize>> {
        debug!(%home, "device_count: called");
        Ok(self.device_ids(home).await?.map(|ids| ids.len()))
    }

    /// Every home's devices with their last readings
    pub async fn list_devices(&self) -> RegistryResponse<DevicesByHome> {
        debug!("list_devices: called");
        self.ask(|reply_to| ManagerCommand::ListDevices { reply_to }).await
    }

    pub async fn remove_device(&self, home: &str, device: &str) -> RegistryResponse<()> {
        debug!(%home, %device, "remove_device: called");
        let removed = self
            .ask(|reply_to| ManagerCommand::RemoveDevice {
                home: home.to_string(),
                device: device.to_string(),
                reply_to,
            })
            .await?;
        if removed {
            Ok(())
        } else {
            Err(RegistryError::NotFound(format!("{}/{}", home, device)))
        }
    }

    // === Heating ===

    /// Heating status; an unknown home reports OFF and turned off
    pub async fn heating(&self, home: &str) -> RegistryResponse<HeatingStatus> {
        debug!(%home, "heating: called");
        self.ask(|reply_to| ManagerCommand::GetHeating {
            home: home.to_string(),
            reply_to,
        })
        .await
    }

    pub async fn set_heating_block(&self, home: &str, block: bool) -> RegistryResponse<HeatingStatus> {
        debug!(%home, block, "set_heating_block: called");
        self.ask(|reply_to| ManagerCommand::SetHeatingBlock {
            home: home.to_string(),
            block,
            reply_to,
        })
        .await?
        .ok_or_else(|| RegistryError::NotFound(home.to_string()))
    }

    /// Ask every home to re-read its devices and recompute heating
    ///
    /// Returns once the broadcast is queued, with the number of homes notified.
    pub async fn alter_heating(&self) -> RegistryResponse<usize> {
        debug!("alter_heating: called");
        self.ask(|reply_to| ManagerCommand::AlterHeating { reply_to }).await
    }

    /// Recompute one home's heating and return the resulting status
    pub async fn reevaluate_home_heating(&self, home: &str) -> RegistryResponse<Option<HeatingStatus>> {
        debug!(%home, "reevaluate_home_heating: called");
        self.ask(|reply_to| ManagerCommand::ReevaluateHome {
            home: home.to_string(),
            reply_to,
        })
        .await
    }

    // === Lifecycle ===

    pub async fn gather_stats(&self) -> RegistryResponse<GatherMetrics> {
        debug!("gather_stats: called");
        self.ask(|reply_to| ManagerCommand::GatherStats { reply_to }).await
    }

    /// Stop the manager and every home, waiting for the manager to exit
    pub async fn shutdown(&self) -> RegistryResponse<()> {
        debug!("shutdown: called");
        self.addr
            .tell(ManagerCommand::Shutdown)
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;
        tokio::time::timeout(self.ask_timeout, self.addr.closed())
            .await
            .map_err(|_| RegistryError::AskTimeout(self.ask_timeout))
    }
}
