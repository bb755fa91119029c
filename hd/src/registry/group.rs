//! DeviceGroup actor - one per home

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::device::TemperatureDevice;
use super::messages::{DeviceCommand, GroupCommand, Readings};
use crate::config::RegistryConfig;
use crate::gather::policies::{ReadTemperatures, RecordTemperatures};
use crate::gather::{Gather, GatherStats, ReplyTo};
use crate::heating::{HeatingState, HeatingStatus, average_temperature};
use crate::lifecycle::{ActorId, Addr, ChildIndex, WeakAddr, mailbox};

/// Owns the devices of one home and its heating state
pub struct DeviceGroup {
    home: String,
    config: RegistryConfig,
    devices: ChildIndex<DeviceCommand>,
    heating: HeatingState,
    stats: Arc<GatherStats>,
    this: WeakAddr<GroupCommand>,
    terminated_tx: mpsc::UnboundedSender<ActorId>,
}

impl DeviceGroup {
    pub fn spawn(home: &str, config: RegistryConfig, stats: Arc<GatherStats>) -> Addr<GroupCommand> {
        debug!(%home, "DeviceGroup::spawn: called");
        let (addr, rx) = mailbox(config.channel_buffer);
        let (terminated_tx, terminated_rx) = mpsc::unbounded_channel();
        let group = Self {
            home: home.to_string(),
            config,
            devices: ChildIndex::new(),
            heating: HeatingState::default(),
            stats,
            this: addr.downgrade(),
            terminated_tx,
        };
        tokio::spawn(group.run(rx, terminated_rx));
        addr
    }

    async fn run(mut self, mut rx: mpsc::Receiver<GroupCommand>, mut terminated_rx: mpsc::UnboundedReceiver<ActorId>) {
        info!("DeviceGroup {} started", self.home);

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(GroupCommand::Stop) | None => {
                        debug!(home = %self.home, "DeviceGroup: Stop command");
                        break;
                    }
                    Some(cmd) => self.handle(cmd).await,
                },
                Some(actor) = terminated_rx.recv() => self.on_device_terminated(actor),
            }
        }

        for (device, addr) in self.devices.drain() {
            debug!(home = %self.home, %device, "DeviceGroup: stopping device");
            let _ = addr.tell(DeviceCommand::Stop).await;
        }
        info!("DeviceGroup {} stopped", self.home);
    }

    async fn handle(&mut self, cmd: GroupCommand) {
        match cmd {
            GroupCommand::TrackDevice { home, device, reply_to } => {
                debug!(%home, %device, "DeviceGroup: TrackDevice command");
                self.track_device(home, device, reply_to).await;
            }

            GroupCommand::ReadTemperatures { reply_to } => {
                debug!(home = %self.home, "DeviceGroup: ReadTemperatures command");
                self.read_all(reply_to);
            }

            GroupCommand::RecordTemperatures { temperatures, reply_to } => {
                debug!(home = %self.home, count = temperatures.len(), "DeviceGroup: RecordTemperatures command");
                self.record_all(temperatures, reply_to);
            }

            GroupCommand::DeviceIds { reply_to } => {
                debug!(home = %self.home, "DeviceGroup: DeviceIds command");
                reply_to.send(self.devices.ids());
            }

            GroupCommand::GetHeating { reply_to } => {
                debug!(home = %self.home, "DeviceGroup: GetHeating command");
                reply_to.send(self.heating.status());
            }

            GroupCommand::SetHeatingBlock { block, reply_to } => {
                debug!(home = %self.home, block, "DeviceGroup: SetHeatingBlock command");
                self.heating.set_blocked(block);
                info!("Heating for house {} blocked: {}", self.home, block);
                reply_to.send(self.heating.status());
            }

            GroupCommand::AlterHeating { reply_to } => {
                debug!(home = %self.home, "DeviceGroup: AlterHeating command");
                self.alter_heating(reply_to);
            }

            GroupCommand::ApplyHeating { readings, reply_to } => {
                debug!(home = %self.home, "DeviceGroup: ApplyHeating command");
                self.apply_heating(&readings);
                if let Some(reply_to) = reply_to {
                    reply_to.send(self.heating.status());
                }
            }

            GroupCommand::StopDevice { device, reply_to } => {
                debug!(home = %self.home, %device, "DeviceGroup: StopDevice command");
                match self.devices.remove(&device) {
                    Some(addr) => {
                        info!("Stopping device actor for {}", device);
                        let _ = addr.tell(DeviceCommand::Stop).await;
                        reply_to.send(true);
                    }
                    None => reply_to.send(false),
                }
            }

            GroupCommand::Stop => {}
        }
    }

    async fn track_device(&mut self, home: String, device: String, reply_to: ReplyTo<String>) {
        if home != self.home {
            warn!(
                "Ignoring TrackDevice request for {}. This actor is responsible for {}.",
                home, self.home
            );
            return;
        }

        let addr = match self.devices.get_live(&device) {
            Some(addr) => addr.clone(),
            None => {
                info!("Creating device actor for {}", device);
                let addr =
                    TemperatureDevice::spawn(&self.home, &device, self.config.initial_reading, self.config.channel_buffer);
                self.devices.insert(device.clone(), addr.clone(), &self.terminated_tx);
                addr
            }
        };

        if let Err(e) = addr.tell(DeviceCommand::TrackDevice { home, device, reply_to }).await {
            warn!(home = %self.home, "Failed to forward TrackDevice: {}", e);
        }
    }

    fn read_all(&self, reply_to: ReplyTo<Readings>) {
        Gather::new(ReadTemperatures, reply_to, self.config.gather_timeout(), self.stats.clone())
            .targets(self.devices.snapshot())
            .spawn();
    }

    fn record_all(&self, temperatures: HashMap<String, f64>, reply_to: ReplyTo<BTreeSet<String>>) {
        let adjusted = self.heating.adjust(temperatures);
        let mut targets = Vec::with_capacity(adjusted.len());
        for device in adjusted.keys() {
            match self.devices.get_live(device) {
                Some(addr) => targets.push((device.clone(), addr.clone())),
                None => warn!(home = %self.home, %device, "Ignoring temperature for unknown device"),
            }
        }

        Gather::new(
            RecordTemperatures::new(adjusted),
            reply_to,
            self.config.gather_timeout(),
            self.stats.clone(),
        )
        .targets(targets)
        .spawn();
    }

    fn alter_heating(&self, reply_to: Option<ReplyTo<HeatingStatus>>) {
        if self.heating.is_blocked() {
            debug!(home = %self.home, "alter_heating: heating blocked, skipping");
            if let Some(reply_to) = reply_to {
                reply_to.send(self.heating.status());
            }
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let requester = ReplyTo::from_fn(move |readings| {
            tokio::spawn(async move {
                let _ = this.tell(GroupCommand::ApplyHeating { readings, reply_to }).await;
            });
        });
        self.read_all(requester);
    }

    fn apply_heating(&mut self, readings: &Readings) {
        if let Some(setting) = self.heating.reevaluate(readings) {
            info!(
                "New heating setting is: {} for house {}. Avg. temp: {}",
                setting,
                self.home,
                average_temperature(readings)
            );
        }
    }

    fn on_device_terminated(&mut self, actor: ActorId) {
        if let Some(device) = self.devices.remove_terminated(actor) {
            info!("Device actor for {} has been terminated", device);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::heating::HeatingSetting;

    fn config() -> RegistryConfig {
        RegistryConfig {
            gather_timeout_ms: 200,
            ..RegistryConfig::default()
        }
    }

    async fn ask<T: Send + 'static>(addr: &Addr<GroupCommand>, make: impl FnOnce(ReplyTo<T>) -> GroupCommand) -> T {
        let (tx, rx) = oneshot::channel();
        addr.tell(make(ReplyTo::oneshot(tx))).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap()
    }

    async fn track(addr: &Addr<GroupCommand>, home: &str, device: &str) -> String {
        ask(addr, |reply_to| GroupCommand::TrackDevice {
            home: home.to_string(),
            device: device.to_string(),
            reply_to,
        })
        .await
    }

    #[tokio::test]
    async fn test_track_creates_device_once() {
        let group = DeviceGroup::spawn("kitchen", config(), Arc::new(GatherStats::new()));

        assert_eq!(track(&group, "kitchen", "d1").await, "d1");
        assert_eq!(track(&group, "kitchen", "d1").await, "d1");
        assert_eq!(track(&group, "kitchen", "d2").await, "d2");

        let ids = ask(&group, |reply_to| GroupCommand::DeviceIds { reply_to }).await;
        assert_eq!(ids, vec!["d1".to_string(), "d2".to_string()]);
    }

    #[tokio::test]
    async fn test_track_for_other_home_is_ignored() {
        let group = DeviceGroup::spawn("kitchen", config(), Arc::new(GatherStats::new()));

        let (tx, rx) = oneshot::channel();
        group
            .tell(GroupCommand::TrackDevice {
                home: "garage".to_string(),
                device: "d1".to_string(),
                reply_to: ReplyTo::oneshot(tx),
            })
            .await
            .unwrap();
        assert!(rx.await.is_err());

        let ids = ask(&group, |reply_to| GroupCommand::DeviceIds { reply_to }).await;
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_record_skips_unknown_devices() {
        let group = DeviceGroup::spawn("kitchen", config(), Arc::new(GatherStats::new()));
        track(&group, "kitchen", "d1").await;

        let acked = ask(&group, |reply_to| GroupCommand::RecordTemperatures {
            temperatures: HashMap::from([("d1".to_string(), 19.0), ("ghost".to_string(), 30.0)]),
            reply_to,
        })
        .await;
        assert_eq!(acked.into_iter().collect::<Vec<_>>(), vec!["d1".to_string()]);

        let ids = ask(&group, |reply_to| GroupCommand::DeviceIds { reply_to }).await;
        assert_eq!(ids, vec!["d1".to_string()]);
    }

    #[tokio::test]
    async fn test_alter_heating_reports_new_setting() {
        let group = DeviceGroup::spawn("kitchen", config(), Arc::new(GatherStats::new()));
        track(&group, "kitchen", "d1").await;
        ask(&group, |reply_to| GroupCommand::RecordTemperatures {
            temperatures: HashMap::from([("d1".to_string(), 17.0)]),
            reply_to,
        })
        .await;

        let status = ask(&group, |reply_to| GroupCommand::AlterHeating {
            reply_to: Some(reply_to),
        })
        .await;
        assert_eq!(status.setting, HeatingSetting::High);
        assert_eq!(status.value, 1.5);
    }

    #[tokio::test]
    async fn test_blocked_group_keeps_heating_off() {
        let group = DeviceGroup::spawn("kitchen", config(), Arc::new(GatherStats::new()));
        track(&group, "kitchen", "d1").await;

        let status = ask(&group, |reply_to| GroupCommand::SetHeatingBlock { block: true, reply_to }).await;
        assert!(status.user_turned_off);
        assert_eq!(status.setting, HeatingSetting::Off);

        let status = ask(&group, |reply_to| GroupCommand::AlterHeating {
            reply_to: Some(reply_to),
        })
        .await;
        assert_eq!(status.setting, HeatingSetting::Off);
    }

    #[tokio::test]
    async fn test_stop_device_removes_it_from_index() {
        let group = DeviceGroup::spawn("kitchen", config(), Arc::new(GatherStats::new()));
        track(&group, "kitchen", "d1").await;
        track(&group, "kitchen", "d2").await;

        let stopped = ask(&group, |reply_to| GroupCommand::StopDevice {
            device: "d1".to_string(),
            reply_to,
        })
        .await;
        assert!(stopped);

        let mut ids = Vec::new();
        for _ in 0..50 {
            ids = ask(&group, |reply_to| GroupCommand::DeviceIds { reply_to }).await;
            if ids.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(ids, vec!["d2".to_string()]);

        let unknown = ask(&group, |reply_to| GroupCommand::StopDevice {
            device: "nope".to_string(),
            reply_to,
        })
        .await;
        assert!(!unknown);
    }
}
