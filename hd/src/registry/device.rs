//! TemperatureDevice actor

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::messages::DeviceCommand;
use crate::lifecycle::{Addr, mailbox};

/// A single simulated temperature sensor owned by one home
pub struct TemperatureDevice {
    home: String,
    device: String,
    reading: f64,
}

impl TemperatureDevice {
    /// Spawn a device seeded with `initial` and return its address
    pub fn spawn(home: &str, device: &str, initial: f64, buffer: usize) -> Addr<DeviceCommand> {
        debug!(%home, %device, initial, "TemperatureDevice::spawn: called");
        let (addr, rx) = mailbox(buffer);
        let actor = Self {
            home: home.to_string(),
            device: device.to_string(),
            reading: initial,
        };
        tokio::spawn(actor.run(rx));
        addr
    }

    async fn run(mut self, mut rx: mpsc::Receiver<DeviceCommand>) {
        info!("Device actor {}-{} started", self.home, self.device);

        while let Some(cmd) = rx.recv().await {
            match cmd {
                DeviceCommand::TrackDevice { home, device, reply_to } => {
                    debug!(%home, %device, "TemperatureDevice: TrackDevice command");
                    if home == self.home && device == self.device {
                        reply_to.send(self.device.clone());
                    } else {
                        warn!(
                            "Ignoring TrackDevice request for {}-{}. This actor is responsible for {}-{}.",
                            home, device, self.home, self.device
                        );
                    }
                }

                DeviceCommand::ReadTemperature { reply_to } => {
                    debug!(device = %self.device, reading = self.reading, "TemperatureDevice: ReadTemperature command");
                    reply_to.send(self.reading);
                }

                DeviceCommand::RecordTemperature { value, reply_to } => {
                    info!("Recorded temperature reading {} for {}-{}", value, self.home, self.device);
                    self.reading = value;
                    reply_to.send(());
                }

                DeviceCommand::Stop => {
                    debug!(device = %self.device, "TemperatureDevice: Stop command");
                    break;
                }
            }
        }

        info!("Device actor {}-{} stopped", self.home, self.device);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::gather::ReplyTo;

    async fn read(addr: &Addr<DeviceCommand>) -> f64 {
        let (tx, rx) = oneshot::channel();
        addr.tell(DeviceCommand::ReadTemperature {
            reply_to: ReplyTo::oneshot(tx),
        })
        .await
        .unwrap();
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_device_starts_with_seed_value() {
        let addr = TemperatureDevice::spawn("kitchen", "d1", 25.0, 8);
        assert_eq!(read(&addr).await, 25.0);
    }

    #[tokio::test]
    async fn test_record_then_read_returns_value() {
        let addr = TemperatureDevice::spawn("kitchen", "d1", 25.0, 8);

        let (tx, rx) = oneshot::channel();
        addr.tell(DeviceCommand::RecordTemperature {
            value: 18.5,
            reply_to: ReplyTo::oneshot(tx),
        })
        .await
        .unwrap();
        rx.await.unwrap();

        assert_eq!(read(&addr).await, 18.5);
    }

    #[tokio::test]
    async fn test_track_acknowledges_own_identity() {
        let addr = TemperatureDevice::spawn("kitchen", "d1", 25.0, 8);
        let (tx, rx) = oneshot::channel();
        addr.tell(DeviceCommand::TrackDevice {
            home: "kitchen".to_string(),
            device: "d1".to_string(),
            reply_to: ReplyTo::oneshot(tx),
        })
        .await
        .unwrap();
        assert_eq!(rx.await.unwrap(), "d1");
    }

    #[tokio::test]
    async fn test_track_for_other_device_is_dropped() {
        let addr = TemperatureDevice::spawn("kitchen", "d1", 25.0, 8);
        let (tx, rx) = oneshot::channel();
        addr.tell(DeviceCommand::TrackDevice {
            home: "kitchen".to_string(),
            device: "d2".to_string(),
            reply_to: ReplyTo::oneshot(tx),
        })
        .await
        .unwrap();

        // The reply capability is dropped, never answered
        assert!(rx.await.is_err());
        assert_eq!(read(&addr).await, 25.0);
    }

    #[tokio::test]
    async fn test_stop_closes_mailbox() {
        let addr = TemperatureDevice::spawn("kitchen", "d1", 25.0, 8);
        addr.tell(DeviceCommand::Stop).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), addr.closed()).await.unwrap();
        assert!(addr.is_closed());
    }
}
