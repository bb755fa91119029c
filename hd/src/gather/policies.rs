//! The registry's four aggregations

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use super::core::GatherPolicy;
use super::reply::ReplyTo;
use crate::registry::{DeviceCommand, DeviceReading, DevicesByHome, GroupCommand, Readings};

/// Read every device of a home
///
/// Devices that exit or stay silent are reported with an absent reading
/// rather than dropped from the result.
#[derive(Debug, Default)]
pub struct ReadTemperatures;

impl GatherPolicy for ReadTemperatures {
    type Command = DeviceCommand;
    type Reply = f64;
    type Output = Readings;

    fn kind(&self) -> &'static str {
        "read-temperatures"
    }

    fn initial(&self) -> Readings {
        Readings::new()
    }

    fn request(&self, _key: &str, reply_to: ReplyTo<f64>) -> Option<DeviceCommand> {
        Some(DeviceCommand::ReadTemperature { reply_to })
    }

    fn merge(&self, mut acc: Readings, key: String, reply: f64) -> Readings {
        acc.insert(key, Some(reply));
        acc
    }

    fn on_terminated(&self, mut acc: Readings, key: String) -> Readings {
        acc.insert(key, None);
        acc
    }

    fn on_timeout(&self, mut acc: Readings, outstanding: Vec<String>) -> Readings {
        for key in outstanding {
            acc.insert(key, None);
        }
        acc
    }

    fn watches_targets(&self) -> bool {
        true
    }
}

/// Write a batch of (already adjusted) values to devices
#[derive(Debug)]
pub struct RecordTemperatures {
    values: HashMap<String, f64>,
}

impl RecordTemperatures {
    pub fn new(values: HashMap<String, f64>) -> Self {
        Self { values }
    }
}

impl GatherPolicy for RecordTemperatures {
    type Command = DeviceCommand;
    type Reply = ();
    type Output = BTreeSet<String>;

    fn kind(&self) -> &'static str {
        "record-temperatures"
    }

    fn initial(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn request(&self, key: &str, reply_to: ReplyTo<()>) -> Option<DeviceCommand> {
        self.values
            .get(key)
            .map(|&value| DeviceCommand::RecordTemperature { value, reply_to })
    }

    fn merge(&self, mut acc: BTreeSet<String>, key: String, _reply: ()) -> BTreeSet<String> {
        acc.insert(key);
        acc
    }
}

/// Register a list of devices with a freshly created home
///
/// Every target is the home's group; the key is the device id to track.
#[derive(Debug)]
pub struct RegisterDevices {
    home: String,
}

impl RegisterDevices {
    pub fn new(home: impl Into<String>) -> Self {
        Self { home: home.into() }
    }
}

impl GatherPolicy for RegisterDevices {
    type Command = GroupCommand;
    type Reply = String;
    type Output = BTreeSet<String>;

    fn kind(&self) -> &'static str {
        "register-devices"
    }

    fn initial(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn request(&self, key: &str, reply_to: ReplyTo<String>) -> Option<GroupCommand> {
        Some(GroupCommand::TrackDevice {
            home: self.home.clone(),
            device: key.to_string(),
            reply_to,
        })
    }

    fn merge(&self, mut acc: BTreeSet<String>, key: String, reply: String) -> BTreeSet<String> {
        if reply != key {
            debug!(%key, %reply, "RegisterDevices: acknowledgement for a different device");
        }
        acc.insert(key);
        acc
    }
}

/// Collect the device readings of every home
#[derive(Debug, Default)]
pub struct ListDevices;

impl GatherPolicy for ListDevices {
    type Command = GroupCommand;
    type Reply = Readings;
    type Output = DevicesByHome;

    fn kind(&self) -> &'static str {
        "list-devices"
    }

    fn initial(&self) -> DevicesByHome {
        DevicesByHome::new()
    }

    fn request(&self, _key: &str, reply_to: ReplyTo<Readings>) -> Option<GroupCommand> {
        Some(GroupCommand::ReadTemperatures { reply_to })
    }

    fn merge(&self, mut acc: DevicesByHome, key: String, reply: Readings) -> DevicesByHome {
        let devices = reply
            .into_iter()
            .map(|(device, value)| DeviceReading { device, value })
            .collect();
        acc.insert(key, devices);
        acc
    }
}
