//! Heating policy
//!
//! A home's heating setting is derived from the average of its device
//! readings. The active setting's offset is then added to every value of a
//! batch write before it reaches the devices.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete heating directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeatingSetting {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
    #[default]
    Off,
}

impl HeatingSetting {
    /// Offset added to each written temperature while this setting is active
    pub fn offset(&self) -> f64 {
        match self {
            Self::VeryHigh => 2.0,
            Self::High => 1.5,
            Self::Medium => 0.5,
            Self::Low => -0.5,
            Self::VeryLow => -1.0,
            Self::Off => 0.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryHigh | Self::High | Self::Medium => "Increasing temperature",
            Self::Low | Self::VeryLow => "Decreasing temperature",
            Self::Off => "OFF",
        }
    }

    /// Map an average temperature to a setting
    ///
    /// Thresholds are checked in a fixed order: `<= 15`, `<= 18`, `<= 23`,
    /// `>= 28`, `>= 32`, otherwise `Off`. Because `>= 28` is checked first,
    /// `VeryLow` is never produced; anything at or above 28 (including the
    /// empty-home sentinel) maps to `Low`.
    pub fn from_average(average: f64) -> Self {
        if average <= 15.0 {
            Self::VeryHigh
        } else if average <= 18.0 {
            Self::High
        } else if average <= 23.0 {
            Self::Medium
        } else if average >= 28.0 {
            Self::Low
        } else if average >= 32.0 {
            Self::VeryLow
        } else {
            Self::Off
        }
    }
}

impl fmt::Display for HeatingSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VeryHigh => "VERY_HIGH",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::VeryLow => "VERY_LOW",
            Self::Off => "OFF",
        };
        write!(f, "{}", name)
    }
}

/// Mean of the present readings, `f64::MAX` when none are present
pub fn average_temperature(readings: &BTreeMap<String, Option<f64>>) -> f64 {
    let present: Vec<f64> = readings.values().filter_map(|v| *v).collect();
    if present.is_empty() {
        return f64::MAX;
    }
    present.iter().sum::<f64>() / present.len() as f64
}

/// Heating settings reported for a home
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingStatus {
    pub setting: HeatingSetting,
    pub label: String,
    pub value: f64,
    pub user_turned_off: bool,
}

impl HeatingStatus {
    pub fn new(setting: HeatingSetting, user_turned_off: bool) -> Self {
        Self {
            setting,
            label: setting.label().to_string(),
            value: setting.offset(),
            user_turned_off,
        }
    }
}

/// Per-home heating state
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatingState {
    setting: HeatingSetting,
    blocked: bool,
}

impl HeatingState {
    pub fn setting(&self) -> HeatingSetting {
        self.setting
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Blocking forces `Off` and stops recomputation until unblocked
    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
        if blocked {
            self.setting = HeatingSetting::Off;
        }
    }

    /// Recompute the setting from fresh readings; `None` while blocked
    pub fn reevaluate(&mut self, readings: &BTreeMap<String, Option<f64>>) -> Option<HeatingSetting> {
        if self.blocked {
            return None;
        }
        self.setting = HeatingSetting::from_average(average_temperature(readings));
        Some(self.setting)
    }

    /// Add the active offset to every value of a batch write
    pub fn adjust(&self, batch: HashMap<String, f64>) -> HashMap<String, f64> {
        let offset = self.setting.offset();
        batch.into_iter().map(|(device, value)| (device, value + offset)).collect()
    }

    pub fn status(&self) -> HeatingStatus {
        HeatingStatus::new(self.setting, self.blocked)
    }
}
