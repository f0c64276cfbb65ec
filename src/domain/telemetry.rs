// Telemetry data domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type DeviceId = String;

/// An optional numeric measurement.
///
/// Absent readings read as `0.0` through [`Reading::value`] but stay
/// distinguishable from a real zero through [`Reading::get`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading(Option<f64>);

impl Reading {
    #[cfg(test)]
    pub const MISSING: Reading = Reading(None);

    pub fn new(value: Option<f64>) -> Self {
        Self(value.filter(|v| v.is_finite()))
    }

    pub fn value(self) -> f64 {
        self.0.unwrap_or(0.0)
    }

    pub fn get(self) -> Option<f64> {
        self.0
    }

    #[cfg(test)]
    pub fn is_missing(self) -> bool {
        self.0.is_none()
    }
}

impl From<f64> for Reading {
    fn from(value: f64) -> Self {
        Self::new(Some(value))
    }
}

/// Harsh-driving event reported by the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    #[default]
    None,
    Acceleration,
    Braking,
    Curve,
}

impl EventType {
    /// Translate the wire code (0 = none, 1 = acceleration, 2 = braking, 3 = curve)
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => EventType::Acceleration,
            2 => EventType::Braking,
            3 => EventType::Curve,
            _ => EventType::None,
        }
    }

    pub fn is_harsh(self) -> bool {
        self != EventType::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub device_id: DeviceId,
    pub timestamp: DateTime<Utc>,
    pub speed: Reading,
    pub rpm: Reading,
    pub engine_temp: Reading,
    pub fuel_level: Reading,
    pub fuel_used_total: Reading,
    pub instant_consumption: Reading,
    pub event_type: EventType,
    pub event_g_value: Reading,
    pub engine_load: Reading,
    pub oil_level: Reading,
    pub odometer_total: Reading,
    pub odometer_trip: Reading,
    #[serde(default)]
    pub obd_faults: Vec<String>,
    #[serde(default)]
    pub ignition_on: bool,
    #[serde(default)]
    pub moving: bool,
    pub signal_strength: Option<u8>,
}

#[cfg(test)]
impl TelemetrySnapshot {
    /// A snapshot with no readings
    pub fn new(device_id: impl Into<DeviceId>, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            speed: Reading::MISSING,
            rpm: Reading::MISSING,
            engine_temp: Reading::MISSING,
            fuel_level: Reading::MISSING,
            fuel_used_total: Reading::MISSING,
            instant_consumption: Reading::MISSING,
            event_type: EventType::None,
            event_g_value: Reading::MISSING,
            engine_load: Reading::MISSING,
            oil_level: Reading::MISSING,
            odometer_total: Reading::MISSING,
            odometer_trip: Reading::MISSING,
            obd_faults: Vec::new(),
            ignition_on: false,
            moving: false,
            signal_strength: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub speed_max: f64,
    pub rpm_max: f64,
    pub engine_temp_max: f64,
    pub fuel_level_min: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            speed_max: 180.0,
            rpm_max: 3000.0,
            engine_temp_max: 120.0,
            fuel_level_min: 20.0,
        }
    }
}

/// Partial thresholds carried by a snapshot or by device metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdOverrides {
    pub speed_max: Option<f64>,
    pub rpm_max: Option<f64>,
    pub engine_temp_max: Option<f64>,
    pub fuel_level_min: Option<f64>,
}

impl ThresholdOverrides {
    pub fn is_empty(&self) -> bool {
        self.speed_max.is_none()
            && self.rpm_max.is_none()
            && self.engine_temp_max.is_none()
            && self.fuel_level_min.is_none()
    }

    /// Fields present here win over `base`
    pub fn apply(&self, base: &Thresholds) -> Thresholds {
        Thresholds {
            speed_max: self.speed_max.unwrap_or(base.speed_max),
            rpm_max: self.rpm_max.unwrap_or(base.rpm_max),
            engine_temp_max: self.engine_temp_max.unwrap_or(base.engine_temp_max),
            fuel_level_min: self.fuel_level_min.unwrap_or(base.fuel_level_min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultRecord {
    pub device_id: DeviceId,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GEvent {
    pub device_id: DeviceId,
    pub event_type: EventType,
    pub g_value: f64,
    pub timestamp: DateTime<Utc>,
}

impl GEvent {
    /// Identity is (device, event type, timestamp); the g-value is not part of it
    pub fn same_occurrence(&self, other: &GEvent) -> bool {
        self.device_id == other.device_id
            && self.event_type == other.event_type
            && self.timestamp == other.timestamp
    }
}
