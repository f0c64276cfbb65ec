// Device dashboard domain model
use super::alerts::AlertSet;
use super::chart::ChartSeries;
use super::classification::DisplayEvent;
use super::device::DeviceIdentity;
use super::telemetry::{DeviceId, FaultRecord, GEvent, TelemetrySnapshot, Thresholds};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything the rendering layer needs for one selected device
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDashboard {
    pub identity: DeviceIdentity,
    pub latest: Option<TelemetrySnapshot>,
    pub classification: Option<DisplayEvent>,
    pub alerts: AlertSet,
    pub thresholds: Thresholds,
    pub chart: ChartSeries,
    pub faults: Vec<FaultRecord>,
    pub events: Vec<GEvent>,
}

/// One row of the device list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub device_id: DeviceId,
    pub display_name: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub classification: Option<DisplayEvent>,
    pub alerting: bool,
    pub window_len: usize,
    pub fault_count: usize,
    pub event_count: usize,
}
