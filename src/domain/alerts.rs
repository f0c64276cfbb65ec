// Threshold alerts derived from a snapshot
use super::telemetry::{Reading, TelemetrySnapshot, Thresholds};
use serde::{Deserialize, Serialize};

/// rpm gauge turns red at 93% of the configured maximum, read off the next gauge tick
const RPM_ALERT_PERCENT: f64 = 93.0;
const RPM_GAUGE_STEP: f64 = 100.0;
/// Start of the speed gauge's danger band, not a hard cap
const SPEED_DANGER_RATIO: f64 = 0.25;
const ENGINE_TEMP_ALERT_RATIO: f64 = 0.92;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSet {
    pub rpm_alert: bool,
    pub speed_alert: bool,
    pub engine_temp_alert: bool,
    pub fuel_level_alert: bool,
}

impl AlertSet {
    pub fn any(&self) -> bool {
        self.rpm_alert || self.speed_alert || self.engine_temp_alert || self.fuel_level_alert
    }
}

pub fn evaluate(snapshot: &TelemetrySnapshot, thresholds: &Thresholds) -> AlertSet {
    AlertSet {
        rpm_alert: above(snapshot.rpm, rpm_alert_limit(thresholds.rpm_max)),
        speed_alert: above(snapshot.speed, thresholds.speed_max * SPEED_DANGER_RATIO),
        engine_temp_alert: above(
            snapshot.engine_temp,
            thresholds.engine_temp_max * ENGINE_TEMP_ALERT_RATIO,
        ),
        fuel_level_alert: snapshot
            .fuel_level
            .get()
            .is_some_and(|level| level < thresholds.fuel_level_min),
    }
}

/// 93% of `rpm_max` rounded up to a whole gauge tick: 3000 -> 2800
pub fn rpm_alert_limit(rpm_max: f64) -> f64 {
    let limit = rpm_max * RPM_ALERT_PERCENT / 100.0;
    (limit / RPM_GAUGE_STEP).ceil() * RPM_GAUGE_STEP
}

// Missing data never raises an alert
fn above(reading: Reading, limit: f64) -> bool {
    reading.get().is_some_and(|value| value > limit)
}
