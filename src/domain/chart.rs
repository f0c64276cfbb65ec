// Chart projection of a device window
use super::classification::{DisplayEvent, classify};
use super::telemetry::TelemetrySnapshot;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformancePoint {
    pub time: String,
    pub timestamp: DateTime<Utc>,
    pub speed: f64,
    pub rpm: f64,
    pub classification: DisplayEvent,
    pub g_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelPoint {
    pub time: String,
    pub timestamp: DateTime<Utc>,
    pub fuel_level: f64,
    pub instant_consumption: f64,
    pub cumulative_fuel_used: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub performance: Vec<PerformancePoint>,
    pub fuel: Vec<FuelPoint>,
}

#[cfg(test)]
impl ChartSeries {
    pub fn len(&self) -> usize {
        self.performance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.performance.is_empty()
    }
}

/// Render a timestamp for chart axes in the host's local time
pub fn display_time(timestamp: &DateTime<Utc>, time_format: &str) -> String {
    timestamp.with_timezone(&Local).format(time_format).to_string()
}

/// Map every window entry to a performance and a fuel point, keeping window order
pub fn project<'a, I>(window: I, time_format: &str) -> ChartSeries
where
    I: IntoIterator<Item = &'a TelemetrySnapshot>,
{
    let mut series = ChartSeries::default();

    for entry in window {
        let time = display_time(&entry.timestamp, time_format);

        series.performance.push(PerformancePoint {
            time: time.clone(),
            timestamp: entry.timestamp,
            speed: entry.speed.value(),
            rpm: entry.rpm.value(),
            classification: classify(entry),
            g_value: entry.event_g_value.value(),
        });

        series.fuel.push(FuelPoint {
            time,
            timestamp: entry.timestamp,
            fuel_level: entry.fuel_level.value(),
            instant_consumption: entry.instant_consumption.value(),
            cumulative_fuel_used: entry.fuel_used_total.value(),
        });
    }

    series
}
