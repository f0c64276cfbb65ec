// Monitor session - Synchronous core state for the monitored context
use crate::application::error::MonitorError;
use crate::application::telemetry_stores::{IngestReport, StoreCapacities, TelemetryStores};
use crate::domain::alerts::{AlertSet, evaluate};
use crate::domain::chart::{ChartSeries, DEFAULT_TIME_FORMAT, project};
use crate::domain::classification::{DisplayEvent, classify};
use crate::domain::dashboard::{DeviceDashboard, DeviceSummary};
use crate::domain::device::{DeviceIdentity, DeviceMetadata};
use crate::domain::telemetry::{
    DeviceId, FaultRecord, GEvent, TelemetrySnapshot, ThresholdOverrides, Thresholds,
};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub capacities: StoreCapacities,
    pub default_thresholds: Thresholds,
    pub time_format: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            capacities: StoreCapacities::default(),
            default_thresholds: Thresholds::default(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StreamState {
    Open,
    #[serde(rename_all = "camelCase")]
    Closed {
        session_id: String,
        timeout_seconds: u64,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub context: Option<String>,
    pub stream: StreamState,
    pub devices: usize,
}

/// Live state of one device after an accepted snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub device_id: DeviceId,
    pub display_name: String,
    pub classification: DisplayEvent,
    pub alerts: AlertSet,
    pub latest: TelemetrySnapshot,
}

pub struct MonitorSession {
    settings: SessionSettings,
    stores: TelemetryStores,
    thresholds: HashMap<DeviceId, Thresholds>,
    identities: HashMap<DeviceId, DeviceIdentity>,
    context: Option<String>,
    stream: StreamState,
}

impl MonitorSession {
    #[cfg(test)]
    pub fn new(settings: SessionSettings) -> Self {
        let stores = TelemetryStores::new(settings.capacities);
        Self::restored(settings, stores, None)
    }

    pub fn restored(settings: SessionSettings, stores: TelemetryStores, context: Option<String>) -> Self {
        Self {
            settings,
            stores,
            thresholds: HashMap::new(),
            identities: HashMap::new(),
            context,
            stream: StreamState::Open,
        }
    }

    pub fn stores(&self) -> &TelemetryStores {
        &self.stores
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.stream == StreamState::Open
    }

    pub fn ingest(
        &mut self,
        snapshot: TelemetrySnapshot,
        overrides: Option<ThresholdOverrides>,
    ) -> Result<IngestReport, MonitorError> {
        if let StreamState::Closed { session_id, .. } = &self.stream {
            return Err(MonitorError::StreamClosed {
                session_id: session_id.clone(),
            });
        }

        if let Some(overrides) = overrides {
            self.apply_thresholds(&snapshot.device_id, &overrides);
        }

        Ok(self.stores.ingest(snapshot))
    }

    /// Last write wins, field by field
    pub fn apply_thresholds(&mut self, device_id: &str, overrides: &ThresholdOverrides) {
        let merged = overrides.apply(&self.thresholds_for(device_id));
        self.thresholds.insert(device_id.to_string(), merged);
    }

    /// Record a finished lookup; `None` pins the device to its fallback identity
    pub fn apply_metadata(&mut self, device_id: &str, metadata: Option<&DeviceMetadata>) {
        let identity = match metadata {
            Some(metadata) => {
                if let Some(overrides) = &metadata.thresholds {
                    self.apply_thresholds(device_id, overrides);
                }
                DeviceIdentity::from_metadata(device_id, metadata)
            }
            None => DeviceIdentity::unresolved(device_id),
        };
        self.identities.insert(device_id.to_string(), identity);
    }

    pub fn needs_identity(&self, device_id: &str) -> bool {
        !self.identities.contains_key(device_id)
    }

    pub fn thresholds_for(&self, device_id: &str) -> Thresholds {
        self.thresholds
            .get(device_id)
            .copied()
            .unwrap_or(self.settings.default_thresholds)
    }

    pub fn identity(&self, device_id: &str) -> DeviceIdentity {
        self.identities
            .get(device_id)
            .cloned()
            .unwrap_or_else(|| DeviceIdentity::unresolved(device_id))
    }

    /// Switch to `context`, wiping all per-device state if it differs from the current one
    pub fn track(&mut self, context: &str) -> bool {
        if self.context.as_deref() == Some(context) {
            return false;
        }

        tracing::info!(previous = ?self.context, context, "Tracked context changed, resetting stores");
        self.stores.clear();
        self.thresholds.clear();
        self.identities.clear();
        self.context = Some(context.to_string());
        self.stream = StreamState::Open;
        true
    }

    /// User-triggered clear; cached thresholds and identities survive
    pub fn clear(&mut self) {
        self.stores.clear();
    }

    /// Close ingestion for `session_id`. Ignored for a session other than the tracked one.
    pub fn close(&mut self, session_id: &str, timeout_seconds: u64) -> bool {
        if self.context.as_deref().is_some_and(|ctx| ctx != session_id) || !self.is_open() {
            return false;
        }
        self.stream = StreamState::Closed {
            session_id: session_id.to_string(),
            timeout_seconds,
        };
        true
    }

    pub fn reopen(&mut self) -> bool {
        if self.is_open() {
            return false;
        }
        self.stream = StreamState::Open;
        true
    }

    pub fn device_update(&self, device_id: &str) -> Option<DeviceUpdate> {
        let latest = self.stores.window().latest(device_id)?.clone();
        Some(DeviceUpdate {
            device_id: device_id.to_string(),
            display_name: self.identity(device_id).display_name,
            classification: classify(&latest),
            alerts: evaluate(&latest, &self.thresholds_for(device_id)),
            latest,
        })
    }

    pub fn chart(&self, device_id: &str) -> Option<ChartSeries> {
        self.stores
            .window()
            .window(device_id)
            .map(|window| project(window, &self.settings.time_format))
    }

    pub fn faults(&self, device_id: &str) -> Option<Vec<FaultRecord>> {
        self.stores
            .faults()
            .entries(device_id)
            .map(|log| log.iter().cloned().collect())
    }

    pub fn events(&self, device_id: &str) -> Option<Vec<GEvent>> {
        self.stores
            .events()
            .entries(device_id)
            .map(|log| log.iter().cloned().collect())
    }

    /// Alerts for the device's current snapshot; all clear before its first reading
    pub fn alerts(&self, device_id: &str) -> Option<AlertSet> {
        if !self.stores.contains(device_id) {
            return None;
        }
        Some(
            self.stores
                .window()
                .latest(device_id)
                .map(|latest| evaluate(latest, &self.thresholds_for(device_id)))
                .unwrap_or_default(),
        )
    }

    pub fn dashboard(&self, device_id: &str) -> Option<DeviceDashboard> {
        if !self.stores.contains(device_id) {
            return None;
        }

        let latest = self.stores.window().latest(device_id).cloned();
        let thresholds = self.thresholds_for(device_id);

        Some(DeviceDashboard {
            identity: self.identity(device_id),
            classification: latest.as_ref().map(classify),
            alerts: latest
                .as_ref()
                .map(|s| evaluate(s, &thresholds))
                .unwrap_or_default(),
            thresholds,
            chart: self.chart(device_id).unwrap_or_default(),
            faults: self.faults(device_id).unwrap_or_default(),
            events: self.events(device_id).unwrap_or_default(),
            latest,
        })
    }

    pub fn summaries(&self) -> Vec<DeviceSummary> {
        self.stores
            .device_ids()
            .map(|device_id| {
                let latest = self.stores.window().latest(device_id);
                DeviceSummary {
                    device_id: device_id.clone(),
                    display_name: self.identity(device_id).display_name,
                    last_seen: latest.map(|s| s.timestamp),
                    classification: latest.map(classify),
                    alerting: latest
                        .map(|s| evaluate(s, &self.thresholds_for(device_id)).any())
                        .unwrap_or(false),
                    window_len: self.stores.window().window(device_id).map_or(0, |w| w.len()),
                    fault_count: self.stores.faults().entries(device_id).map_or(0, |l| l.len()),
                    event_count: self.stores.events().entries(device_id).map_or(0, |l| l.len()),
                }
            })
            .collect()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            context: self.context.clone(),
            stream: self.stream.clone(),
            devices: self.stores.device_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::EventType;
    use chrono::{Duration, Utc};

    fn session() -> MonitorSession {
        MonitorSession::new(SessionSettings::default())
    }

    fn snapshot(device: &str, second: i64) -> TelemetrySnapshot {
        TelemetrySnapshot::new(device, Utc::now() + Duration::seconds(second))
    }

    #[test]
    fn test_thresholds_last_write_wins_per_field() {
        let mut session = session();
        let snapshot_overrides = ThresholdOverrides {
            rpm_max: Some(4000.0),
            speed_max: Some(120.0),
            ..Default::default()
        };
        session.ingest(snapshot("D1", 0), Some(snapshot_overrides)).unwrap();

        let metadata = DeviceMetadata {
            asset_name: Some("Truck 07".to_string()),
            thresholds: Some(ThresholdOverrides {
                rpm_max: Some(3500.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        session.apply_metadata("D1", Some(&metadata));

        let thresholds = session.thresholds_for("D1");
        assert_eq!(thresholds.rpm_max, 3500.0);
        assert_eq!(thresholds.speed_max, 120.0);
        assert_eq!(thresholds.engine_temp_max, 120.0);
        assert_eq!(session.identity("D1").display_name, "Truck 07");

        // other devices keep the defaults
        assert_eq!(session.thresholds_for("D2"), Thresholds::default());
    }

    #[test]
    fn test_unresolved_device_uses_raw_identifier() {
        let mut session = session();
        session.ingest(snapshot("867530900000001", 0), None).unwrap();
        assert!(session.needs_identity("867530900000001"));

        session.apply_metadata("867530900000001", None);
        assert!(!session.needs_identity("867530900000001"));
        assert_eq!(session.summaries()[0].display_name, "867530900000001");
    }

    #[test]
    fn test_context_change_resets_everything() {
        let mut session = session();
        assert!(session.track("job-1"));
        session.ingest(snapshot("D1", 0), None).unwrap();
        session.apply_metadata("D1", Some(&DeviceMetadata::default()));

        assert!(!session.track("job-1"));
        assert_eq!(session.stores().device_count(), 1);

        assert!(session.track("job-2"));
        assert!(session.stores().is_empty());
        assert!(session.needs_identity("D1"));
        assert_eq!(session.context(), Some("job-2"));
    }

    #[test]
    fn test_timeout_closes_stream_but_keeps_data() {
        let mut session = session();
        session.track("job-1");
        session.ingest(snapshot("D1", 0), None).unwrap();

        assert!(!session.close("job-other", 30));
        assert!(session.is_open());

        assert!(session.close("job-1", 30));
        assert_eq!(
            session.ingest(snapshot("D1", 1), None),
            Err(MonitorError::StreamClosed {
                session_id: "job-1".to_string()
            })
        );
        assert_eq!(session.stores().window().window("D1").unwrap().len(), 1);

        assert!(session.reopen());
        assert!(!session.reopen());
        assert!(session.ingest(snapshot("D1", 1), None).is_ok());
    }

    #[test]
    fn test_dashboard_projects_current_state() {
        let mut session = session();
        let mut s = snapshot("D1", 0);
        s.speed = 60.0.into();
        s.rpm = 2950.0.into();
        s.event_type = EventType::Braking;
        s.event_g_value = 0.7.into();
        s.obd_faults = vec!["P0135".to_string()];
        session.ingest(s, None).unwrap();

        let dashboard = session.dashboard("D1").unwrap();
        assert_eq!(dashboard.classification, Some(DisplayEvent::Braking));
        assert!(dashboard.alerts.rpm_alert);
        assert!(dashboard.alerts.speed_alert);
        assert_eq!(dashboard.chart.len(), 1);
        assert_eq!(dashboard.faults.len(), 1);
        assert_eq!(dashboard.events[0].g_value, 0.7);

        assert!(session.dashboard("D2").is_none());
        assert!(session.alerts("D2").is_none());
    }

    #[test]
    fn test_clear_keeps_thresholds() {
        let mut session = session();
        let overrides = ThresholdOverrides {
            fuel_level_min: Some(5.0),
            ..Default::default()
        };
        session.ingest(snapshot("D1", 0), Some(overrides)).unwrap();

        session.clear();
        assert!(session.stores().is_empty());
        assert_eq!(session.thresholds_for("D1").fuel_level_min, 5.0);
    }

    #[test]
    fn test_device_update_reflects_latest_snapshot() {
        let mut session = session();
        let mut s = snapshot("D1", 0);
        s.rpm = 800.0.into();
        s.speed = 0.0.into();
        session.ingest(s.clone(), None).unwrap();

        let update = session.device_update("D1").unwrap();
        assert_eq!(update.classification, DisplayEvent::Stationary);
        assert_eq!(update.latest, s);
        assert!(session.device_update("D2").is_none());
    }
}
