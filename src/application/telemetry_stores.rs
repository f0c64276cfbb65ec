// Telemetry stores - Window, fault and event stores kept in lockstep per device
use crate::application::log_store::{EventLogStore, FaultLogStore};
use crate::application::persistence_gateway::StoreKind;
use crate::application::window_store::{AppendOutcome, WindowStore};
use crate::domain::telemetry::{DeviceId, TelemetrySnapshot};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapacities {
    pub window: usize,
    pub faults: usize,
    pub events: usize,
}

impl Default for StoreCapacities {
    fn default() -> Self {
        Self {
            window: DEFAULT_CAPACITY,
            faults: DEFAULT_CAPACITY,
            events: DEFAULT_CAPACITY,
        }
    }
}

/// Which stores a mutation touched, used to decide what to mirror
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreChanges {
    pub window: bool,
    pub faults: bool,
    pub events: bool,
}

impl StoreChanges {
    #[cfg(test)]
    pub fn all() -> Self {
        Self {
            window: true,
            faults: true,
            events: true,
        }
    }

    pub fn any(&self) -> bool {
        self.window || self.faults || self.events
    }

    pub fn merge(&mut self, other: StoreChanges) {
        self.window |= other.window;
        self.faults |= other.faults;
        self.events |= other.events;
    }

    pub fn contains(&self, kind: StoreKind) -> bool {
        match kind {
            StoreKind::Window => self.window,
            StoreKind::Fault => self.faults,
            StoreKind::Event => self.events,
        }
    }

    pub fn kinds(self) -> impl Iterator<Item = StoreKind> {
        StoreKind::ALL.into_iter().filter(move |kind| self.contains(*kind))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub new_device: bool,
    pub duplicate: bool,
    pub faults_added: usize,
    pub event_added: bool,
    pub changes: StoreChanges,
}

#[derive(Debug, Clone)]
pub struct TelemetryStores {
    window: WindowStore,
    faults: FaultLogStore,
    events: EventLogStore,
}

impl TelemetryStores {
    #[cfg(test)]
    pub fn new(capacities: StoreCapacities) -> Self {
        Self {
            window: WindowStore::new(capacities.window),
            faults: FaultLogStore::new(capacities.faults),
            events: EventLogStore::new(capacities.events),
        }
    }

    /// Rebuild from persisted blobs. Unreadable blobs start empty; device keys are
    /// reconciled so every device exists in all three stores.
    pub fn restore(
        capacities: StoreCapacities,
        window: Option<&str>,
        faults: Option<&str>,
        events: Option<&str>,
    ) -> Self {
        let mut stores = Self {
            window: WindowStore::from_windows(capacities.window, decode(StoreKind::Window, window)),
            faults: FaultLogStore::from_logs(capacities.faults, decode(StoreKind::Fault, faults)),
            events: EventLogStore::from_logs(capacities.events, decode(StoreKind::Event, events)),
        };

        let device_ids: BTreeSet<DeviceId> = stores
            .window
            .device_ids()
            .chain(stores.faults.device_ids())
            .chain(stores.events.device_ids())
            .cloned()
            .collect();
        for device_id in &device_ids {
            stores.ensure_device(device_id);
        }

        stores
    }

    /// Create the device in all three stores; true when it was previously unseen
    pub fn ensure_device(&mut self, device_id: &str) -> bool {
        let window = self.window.ensure(device_id);
        let faults = self.faults.ensure(device_id);
        let events = self.events.ensure(device_id);
        window || faults || events
    }

    pub fn ingest(&mut self, snapshot: TelemetrySnapshot) -> IngestReport {
        let device_id = snapshot.device_id.clone();
        let new_device = self.ensure_device(&device_id);

        let faults_added = self
            .faults
            .merge(&device_id, &snapshot.obd_faults, snapshot.timestamp);
        let event_added = self.events.merge(
            &device_id,
            snapshot.event_type,
            snapshot.event_g_value.value(),
            snapshot.timestamp,
        );
        let duplicate = self.window.append(snapshot) == AppendOutcome::Duplicate;

        IngestReport {
            new_device,
            duplicate,
            faults_added,
            event_added,
            changes: StoreChanges {
                window: new_device || !duplicate,
                faults: new_device || faults_added > 0,
                events: new_device || event_added,
            },
        }
    }

    pub fn window(&self) -> &WindowStore {
        &self.window
    }

    pub fn faults(&self) -> &FaultLogStore {
        &self.faults
    }

    pub fn events(&self) -> &EventLogStore {
        &self.events
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.window.window(device_id).is_some()
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.window.device_ids()
    }

    pub fn device_count(&self) -> usize {
        self.window.windows().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.device_count() == 0
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.faults.clear();
        self.events.clear();
    }

    /// Serialized form: an object mapping device id to its bounded list
    pub fn serialize(&self, kind: StoreKind) -> Result<String, serde_json::Error> {
        match kind {
            StoreKind::Window => serde_json::to_string(self.window.windows()),
            StoreKind::Fault => serde_json::to_string(self.faults.logs()),
            StoreKind::Event => serde_json::to_string(self.events.logs()),
        }
    }
}

fn decode<T: DeserializeOwned>(kind: StoreKind, blob: Option<&str>) -> BTreeMap<DeviceId, Vec<T>> {
    let Some(blob) = blob else {
        return BTreeMap::new();
    };
    serde_json::from_str(blob).unwrap_or_else(|e| {
        tracing::warn!(key = kind.key(), error = %e, "Discarding unreadable persisted store");
        BTreeMap::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::EventType;
    use chrono::{Duration, Utc};

    fn snapshot(device: &str, second: i64) -> TelemetrySnapshot {
        TelemetrySnapshot::new(device, Utc::now() + Duration::seconds(second))
    }

    #[test]
    fn test_first_snapshot_creates_all_three_keys() {
        let mut stores = TelemetryStores::new(StoreCapacities::default());
        let report = stores.ingest(snapshot("D1", 0));

        assert!(report.new_device);
        assert_eq!(report.changes, StoreChanges::all());
        assert!(stores.window().window("D1").is_some());
        assert!(stores.faults().entries("D1").unwrap().is_empty());
        assert!(stores.events().entries("D1").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_frame_touches_nothing() {
        let mut stores = TelemetryStores::new(StoreCapacities::default());
        let mut s = snapshot("D1", 0);
        s.obd_faults = vec!["P0135".to_string()];
        s.event_type = EventType::Braking;
        s.event_g_value = 0.5.into();

        let first = stores.ingest(s.clone());
        assert_eq!(first.faults_added, 1);
        assert!(first.event_added);

        let second = stores.ingest(s);
        assert!(second.duplicate);
        assert!(!second.changes.any());
        assert_eq!(stores.faults().entries("D1").unwrap().len(), 1);
        assert_eq!(stores.events().entries("D1").unwrap().len(), 1);
        assert_eq!(stores.window().window("D1").unwrap().len(), 1);
    }

    #[test]
    fn test_clear_then_ingest_keeps_only_new_contribution() {
        let mut stores = TelemetryStores::new(StoreCapacities::default());
        for i in 0..5 {
            let mut s = snapshot("D1", i);
            s.obd_faults = vec![format!("P01{:02}", i)];
            s.event_type = EventType::Curve;
            stores.ingest(s);
        }

        stores.clear();
        assert!(stores.is_empty());

        let mut s = snapshot("D1", 100);
        s.obd_faults = vec!["P0300".to_string()];
        stores.ingest(s.clone());

        assert_eq!(stores.window().window("D1").unwrap().len(), 1);
        assert_eq!(stores.window().latest("D1"), Some(&s));
        let faults = stores.faults().entries("D1").unwrap();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].code, "P0300");
        assert!(stores.events().entries("D1").unwrap().is_empty());
    }

    #[test]
    fn test_restore_round_trip_and_reconcile() {
        let mut stores = TelemetryStores::new(StoreCapacities::default());
        let mut s = snapshot("D1", 0);
        s.obd_faults = vec!["P0135".to_string()];
        stores.ingest(s);
        stores.ingest(snapshot("D2", 0));

        let window = stores.serialize(StoreKind::Window).unwrap();
        let faults = stores.serialize(StoreKind::Fault).unwrap();

        // event blob lost: devices must still exist in the event store
        let restored =
            TelemetryStores::restore(StoreCapacities::default(), Some(window.as_str()), Some(faults.as_str()), None);

        assert_eq!(restored.device_count(), 2);
        assert_eq!(restored.window().latest("D1"), stores.window().latest("D1"));
        assert_eq!(restored.faults().entries("D1").unwrap().len(), 1);
        assert!(restored.events().entries("D1").is_some());
        assert!(restored.events().entries("D2").is_some());
    }

    #[test]
    fn test_restore_device_known_only_to_fault_log() {
        let faults = r#"{"D9":[{"deviceId":"D9","code":"P0420","timestamp":"2024-05-01T10:00:00Z"}]}"#;

        let restored = TelemetryStores::restore(
            StoreCapacities::default(),
            Some("not json"),
            Some(faults),
            None,
        );

        assert!(restored.contains("D9"));
        assert!(restored.window().window("D9").unwrap().is_empty());
        assert_eq!(restored.faults().entries("D9").unwrap()[0].code, "P0420");
    }
}
