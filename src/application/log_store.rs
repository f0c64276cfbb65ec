// Log stores - Bounded, deduplicated, newest-first fault and g-event logs
use crate::domain::telemetry::{DeviceId, EventType, FaultRecord, GEvent};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};

pub trait LogEntry {
    fn same_entry(&self, other: &Self) -> bool;
}

impl LogEntry for FaultRecord {
    fn same_entry(&self, other: &Self) -> bool {
        self == other
    }
}

impl LogEntry for GEvent {
    fn same_entry(&self, other: &Self) -> bool {
        self.same_occurrence(other)
    }
}

/// Per-device logs in insertion order, most recent first. Never re-sorted by timestamp.
#[derive(Debug, Clone)]
pub struct LogStore<T> {
    capacity: usize,
    logs: BTreeMap<DeviceId, VecDeque<T>>,
}

pub type FaultLogStore = LogStore<FaultRecord>;
pub type EventLogStore = LogStore<GEvent>;

impl<T: LogEntry> LogStore<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            logs: BTreeMap::new(),
        }
    }

    /// Rebuild from persisted logs: repeated entries keep their first occurrence,
    /// then the head of each log is retained
    pub fn from_logs(capacity: usize, logs: BTreeMap<DeviceId, Vec<T>>) -> Self {
        let mut store = Self::new(capacity);
        for (device_id, entries) in logs {
            let total = entries.len();
            let mut log: VecDeque<T> = VecDeque::new();
            for entry in entries {
                if !log.iter().any(|kept| kept.same_entry(&entry)) {
                    log.push_back(entry);
                }
            }
            if log.len() < total {
                tracing::debug!(
                    device_id = %device_id,
                    dropped = total - log.len(),
                    "Dropped repeated entries from restored log"
                );
            }
            log.truncate(store.capacity);
            store.logs.insert(device_id, log);
        }
        store
    }

    pub fn ensure(&mut self, device_id: &str) -> bool {
        if self.logs.contains_key(device_id) {
            return false;
        }
        self.logs.insert(device_id.to_string(), VecDeque::new());
        true
    }

    /// Prepend unless an entry with the same identity is already logged
    pub fn insert(&mut self, device_id: &str, entry: T) -> bool {
        let log = self.logs.entry(device_id.to_string()).or_default();
        if log.iter().any(|existing| existing.same_entry(&entry)) {
            return false;
        }
        log.push_front(entry);
        log.truncate(self.capacity);
        true
    }

    pub fn entries(&self, device_id: &str) -> Option<&VecDeque<T>> {
        self.logs.get(device_id)
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.logs.keys()
    }

    pub fn logs(&self) -> &BTreeMap<DeviceId, VecDeque<T>> {
        &self.logs
    }

    pub fn clear(&mut self) {
        self.logs.clear();
    }
}

impl LogStore<FaultRecord> {
    /// Returns the number of new records; an empty code list is a no-op
    pub fn merge(&mut self, device_id: &str, codes: &[String], timestamp: DateTime<Utc>) -> usize {
        let mut added = 0;
        for code in codes {
            let record = FaultRecord {
                device_id: device_id.to_string(),
                code: code.clone(),
                timestamp,
            };
            if self.insert(device_id, record) {
                added += 1;
            }
        }
        added
    }
}

impl LogStore<GEvent> {
    pub fn merge(
        &mut self,
        device_id: &str,
        event_type: EventType,
        g_value: f64,
        timestamp: DateTime<Utc>,
    ) -> bool {
        if !event_type.is_harsh() {
            return false;
        }
        self.insert(
            device_id,
            GEvent {
                device_id: device_id.to_string(),
                event_type,
                g_value,
                timestamp,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_fault_merge_is_idempotent() {
        let ts = Utc::now();
        let mut store = FaultLogStore::new(50);

        assert_eq!(store.merge("D1", &codes(&["P0135"]), ts), 1);
        assert_eq!(store.merge("D1", &codes(&["P0135"]), ts), 0);
        assert_eq!(store.entries("D1").unwrap().len(), 1);

        // same code at a different instant is a new occurrence
        assert_eq!(store.merge("D1", &codes(&["P0135"]), ts + Duration::seconds(1)), 1);
        assert_eq!(store.entries("D1").unwrap().len(), 2);
    }

    #[test]
    fn test_empty_fault_set_is_noop() {
        let mut store = FaultLogStore::new(50);
        assert_eq!(store.merge("D1", &[], Utc::now()), 0);
        assert!(store.entries("D1").is_none());
    }

    #[test]
    fn test_fault_log_is_bounded_and_newest_first() {
        let start = Utc::now();
        let mut store = FaultLogStore::new(50);

        for i in 0..70 {
            store.merge("D1", &codes(&[&format!("P{:04}", i)]), start + Duration::seconds(i));
            assert!(store.entries("D1").unwrap().len() <= 50);
        }

        let log = store.entries("D1").unwrap();
        assert_eq!(log.len(), 50);
        assert_eq!(log.front().unwrap().code, "P0069");
        assert_eq!(log.back().unwrap().code, "P0020");
    }

    #[test]
    fn test_event_log_keeps_insertion_order_not_timestamp_order() {
        let start = Utc::now();
        let mut store = EventLogStore::new(50);

        assert!(store.merge("D1", EventType::Braking, 0.5, start + Duration::seconds(10)));
        assert!(store.merge("D1", EventType::Curve, 0.3, start));

        let log = store.entries("D1").unwrap();
        assert_eq!(log[0].event_type, EventType::Curve);
        assert_eq!(log[1].event_type, EventType::Braking);
    }

    #[test]
    fn test_event_dedup_ignores_g_value() {
        let ts = Utc::now();
        let mut store = EventLogStore::new(50);

        assert!(store.merge("D1", EventType::Acceleration, 0.41, ts));
        assert!(!store.merge("D1", EventType::Acceleration, 0.42, ts));
        assert!(store.merge("D1", EventType::Braking, 0.42, ts));
        assert!(!store.merge("D1", EventType::None, 0.0, ts));
        assert_eq!(store.entries("D1").unwrap().len(), 2);
    }

    #[test]
    fn test_event_log_bound() {
        let start = Utc::now();
        let mut store = EventLogStore::new(50);

        for i in 0..120 {
            store.merge("D1", EventType::Braking, 0.5, start + Duration::milliseconds(i * 100));
        }

        let log = store.entries("D1").unwrap();
        assert_eq!(log.len(), 50);
        assert_eq!(log[0].timestamp, start + Duration::milliseconds(119 * 100));
    }

    #[test]
    fn test_from_logs_keeps_head() {
        let ts = Utc::now();
        let records: Vec<FaultRecord> = (0..4)
            .map(|i| FaultRecord {
                device_id: "D1".to_string(),
                code: format!("C{}", i),
                timestamp: ts,
            })
            .collect();

        let store = FaultLogStore::from_logs(2, BTreeMap::from([("D1".to_string(), records)]));
        let log: Vec<&str> = store.entries("D1").unwrap().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(log, vec!["C0", "C1"]);
    }

    #[test]
    fn test_from_logs_drops_repeated_events() {
        let ts = Utc::now();
        let event = |g: f64, offset: i64| GEvent {
            device_id: "D1".to_string(),
            event_type: EventType::Braking,
            g_value: g,
            timestamp: ts + Duration::seconds(offset),
        };
        let events = vec![event(0.4, 2), event(0.9, 2), event(0.5, 1)];

        let store = EventLogStore::from_logs(50, BTreeMap::from([("D1".to_string(), events)]));
        let log = store.entries("D1").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].g_value, 0.4);
        assert_eq!(log[1].timestamp, ts + Duration::seconds(1));
    }
}
