// Window store - Bounded per-device snapshot history for charts
use crate::domain::telemetry::{DeviceId, TelemetrySnapshot};
use std::collections::{BTreeMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { evicted: usize },
    /// A retained entry already carries this timestamp
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct WindowStore {
    capacity: usize,
    windows: BTreeMap<DeviceId, VecDeque<TelemetrySnapshot>>,
}

impl WindowStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            windows: BTreeMap::new(),
        }
    }

    /// Rebuild from persisted windows. A repeated timestamp keeps its first entry,
    /// then the newest `capacity` entries of each window are retained.
    pub fn from_windows(capacity: usize, windows: BTreeMap<DeviceId, Vec<TelemetrySnapshot>>) -> Self {
        let mut store = Self::new(capacity);
        for (device_id, entries) in windows {
            let total = entries.len();
            let mut seen = HashSet::with_capacity(total);
            let mut window: VecDeque<TelemetrySnapshot> = entries
                .into_iter()
                .filter(|entry| seen.insert(entry.timestamp))
                .collect();
            if window.len() < total {
                tracing::debug!(
                    device_id = %device_id,
                    dropped = total - window.len(),
                    "Dropped duplicate timestamps from restored window"
                );
            }
            let excess = window.len().saturating_sub(store.capacity);
            window.drain(..excess);
            store.windows.insert(device_id, window);
        }
        store
    }

    /// Returns true when the device was previously unseen
    pub fn ensure(&mut self, device_id: &str) -> bool {
        if self.windows.contains_key(device_id) {
            return false;
        }
        self.windows.insert(device_id.to_string(), VecDeque::new());
        true
    }

    pub fn append(&mut self, snapshot: TelemetrySnapshot) -> AppendOutcome {
        let capacity = self.capacity;
        let window = self.windows.entry(snapshot.device_id.clone()).or_default();

        if window.iter().rev().any(|e| e.timestamp == snapshot.timestamp) {
            tracing::debug!(device_id = %snapshot.device_id, timestamp = %snapshot.timestamp, "Dropping duplicate frame");
            return AppendOutcome::Duplicate;
        }

        if let Some(last) = window.back() {
            if snapshot.timestamp < last.timestamp {
                tracing::debug!(
                    device_id = %snapshot.device_id,
                    timestamp = %snapshot.timestamp,
                    last = %last.timestamp,
                    "Late frame appended in arrival order"
                );
            }
        }

        window.push_back(snapshot);

        let mut evicted = 0;
        while window.len() > capacity {
            window.pop_front();
            evicted += 1;
        }

        AppendOutcome::Appended { evicted }
    }

    pub fn window(&self, device_id: &str) -> Option<&VecDeque<TelemetrySnapshot>> {
        self.windows.get(device_id)
    }

    pub fn latest(&self, device_id: &str) -> Option<&TelemetrySnapshot> {
        self.windows.get(device_id).and_then(|w| w.back())
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.windows.keys()
    }

    pub fn windows(&self) -> &BTreeMap<DeviceId, VecDeque<TelemetrySnapshot>> {
        &self.windows
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }
}
