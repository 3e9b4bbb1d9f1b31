use crate::models::{HostSnapshot, SnapshotMap};
use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Latest snapshot per host, written by the monitors and read by the web layer.
///
/// Each monitor owns a distinct key. Snapshots are swapped whole under the map
/// lock, so a reader sees either the previous or the next snapshot of a host,
/// never a mix of both.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Shared<SnapshotMap>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self { inner: new_state(SnapshotMap::new()) }
    }

    pub fn write(&self, host_id: &str, snapshot: HostSnapshot) {
        self.inner.lock().insert(host_id.to_string(), snapshot);
    }

    /// Consistent copy of the whole map
    pub fn read_all(&self) -> SnapshotMap {
        self.inner.lock().clone()
    }

    pub fn get(&self, host_id: &str) -> Option<HostSnapshot> {
        self.inner.lock().get(host_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
