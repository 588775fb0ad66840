// ── Snapshot cache ──
//
// One atomically replaceable slot. Readers never block and never see a
// half-built snapshot; the poll loop is the only writer.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::model::Snapshot;

/// Latest computed snapshot, empty until the first successful poll.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slot: ArcSwapOption<Snapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot with `snapshot`.
    pub fn store(&self, snapshot: Arc<Snapshot>) {
        self.slot.store(Some(snapshot));
    }

    /// Current snapshot, if any. Lock-free.
    pub fn load(&self) -> Option<Arc<Snapshot>> {
        self.slot.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load().is_none()
    }
}
