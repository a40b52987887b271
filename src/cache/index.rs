//! The rebuildable `hash -> path` index.
//!
//! Readers never lock around the directory scan. Every change bumps a
//! generation counter, and a snapshot is only trusted while its generation
//! matches. A change that lands during a rebuild leaves an outdated snapshot
//! behind, which the next reader rebuilds.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

pub type IndexEntries = Arc<HashMap<String, PathBuf>>;

#[derive(Debug)]
struct Snapshot {
    generation: u64,
    entries: IndexEntries,
}

/// Generation-guarded snapshot of the cache directory.
#[derive(Debug, Default)]
pub struct CacheIndex {
    generation: AtomicU64,
    snapshot: RwLock<Option<Snapshot>>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the current snapshot as outdated.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The current entries, calling `scan` to rebuild them if outdated.
    pub fn entries(&self, scan: impl FnOnce() -> HashMap<String, PathBuf>) -> IndexEntries {
        let current = self.generation();
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            if snapshot.generation == current {
                return snapshot.entries.clone();
            }
        }

        debug!("Rebuilding cache index");
        let entries = Arc::new(scan());
        *self.snapshot.write() = Some(Snapshot {
            generation: current,
            entries: entries.clone(),
        });
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_snapshot_reused_until_invalidated() {
        let index = CacheIndex::new();
        let scans = Cell::new(0);
        let scan = || {
            scans.set(scans.get() + 1);
            HashMap::from([("0A1B2C3D".to_string(), PathBuf::from("/c/0A1B2C3D-a.zip"))])
        };

        assert_eq!(index.entries(scan).len(), 1);
        assert_eq!(index.entries(scan).len(), 1);
        assert_eq!(scans.get(), 1);

        index.invalidate();
        index.entries(scan);
        assert_eq!(scans.get(), 2);
    }

    #[test]
    fn test_generation_increments() {
        let index = CacheIndex::new();
        let before = index.generation();
        index.invalidate();
        index.invalidate();
        assert_eq!(index.generation(), before + 2);
    }
}
