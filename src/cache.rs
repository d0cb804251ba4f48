use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::sheet::SheetSnapshot;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub struct SnapshotCache {
    ttl: Duration,
    entries: HashMap<(String, u64), CachedSnapshot>,
}

#[derive(Debug)]
struct CachedSnapshot {
    loaded_at: Instant,
    snapshot: Arc<SheetSnapshot>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, sheet: &str, version: u64) -> Option<Arc<SheetSnapshot>> {
        self.get_at(sheet, version, Instant::now())
    }

    fn get_at(&self, sheet: &str, version: u64, now: Instant) -> Option<Arc<SheetSnapshot>> {
        let entry = self.entries.get(&(sheet.to_string(), version))?;
        if now.duration_since(entry.loaded_at) >= self.ttl {
            return None;
        }
        Some(Arc::clone(&entry.snapshot))
    }

    pub fn insert(&mut self, version: u64, snapshot: SheetSnapshot) -> Arc<SheetSnapshot> {
        self.insert_at(version, snapshot, Instant::now())
    }

    fn insert_at(
        &mut self,
        version: u64,
        snapshot: SheetSnapshot,
        now: Instant,
    ) -> Arc<SheetSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.purge(now, version);
        self.entries.insert(
            (snapshot.sheet.clone(), version),
            CachedSnapshot {
                loaded_at: now,
                snapshot: Arc::clone(&snapshot),
            },
        );
        snapshot
    }

    /// Drops expired entries and entries from older versions.
    fn purge(&mut self, now: Instant, current_version: u64) {
        let ttl = self.ttl;
        self.entries.retain(|(_, version), entry| {
            *version >= current_version && now.duration_since(entry.loaded_at) < ttl
        });
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
