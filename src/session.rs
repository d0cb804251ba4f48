use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::SnapshotCache;
use crate::error::Result;
use crate::models::ReleaseWindow;
use crate::sheet::{GradeSheet, SheetSnapshot};
use crate::table::GradeTable;
use crate::window;

pub struct GradebookSession {
    grades: Arc<dyn GradeSheet>,
    windows: Arc<dyn GradeSheet>,
    cache: SnapshotCache,
    version: u64,
}

impl GradebookSession {
    pub fn new(grades: Arc<dyn GradeSheet>, windows: Arc<dyn GradeSheet>, ttl: Duration) -> Self {
        Self {
            grades,
            windows,
            cache: SnapshotCache::new(ttl),
            version: 0,
        }
    }

    pub fn grade_sheet(&self) -> &dyn GradeSheet {
        self.grades.as_ref()
    }

    #[cfg(test)]
    pub fn version(&self) -> u64 {
        self.version
    }

    async fn snapshot(&mut self, sheet: Arc<dyn GradeSheet>) -> Result<Arc<SheetSnapshot>> {
        if let Some(hit) = self.cache.get(sheet.name(), self.version) {
            debug!(sheet = sheet.name(), version = self.version, "snapshot cache hit");
            return Ok(hit);
        }
        let snapshot = sheet.read_all().await?;
        info!(
            sheet = sheet.name(),
            version = self.version,
            rows = snapshot.rows.len(),
            "loaded sheet"
        );
        Ok(self.cache.insert(self.version, snapshot))
    }

    pub async fn grade_table(&mut self, required: &[&str]) -> Result<GradeTable> {
        let snapshot = self.snapshot(Arc::clone(&self.grades)).await?;
        GradeTable::from_snapshot(&snapshot, required)
    }

    pub async fn release_windows(&mut self) -> Result<Vec<ReleaseWindow>> {
        let snapshot = self.snapshot(Arc::clone(&self.windows)).await?;
        window::release_windows(&snapshot)
    }

    /// Forces the next read of every sheet to go to the store.
    pub fn invalidate(&mut self) {
        self.version += 1;
        debug!(version = self.version, "snapshot cache invalidated");
    }
}
