//! Per-sweep counters

use std::fmt;
use std::ops::AddAssign;

use serde::Serialize;

/// What a sync sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Remote records inserted or overwritten locally
    pub upserted: usize,
    /// Remote records that already matched
    pub unchanged: usize,
    /// Remote records blocked by a tombstone
    pub skipped: usize,
    /// Local records created remotely
    pub created: usize,
    /// Local edits pushed as updates
    pub updated: usize,
    /// Tombstones pushed as deletes
    pub deleted: usize,
    /// Operations that failed (logged, not retried)
    pub failed: usize,
}

impl SyncReport {
    /// Number of mutations sent to the remote
    pub fn pushed(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Whether anything changed on either side
    pub fn is_noop(&self) -> bool {
        self.upserted == 0 && self.pushed() == 0 && self.failed == 0
    }
}

impl AddAssign for SyncReport {
    fn add_assign(&mut self, other: Self) {
        self.upserted += other.upserted;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pulled {} ({} unchanged, {} tombstoned), pushed {} created / {} updated / {} deleted",
            self.upserted,
            self.unchanged,
            self.skipped,
            self.created,
            self.updated,
            self.deleted
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}
