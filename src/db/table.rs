//! In-process job table backing `PooledJobStore`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult, ConflictKind};
use crate::jobs::models::ScheduledJob;

#[derive(Debug, Clone)]
struct Row {
    version: u64,
    job: ScheduledJob,
}

/// Versioned rows; every committed write bumps the row version.
#[derive(Debug, Default)]
pub struct JobTable {
    rows: DashMap<Uuid, Row>,
    commit_lock: Mutex<()>,
    versions: AtomicU64,
}

/// Row version observed by a reader; `None` means the row was absent.
pub(crate) type ReadVersion = Option<u64>;

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn read(&self, id: &Uuid) -> (ReadVersion, Option<ScheduledJob>) {
        match self.rows.get(id) {
            Some(row) => (Some(row.version), Some(row.job.clone())),
            None => (None, None),
        }
    }

    pub(crate) fn scan(&self) -> Vec<(u64, ScheduledJob)> {
        self.rows
            .iter()
            .map(|entry| (entry.version, entry.job.clone()))
            .collect()
    }

    /// Apply a write set atomically.
    ///
    /// Each id in `expected` must still be at the recorded version, otherwise
    /// nothing is written and a serialization conflict is returned.
    pub(crate) fn commit(
        &self,
        writes: HashMap<Uuid, Option<ScheduledJob>>,
        expected: &HashMap<Uuid, ReadVersion>,
    ) -> AppResult<()> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|e| AppError::Internal {
                source: anyhow::anyhow!("job table commit lock poisoned: {e}"),
            })?;

        for (id, seen) in expected {
            let current = self.rows.get(id).map(|row| row.version);
            if current != *seen {
                return Err(AppError::TransactionConflict {
                    kind: ConflictKind::Serialization,
                    message: format!(
                        "could not serialize access due to concurrent update of job {id}"
                    ),
                });
            }
        }

        for (id, write) in writes {
            match write {
                Some(job) => {
                    let version = self.versions.fetch_add(1, Ordering::Relaxed) + 1;
                    self.rows.insert(id, Row { version, job });
                }
                None => {
                    self.rows.remove(&id);
                }
            }
        }

        Ok(())
    }
}
