//! Process-wide registry of accepted tasks, for status and health endpoints.
//!
//! Records are written when a task is accepted and again once its callback
//! has been attempted. Finished records older than the retention window are
//! pruned on insert. Nothing here survives a restart.
//!
//! Every [`TaskRegistry::start`] hands out a generation number. A caller may
//! reuse a task id while the first run is still going; the generation keeps
//! the older run from finishing the newer record, and both runs count as
//! active until each has finished.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::TaskStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task_id: String,
    pub keyword: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    #[serde(skip)]
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Entries {
    records: HashMap<String, TaskRecord>,
    in_flight: HashSet<u64>,
}

#[derive(Debug)]
pub struct TaskRegistry {
    entries: RwLock<Entries>,
    next_generation: AtomicU64,
    retention: Duration,
}

impl TaskRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            next_generation: AtomicU64::new(1),
            retention,
        }
    }

    /// Record a newly accepted task as running and return its generation.
    pub fn start(&self, task_id: &str, keyword: &str) -> u64 {
        let now = Utc::now();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        self.prune(&mut entries.records, now);

        let record = TaskRecord {
            task_id: task_id.to_string(),
            keyword: keyword.to_string(),
            started_at: now,
            finished_at: None,
            status: TaskStatus::Running,
            generation,
        };
        entries.in_flight.insert(generation);
        if let Some(previous) = entries.records.insert(task_id.to_string(), record) {
            warn!(
                %task_id,
                previous_status = ?previous.status,
                previous_generation = previous.generation,
                "Task id reused; replacing registry record"
            );
        }
        generation
    }

    /// Mark one run of a task terminal.
    ///
    /// The record is only updated when it still belongs to `generation`;
    /// unknown generations are ignored.
    pub fn finish(&self, task_id: &str, generation: u64, status: TaskStatus) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.in_flight.remove(&generation) {
            debug!(%task_id, generation, "Finished task has no registry record");
            return;
        }
        match entries.records.get_mut(task_id) {
            Some(record) if record.generation == generation => {
                record.status = status;
                record.finished_at = Some(Utc::now());
            }
            _ => debug!(%task_id, generation, "Record superseded by a newer run"),
        }
    }

    pub fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .get(task_id)
            .cloned()
    }

    /// Runs accepted but not yet finished, including superseded ones.
    pub fn active_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .len()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    fn prune(&self, records: &mut HashMap<String, TaskRecord>, now: DateTime<Utc>) {
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return;
        };
        let before = records.len();
        records.retain(|_, r| match r.finished_at {
            Some(finished) => now - finished < retention,
            None => true,
        });
        let pruned = before - records.len();
        if pruned > 0 {
            debug!(pruned, remaining = records.len(), "Pruned finished task records");
        }
    }
}
