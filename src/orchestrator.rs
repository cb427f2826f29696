//! Task orchestration: run every slot of a task, then report once.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};

use crate::callback::CallbackReporter;
use crate::models::{ArticleSlot, CallbackPayload, Task};
use crate::registry::TaskRegistry;
use crate::slot::SlotProcessor;

pub struct TaskRunner {
    slots: SlotProcessor,
    registry: Arc<TaskRegistry>,
    reporter: CallbackReporter,
}

impl TaskRunner {
    pub fn new(slots: SlotProcessor, registry: Arc<TaskRegistry>, reporter: CallbackReporter) -> Self {
        Self {
            slots,
            registry,
            reporter,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Process slots in index order, one at a time, sharing one excluded-URL
    /// set, then deliver exactly one callback.
    #[instrument(level = "info", skip_all, fields(task_id = %task.task_id, keyword = %task.keyword))]
    pub async fn run_task(&self, mut task: Task) -> CallbackPayload {
        let t0 = Instant::now();
        let queued_ms = (Utc::now() - task.created_at).num_milliseconds();
        info!(queued_ms, slots = task.slots.len(), "Task started");
        let mut excluded: HashSet<String> = HashSet::new();

        for index in 0..task.slots.len() {
            let slot = self.slots.process(&task.keyword, index, &mut excluded).await;
            task.slots[index] = slot;
        }
        debug_assert!(task.slots.iter().all(ArticleSlot::is_terminal));

        let payload = CallbackPayload::from_task(&task);
        let succeeded = task.succeeded().count();
        info!(
            status = ?payload.status(),
            succeeded,
            slots = task.slots.len(),
            urls_tried = excluded.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Task finished"
        );

        // Finish after delivery so a task counts as active until its callback is sent.
        self.reporter.deliver(&task.callback_address, &payload).await;
        self.registry
            .finish(&task.task_id, task.generation, payload.status());
        payload
    }
}
