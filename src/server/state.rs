//! Shared state handed to every request handler.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::Config;
use crate::orchestrator::TaskRunner;
use crate::registry::TaskRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub runner: Arc<TaskRunner>,
    pub registry: Arc<TaskRegistry>,
    /// Caps how many accepted tasks run their pipeline at once.
    pub task_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Arc<Config>, runner: Arc<TaskRunner>) -> Self {
        let registry = runner.registry().clone();
        let task_permits = Arc::new(Semaphore::new(config.server.max_concurrent_tasks.max(1)));
        Self {
            config,
            runner,
            registry,
            task_permits,
        }
    }
}
