//! Recurring crawl tasks.
//!
//! A [`TaskManager`] owns the registry of tasks. Each task gets its own timer
//! loop that fires every `interval_secs`; a firing runs the task inline, so a
//! task never overlaps with itself, while different tasks run independently.
//! Manual runs through [`TaskManager::run_now`] are subject to the same
//! exclusion and fail with [`AppError::TaskBusy`] instead of waiting.

mod clock;
mod runner;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use clock::{Clock, ManualClock, SystemClock};

use crate::error::{AppError, Result};
use crate::models::{Config, TaskId, TaskRecord, TaskSpec};
use crate::pipeline::{ChangeSet, build_crawler};
use crate::utils::http::{HttpFetcher, PageFetcher};
use runner::{TaskRunner, TaskSlot};

struct TaskEntry {
    slot: Arc<TaskSlot>,
    trigger: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registry of recurring tasks and their timers.
///
/// Cloning yields another handle to the same registry. Creating tasks spawns
/// timer loops, so it must happen inside a Tokio runtime.
#[derive(Clone)]
pub struct TaskManager {
    tasks: Arc<DashMap<TaskId, TaskEntry>>,
    runner: Arc<TaskRunner>,
    shutdown: CancellationToken,
}

impl TaskManager {
    /// Create a manager that crawls over HTTP.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.crawler)?);
        Self::new(config, fetcher)
    }

    pub fn new(config: &Config, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        Self::with_clock(config, fetcher, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let crawler = build_crawler(config, fetcher)?;
        let runner = TaskRunner::new(
            crawler,
            clock,
            Duration::from_secs(config.crawler.crawl_timeout_secs),
        );

        Ok(Self {
            tasks: Arc::new(DashMap::new()),
            runner: Arc::new(runner),
            shutdown: CancellationToken::new(),
        })
    }

    /// Register a task and start its timer. The first run fires after one
    /// interval; use [`run_now`](Self::run_now) for an immediate run.
    pub fn create_task(&self, spec: TaskSpec) -> Result<TaskId> {
        if self.shutdown.is_cancelled() {
            return Err(AppError::ShutDown);
        }
        if spec.interval_secs == 0 {
            return Err(AppError::validation("interval_secs must be > 0"));
        }
        if spec.max_pages == 0 {
            return Err(AppError::validation("max_pages must be > 0"));
        }

        let id = TaskId::new();
        let interval = Duration::from_secs(spec.interval_secs);
        let record = TaskRecord::new(id, spec, self.runner.clock().now());
        let slot = Arc::new(TaskSlot::new(record));
        let trigger = self.shutdown.child_token();

        let handle = tokio::spawn(run_periodically(
            Arc::clone(&self.runner),
            Arc::clone(&slot),
            interval,
            trigger.clone(),
        ));

        self.tasks.insert(
            id,
            TaskEntry {
                slot,
                trigger,
                handle,
            },
        );
        log::info!("Created task {} (every {}s)", id, interval.as_secs());
        Ok(id)
    }

    /// Stop a task's timer, cancel any run in progress, and drop the task.
    ///
    /// Returns `false` if no such task exists.
    pub fn delete_task(&self, id: TaskId) -> bool {
        let Some(trigger) = self.tasks.get(&id).map(|entry| entry.trigger.clone()) else {
            return false;
        };
        trigger.cancel();

        match self.tasks.remove(&id) {
            Some((_, entry)) => {
                entry.handle.abort();
                log::info!("Deleted task {}", id);
                true
            }
            None => false,
        }
    }

    /// Snapshot of every task, oldest first.
    pub fn list_tasks(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self
            .tasks
            .iter()
            .map(|entry| entry.slot.record.lock().clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }

    /// Snapshot of one task.
    pub fn get_task(&self, id: TaskId) -> Option<TaskRecord> {
        self.tasks
            .get(&id)
            .map(|entry| entry.slot.record.lock().clone())
    }

    /// Whether a run of the task is in progress.
    pub fn is_running(&self, id: TaskId) -> Option<bool> {
        self.tasks.get(&id).map(|entry| entry.slot.is_running())
    }

    /// Run a task immediately, outside its timer.
    pub async fn run_now(&self, id: TaskId) -> Result<ChangeSet> {
        let (slot, trigger) = self
            .tasks
            .get(&id)
            .map(|entry| (Arc::clone(&entry.slot), entry.trigger.clone()))
            .ok_or(AppError::TaskNotFound(id))?;
        self.runner.execute(&slot, &trigger).await
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every timer and in-flight run, and clear the registry.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let ids: Vec<TaskId> = self.tasks.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, entry)) = self.tasks.remove(&id) {
                entry.handle.abort();
            }
        }
        log::info!("Task manager shut down");
    }
}

/// Timer loop for one task. The next firing is one interval after the previous
/// run ends, so ticks that fall inside a long run are dropped.
async fn run_periodically(
    runner: Arc<TaskRunner>,
    slot: Arc<TaskSlot>,
    interval: Duration,
    trigger: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = trigger.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match runner.execute(&slot, &trigger).await {
            Ok(_) => {}
            Err(AppError::TaskBusy(id)) => {
                log::warn!("Task {} still running, skipping scheduled run", id);
            }
            Err(AppError::Cancelled) => break,
            // Already recorded on the task.
            Err(_) => {}
        }
        ticker.reset();
    }
}
