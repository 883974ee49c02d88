//! Execution of a single task run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{FingerprintMap, TaskId, TaskRecord, TaskSpec, TaskStatus};
use crate::pipeline::{ChangeSet, detect_changes, render_tree};
use crate::scheduler::Clock;
use crate::services::{CrawlOptions, SiteCrawler};

/// Shared state of one registered task.
///
/// `running` admits at most one execution at a time; the record lock is only
/// held for short reads and writes, never across a crawl.
pub(crate) struct TaskSlot {
    pub(crate) record: Mutex<TaskRecord>,
    running: AtomicBool,
}

impl TaskSlot {
    pub(crate) fn new(record: TaskRecord) -> Self {
        Self {
            record: Mutex::new(record),
            running: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the slot and snapshot the inputs of a run.
    ///
    /// The snapshot is taken after the claim, so it always sees the baseline
    /// stored by the previous run.
    pub(crate) fn begin(&self) -> Result<RunStart<'_>> {
        let claimed = self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !claimed {
            return Err(AppError::TaskBusy(self.record.lock().id));
        }
        let guard = RunGuard(&self.running);

        let record = self.record.lock();
        Ok(RunStart {
            id: record.id,
            spec: record.spec.clone(),
            baseline: Arc::clone(&record.fingerprints),
            _guard: guard,
        })
    }
}

/// Inputs of a run in progress; the slot stays claimed while this lives.
pub(crate) struct RunStart<'a> {
    pub(crate) id: TaskId,
    pub(crate) spec: TaskSpec,
    pub(crate) baseline: Arc<FingerprintMap>,
    _guard: RunGuard<'a>,
}

/// Clears the running flag when a run ends, including on cancellation.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs tasks: crawl, compare against the baseline, and update the record.
pub(crate) struct TaskRunner {
    crawler: SiteCrawler,
    clock: Arc<dyn Clock>,
    crawl_timeout: Duration,
}

impl TaskRunner {
    pub(crate) fn new(crawler: SiteCrawler, clock: Arc<dyn Clock>, crawl_timeout: Duration) -> Self {
        Self {
            crawler,
            clock,
            crawl_timeout,
        }
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Execute one run of the task in `slot`.
    ///
    /// Output and fingerprints are replaced only when the crawl succeeded and
    /// found a change. A failed run records its error and leaves them intact.
    pub(crate) async fn execute(
        &self,
        slot: &TaskSlot,
        cancel: &CancellationToken,
    ) -> Result<ChangeSet> {
        let run = slot.begin()?;
        let (id, spec, baseline) = (run.id, &run.spec, &run.baseline);

        log::info!("Task {} started for {}", id, spec.base_url);
        let options = CrawlOptions::from_spec(spec);
        let crawl = self.crawler.crawl(&spec.base_url, &options, baseline, cancel);
        let outcome = match tokio::time::timeout(self.crawl_timeout, crawl).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(self.crawl_timeout.as_secs())),
        };

        let now = self.clock.now();
        let mut record = slot.record.lock();

        let result = match outcome {
            Ok(result) => result,
            Err(AppError::Cancelled) => {
                log::info!("Task {} cancelled", id);
                return Err(AppError::Cancelled);
            }
            Err(e) => {
                log::error!("Task {} failed: {}", id, e);
                record.last_run = Some(now);
                record.status = TaskStatus::Error {
                    message: e.to_string(),
                };
                return Err(e);
            }
        };

        let changes = detect_changes(baseline, &result.fingerprints);
        if changes.anything_changed() {
            log::info!(
                "Task {} detected changes: {} changed, {} added",
                id,
                changes.changed.len(),
                changes.added.len()
            );
            record.output = Some(Arc::new(render_tree(&result.tree)));
            record.fingerprints = Arc::new(result.fingerprints);
            record.last_changed = Some(now);
        } else {
            log::info!("Task {} found no changes", id);
        }

        record.last_run = Some(now);
        record.last_stats = Some(result.stats);
        record.status = TaskStatus::Completed;
        Ok(changes)
    }
}
