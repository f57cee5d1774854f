//! # Job Dispatcher
//!
//! A fixed pool of workers fed from a bounded FIFO queue, driven by a single
//! control loop.
//!
//! ## Overview
//!
//! The control loop is the only owner of scheduling state. Workers report
//! back over an unbounded event channel:
//!
//! - `Idle` / `Busy` keep the idle count. When every worker is idle the idle
//!   timer is armed; any worker leaving idle disarms it.
//! - `Submit` carries follow-up jobs, appended to the backlog.
//! - `Failed` carries a [`JobError`]. Retryable failures under the retry
//!   ceiling go back to the tail of the queue; everything else is dropped.
//!
//! When the idle timer fires with nothing queued or in flight, the run is
//! complete: the dispatcher cancels its token and [`Dispatcher::run`]
//! returns. This is the only clean completion signal.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(DispatcherConfig::default(), handler, Arc::new(SystemClock));
//! let (report, seeded) = tokio::join!(dispatcher.run(), async {
//!     for job in jobs {
//!         dispatcher.submit(job).await?;
//!     }
//!     Ok::<_, SyncError>(())
//! });
//! ```

use crate::job::{Job, JobAction, JobError};
use crate::worker::{JobHandler, Worker};
use crate::{Result, SyncError};
use bridge_traits::Clock;
use core_runtime::config::MirrorConfig;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Attempts after the first one before a job is dropped
pub const MAX_RETRIES: u32 = 3;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_buffer: usize,
    pub idle_grace: Duration,
    pub max_retries: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: core_runtime::config::DEFAULT_WORKERS,
            queue_buffer: core_runtime::config::DEFAULT_QUEUE_BUFFER,
            idle_grace: core_runtime::config::DEFAULT_IDLE_GRACE,
            max_retries: MAX_RETRIES,
        }
    }
}

impl From<&MirrorConfig> for DispatcherConfig {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            workers: config.workers,
            queue_buffer: config.queue_buffer,
            idle_grace: config.idle_grace,
            max_retries: MAX_RETRIES,
        }
    }
}

// ============================================================================
// Events & Sink
// ============================================================================

#[derive(Debug)]
pub(crate) enum DispatchEvent {
    Idle(usize),
    Busy(usize),
    Submit(Job),
    Failed(JobError),
}

/// Handle workers use to schedule follow-up jobs
#[derive(Debug, Clone)]
pub struct JobSink {
    events: mpsc::UnboundedSender<DispatchEvent>,
    cancel: CancellationToken,
}

impl JobSink {
    pub(crate) fn new(events: mpsc::UnboundedSender<DispatchEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Queue `job` behind the work already scheduled
    ///
    /// Returns `false` if the dispatcher is cancelled and the job was discarded.
    pub fn submit(&self, job: Job) -> bool {
        if self.cancel.is_cancelled() {
            debug!(action = %job.action(), subject = %job.subject(), "Discarding follow-up job after cancellation");
            return false;
        }
        self.events.send(DispatchEvent::Submit(job)).is_ok()
    }
}

/// Counters shared between the control loop and the workers
#[derive(Debug, Default)]
pub(crate) struct DispatchStats {
    /// Jobs handed to the queue whose execution has not finished
    pub(crate) pending: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) idle_workers: AtomicUsize,
}

// ============================================================================
// Report
// ============================================================================

/// A job dropped after its last failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedJob {
    pub action: JobAction,
    pub subject: String,
    pub fails: u32,
    pub error: String,
}

/// What one dispatcher run did
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub submitted: u64,
    pub completed: u64,
    pub retried: u64,
    pub failed: Vec<FailedJob>,
}

// ============================================================================
// Dispatcher
// ============================================================================

type Timer<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

pub struct Dispatcher {
    config: DispatcherConfig,
    handler: Arc<dyn JobHandler>,
    clock: Arc<dyn Clock>,
    jobs_tx: mpsc::Sender<Job>,
    jobs_rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    events_tx: mpsc::UnboundedSender<DispatchEvent>,
    events_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<DispatchEvent>>>,
    cancel: CancellationToken,
    stats: Arc<DispatchStats>,
    submitted: AtomicU64,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, handler: Arc<dyn JobHandler>, clock: Arc<dyn Clock>) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(config.queue_buffer.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            config,
            handler,
            clock,
            jobs_tx,
            jobs_rx: Arc::new(Mutex::new(jobs_rx)),
            events_tx,
            events_rx: std::sync::Mutex::new(Some(events_rx)),
            cancel: CancellationToken::new(),
            stats: Arc::new(DispatchStats::default()),
            submitted: AtomicU64::new(0),
        }
    }

    /// Observe `token` instead of a private one, so a parent token can stop the run
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Sink for scheduling jobs from outside a worker
    pub fn sink(&self) -> JobSink {
        JobSink::new(self.events_tx.clone(), self.cancel.clone())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Idle workers as last seen by the control loop
    pub fn idle_workers(&self) -> usize {
        self.stats.idle_workers.load(Ordering::SeqCst)
    }

    /// Jobs finished successfully so far
    pub fn completed(&self) -> u64 {
        self.stats.completed.load(Ordering::SeqCst)
    }

    /// Enqueue `job`, waiting for queue capacity
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Cancelled` without enqueuing if the dispatcher is
    /// cancelled before capacity frees up.
    pub async fn submit(&self, job: Job) -> Result<()> {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SyncError::Cancelled),
            permit = self.jobs_tx.reserve() => permit
                .map_err(|_| SyncError::DispatcherState("job queue closed".to_string()))?,
        };

        self.stats.pending.fetch_add(1, Ordering::SeqCst);
        self.submitted.fetch_add(1, Ordering::Relaxed);
        permit.send(job);
        Ok(())
    }

    /// Stop the control loop and every worker. Safe to call repeatedly.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!("Shutting down dispatcher");
        }
        self.cancel.cancel();
    }

    /// Run workers and the control loop until the work is exhausted or the
    /// dispatcher is cancelled
    ///
    /// # Errors
    ///
    /// - `SyncError::Cancelled` if the run was shut down from outside
    /// - `SyncError::Enumeration` if an enumeration job was dropped
    /// - `SyncError::DispatcherState` if the dispatcher already ran
    #[instrument(skip(self), fields(workers = self.config.workers))]
    pub async fn run(&self) -> Result<DispatchReport> {
        let events_rx = self
            .events_rx
            .lock()
            .map_err(|_| SyncError::DispatcherState("event receiver poisoned".to_string()))?
            .take()
            .ok_or_else(|| SyncError::DispatcherState("dispatcher already ran".to_string()))?;

        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            let worker = Worker::new(
                id,
                Arc::clone(&self.handler),
                Arc::clone(&self.jobs_rx),
                self.events_tx.clone(),
                self.cancel.clone(),
                Arc::clone(&self.stats),
            );
            workers.spawn(worker.run());
        }

        let mut report = DispatchReport::default();
        let outcome = self.control_loop(events_rx, &mut report).await;

        self.cancel.cancel();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }

        report.submitted += self.submitted.load(Ordering::Relaxed);
        report.completed = self.stats.completed.load(Ordering::SeqCst);

        info!(
            submitted = report.submitted,
            completed = report.completed,
            retried = report.retried,
            failed = report.failed.len(),
            "Dispatcher stopped"
        );

        outcome.map(|()| report)
    }

    async fn control_loop(
        &self,
        mut events: mpsc::UnboundedReceiver<DispatchEvent>,
        report: &mut DispatchReport,
    ) -> Result<()> {
        let mut backlog: VecDeque<Job> = VecDeque::new();
        let mut idle = 0usize;
        let mut timer: Option<Timer<'_>> = None;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    return Err(SyncError::Cancelled);
                }

                Some(event) = events.recv() => match event {
                    DispatchEvent::Idle(worker) => {
                        idle += 1;
                        self.stats.idle_workers.store(idle, Ordering::SeqCst);
                        if idle == self.config.workers {
                            debug!(worker, "All workers idle, arming idle timer");
                            timer = Some(self.clock.sleep(self.config.idle_grace));
                        }
                    }
                    DispatchEvent::Busy(_) => {
                        idle = idle.saturating_sub(1);
                        self.stats.idle_workers.store(idle, Ordering::SeqCst);
                        timer = None;
                    }
                    DispatchEvent::Submit(job) => {
                        report.submitted += 1;
                        backlog.push_back(job);
                    }
                    DispatchEvent::Failed(failure) => {
                        if let Some(job) = self.on_failure(failure, report)? {
                            backlog.push_back(job);
                        }
                    }
                },

                permit = self.jobs_tx.reserve(), if !backlog.is_empty() => {
                    let permit = permit
                        .map_err(|_| SyncError::DispatcherState("job queue closed".to_string()))?;
                    if let Some(job) = backlog.pop_front() {
                        self.stats.pending.fetch_add(1, Ordering::SeqCst);
                        permit.send(job);
                    }
                }

                _ = wait_timer(&mut timer) => {
                    let drained = backlog.is_empty()
                        && events.is_empty()
                        && self.stats.pending.load(Ordering::SeqCst) == 0;
                    if drained {
                        info!(grace = ?self.config.idle_grace, "No work left, finishing");
                        self.cancel.cancel();
                        return Ok(());
                    }
                    timer = Some(self.clock.sleep(self.config.idle_grace));
                }
            }
        }
    }

    /// Decide the fate of a failed job; `Some` means schedule it again
    fn on_failure(&self, failure: JobError, report: &mut DispatchReport) -> Result<Option<Job>> {
        let retry = failure.error().is_retryable() && failure.job().fails() <= self.config.max_retries;
        if retry {
            warn!(
                attempt = failure.job().fails(),
                max_retries = self.config.max_retries,
                "{failure}; retrying"
            );
            report.retried += 1;
            let (job, _) = failure.into_parts();
            return Ok(Some(job));
        }

        error!("{failure}; giving up");
        let (job, error) = failure.into_parts();
        report.failed.push(FailedJob {
            action: job.action(),
            subject: job.subject(),
            fails: job.fails(),
            error: error.to_string(),
        });

        if job.action() == JobAction::EnumerateTree {
            return Err(SyncError::Enumeration {
                repository: job.repository().map(|r| r.name().to_string()).unwrap_or_default(),
                message: error.to_string(),
            });
        }

        Ok(None)
    }
}

async fn wait_timer(timer: &mut Option<Timer<'_>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
