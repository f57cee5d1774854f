//! Worker tasks of the dispatcher pool.
//!
//! A worker never touches dispatcher state directly. It reports idle and busy
//! transitions, follow-up jobs and failures as events and leaves every
//! scheduling decision to the control loop.

use crate::dispatcher::{DispatchEvent, DispatchStats, JobSink};
use crate::job::Job;
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Executes one job
///
/// Handlers never retry internally. Any error they return is handed back to
/// the dispatcher, which decides whether the job runs again.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run `job`, submitting follow-up work through `sink`
    async fn handle(&self, job: &mut Job, sink: &JobSink) -> Result<()>;
}

pub(crate) struct Worker {
    id: usize,
    handler: Arc<dyn JobHandler>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    events: mpsc::UnboundedSender<DispatchEvent>,
    cancel: CancellationToken,
    stats: Arc<DispatchStats>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        handler: Arc<dyn JobHandler>,
        jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
        events: mpsc::UnboundedSender<DispatchEvent>,
        cancel: CancellationToken,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            id,
            handler,
            jobs,
            events,
            cancel,
            stats,
        }
    }

    pub(crate) async fn run(self) {
        let sink = JobSink::new(self.events.clone(), self.cancel.clone());

        loop {
            if self.events.send(DispatchEvent::Idle(self.id)).is_err() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                job = async { self.jobs.lock().await.recv().await } => job,
            };
            let Some(job) = next else {
                break;
            };

            if self.events.send(DispatchEvent::Busy(self.id)).is_err() {
                break;
            }

            self.execute(job, &sink).await;
        }

        trace!(worker = self.id, "Worker stopped");
    }

    async fn execute(&self, mut job: Job, sink: &JobSink) {
        if let Err(e) = job.begin() {
            warn!(worker = self.id, job = %job.id(), error = %e, "Discarding job in unexpected state");
            self.stats.pending.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        debug!(worker = self.id, action = %job.action(), subject = %job.subject(), "Running job");

        match self.handler.handle(&mut job, sink).await {
            Ok(()) => {
                if let Err(e) = job.complete() {
                    warn!(worker = self.id, job = %job.id(), error = %e, "Job finished in unexpected state");
                }
                self.stats.completed.fetch_add(1, Ordering::SeqCst);
            }
            Err(error) => {
                let failed = job.fail(error);
                if self.cancel.is_cancelled() {
                    debug!(worker = self.id, "{failed}; discarded after cancellation");
                } else {
                    let _ = self.events.send(DispatchEvent::Failed(failed));
                }
            }
        }

        self.stats.pending.fetch_sub(1, Ordering::SeqCst);
    }
}
