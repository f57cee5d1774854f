//! # Pipeline Jobs
//!
//! The unit of work the dispatcher schedules and its failure wrapper.
//!
//! ## Overview
//!
//! A [`Job`] carries a typed [`JobPayload`] (one variant per action) together
//! with its status and failure count. Jobs are moved by value between the
//! dispatcher, the queue and exactly one worker at a time, so status and
//! counter updates never race.
//!
//! ## State Machine
//!
//! ```text
//! Created → Pending → Done
//!              ↓  ↑
//!            Failed (retried) → dropped
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{Job, JobStatus};
//!
//! let mut job = Job::download(source, destination, asset);
//! job.begin()?;
//! assert_eq!(job.status(), JobStatus::Pending);
//! job.complete()?;
//! ```

use crate::repository::SyncRepository;
use crate::{Result, SyncError};
use bridge_traits::Asset;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Action & Status
// ============================================================================

/// What a job does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobAction {
    EnumerateTree,
    FetchAssetInfo,
    DownloadAsset,
    UploadAsset,
    DeleteStaged,
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAction::EnumerateTree => "enumerate_tree",
            JobAction::FetchAssetInfo => "fetch_asset_info",
            JobAction::DownloadAsset => "download_asset",
            JobAction::UploadAsset => "upload_asset",
            JobAction::DeleteStaged => "delete_staged",
        }
    }
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Built but never picked up
    Created,
    /// Picked up by a worker
    Pending,
    /// Finished successfully
    Done,
    /// Last attempt failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Pending => "pending",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Typed inputs of each action
#[derive(Debug)]
pub enum JobPayload {
    EnumerateTree {
        repository: Arc<SyncRepository>,
        node: String,
    },
    FetchAssetInfo {
        repository: Arc<SyncRepository>,
        asset: Asset,
    },
    DownloadAsset {
        source: Arc<SyncRepository>,
        destination: Arc<SyncRepository>,
        asset: Asset,
    },
    UploadAsset {
        destination: Arc<SyncRepository>,
        asset: Asset,
    },
    DeleteStaged {
        asset: Asset,
    },
}

impl JobPayload {
    pub fn action(&self) -> JobAction {
        match self {
            JobPayload::EnumerateTree { .. } => JobAction::EnumerateTree,
            JobPayload::FetchAssetInfo { .. } => JobAction::FetchAssetInfo,
            JobPayload::DownloadAsset { .. } => JobAction::DownloadAsset,
            JobPayload::UploadAsset { .. } => JobAction::UploadAsset,
            JobPayload::DeleteStaged { .. } => JobAction::DeleteStaged,
        }
    }
}

// ============================================================================
// Job Entity
// ============================================================================

/// A schedulable unit of work
#[derive(Debug)]
pub struct Job {
    id: JobId,
    payload: JobPayload,
    status: JobStatus,
    fails: u32,
}

impl Job {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: JobId::new(),
            payload,
            status: JobStatus::Created,
            fails: 0,
        }
    }

    /// List one node of `repository`
    pub fn enumerate_tree(repository: Arc<SyncRepository>, node: impl Into<String>) -> Self {
        Self::new(JobPayload::EnumerateTree {
            repository,
            node: node.into(),
        })
    }

    /// Attach attributes to `asset` and record it in the inventory of `repository`
    pub fn fetch_asset_info(repository: Arc<SyncRepository>, asset: Asset) -> Self {
        Self::new(JobPayload::FetchAssetInfo { repository, asset })
    }

    pub fn download(
        source: Arc<SyncRepository>,
        destination: Arc<SyncRepository>,
        asset: Asset,
    ) -> Self {
        Self::new(JobPayload::DownloadAsset {
            source,
            destination,
            asset,
        })
    }

    pub fn upload(destination: Arc<SyncRepository>, asset: Asset) -> Self {
        Self::new(JobPayload::UploadAsset { destination, asset })
    }

    pub fn delete_staged(asset: Asset) -> Self {
        Self::new(JobPayload::DeleteStaged { asset })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn action(&self) -> JobAction {
        self.payload.action()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Number of failed attempts so far
    pub fn fails(&self) -> u32 {
        self.fails
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut JobPayload {
        &mut self.payload
    }

    /// Asset the job works on, if any
    pub fn asset(&self) -> Option<&Asset> {
        match &self.payload {
            JobPayload::EnumerateTree { .. } => None,
            JobPayload::FetchAssetInfo { asset, .. }
            | JobPayload::DownloadAsset { asset, .. }
            | JobPayload::UploadAsset { asset, .. }
            | JobPayload::DeleteStaged { asset } => Some(asset),
        }
    }

    /// Repository the job talks to, if any
    pub fn repository(&self) -> Option<&SyncRepository> {
        match &self.payload {
            JobPayload::EnumerateTree { repository, .. }
            | JobPayload::FetchAssetInfo { repository, .. } => Some(repository),
            JobPayload::DownloadAsset { source, .. } => Some(source),
            JobPayload::UploadAsset { destination, .. } => Some(destination),
            JobPayload::DeleteStaged { .. } => None,
        }
    }

    /// Short human-readable description of what the job is about
    pub fn subject(&self) -> String {
        match &self.payload {
            JobPayload::EnumerateTree { repository, node } => {
                format!("{}:{}", repository.name(), node)
            }
            _ => self.asset().map(|a| a.name().to_string()).unwrap_or_default(),
        }
    }

    /// Mark the job as picked up by a worker
    ///
    /// # Errors
    ///
    /// Returns an error if the job already finished
    pub fn begin(&mut self) -> Result<()> {
        self.transition(JobStatus::Pending)
    }

    /// Mark the job as finished successfully
    pub fn complete(&mut self) -> Result<()> {
        self.transition(JobStatus::Done)
    }

    /// Record a failed attempt and pair the job with its error
    pub fn fail(mut self, error: SyncError) -> JobError {
        self.status = JobStatus::Failed;
        self.fails += 1;
        JobError { job: self, error }
    }

    fn transition(&mut self, to: JobStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (JobStatus::Created, JobStatus::Pending)
                | (JobStatus::Failed, JobStatus::Pending)
                | (JobStatus::Pending, JobStatus::Done)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        self.status = to;
        Ok(())
    }
}

// ============================================================================
// Job Error
// ============================================================================

/// A failed job together with the error that failed it
#[derive(Debug)]
pub struct JobError {
    job: Job,
    error: SyncError,
}

impl JobError {
    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn error(&self) -> &SyncError {
        &self.error
    }

    pub fn into_parts(self) -> (Job, SyncError) {
        (self.job, self.error)
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} failed (attempt {}): {}",
            self.job.action(),
            self.job.subject(),
            self.job.fails(),
            self.error
        )
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
