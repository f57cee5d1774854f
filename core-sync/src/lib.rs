//! # Mirror Engine
//!
//! Copies the artifacts a destination repository is missing from a source
//! repository.
//!
//! ## Overview
//!
//! A run enumerates both repositories concurrently, diffs the inventories by
//! name and strong checksum, and pushes each missing asset through a
//! download → upload → delete pipeline. All work is expressed as [`Job`]s
//! executed by a fixed worker pool under a single dispatcher control loop.
//!
//! ## Components
//!
//! - **Jobs** (`job`): typed payloads with a validated status machine
//! - **Dispatcher** (`dispatcher`, `worker`): bounded FIFO queue, retry
//!   ceiling and idle-based completion
//! - **Pipeline** (`pipeline`): what each job action does
//! - **Diff Engine** (`diff`): decides what has to be transferred
//! - **Inventories** (`repository`) and the **Staging Area** (`staging`)
//! - **Coordinator** (`coordinator`): phases of one mirroring run

pub mod coordinator;
pub mod diff;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod repository;
pub mod staging;
pub mod worker;

pub use coordinator::{MirrorCoordinator, MirrorSummary, ShutdownHandle};
pub use diff::{DiffEngine, DiffOptions, DiffReport};
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherConfig, FailedJob, JobSink, MAX_RETRIES};
pub use error::{Result, SyncError};
pub use job::{Job, JobAction, JobError, JobId, JobPayload, JobStatus};
pub use pipeline::{MirrorHandler, TransferOptions};
pub use repository::SyncRepository;
pub use staging::StagingArea;
pub use worker::JobHandler;
