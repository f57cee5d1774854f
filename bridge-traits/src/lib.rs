//! # Host Bridge Traits
//!
//! Collaborator traits the sync engine depends on, plus the artifact model
//! shared between the engine and the repository providers.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync core and concrete
//! implementations. The core never talks to a server, a disk or the wall
//! clock directly; it is handed trait objects for each:
//!
//! ### Repositories
//! - [`RepositoryClient`](repository::RepositoryClient) - List, describe, download and upload assets
//! - [`Asset`](asset::Asset) - One artifact on one server
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP with basic auth, multipart and streaming
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Staging-area file I/O
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Implementations
//!
//! | Trait | Crate |
//! |-------|-------|
//! | `HttpClient`, `FileSystemAccess` | `bridge-desktop` |
//! | `RepositoryClient` | `provider-nexus` |
//! | `Clock` | [`SystemClock`](time::SystemClock), [`ManualClock`](time::ManualClock) |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Its variants
//! follow the collaborator taxonomy the engine's retry policy is keyed on:
//! `NotFound`, `Transient`, `MetadataUnavailable`, `Rejected`, `Malformed`
//! and `AttributeMissing`. See [`BridgeError::is_retryable`].
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! between worker tasks behind an `Arc`.

pub mod asset;
pub mod error;
pub mod http;
pub mod repository;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use asset::{is_metadata_file, Asset, AssetAttributes, AssetHashes, HashAlgorithm, MavenCoordinates};
pub use http::{HttpBody, HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartPart, RetryPolicy};
pub use repository::{ListingEntry, RepositoryClient};
pub use storage::FileSystemAccess;
pub use time::{Clock, LogLevel, ManualClock, SystemClock};
