//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (Linux, macOS, Windows).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the I/O bridge
//! traits:
//! - `HttpClient` using `reqwest` (rustls, multipart, streaming bodies)
//! - `FileSystemAccess` using `tokio::fs`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HttpClientOptions, ReqwestHttpClient, TokioFileSystem};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::with_options(HttpClientOptions {
//!         timeout: Duration::from_secs(30),
//!         ..Default::default()
//!     })?;
//!     let fs = TokioFileSystem::new();
//!
//!     // Hand both to the repository connectors and the staging area
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;

pub use filesystem::TokioFileSystem;
pub use http::{HttpClientOptions, ReqwestHttpClient};
