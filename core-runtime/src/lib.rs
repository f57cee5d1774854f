//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the mirror:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions and the validated configuration
//! every other crate receives at construction time.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
