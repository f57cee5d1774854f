//! Time Abstractions
//!
//! Provides an injectable time source so timer-driven behaviour (the
//! dispatcher's idle grace period) can be exercised deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Time source trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// async fn wait_grace(clock: &dyn Clock) {
///     clock.sleep(std::time::Duration::from_secs(5)).await;
///     println!("Grace period over at {}", clock.now());
/// }
/// ```
#[async_trait]
pub trait Clock: Send + Sync {
    /// Get current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Suspend until `duration` has elapsed on this clock
    async fn sleep(&self, duration: Duration);

    /// Get current Unix timestamp in seconds
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

/// System clock implementation using actual system time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when told to
///
/// Sleeps complete once [`advance`](ManualClock::advance) has moved the clock
/// past their deadline.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps_started: AtomicUsize,
    wake: Notify,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps_started: AtomicUsize::new(0),
            wake: Notify::new(),
        }
    }

    /// Move the clock forward and wake every sleeper whose deadline passed
    pub fn advance(&self, duration: Duration) {
        let step = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        if let Ok(mut now) = self.now.lock() {
            *now = now.checked_add_signed(step).unwrap_or(*now);
        }
        self.wake.notify_waiters();
    }

    /// Number of `sleep` calls made so far
    pub fn sleeps_started(&self) -> usize {
        self.sleeps_started.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }

    async fn sleep(&self, duration: Duration) {
        let step = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let deadline = self.now().checked_add_signed(step);
        let mut counted = false;
        loop {
            let notified = self.wake.notified();
            if !counted {
                self.sleeps_started.fetch_add(1, Ordering::SeqCst);
                counted = true;
            }
            match deadline {
                Some(deadline) if self.now() >= deadline => return,
                _ => notified.await,
            }
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}
