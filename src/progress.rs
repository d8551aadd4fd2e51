// src/progress.rs

//! Progress reporting trait and implementations
//!
//! The merge reports coarse progress: one unit per input archive plus
//! two trailing steps. Implementations cover the usual output modes:
//! `CliProgress` (indicatif bar), `LogProgress` (tracing), and
//! `SilentProgress` for scripted use.

use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Core trait for progress tracking. Implementations are thread-safe so
/// callers may report from worker threads.
pub trait ProgressTracker: Send + Sync {
    /// Set the current status message.
    fn set_message(&self, message: &str);

    /// Set the total number of units.
    fn set_length(&self, length: u64);

    /// Advance by the given amount.
    fn increment(&self, amount: u64);

    /// Current position.
    fn position(&self) -> u64;

    /// Finish successfully with a message.
    fn finish_with_message(&self, message: &str);
}

/// No-op tracker for quiet or scripted usage.
#[derive(Debug, Default)]
pub struct SilentProgress {
    position: AtomicU64,
    length: AtomicU64,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressTracker for SilentProgress {
    fn set_message(&self, _message: &str) {}

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn increment(&self, amount: u64) {
        self.position.fetch_add(amount, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, _message: &str) {}
}

/// Logs progress through tracing, for non-interactive environments.
#[derive(Debug)]
pub struct LogProgress {
    prefix: String,
    position: AtomicU64,
    length: AtomicU64,
}

impl LogProgress {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            position: AtomicU64::new(0),
            length: AtomicU64::new(0),
        }
    }
}

impl ProgressTracker for LogProgress {
    fn set_message(&self, message: &str) {
        info!("{}: {}", self.prefix, message);
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn increment(&self, amount: u64) {
        let position = self.position.fetch_add(amount, Ordering::Relaxed) + amount;
        let length = self.length.load(Ordering::Relaxed);
        if length > 0 {
            info!("{}: {}/{}", self.prefix, position, length);
        }
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        info!("{}: {}", self.prefix, message);
    }
}

/// Visual progress bar for interactive terminals.
#[derive(Debug)]
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new(prefix: impl Into<String>) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_prefix(prefix.into());
        Self { bar }
    }
}

impl ProgressTracker for CliProgress {
    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn set_length(&self, length: u64) {
        self.bar.set_length(length);
    }

    fn increment(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn position(&self) -> u64 {
        self.bar.position()
    }

    fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}
