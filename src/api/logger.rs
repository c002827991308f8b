//! Deployment progress logging.
//!
//! The engine reports one human-readable line per applied change through a
//! [`DeploymentLogger`]. Diagnostics go through `tracing` as usual.

use std::sync::Mutex;
use tracing::info;

/// Sink for deployment progress lines.
pub trait DeploymentLogger: Send + Sync {
    /// Records a progress line.
    fn info(&self, message: &str);
}

/// Logger forwarding progress lines to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

/// Logger keeping progress lines in memory, optionally forwarding them.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<String>>,
    forward: bool,
}

impl TracingLogger {
    /// Creates a tracing logger.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DeploymentLogger for TracingLogger {
    fn info(&self, message: &str) {
        info!(target: "bundle_deploy::progress", "{message}");
    }
}

impl RecordingLogger {
    /// Creates a logger that only records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a logger that records and also forwards to `tracing`.
    #[must_use]
    pub fn forwarding() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            forward: true,
        }
    }

    /// Returns the recorded lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl DeploymentLogger for RecordingLogger {
    fn info(&self, message: &str) {
        if self.forward {
            TracingLogger.info(message);
        }
        match self.lines.lock() {
            Ok(mut lines) => lines.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
    }
}
