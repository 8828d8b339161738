//! Construction-time diagnostics collector.
//!
//! Soft schema issues (presence gaps, optional/required mismatches,
//! multi-output validation limits, partial overlaps) never block graph
//! construction. They are written here and to `tracing`, not to the
//! execution event stream.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of diagnostics kept in the ring buffer.
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 1024;

/// A single construction-time warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// When the warning was recorded.
    pub timestamp: DateTime<Utc>,
    /// The warning text.
    pub message: String,
}

/// Thread-safe bounded buffer of construction-time warnings.
pub struct DiagnosticsCollector {
    buffer: RwLock<VecDeque<Diagnostic>>,
    capacity: usize,
}

impl DiagnosticsCollector {
    /// Create a collector with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
        }
    }

    /// Record a warning, evicting the oldest entry when full.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "orchid::diagnostics", "{}", message);

        let mut buffer = self.buffer.write();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(Diagnostic {
            timestamp: Utc::now(),
            message,
        });
    }

    /// Get all buffered diagnostics, oldest first.
    pub fn all(&self) -> Vec<Diagnostic> {
        self.buffer.read().iter().cloned().collect()
    }

    /// Get all buffered warning messages, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.buffer.read().iter().map(|d| d.message.clone()).collect()
    }

    /// Get the most recent N diagnostics, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Diagnostic> {
        self.buffer.read().iter().rev().take(limit).cloned().collect()
    }

    /// Number of buffered diagnostics.
    pub fn len(&self) -> usize {
        self.buffer.read().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.read().is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&self) {
        self.buffer.write().clear();
    }
}

impl Default for DiagnosticsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTIC_CAPACITY)
    }
}

impl std::fmt::Debug for DiagnosticsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsCollector")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
