//! Execution snapshot for persistence and resume.
//!
//! A snapshot records which nodes completed or failed, their results, and
//! named sub-outputs. The scheduler hydrates its live state from the
//! snapshot at run start and flushes back after every node transition, so
//! the snapshot always reflects the most recently fully-processed node even
//! if the process dies mid-run. The caller owns serialization format and
//! lifetime; there is no versioning or migration.

use crate::error::{OrchidError, Result};
use crate::types::NodeId;
use crate::value::Value;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// A snapshot shared between the caller and the scheduler.
///
/// The scheduler locks it only briefly, between node completions.
pub type SharedSnapshot = Arc<Mutex<ExecutionSnapshot>>;

/// Serializable record of per-node completion, failure, and results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    /// Nodes that completed successfully.
    #[serde(default)]
    pub completed: HashSet<NodeId>,
    /// Nodes that failed (including synthesized dependency failures).
    #[serde(default)]
    pub failed: HashSet<NodeId>,
    /// Result value of each completed node.
    #[serde(default)]
    pub results: HashMap<NodeId, Value>,
    /// Per-slot values of multi-output nodes, keyed `"node.slot"`.
    #[serde(default)]
    pub named_outputs: HashMap<String, Value>,
    /// Captured error description of each failed node.
    #[serde(default)]
    pub errors: HashMap<NodeId, String>,
}

impl ExecutionSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.failed.is_empty()
    }

    /// Whether the given node already finished (completed or failed).
    pub fn is_done(&self, id: &NodeId) -> bool {
        self.completed.contains(id) || self.failed.contains(id)
    }

    /// Discard everything recorded, e.g. after a fully successful run.
    pub fn clear(&mut self) {
        self.completed.clear();
        self.failed.clear();
        self.results.clear();
        self.named_outputs.clear();
        self.errors.clear();
    }

    /// Remove all record of a single node, forcing it to re-run on resume.
    pub fn forget(&mut self, id: &NodeId) {
        self.completed.remove(id);
        self.failed.remove(id);
        self.results.remove(id);
        self.errors.remove(id);
        let prefix = format!("{}.", id);
        self.named_outputs.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Wrap into the shared handle the scheduler consumes.
    pub fn into_shared(self) -> SharedSnapshot {
        Arc::new(Mutex::new(self))
    }

    /// Create an empty shared snapshot.
    pub fn shared() -> SharedSnapshot {
        Self::new().into_shared()
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| OrchidError::Serialization(format!("failed to serialize snapshot: {}", e)))
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| OrchidError::Serialization(format!("failed to parse snapshot: {}", e)))
    }

    /// Persist to a file atomically (write to a temp file, then rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let io_err = |e: std::io::Error| OrchidError::SnapshotIo {
            path: path.to_path_buf(),
            cause: e.to_string(),
        };

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        file.persist(path).map_err(|e| OrchidError::SnapshotIo {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from a file previously written with [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| OrchidError::SnapshotIo {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        Self::from_json(&json)
    }
}
