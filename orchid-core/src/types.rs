//! Strongly-typed identifiers for Orchid entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a node within a graph.
///
/// Node ids are caller-chosen strings, assigned at construction time and
/// stable across executions. They key every per-node map in the engine,
/// including the execution snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id from a string key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw string key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render a `node.slot` key, the form used for named outputs.
    pub fn slot_key(&self, slot: &str) -> String {
        format!("{}.{}", self.0, slot)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Unique identifier for a single scheduler run.
///
/// A fresh id is minted per invocation; it tags tracing spans and the
/// terminal events of that run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse a run id from a string.
    ///
    /// Returns `None` if the string is not a valid UUID.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display_is_raw_key() {
        let id = NodeId::new("validate");
        assert_eq!(format!("{}", id), "validate");
        assert_eq!(id.as_str(), "validate");
    }

    #[test]
    fn node_id_slot_key() {
        let id = NodeId::new("splitter");
        assert_eq!(id.slot_key("left"), "splitter.left");
    }

    #[test]
    fn node_id_serializes_as_plain_string() {
        let id = NodeId::new("n1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"n1\"");
    }

    #[test]
    fn run_id_uniqueness() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn run_id_display() {
        let id = RunId::new();
        assert!(format!("{}", id).starts_with("run_"));
    }
}
