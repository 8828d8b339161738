//! Execution events streamed to the caller during a run.
//!
//! Every event carries a kind and timestamp; the scheduler tags events with
//! the node id and graph name before they reach the caller, and its own
//! terminal event carries the run's completed/failed node summary.

use crate::types::{NodeId, RunId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Log severity level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Fine-grained debugging information.
    Trace,
    /// Debugging information.
    Debug,
    /// Informational messages.
    #[default]
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl LogLevel {
    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of an execution event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Emitted immediately before a node's runnable is invoked.
    NodeStarted,
    /// Emitted after a node's runnable returned successfully.
    NodeCompleted,
    /// Emitted after a node's runnable failed or was failed by the scheduler.
    NodeFailed,
    /// A log-style progress event emitted by a node itself.
    Log,
    /// Terminal event of a successful run; carries the node summary.
    GraphCompleted,
    /// Terminal event of an aborted run; emitted before the error is raised.
    GraphFailed,
}

impl EventKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeStarted => "node_started",
            Self::NodeCompleted => "node_completed",
            Self::NodeFailed => "node_failed",
            Self::Log => "log",
            Self::GraphCompleted => "graph_completed",
            Self::GraphFailed => "graph_failed",
        }
    }

    /// Whether this kind ends the event stream of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GraphCompleted | Self::GraphFailed)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An execution event with correlation ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Timestamp in nanoseconds since UNIX epoch.
    pub timestamp_ns: u64,
    /// Log severity level.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Node the event belongs to (injected by the scheduler).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Name of the graph being executed (injected by the scheduler).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_name: Option<String>,
    /// Id of the scheduler run (injected by the scheduler).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Structured fields for additional context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,
    /// Nodes completed so far; set on terminal events only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_nodes: Option<Vec<NodeId>>,
    /// Nodes failed so far; set on terminal events only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_nodes: Option<Vec<NodeId>>,
}

impl ExecEvent {
    /// Create a new event with the current timestamp.
    pub fn new(kind: EventKind, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp_ns: current_timestamp_ns(),
            level,
            message: message.into(),
            node_id: None,
            graph_name: None,
            run_id: None,
            fields: HashMap::new(),
            completed_nodes: None,
            failed_nodes: None,
        }
    }

    /// Event bracketing the start of a node invocation.
    pub fn node_started(node_id: &NodeId) -> Self {
        Self::new(
            EventKind::NodeStarted,
            LogLevel::Info,
            format!("starting execution of node '{}'", node_id),
        )
        .with_node_id(node_id.clone())
    }

    /// Event bracketing a successful node invocation.
    pub fn node_completed(node_id: &NodeId) -> Self {
        Self::new(
            EventKind::NodeCompleted,
            LogLevel::Info,
            format!("completed execution of node '{}'", node_id),
        )
        .with_node_id(node_id.clone())
    }

    /// Event bracketing a failed node invocation.
    pub fn node_failed(node_id: &NodeId, error: &str) -> Self {
        Self::new(
            EventKind::NodeFailed,
            LogLevel::Error,
            format!("node '{}' failed: {}", node_id, error),
        )
        .with_node_id(node_id.clone())
        .with_field("error", error)
    }

    /// A log-style event, as emitted by nodes themselves.
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::new(EventKind::Log, level, message)
    }

    /// Terminal event of a successful run.
    pub fn graph_completed(completed: Vec<NodeId>, failed: Vec<NodeId>) -> Self {
        let mut event = Self::new(
            EventKind::GraphCompleted,
            LogLevel::Info,
            "graph execution completed",
        );
        event.completed_nodes = Some(completed);
        event.failed_nodes = Some(failed);
        event
    }

    /// Terminal event of an aborted run.
    pub fn graph_failed(error: &str, completed: Vec<NodeId>, failed: Vec<NodeId>) -> Self {
        let mut event = Self::new(
            EventKind::GraphFailed,
            LogLevel::Error,
            format!("graph execution failed: {}", error),
        );
        event.completed_nodes = Some(completed);
        event.failed_nodes = Some(failed);
        event
    }

    /// Set the node id.
    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Set the graph name.
    pub fn with_graph_name(mut self, name: impl Into<String>) -> Self {
        self.graph_name = Some(name.into());
        self
    }

    /// Set the run id.
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Add a string field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .insert(key.into(), serde_json::Value::String(value.into()));
        self
    }

    /// Add a JSON value field.
    pub fn with_field_json(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Get the timestamp as an ISO 8601 string.
    pub fn timestamp_iso(&self) -> String {
        let secs = self.timestamp_ns / 1_000_000_000;
        let nanos = (self.timestamp_ns % 1_000_000_000) as u32;

        if let Some(datetime) = chrono::DateTime::from_timestamp(secs as i64, nanos) {
            datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
        } else {
            format!("{}ns", self.timestamp_ns)
        }
    }

    /// Whether this event ends the run's event stream.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

/// Get current timestamp in nanoseconds since UNIX epoch.
fn current_timestamp_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parsing() {
        assert_eq!(LogLevel::parse("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("Error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("nope"), None);
    }

    #[test]
    fn log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn node_events_are_tagged() {
        let id = NodeId::new("validate");
        let event = ExecEvent::node_started(&id).with_graph_name("pipeline");

        assert_eq!(event.kind, EventKind::NodeStarted);
        assert_eq!(event.node_id, Some(id));
        assert_eq!(event.graph_name, Some("pipeline".to_string()));
        assert!(event.message.contains("validate"));
    }

    #[test]
    fn terminal_event_carries_summary() {
        let event = ExecEvent::graph_completed(
            vec![NodeId::new("a"), NodeId::new("b")],
            vec![NodeId::new("c")],
        );
        assert!(event.is_terminal());
        assert_eq!(event.completed_nodes.as_ref().unwrap().len(), 2);
        assert_eq!(event.failed_nodes.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = ExecEvent::node_failed(&NodeId::new("n"), "boom")
            .with_graph_name("g")
            .with_run_id(RunId::new());

        let json = serde_json::to_string(&event).unwrap();
        let parsed: ExecEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.kind, EventKind::NodeFailed);
        assert_eq!(parsed.level, LogLevel::Error);
        assert_eq!(parsed.node_id, Some(NodeId::new("n")));
        assert!(parsed.fields.contains_key("error"));
    }

    #[test]
    fn timestamp_renders_iso() {
        let event = ExecEvent::log(LogLevel::Info, "hello");
        let iso = event.timestamp_iso();
        assert!(iso.ends_with('Z'));
        assert!(iso.contains('T'));
    }
}
