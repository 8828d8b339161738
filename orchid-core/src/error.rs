//! Error types for Orchid.
//!
//! This module provides strongly-typed errors with actionable context.
//! Construction errors carry the identifiers that caused them; runtime
//! errors carry the node they originated from.

use crate::types::NodeId;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Orchid operations.
#[derive(Error, Debug)]
pub enum OrchidError {
    // =========================================================================
    // Graph Construction Errors (E001-E099)
    // =========================================================================
    /// A node with the same id was already registered.
    #[error("E001: Duplicate node '{id}': a node with this id already exists")]
    DuplicateNode {
        /// The id that was registered twice.
        id: NodeId,
    },

    /// A referenced node does not exist in the graph.
    #[error("E002: Unknown node '{id}': no node with this id has been added")]
    UnknownNode {
        /// The id that could not be resolved.
        id: NodeId,
    },

    /// The graph contains a directed cycle.
    #[error("E003: Graph has a cycle involving nodes: {}", format_node_list(.nodes))]
    GraphHasCycle {
        /// Nodes participating in the cycle.
        nodes: Vec<NodeId>,
    },

    /// The graph is not in an executable state.
    #[error("E004: Graph is not executable: {cause}")]
    NotExecutable {
        /// Why the graph cannot be executed.
        cause: String,
    },

    // =========================================================================
    // Schema Errors (E100-E199)
    // =========================================================================
    /// A connection's declared output/input shapes are provably incompatible.
    #[error("E101: Schema incompatible: {from} \u{2192} {to}: {details}")]
    SchemaIncompatible {
        /// The producing endpoint, as `node.slot`.
        from: String,
        /// The consuming endpoint, as `node.slot`.
        to: String,
        /// The hard errors reported by the compatibility check.
        details: String,
    },

    // =========================================================================
    // Execution Errors (E200-E299)
    // =========================================================================
    /// A node failed during execution.
    #[error("E201: Node '{node_id}' failed: {cause}")]
    NodeExecution {
        /// The node that failed.
        node_id: NodeId,
        /// Reason for the failure.
        cause: String,
    },

    /// A multi-output node's result did not contain a declared output slot.
    #[error("E202: Node '{node_id}' missing expected output '{slot}'")]
    MissingOutput {
        /// The node whose result was incomplete.
        node_id: NodeId,
        /// The declared slot absent from the result object.
        slot: String,
    },

    /// A node task panicked or was torn down by the runtime.
    #[error("E203: Node task aborted abnormally: {cause}")]
    NodePanic {
        /// Description of the abnormal termination.
        cause: String,
    },

    /// No node can make progress but unfinished nodes remain.
    #[error("E204: Execution deadlocked; no runnable nodes remain:\n{details}")]
    Deadlock {
        /// Per-node explanation of what each stuck node is waiting on.
        details: String,
    },

    /// The run was cancelled via its cancellation flag.
    #[error("E205: Execution aborted: cancellation was requested")]
    Aborted,

    /// An exit node failed, so the graph result cannot be assembled.
    #[error("E206: Exit node '{node_id}' failed; graph result cannot be assembled")]
    ExitNodeFailed {
        /// The failed exit node.
        node_id: NodeId,
    },

    /// An exit node never ran, so the graph result cannot be assembled.
    #[error("E207: Exit node '{node_id}' never ran; graph result cannot be assembled")]
    ExitNodeNeverRan {
        /// The exit node that never executed.
        node_id: NodeId,
    },

    // =========================================================================
    // Persistence Errors (E300-E399)
    // =========================================================================
    /// Reading or writing a snapshot file failed.
    #[error("E301: Snapshot I/O failed at {path}: {cause}")]
    SnapshotIo {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O failure.
        cause: String,
    },

    /// (De)serialization of a value, event, or snapshot failed.
    #[error("E302: Serialization failed: {0}")]
    Serialization(String),
}

/// Convenient result alias used throughout Orchid.
pub type Result<T> = std::result::Result<T, OrchidError>;

fn format_node_list(nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_lists_nodes() {
        let err = OrchidError::GraphHasCycle {
            nodes: vec![NodeId::new("a"), NodeId::new("b")],
        };
        let message = err.to_string();
        assert!(message.contains("'a'"));
        assert!(message.contains("'b'"));
    }

    #[test]
    fn schema_error_carries_endpoints() {
        let err = OrchidError::SchemaIncompatible {
            from: "producer.output".to_string(),
            to: "consumer.input".to_string(),
            details: "missing required property 'amount'".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("producer.output"));
        assert!(message.contains("amount"));
    }
}
