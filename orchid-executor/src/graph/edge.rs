//! Graph edges and connection options.

use super::node::{DEFAULT_INPUT_SLOT, DEFAULT_OUTPUT_SLOT};
use orchid_core::types::NodeId;
use orchid_core::value::Value;
use std::sync::Arc;

/// A value transform applied to an edge's payload before it reaches the
/// target slot.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A directed edge from one node's output slot to another node's input slot.
#[derive(Clone)]
pub struct Edge {
    /// Source node id.
    pub from: NodeId,
    /// Source output slot name.
    pub from_slot: String,
    /// Target node id.
    pub to: NodeId,
    /// Target input slot name.
    pub to_slot: String,
    /// Optional transform applied to the value flowing along this edge.
    pub transform: Option<Transform>,
}

impl Edge {
    /// Create a new edge.
    pub fn new(
        from: NodeId,
        from_slot: impl Into<String>,
        to: NodeId,
        to_slot: impl Into<String>,
    ) -> Self {
        Self {
            from,
            from_slot: from_slot.into(),
            to,
            to_slot: to_slot.into(),
            transform: None,
        }
    }

    /// Attach a transform to the edge.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Apply this edge's transform, if any.
    pub fn apply(&self, value: Value) -> Value {
        match &self.transform {
            Some(transform) => transform(value),
            None => value,
        }
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("from", &self.from)
            .field("from_slot", &self.from_slot)
            .field("to", &self.to)
            .field("to_slot", &self.to_slot)
            .field("transform", &self.transform.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Configuration for a connection between two nodes.
#[derive(Clone)]
pub struct ConnectOptions {
    /// Source output slot. Defaults to the implicit `"output"` slot.
    pub from_slot: String,
    /// Target input slot. Defaults to the implicit `"input"` slot.
    pub to_slot: String,
    /// Optional transform applied before the value reaches the target.
    pub transform: Option<Transform>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            from_slot: DEFAULT_OUTPUT_SLOT.to_string(),
            to_slot: DEFAULT_INPUT_SLOT.to_string(),
            transform: None,
        }
    }
}

impl ConnectOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source output slot.
    pub fn from_slot(mut self, slot: impl Into<String>) -> Self {
        self.from_slot = slot.into();
        self
    }

    /// Set the target input slot.
    pub fn to_slot(mut self, slot: impl Into<String>) -> Self {
        self.to_slot = slot.into();
        self
    }

    /// Set a transform for the connection.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("from_slot", &self.from_slot)
            .field("to_slot", &self.to_slot)
            .field("transform", &self.transform.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
