//! Graph nodes: declared wrappers around one runnable.

use orchid_core::runnable::Runnable;
use orchid_core::types::NodeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the implicit single input slot.
pub const DEFAULT_INPUT_SLOT: &str = "input";

/// Name of the implicit single output slot.
pub const DEFAULT_OUTPUT_SLOT: &str = "output";

/// Configuration for a node being added to a graph.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    /// Ordered named input slots. Defaults to the single implicit slot.
    pub inputs: Vec<String>,
    /// Ordered named output slots. Defaults to the single implicit slot.
    pub outputs: Vec<String>,
    /// Whether the graph may continue when this node fails.
    pub optional: bool,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            inputs: vec![DEFAULT_INPUT_SLOT.to_string()],
            outputs: vec![DEFAULT_OUTPUT_SLOT.to_string()],
            optional: false,
        }
    }
}

impl NodeOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare named input slots.
    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Declare named output slots.
    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the node as optional (its failure does not abort the run).
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A node in the graph: one runnable plus its declared slots and wiring.
#[derive(Clone)]
pub struct GraphNode {
    /// The node's unique id.
    pub id: NodeId,
    /// The unit of work this node executes.
    pub runnable: Arc<dyn Runnable>,
    /// Ordered named input slots.
    pub inputs: Vec<String>,
    /// Ordered named output slots.
    pub outputs: Vec<String>,
    /// Which `(source node, source slot)` feeds each input slot.
    ///
    /// Keys are always a subset of `inputs`. A later connection to the same
    /// slot overwrites the earlier one (last connection wins).
    pub input_mappings: HashMap<String, (NodeId, String)>,
    /// Whether the graph may continue when this node fails.
    pub optional: bool,
}

impl GraphNode {
    /// Create a node from a runnable and options.
    pub fn new(id: NodeId, runnable: Arc<dyn Runnable>, options: NodeOptions) -> Self {
        Self {
            id,
            runnable,
            inputs: options.inputs,
            outputs: options.outputs,
            input_mappings: HashMap::new(),
            optional: options.optional,
        }
    }

    /// Whether this node declares more than one output slot.
    pub fn is_multi_output(&self) -> bool {
        self.outputs.len() > 1
    }

    /// Whether this node declares more than one input slot.
    pub fn is_multi_input(&self) -> bool {
        self.inputs.len() > 1
    }

    /// Whether the given input slot is declared on this node.
    pub fn declares_input(&self, slot: &str) -> bool {
        self.inputs.iter().any(|s| s == slot)
    }

    /// Whether the given output slot is declared on this node.
    pub fn declares_output(&self, slot: &str) -> bool {
        self.outputs.iter().any(|s| s == slot)
    }
}

impl std::fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("runnable", &self.runnable.name())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("input_mappings", &self.input_mappings)
            .field("optional", &self.optional)
            .finish()
    }
}
