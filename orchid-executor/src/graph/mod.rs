//! Graph model: node/edge storage, wiring, and structural validation.
//!
//! A graph is built incrementally (add node, connect, set entry/exit) and
//! becomes executable once it has at least one node, one entry node, and
//! one exit node. Connections are type-checked as they are added; whole
//! graph validation (schema presence, every edge, cycle detection) re-runs
//! when the entry or exit sets change.

mod builder;
mod edge;
mod node;

pub use builder::GraphBuilder;
pub use edge::{ConnectOptions, Edge, Transform};
pub use node::{GraphNode, NodeOptions, DEFAULT_INPUT_SLOT, DEFAULT_OUTPUT_SLOT};

use crate::diagnostics::DiagnosticsCollector;
use orchid_core::error::{OrchidError, Result};
use orchid_core::runnable::Runnable;
use orchid_core::schema::{check_compatibility, schema_presence};
use orchid_core::types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// A directed graph of runnables with named input/output slots.
#[derive(Clone)]
pub struct Graph {
    name: String,
    nodes: HashMap<NodeId, GraphNode>,
    node_order: Vec<NodeId>,
    edges: Vec<Edge>,
    entry_nodes: Vec<NodeId>,
    exit_nodes: Vec<NodeId>,
    diagnostics: Arc<DiagnosticsCollector>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            node_order: Vec::new(),
            edges: Vec::new(),
            entry_nodes: Vec::new(),
            exit_nodes: Vec::new(),
            diagnostics: Arc::new(DiagnosticsCollector::default()),
        }
    }

    /// The graph's name, injected into every forwarded event.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The construction-time diagnostics buffer.
    pub fn diagnostics(&self) -> &Arc<DiagnosticsCollector> {
        &self.diagnostics
    }

    /// Add a node wrapping the given runnable.
    ///
    /// Fails with `DuplicateNode` when the id is already present.
    pub fn add_node(
        &mut self,
        id: impl Into<NodeId>,
        runnable: Arc<dyn Runnable>,
        options: NodeOptions,
    ) -> Result<()> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(OrchidError::DuplicateNode { id });
        }

        tracing::debug!(graph = %self.name, node_id = %id, "adding node");
        self.node_order.push(id.clone());
        self.nodes
            .insert(id.clone(), GraphNode::new(id, runnable, options));
        Ok(())
    }

    /// Connect one node's output slot to another node's input slot.
    ///
    /// Fails with `UnknownNode` when either endpoint is missing and with
    /// `SchemaIncompatible` when the declared shapes provably cannot feed
    /// each other. On success the edge is registered and the target's input
    /// mapping for the slot is overwritten (last connection wins).
    pub fn connect(
        &mut self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        options: ConnectOptions,
    ) -> Result<()> {
        let from = from.into();
        let to = to.into();
        if !self.nodes.contains_key(&from) {
            return Err(OrchidError::UnknownNode { id: from });
        }
        if !self.nodes.contains_key(&to) {
            return Err(OrchidError::UnknownNode { id: to });
        }

        let warnings =
            self.check_connection(&from, &options.from_slot, &to, &options.to_slot)?;
        for warning in warnings {
            self.diagnostics.warn(warning);
        }

        let mut edge = Edge::new(from, options.from_slot, to.clone(), options.to_slot.clone());
        edge.transform = options.transform;

        if let Some(target) = self.nodes.get_mut(&to) {
            // Last connection wins; an earlier mapping for this slot is
            // silently replaced.
            target.input_mappings.insert(
                options.to_slot,
                (edge.from.clone(), edge.from_slot.clone()),
            );
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Declare which nodes receive the raw graph input.
    ///
    /// Fails with `UnknownNode` for unrecognized ids, then re-runs whole
    /// graph validation.
    pub fn set_entry_nodes<I, N>(&mut self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        let ids = self.resolve_ids(ids)?;
        self.entry_nodes = ids;
        self.validate()
    }

    /// Declare which nodes compose the final graph result.
    ///
    /// Fails with `UnknownNode` for unrecognized ids, then re-runs whole
    /// graph validation.
    pub fn set_exit_nodes<I, N>(&mut self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        let ids = self.resolve_ids(ids)?;
        self.exit_nodes = ids;
        self.validate()
    }

    fn resolve_ids<I, N>(&self, ids: I) -> Result<Vec<NodeId>>
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        let mut resolved = Vec::new();
        for id in ids {
            let id = id.into();
            if !self.nodes.contains_key(&id) {
                return Err(OrchidError::UnknownNode { id });
            }
            resolved.push(id);
        }
        Ok(resolved)
    }

    /// Get a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// All node ids, in insertion order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_order
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// All edges, in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The declared entry nodes.
    pub fn entry_nodes(&self) -> &[NodeId] {
        &self.entry_nodes
    }

    /// The declared exit nodes.
    pub fn exit_nodes(&self) -> &[NodeId] {
        &self.exit_nodes
    }

    /// Whether the given node is an entry node.
    pub fn is_entry(&self, id: &NodeId) -> bool {
        self.entry_nodes.contains(id)
    }

    /// Edges targeting the given node and input slot, in insertion order.
    pub fn edges_into_slot<'a>(
        &'a self,
        to: &'a NodeId,
        slot: &'a str,
    ) -> impl Iterator<Item = &'a Edge> {
        self.edges
            .iter()
            .filter(move |e| &e.to == to && e.to_slot == slot)
    }

    /// The edge that owns the current mapping of `(to, slot)`, i.e. the most
    /// recently registered edge matching all four endpoints.
    pub fn edge_for_mapping(
        &self,
        to: &NodeId,
        to_slot: &str,
        from: &NodeId,
        from_slot: &str,
    ) -> Option<&Edge> {
        self.edges.iter().rev().find(|e| {
            &e.to == to && e.to_slot == to_slot && &e.from == from && e.from_slot == from_slot
        })
    }

    /// Validate the whole graph: edge references, cycles, schema presence
    /// for every node, and compatibility for every edge.
    ///
    /// Warnings accumulate in the diagnostics buffer; only genuinely
    /// incompatible edges (and cycles) raise hard errors.
    pub fn validate(&self) -> Result<()> {
        for edge in &self.edges {
            if !self.nodes.contains_key(&edge.from) {
                return Err(OrchidError::UnknownNode {
                    id: edge.from.clone(),
                });
            }
            if !self.nodes.contains_key(&edge.to) {
                return Err(OrchidError::UnknownNode { id: edge.to.clone() });
            }
        }

        self.detect_cycles()?;

        for node in self.nodes() {
            let input = node.runnable.input_schema();
            let output = node.runnable.output_schema();
            for warning in
                schema_presence(node.id.as_str(), input.as_ref(), output.as_ref())
            {
                self.diagnostics.warn(warning);
            }
        }

        for edge in &self.edges {
            let warnings =
                self.check_connection(&edge.from, &edge.from_slot, &edge.to, &edge.to_slot)?;
            for warning in warnings {
                self.diagnostics.warn(warning);
            }
        }

        Ok(())
    }

    /// Check that the graph can be executed at all.
    pub fn ensure_executable(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(OrchidError::NotExecutable {
                cause: "graph has no nodes".to_string(),
            });
        }
        if self.entry_nodes.is_empty() {
            return Err(OrchidError::NotExecutable {
                cause: "graph has no entry nodes".to_string(),
            });
        }
        if self.exit_nodes.is_empty() {
            return Err(OrchidError::NotExecutable {
                cause: "graph has no exit nodes".to_string(),
            });
        }
        Ok(())
    }

    /// Type-check one connection. Returns soft warnings; hard
    /// incompatibilities become `SchemaIncompatible` errors.
    fn check_connection(
        &self,
        from: &NodeId,
        from_slot: &str,
        to: &NodeId,
        to_slot: &str,
    ) -> Result<Vec<String>> {
        let (Some(producer), Some(consumer)) = (self.nodes.get(from), self.nodes.get(to)) else {
            return Ok(Vec::new());
        };

        let edge_label = format!(
            "connection {} \u{2192} {}",
            from.slot_key(from_slot),
            to.slot_key(to_slot)
        );
        let mut warnings = Vec::new();

        if !producer.declares_output(from_slot) {
            warnings.push(format!(
                "{}: node '{}' does not declare output slot '{}'",
                edge_label, from, from_slot
            ));
        }
        if !consumer.declares_input(to_slot) {
            warnings.push(format!(
                "{}: node '{}' does not declare input slot '{}'",
                edge_label, to, to_slot
            ));
        }

        // A single output descriptor cannot describe individual slots of a
        // multi-output node, so per-slot validation is skipped entirely.
        if producer.is_multi_output() {
            warnings.push(format!(
                "{}: node '{}' declares multiple output slots; per-slot schema validation \
                 is skipped",
                edge_label, from
            ));
            return Ok(warnings);
        }

        let (Some(produced), Some(consumed)) = (
            producer.runnable.output_schema(),
            consumer.runnable.input_schema(),
        ) else {
            // Missing descriptors disable static checking for this edge;
            // the presence check reports them during whole-graph validation.
            return Ok(warnings);
        };

        let report = check_compatibility(&produced, &consumed);
        if !report.compatible {
            return Err(OrchidError::SchemaIncompatible {
                from: from.slot_key(from_slot),
                to: to.slot_key(to_slot),
                details: report.error_summary(),
            });
        }

        warnings.extend(
            report
                .warnings
                .into_iter()
                .map(|w| format!("{}: {}", edge_label, w)),
        );
        Ok(warnings)
    }

    /// Depth-first cycle detection over the directed edges.
    ///
    /// Revisiting a node still on the current recursion stack is a cycle.
    fn detect_cycles(&self) -> Result<()> {
        let mut state: HashMap<NodeId, VisitState> = HashMap::new();
        let mut stack: Vec<NodeId> = Vec::new();

        for id in &self.node_order {
            if state.get(id).copied().unwrap_or(VisitState::Unvisited) == VisitState::Unvisited {
                self.dfs_visit(id, &mut state, &mut stack)?;
            }
        }
        Ok(())
    }

    fn dfs_visit(
        &self,
        id: &NodeId,
        state: &mut HashMap<NodeId, VisitState>,
        stack: &mut Vec<NodeId>,
    ) -> Result<()> {
        state.insert(id.clone(), VisitState::InStack);
        stack.push(id.clone());

        for edge in self.edges.iter().filter(|e| &e.from == id) {
            match state
                .get(&edge.to)
                .copied()
                .unwrap_or(VisitState::Unvisited)
            {
                VisitState::InStack => {
                    let position = stack.iter().position(|n| n == &edge.to).unwrap_or(0);
                    return Err(OrchidError::GraphHasCycle {
                        nodes: stack[position..].to_vec(),
                    });
                }
                VisitState::Unvisited => self.dfs_visit(&edge.to, state, stack)?,
                VisitState::Done => {}
            }
        }

        stack.pop();
        state.insert(id.clone(), VisitState::Done);
        Ok(())
    }

    /// Compute a dependency-respecting execution order (entry nodes first),
    /// used by the sequential scheduler.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut in_degree: HashMap<&NodeId, usize> =
            self.node_order.iter().map(|id| (id, 0)).collect();
        for edge in &self.edges {
            if let Some(degree) = in_degree.get_mut(&edge.to) {
                *degree += 1;
            }
        }

        let mut queue: VecDeque<NodeId> = VecDeque::new();
        let mut queued: HashSet<NodeId> = HashSet::new();

        // Entry nodes seed the order; remaining roots follow in insertion
        // order.
        for id in &self.entry_nodes {
            if in_degree.get(id).copied() == Some(0) && queued.insert(id.clone()) {
                queue.push_back(id.clone());
            }
        }
        for id in &self.node_order {
            if in_degree.get(id).copied() == Some(0) && queued.insert(id.clone()) {
                queue.push_back(id.clone());
            }
        }

        let mut order = Vec::with_capacity(self.node_order.len());
        while let Some(id) = queue.pop_front() {
            for edge in self.edges.iter().filter(|e| e.from == id) {
                if let Some(degree) = in_degree.get_mut(&edge.to) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 && queued.insert(edge.to.clone()) {
                        queue.push_back(edge.to.clone());
                    }
                }
            }
            order.push(id);
        }

        if order.len() != self.node_order.len() {
            let cyclic: Vec<NodeId> = self
                .node_order
                .iter()
                .filter(|id| !order.contains(id))
                .cloned()
                .collect();
            return Err(OrchidError::GraphHasCycle { nodes: cyclic });
        }
        Ok(order)
    }

    /// Produce an immutable summary of the graph for introspection and
    /// logging. Never used internally for execution decisions.
    pub fn describe(&self) -> GraphDescription {
        GraphDescription {
            name: self.name.clone(),
            nodes: self
                .nodes()
                .map(|node| NodeDescription {
                    id: node.id.clone(),
                    runnable: node.runnable.name().to_string(),
                    inputs: node.inputs.clone(),
                    outputs: node.outputs.clone(),
                    optional: node.optional,
                    input_mappings: node
                        .input_mappings
                        .iter()
                        .map(|(slot, (src, src_slot))| {
                            (slot.clone(), (src.clone(), src_slot.clone()))
                        })
                        .collect(),
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|edge| EdgeDescription {
                    from: edge.from.clone(),
                    from_slot: edge.from_slot.clone(),
                    to: edge.to.clone(),
                    to_slot: edge.to_slot.clone(),
                    has_transform: edge.transform.is_some(),
                })
                .collect(),
            entry_nodes: self.entry_nodes.clone(),
            exit_nodes: self.exit_nodes.clone(),
        }
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("nodes", &self.node_order)
            .field("edges", &self.edges.len())
            .field("entry_nodes", &self.entry_nodes)
            .field("exit_nodes", &self.exit_nodes)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    InStack,
    Done,
}

/// Immutable summary of a graph's shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDescription {
    /// The graph's name.
    pub name: String,
    /// Per-node summaries, in insertion order.
    pub nodes: Vec<NodeDescription>,
    /// Per-edge summaries, in insertion order.
    pub edges: Vec<EdgeDescription>,
    /// Declared entry node ids.
    pub entry_nodes: Vec<NodeId>,
    /// Declared exit node ids.
    pub exit_nodes: Vec<NodeId>,
}

/// Summary of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescription {
    /// The node's id.
    pub id: NodeId,
    /// Name of the wrapped runnable.
    pub runnable: String,
    /// Declared input slots.
    pub inputs: Vec<String>,
    /// Declared output slots.
    pub outputs: Vec<String>,
    /// Whether the node is optional.
    pub optional: bool,
    /// Current input wiring: slot to `(source node, source slot)`.
    pub input_mappings: BTreeMap<String, (NodeId, String)>,
}

/// Summary of one edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDescription {
    /// Source node id.
    pub from: NodeId,
    /// Source output slot.
    pub from_slot: String,
    /// Target node id.
    pub to: NodeId,
    /// Target input slot.
    pub to_slot: String,
    /// Whether the edge carries a transform (transforms themselves are not
    /// serializable).
    pub has_transform: bool,
}
