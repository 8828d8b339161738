//! Live per-run execution state, hydrated from and flushed to the snapshot.

use crate::graph::Graph;
use orchid_core::error::{OrchidError, Result};
use orchid_core::snapshot::SharedSnapshot;
use orchid_core::types::NodeId;
use orchid_core::value::Value;
use std::collections::{HashMap, HashSet};

/// In-memory view of a run's progress.
///
/// Reconstructed from the execution snapshot at run start; every node
/// transition is written back to the snapshot immediately, so the snapshot
/// always reflects the most recently fully-processed node. Only the
/// scheduler's driver touches this state, between node completions.
pub struct ExecState {
    completed: HashSet<NodeId>,
    failed: HashSet<NodeId>,
    results: HashMap<NodeId, Value>,
    named_outputs: HashMap<String, Value>,
    errors: HashMap<NodeId, String>,
    snapshot: SharedSnapshot,
}

impl ExecState {
    /// Hydrate live state from a caller-supplied snapshot.
    pub fn hydrate(snapshot: SharedSnapshot) -> Self {
        let view = snapshot.lock().clone();
        Self {
            completed: view.completed,
            failed: view.failed,
            results: view.results,
            named_outputs: view.named_outputs,
            errors: view.errors,
            snapshot,
        }
    }

    /// Whether the node already finished (completed or failed).
    pub fn is_done(&self, id: &NodeId) -> bool {
        self.completed.contains(id) || self.failed.contains(id)
    }

    /// Whether every node in the graph finished.
    pub fn all_resolved(&self, graph: &Graph) -> bool {
        graph.node_ids().iter().all(|id| self.is_done(id))
    }

    /// The recorded result of a node, if it completed.
    pub fn result_of(&self, id: &NodeId) -> Option<&Value> {
        self.results.get(id)
    }

    /// The recorded error of a node, if it failed.
    pub fn error_of(&self, id: &NodeId) -> Option<&str> {
        self.errors.get(id).map(String::as_str)
    }

    /// Whether a node is ready to execute.
    ///
    /// An entry node with at most one declared input slot is ready as soon
    /// as it has not finished: it receives the raw graph input. Any other
    /// node is ready when every declared input slot has a mapping whose
    /// source is resolved. A failed source still resolves when it was
    /// marked optional; its value is simply absent from the assembled
    /// input.
    pub fn is_ready(&self, graph: &Graph, id: &NodeId) -> bool {
        if self.is_done(id) {
            return false;
        }
        let Some(node) = graph.node(id) else {
            return false;
        };
        if graph.is_entry(id) && node.inputs.len() <= 1 {
            return true;
        }

        for slot in &node.inputs {
            match node.input_mappings.get(slot) {
                None => return false,
                Some((source, _)) => {
                    if !self.source_resolved(graph, source) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn source_resolved(&self, graph: &Graph, source: &NodeId) -> bool {
        self.completed.contains(source)
            || (self.failed.contains(source) && self.source_is_optional(graph, source))
    }

    fn source_is_optional(&self, graph: &Graph, source: &NodeId) -> bool {
        graph.node(source).map(|n| n.optional).unwrap_or(false)
    }

    /// Find a required (non-optional) failed source feeding this node, if
    /// any. Such a node is failed by the scheduler without being invoked.
    pub fn failed_required_source(
        &self,
        graph: &Graph,
        id: &NodeId,
    ) -> Option<(String, NodeId)> {
        let node = graph.node(id)?;
        for slot in &node.inputs {
            if let Some((source, _)) = node.input_mappings.get(slot) {
                if self.failed.contains(source) && !self.source_is_optional(graph, source) {
                    return Some((slot.clone(), source.clone()));
                }
            }
        }
        None
    }

    /// Assemble the input value for a node about to execute.
    ///
    /// Entry nodes receive the raw graph input. A single-slot node receives
    /// the sole connected producer's output directly, or an ordered array
    /// when several edges target the slot. A multi-slot node receives a
    /// keyed object built from its input mappings. Edge transforms apply to
    /// the raw value before assignment; resolved-absent producers (failed
    /// optional nodes) contribute nothing.
    pub fn assemble_input(&self, graph: &Graph, id: &NodeId, graph_input: &Value) -> Result<Value> {
        let node = graph
            .node(id)
            .ok_or_else(|| OrchidError::UnknownNode { id: id.clone() })?;

        if graph.is_entry(id) && node.inputs.len() <= 1 {
            return Ok(graph_input.clone());
        }

        if node.inputs.len() == 1 {
            let slot = &node.inputs[0];
            let mut values = Vec::new();
            for edge in graph.edges_into_slot(id, slot) {
                if let Some(value) = self.resolve_output(graph, &edge.from, &edge.from_slot) {
                    values.push(edge.apply(value));
                }
            }
            return Ok(match values.len() {
                0 => Value::null(),
                1 => values.swap_remove(0),
                _ => Value::array(values),
            });
        }

        let mut entries = Vec::new();
        for slot in &node.inputs {
            let Some((source, source_slot)) = node.input_mappings.get(slot) else {
                continue;
            };
            if let Some(value) = self.resolve_output(graph, source, source_slot) {
                let value = match graph.edge_for_mapping(id, slot, source, source_slot) {
                    Some(edge) => edge.apply(value),
                    None => value,
                };
                entries.push((slot.clone(), value));
            }
        }
        Ok(Value::object(entries))
    }

    /// Resolve a producer's output for the given slot.
    ///
    /// Multi-output producers are read from the named-output map; single
    /// output producers yield their whole result regardless of slot name.
    fn resolve_output(&self, graph: &Graph, source: &NodeId, slot: &str) -> Option<Value> {
        let producer = graph.node(source)?;
        if producer.is_multi_output() {
            self.named_outputs.get(&source.slot_key(slot)).cloned()
        } else {
            self.results.get(source).cloned()
        }
    }

    /// Record a successful node result, splitting multi-output results by
    /// slot name. A declared slot absent from the result object is a hard
    /// `MissingOutput` error; nothing is recorded in that case.
    pub fn record_success(&mut self, graph: &Graph, id: &NodeId, value: Value) -> Result<()> {
        let node = graph
            .node(id)
            .ok_or_else(|| OrchidError::UnknownNode { id: id.clone() })?;

        let mut named = Vec::new();
        if node.is_multi_output() {
            for slot in &node.outputs {
                match value.get_key(slot) {
                    Some(slot_value) => named.push((id.slot_key(slot), slot_value)),
                    None => {
                        return Err(OrchidError::MissingOutput {
                            node_id: id.clone(),
                            slot: slot.clone(),
                        })
                    }
                }
            }
        }

        self.completed.insert(id.clone());
        self.results.insert(id.clone(), value);
        for (key, slot_value) in named {
            self.named_outputs.insert(key, slot_value);
        }
        self.flush_node(id);
        Ok(())
    }

    /// Record a node failure.
    pub fn record_failure(&mut self, id: &NodeId, error: String) {
        self.failed.insert(id.clone());
        self.errors.insert(id.clone(), error);
        self.flush_node(id);
    }

    /// Write one node's transition back to the shared snapshot.
    fn flush_node(&self, id: &NodeId) {
        let mut snapshot = self.snapshot.lock();
        if self.completed.contains(id) {
            snapshot.completed.insert(id.clone());
            if let Some(value) = self.results.get(id) {
                snapshot.results.insert(id.clone(), value.clone());
            }
            let prefix = format!("{}.", id);
            for (key, value) in self
                .named_outputs
                .iter()
                .filter(|(key, _)| key.starts_with(&prefix))
            {
                snapshot.named_outputs.insert(key.clone(), value.clone());
            }
        }
        if self.failed.contains(id) {
            snapshot.failed.insert(id.clone());
            if let Some(error) = self.errors.get(id) {
                snapshot.errors.insert(id.clone(), error.clone());
            }
        }
    }

    /// The result contributed by an exit node, distinguishing "failed" from
    /// "never ran".
    pub fn exit_result(&self, id: &NodeId) -> Result<Value> {
        if self.completed.contains(id) {
            return Ok(self.results.get(id).cloned().unwrap_or_default());
        }
        if self.failed.contains(id) {
            return Err(OrchidError::ExitNodeFailed {
                node_id: id.clone(),
            });
        }
        Err(OrchidError::ExitNodeNeverRan {
            node_id: id.clone(),
        })
    }

    /// Completed and failed node ids, in graph insertion order.
    pub fn summary(&self, graph: &Graph) -> (Vec<NodeId>, Vec<NodeId>) {
        let completed = graph
            .node_ids()
            .iter()
            .filter(|id| self.completed.contains(*id))
            .cloned()
            .collect();
        let failed = graph
            .node_ids()
            .iter()
            .filter(|id| self.failed.contains(*id))
            .cloned()
            .collect();
        (completed, failed)
    }

    /// Per-node explanation of why unfinished nodes cannot run, used when
    /// the scheduler detects a deadlock.
    pub fn deadlock_details(&self, graph: &Graph) -> String {
        let mut lines = Vec::new();
        for id in graph.node_ids() {
            if self.is_done(id) {
                continue;
            }
            let Some(node) = graph.node(id) else {
                continue;
            };
            if graph.is_entry(id) && node.inputs.len() <= 1 {
                continue;
            }
            for slot in &node.inputs {
                match node.input_mappings.get(slot) {
                    None => lines.push(format!(
                        "node '{}': input slot '{}' is not connected to any producer",
                        id, slot
                    )),
                    Some((source, _)) if !self.source_resolved(graph, source) => {
                        let reason = if self.failed.contains(source) {
                            "failed"
                        } else {
                            "never ran"
                        };
                        lines.push(format!(
                            "node '{}': input slot '{}' is waiting on node '{}' which {}",
                            id, slot, source, reason
                        ));
                    }
                    _ => {}
                }
            }
        }
        lines.join("\n")
    }

    /// Build the deadlock error for the current state.
    pub fn deadlock_error(&self, graph: &Graph) -> OrchidError {
        OrchidError::Deadlock {
            details: self.deadlock_details(graph),
        }
    }
}

impl std::fmt::Debug for ExecState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecState")
            .field("completed", &self.completed.len())
            .field("failed", &self.failed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConnectOptions, NodeOptions};
    use orchid_core::runnable::{FnRunnable, Runnable};
    use orchid_core::snapshot::ExecutionSnapshot;
    use std::sync::Arc;

    fn passthrough(name: &str) -> Arc<dyn Runnable> {
        Arc::new(FnRunnable::from_sync(name, Ok))
    }

    fn wired_graph() -> Graph {
        let mut graph = Graph::new("g");
        graph
            .add_node("a", passthrough("a"), NodeOptions::default())
            .unwrap();
        graph
            .add_node("b", passthrough("b"), NodeOptions::default())
            .unwrap();
        graph.connect("a", "b", ConnectOptions::default()).unwrap();
        graph.set_entry_nodes(["a"]).unwrap();
        graph.set_exit_nodes(["b"]).unwrap();
        graph
    }

    #[test]
    fn entry_is_ready_and_downstream_waits() {
        let graph = wired_graph();
        let state = ExecState::hydrate(ExecutionSnapshot::shared());

        assert!(state.is_ready(&graph, &NodeId::new("a")));
        assert!(!state.is_ready(&graph, &NodeId::new("b")));
    }

    #[test]
    fn completion_unblocks_downstream_and_flushes() {
        let graph = wired_graph();
        let shared = ExecutionSnapshot::shared();
        let mut state = ExecState::hydrate(Arc::clone(&shared));

        state
            .record_success(&graph, &NodeId::new("a"), Value::int(1))
            .unwrap();
        assert!(state.is_ready(&graph, &NodeId::new("b")));

        let snapshot = shared.lock();
        assert!(snapshot.completed.contains(&NodeId::new("a")));
        assert_eq!(snapshot.results.get(&NodeId::new("a")), Some(&Value::int(1)));
    }

    #[test]
    fn hydration_resumes_prior_progress() {
        let graph = wired_graph();
        let mut snapshot = ExecutionSnapshot::new();
        snapshot.completed.insert(NodeId::new("a"));
        snapshot
            .results
            .insert(NodeId::new("a"), Value::string("cached"));

        let state = ExecState::hydrate(snapshot.into_shared());
        assert!(state.is_done(&NodeId::new("a")));
        assert!(state.is_ready(&graph, &NodeId::new("b")));
    }

    #[test]
    fn single_slot_input_is_producer_output() {
        let graph = wired_graph();
        let mut state = ExecState::hydrate(ExecutionSnapshot::shared());
        state
            .record_success(&graph, &NodeId::new("a"), Value::string("payload"))
            .unwrap();

        let input = state
            .assemble_input(&graph, &NodeId::new("b"), &Value::null())
            .unwrap();
        assert_eq!(input, Value::string("payload"));
    }

    #[test]
    fn fan_in_to_single_slot_becomes_array() {
        let mut graph = Graph::new("g");
        graph
            .add_node("x", passthrough("x"), NodeOptions::default())
            .unwrap();
        graph
            .add_node("y", passthrough("y"), NodeOptions::default())
            .unwrap();
        graph
            .add_node("sink", passthrough("sink"), NodeOptions::default())
            .unwrap();
        graph
            .connect("x", "sink", ConnectOptions::default())
            .unwrap();
        graph
            .connect("y", "sink", ConnectOptions::default())
            .unwrap();
        graph.set_entry_nodes(["x", "y"]).unwrap();

        let mut state = ExecState::hydrate(ExecutionSnapshot::shared());
        state
            .record_success(&graph, &NodeId::new("x"), Value::int(1))
            .unwrap();
        state
            .record_success(&graph, &NodeId::new("y"), Value::int(2))
            .unwrap();

        let input = state
            .assemble_input(&graph, &NodeId::new("sink"), &Value::null())
            .unwrap();
        assert_eq!(input, Value::array([Value::int(1), Value::int(2)]));
    }

    #[test]
    fn multi_slot_input_is_keyed_object() {
        let mut graph = Graph::new("g");
        graph
            .add_node("x", passthrough("x"), NodeOptions::default())
            .unwrap();
        graph
            .add_node("y", passthrough("y"), NodeOptions::default())
            .unwrap();
        graph
            .add_node(
                "z",
                passthrough("z"),
                NodeOptions::new().with_inputs(["left", "right"]),
            )
            .unwrap();
        graph
            .connect("x", "z", ConnectOptions::new().to_slot("left"))
            .unwrap();
        graph
            .connect("y", "z", ConnectOptions::new().to_slot("right"))
            .unwrap();
        graph.set_entry_nodes(["x", "y"]).unwrap();

        let mut state = ExecState::hydrate(ExecutionSnapshot::shared());
        assert!(!state.is_ready(&graph, &NodeId::new("z")));

        state
            .record_success(&graph, &NodeId::new("x"), Value::int(1))
            .unwrap();
        state
            .record_success(&graph, &NodeId::new("y"), Value::int(2))
            .unwrap();
        assert!(state.is_ready(&graph, &NodeId::new("z")));

        let input = state
            .assemble_input(&graph, &NodeId::new("z"), &Value::null())
            .unwrap();
        assert_eq!(input.get_key("left"), Some(Value::int(1)));
        assert_eq!(input.get_key("right"), Some(Value::int(2)));
    }

    #[test]
    fn multi_output_split_and_missing_slot() {
        let mut graph = Graph::new("g");
        graph
            .add_node(
                "s",
                passthrough("s"),
                NodeOptions::new().with_outputs(["p", "q"]),
            )
            .unwrap();
        graph.set_entry_nodes(["s"]).unwrap();

        let mut state = ExecState::hydrate(ExecutionSnapshot::shared());
        let complete = Value::object([
            ("p".to_string(), Value::int(1)),
            ("q".to_string(), Value::int(2)),
        ]);
        state
            .record_success(&graph, &NodeId::new("s"), complete)
            .unwrap();
        assert_eq!(
            state.resolve_output(&graph, &NodeId::new("s"), "p"),
            Some(Value::int(1))
        );

        let mut state = ExecState::hydrate(ExecutionSnapshot::shared());
        let incomplete = Value::object([("p".to_string(), Value::int(1))]);
        let err = state
            .record_success(&graph, &NodeId::new("s"), incomplete)
            .unwrap_err();
        assert!(matches!(err, OrchidError::MissingOutput { ref slot, .. } if slot == "q"));
        assert!(!state.is_done(&NodeId::new("s")));
    }

    #[test]
    fn optional_failed_source_resolves_as_absent() {
        let mut graph = Graph::new("g");
        graph
            .add_node("a", passthrough("a"), NodeOptions::default())
            .unwrap();
        graph
            .add_node("flaky", passthrough("flaky"), NodeOptions::new().optional())
            .unwrap();
        graph
            .add_node(
                "z",
                passthrough("z"),
                NodeOptions::new().with_inputs(["main", "extra"]),
            )
            .unwrap();
        graph
            .connect("a", "z", ConnectOptions::new().to_slot("main"))
            .unwrap();
        graph
            .connect("flaky", "z", ConnectOptions::new().to_slot("extra"))
            .unwrap();
        graph.set_entry_nodes(["a", "flaky"]).unwrap();

        let mut state = ExecState::hydrate(ExecutionSnapshot::shared());
        state
            .record_success(&graph, &NodeId::new("a"), Value::int(1))
            .unwrap();
        state.record_failure(&NodeId::new("flaky"), "boom".to_string());

        assert!(state.is_ready(&graph, &NodeId::new("z")));
        assert!(state.failed_required_source(&graph, &NodeId::new("z")).is_none());

        let input = state
            .assemble_input(&graph, &NodeId::new("z"), &Value::null())
            .unwrap();
        assert_eq!(input.get_key("main"), Some(Value::int(1)));
        assert_eq!(input.get_key("extra"), None);
    }

    #[test]
    fn required_failed_source_is_reported() {
        let graph = wired_graph();
        let mut state = ExecState::hydrate(ExecutionSnapshot::shared());
        state.record_failure(&NodeId::new("a"), "boom".to_string());

        let (slot, source) = state
            .failed_required_source(&graph, &NodeId::new("b"))
            .unwrap();
        assert_eq!(slot, "input");
        assert_eq!(source, NodeId::new("a"));
    }

    #[test]
    fn deadlock_details_name_unmapped_slots() {
        let mut graph = Graph::new("g");
        graph
            .add_node(
                "lonely",
                passthrough("lonely"),
                NodeOptions::new().with_inputs(["left", "right"]),
            )
            .unwrap();
        graph.set_entry_nodes(["lonely"]).unwrap();

        let state = ExecState::hydrate(ExecutionSnapshot::shared());
        let details = state.deadlock_details(&graph);
        assert!(details.contains("lonely"));
        assert!(details.contains("left"));
        assert!(details.contains("not connected"));
    }

    #[test]
    fn exit_result_distinguishes_failed_from_never_ran() {
        let graph = wired_graph();
        let mut state = ExecState::hydrate(ExecutionSnapshot::shared());

        assert!(matches!(
            state.exit_result(&NodeId::new("b")),
            Err(OrchidError::ExitNodeNeverRan { .. })
        ));

        state.record_failure(&NodeId::new("b"), "boom".to_string());
        assert!(matches!(
            state.exit_result(&NodeId::new("b")),
            Err(OrchidError::ExitNodeFailed { .. })
        ));
    }
}
