//! Fluent builder mirroring the graph construction surface.

use super::{ConnectOptions, Graph, NodeOptions};
use orchid_core::error::Result;
use orchid_core::runnable::Runnable;
use orchid_core::types::NodeId;
use std::sync::Arc;

/// Fluent builder over [`Graph`].
///
/// Mirrors `add_node` / `connect` / `set_entry_nodes` / `set_exit_nodes`;
/// construction errors are deferred to the terminal [`build`](Self::build)
/// call, which applies the recorded operations in order and surfaces the
/// first failure.
pub struct GraphBuilder {
    name: String,
    operations: Vec<Operation>,
}

enum Operation {
    AddNode {
        id: NodeId,
        runnable: Arc<dyn Runnable>,
        options: NodeOptions,
    },
    Connect {
        from: NodeId,
        to: NodeId,
        options: ConnectOptions,
    },
    Entry(Vec<NodeId>),
    Exit(Vec<NodeId>),
}

impl GraphBuilder {
    /// Start building a graph with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    /// Add a node with default options.
    pub fn add_node(self, id: impl Into<NodeId>, runnable: Arc<dyn Runnable>) -> Self {
        self.add_node_with(id, runnable, NodeOptions::default())
    }

    /// Add a node with explicit options.
    pub fn add_node_with(
        mut self,
        id: impl Into<NodeId>,
        runnable: Arc<dyn Runnable>,
        options: NodeOptions,
    ) -> Self {
        self.operations.push(Operation::AddNode {
            id: id.into(),
            runnable,
            options,
        });
        self
    }

    /// Connect two nodes using the implicit slots.
    pub fn connect(self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.connect_with(from, to, ConnectOptions::default())
    }

    /// Connect two nodes with explicit options.
    pub fn connect_with(
        mut self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        options: ConnectOptions,
    ) -> Self {
        self.operations.push(Operation::Connect {
            from: from.into(),
            to: to.into(),
            options,
        });
        self
    }

    /// Declare the entry nodes.
    pub fn entry<I, N>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        self.operations
            .push(Operation::Entry(ids.into_iter().map(Into::into).collect()));
        self
    }

    /// Declare the exit nodes.
    pub fn exit<I, N>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        self.operations
            .push(Operation::Exit(ids.into_iter().map(Into::into).collect()));
        self
    }

    /// Apply the recorded operations and return the graph.
    pub fn build(self) -> Result<Graph> {
        let mut graph = Graph::new(self.name);
        for operation in self.operations {
            match operation {
                Operation::AddNode {
                    id,
                    runnable,
                    options,
                } => graph.add_node(id, runnable, options)?,
                Operation::Connect { from, to, options } => graph.connect(from, to, options)?,
                Operation::Entry(ids) => graph.set_entry_nodes(ids)?,
                Operation::Exit(ids) => graph.set_exit_nodes(ids)?,
            }
        }
        Ok(graph)
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("name", &self.name)
            .field("operations", &self.operations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchid_core::error::OrchidError;
    use orchid_core::runnable::FnRunnable;

    fn passthrough(name: &str) -> Arc<dyn Runnable> {
        Arc::new(FnRunnable::from_sync(name, Ok))
    }

    #[test]
    fn builds_a_linear_graph() {
        let graph = GraphBuilder::new("linear")
            .add_node("a", passthrough("a"))
            .add_node("b", passthrough("b"))
            .connect("a", "b")
            .entry(["a"])
            .exit(["b"])
            .build()
            .unwrap();

        assert_eq!(graph.name(), "linear");
        assert_eq!(graph.node_ids().len(), 2);
        assert!(graph.ensure_executable().is_ok());
    }

    #[test]
    fn build_surfaces_deferred_errors() {
        let err = GraphBuilder::new("broken")
            .add_node("a", passthrough("a"))
            .connect("a", "missing")
            .build()
            .unwrap_err();
        assert!(matches!(err, OrchidError::UnknownNode { .. }));
    }
}
