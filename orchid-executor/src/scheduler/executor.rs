//! Graph execution engine.
//!
//! This module provides the dependency-driven scheduler with **concurrent
//! DAG execution**. In parallel mode, nodes run as soon as their
//! dependencies are satisfied, bounded by a concurrency ceiling; the
//! scheduler waits for the next completion (not all of them) before
//! re-evaluating readiness, so a newly-unblocked node starts as soon as a
//! slot frees. Sequential mode computes one topological order up front and
//! awaits nodes strictly one at a time.
//!
//! Progress events flow through a bounded channel; the terminal result
//! arrives on a separate single-slot channel once the event stream closes.

use crate::graph::Graph;
use crate::scheduler::state::ExecState;
use orchid_core::cancel::CancelFlag;
use orchid_core::error::{OrchidError, Result};
use orchid_core::event::ExecEvent;
use orchid_core::runnable::RunContext;
use orchid_core::snapshot::{ExecutionSnapshot, SharedSnapshot};
use orchid_core::types::{NodeId, RunId};
use orchid_core::value::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinSet;
use tracing::Instrument;

/// Default concurrency ceiling for parallel execution.
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Default capacity of the progress-event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// How nodes are scheduled within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One topological order up front, one node at a time.
    #[default]
    Sequential,
    /// All ready nodes in flight together, bounded by `max_concurrent`.
    Parallel {
        /// Maximum node tasks in flight at once.
        max_concurrent: usize,
    },
}

/// Configuration for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Scheduling mode.
    pub mode: ExecutionMode,
    /// Continue running after a non-optional node fails instead of
    /// aborting the run.
    pub continue_on_error: bool,
    /// Capacity of the progress-event channel handed to the caller.
    pub event_buffer: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            continue_on_error: false,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ExecutorConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `ORCHID_PARALLEL`: enable parallel execution (`1`/`true`)
    /// - `ORCHID_MAX_CONCURRENT_NODES`: concurrency ceiling for parallel mode
    /// - `ORCHID_CONTINUE_ON_ERROR`: continue past node failures (`1`/`true`)
    /// - `ORCHID_EVENT_BUFFER`: progress-event channel capacity
    pub fn from_env() -> Self {
        let parallel = std::env::var("ORCHID_PARALLEL")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let max_concurrent = std::env::var("ORCHID_MAX_CONCURRENT_NODES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_CONCURRENT);

        let continue_on_error = std::env::var("ORCHID_CONTINUE_ON_ERROR")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let event_buffer = std::env::var("ORCHID_EVENT_BUFFER")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_EVENT_BUFFER);

        Self {
            mode: if parallel {
                ExecutionMode::Parallel { max_concurrent }
            } else {
                ExecutionMode::Sequential
            },
            continue_on_error,
            event_buffer,
        }
    }

    /// Switch to parallel execution with the given concurrency ceiling.
    pub fn with_parallel(mut self, max_concurrent: usize) -> Self {
        self.mode = ExecutionMode::Parallel {
            max_concurrent: max_concurrent.max(1),
        };
        self
    }

    /// Switch to sequential execution.
    pub fn sequential(mut self) -> Self {
        self.mode = ExecutionMode::Sequential;
        self
    }

    /// Continue running after non-optional node failures.
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Set the progress-event channel capacity.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }
}

/// Per-run context supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct InvokeContext {
    /// Opaque caller-supplied value forwarded read-only to every node.
    pub shared: Value,
    /// Snapshot to hydrate from and flush into. When absent, a fresh
    /// snapshot is created and owned for that single run only; no resume is
    /// possible across calls unless the caller retains it.
    pub snapshot: Option<SharedSnapshot>,
    /// Cancellation flag shared with every node task.
    pub cancel: CancelFlag,
}

impl InvokeContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shared context value.
    pub fn with_shared(mut self, shared: Value) -> Self {
        self.shared = shared;
        self
    }

    /// Attach a snapshot for persistence/resume.
    pub fn with_snapshot(mut self, snapshot: SharedSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Use an externally-held cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A running invocation: the lazy progress-event sequence plus the terminal
/// result.
#[derive(Debug)]
pub struct Invocation {
    events: mpsc::Receiver<ExecEvent>,
    result: oneshot::Receiver<Result<Value>>,
}

impl Invocation {
    pub(crate) fn new(
        events: mpsc::Receiver<ExecEvent>,
        result: oneshot::Receiver<Result<Value>>,
    ) -> Self {
        Self { events, result }
    }

    /// Receive the next progress event, or `None` once the run finished.
    pub async fn next_event(&mut self) -> Option<ExecEvent> {
        self.events.recv().await
    }

    /// Discard any remaining events and wait for the terminal result.
    pub async fn wait(mut self) -> Result<Value> {
        self.events.close();
        while self.events.recv().await.is_some() {}
        match self.result.await {
            Ok(result) => result,
            Err(_) => Err(OrchidError::NodePanic {
                cause: "executor driver ended without reporting a result".to_string(),
            }),
        }
    }

    /// Collect all remaining events, then return them with the terminal
    /// result.
    pub async fn collect(mut self) -> (Vec<ExecEvent>, Result<Value>) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let result = match self.result.await {
            Ok(result) => result,
            Err(_) => Err(OrchidError::NodePanic {
                cause: "executor driver ended without reporting a result".to_string(),
            }),
        };
        (events, result)
    }
}

/// The execution engine for one graph.
///
/// Construction validates the graph (references, cycles, schema) and checks
/// that it is executable. Each `invoke` call drives one run in a background
/// task and hands back the event stream and terminal result.
#[derive(Debug, Clone)]
pub struct Executor {
    graph: Arc<Graph>,
    config: ExecutorConfig,
}

impl Executor {
    /// Create an executor with default configuration.
    pub fn new(graph: Graph) -> Result<Self> {
        Self::with_config(graph, ExecutorConfig::default())
    }

    /// Create an executor with explicit configuration.
    pub fn with_config(graph: Graph, config: ExecutorConfig) -> Result<Self> {
        graph.validate()?;
        graph.ensure_executable()?;
        Ok(Self {
            graph: Arc::new(graph),
            config,
        })
    }

    /// The executor's configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The graph being executed.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Start one run.
    ///
    /// Returns immediately; consume the invocation's events and then its
    /// result, or call [`Invocation::wait`] to discard events.
    pub fn invoke(&self, input: Value, ctx: InvokeContext) -> Invocation {
        let (event_tx, event_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let (result_tx, result_rx) = oneshot::channel();

        let snapshot = ctx
            .snapshot
            .unwrap_or_else(ExecutionSnapshot::shared);
        let driver = Driver {
            graph: Arc::clone(&self.graph),
            config: self.config.clone(),
            events: event_tx,
            run_id: RunId::new(),
            cancel: ctx.cancel,
            shared: Arc::new(ctx.shared),
        };

        let span = tracing::info_span!(
            "graph_execution",
            graph = %driver.graph.name(),
            run_id = %driver.run_id,
            node_count = driver.graph.node_ids().len(),
        );
        tokio::spawn(
            async move {
                let result = driver.run(input, snapshot).await;
                let _ = result_tx.send(result);
            }
            .instrument(span),
        );

        Invocation::new(event_rx, result_rx)
    }

    /// Convenience call that discards events and returns only the result.
    #[tracing::instrument(skip_all, fields(graph = %self.graph.name()))]
    pub async fn run(&self, input: Value, ctx: InvokeContext) -> Result<Value> {
        self.invoke(input, ctx).wait().await
    }
}

/// State and handles for one run, owned by the driver task.
struct Driver {
    graph: Arc<Graph>,
    config: ExecutorConfig,
    events: mpsc::Sender<ExecEvent>,
    run_id: RunId,
    cancel: CancelFlag,
    shared: Arc<Value>,
}

impl Driver {
    async fn emit(&self, event: ExecEvent) {
        let event = event
            .with_graph_name(self.graph.name())
            .with_run_id(self.run_id);
        let _ = self.events.send(event).await;
    }

    async fn run(self, input: Value, snapshot: SharedSnapshot) -> Result<Value> {
        let mut state = ExecState::hydrate(snapshot);
        tracing::debug!(graph = %self.graph.name(), "starting run");

        let outcome = match self.config.mode {
            ExecutionMode::Sequential => self.run_sequential(&mut state, &input).await,
            ExecutionMode::Parallel { max_concurrent } => {
                self.run_parallel(&mut state, &input, max_concurrent).await
            }
        };

        let result = match outcome {
            Ok(()) => self.assemble_output(&state),
            Err(error) => Err(error),
        };

        let (completed, failed) = state.summary(&self.graph);
        match &result {
            Ok(_) => {
                tracing::info!(graph = %self.graph.name(), completed = completed.len(), "run completed");
                self.emit(ExecEvent::graph_completed(completed, failed)).await;
            }
            Err(error) => {
                tracing::error!(graph = %self.graph.name(), error = %error, "run failed");
                self.emit(ExecEvent::graph_failed(&error.to_string(), completed, failed))
                    .await;
            }
        }
        result
    }

    /// Sequential mode: one topological order up front, one node at a time.
    async fn run_sequential(&self, state: &mut ExecState, input: &Value) -> Result<()> {
        let order = self.graph.topological_order()?;
        let no_in_flight = HashSet::new();

        for id in order {
            if self.cancel.is_cancelled() {
                return Err(OrchidError::Aborted);
            }
            self.propagate_dependency_failures(state, &no_in_flight)
                .await;
            if state.is_done(&id) {
                continue;
            }
            // Topological order guarantees dependencies were already
            // processed; a node still not ready here is stuck and is
            // reported by the deadlock check after the pass.
            if !state.is_ready(&self.graph, &id) {
                continue;
            }
            let Some(node) = self.graph.node(&id) else {
                continue;
            };

            let result = match state.assemble_input(&self.graph, &id, input) {
                Ok(assembled) => {
                    self.emit(ExecEvent::node_started(&id)).await;
                    let ctx = RunContext::new(
                        id.clone(),
                        self.graph.name(),
                        self.events.clone(),
                        self.cancel.clone(),
                        Arc::clone(&self.shared),
                    );
                    node.runnable.run(assembled, ctx).await
                }
                Err(error) => Err(error),
            };
            self.process_node_result(state, &id, result, None).await?;
        }

        self.propagate_dependency_failures(state, &no_in_flight)
            .await;
        if state.all_resolved(&self.graph) {
            Ok(())
        } else {
            Err(state.deadlock_error(&self.graph))
        }
    }

    /// Parallel mode: work-conserving greedy scheduling.
    ///
    /// 1. Fail any node whose required upstream failed.
    /// 2. Launch every ready node (the semaphore bounds real concurrency).
    /// 3. Wait for the *next* completion, then re-evaluate readiness.
    async fn run_parallel(
        &self,
        state: &mut ExecState,
        input: &Value,
        max_concurrent: usize,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut tasks: JoinSet<(NodeId, Result<Value>)> = JoinSet::new();
        let mut in_flight: HashSet<NodeId> = HashSet::new();

        loop {
            if self.cancel.is_cancelled() {
                tasks.abort_all();
                return Err(OrchidError::Aborted);
            }

            self.propagate_dependency_failures(state, &in_flight).await;

            let ready: Vec<NodeId> = self
                .graph
                .node_ids()
                .iter()
                .filter(|id| !in_flight.contains(*id) && state.is_ready(&self.graph, id))
                .cloned()
                .collect();

            for id in ready {
                let Some(node) = self.graph.node(&id) else {
                    continue;
                };
                let assembled = match state.assemble_input(&self.graph, &id, input) {
                    Ok(assembled) => assembled,
                    Err(error) => {
                        self.process_node_result(state, &id, Err(error), Some(&mut tasks))
                            .await?;
                        continue;
                    }
                };

                in_flight.insert(id.clone());
                self.emit(ExecEvent::node_started(&id)).await;

                let runnable = Arc::clone(&node.runnable);
                let ctx = RunContext::new(
                    id.clone(),
                    self.graph.name(),
                    self.events.clone(),
                    self.cancel.clone(),
                    Arc::clone(&self.shared),
                );
                let semaphore = Arc::clone(&semaphore);
                let task_id = id.clone();
                tasks.spawn(async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .expect("semaphore should not be closed");
                    let result = runnable.run(assembled, ctx).await;
                    (task_id, result)
                });
            }

            if tasks.is_empty() {
                if state.all_resolved(&self.graph) {
                    return Ok(());
                }
                return Err(state.deadlock_error(&self.graph));
            }

            match tasks.join_next().await {
                Some(Ok((id, result))) => {
                    in_flight.remove(&id);
                    self.process_node_result(state, &id, result, Some(&mut tasks))
                        .await?;
                }
                Some(Err(join_error)) => {
                    let cause = if join_error.is_panic() {
                        "node task panicked".to_string()
                    } else {
                        "node task was cancelled".to_string()
                    };
                    tasks.abort_all();
                    return Err(OrchidError::NodePanic { cause });
                }
                None => {}
            }
        }
    }

    /// Synthesize failures for nodes whose required upstream failed,
    /// transitively, without invoking their runnables.
    async fn propagate_dependency_failures(
        &self,
        state: &mut ExecState,
        in_flight: &HashSet<NodeId>,
    ) {
        loop {
            let mut newly_failed = Vec::new();
            for id in self.graph.node_ids() {
                if state.is_done(id) || in_flight.contains(id) {
                    continue;
                }
                if let Some((slot, source)) = state.failed_required_source(&self.graph, id) {
                    newly_failed.push((
                        id.clone(),
                        format!(
                            "dependency failed: input slot '{}' depends on failed node '{}'",
                            slot, source
                        ),
                    ));
                }
            }
            if newly_failed.is_empty() {
                return;
            }
            for (id, message) in newly_failed {
                tracing::warn!(node_id = %id, "{}", message);
                state.record_failure(&id, message.clone());
                self.emit(ExecEvent::node_failed(&id, &message)).await;
            }
        }
    }

    /// Record one node's terminal result, emit the bracketing event, and
    /// decide whether the run aborts.
    async fn process_node_result(
        &self,
        state: &mut ExecState,
        id: &NodeId,
        result: Result<Value>,
        tasks: Option<&mut JoinSet<(NodeId, Result<Value>)>>,
    ) -> Result<()> {
        let node_optional = self
            .graph
            .node(id)
            .map(|node| node.optional)
            .unwrap_or(false);

        let failure = match result {
            Ok(value) => match state.record_success(&self.graph, id, value) {
                Ok(()) => {
                    tracing::debug!(node_id = %id, "node completed");
                    self.emit(ExecEvent::node_completed(id)).await;
                    return Ok(());
                }
                // Missing expected output on a multi-output node.
                Err(error) => error.to_string(),
            },
            Err(error) => error.to_string(),
        };

        tracing::warn!(node_id = %id, error = %failure, "node failed");
        state.record_failure(id, failure.clone());
        self.emit(ExecEvent::node_failed(id, &failure)).await;

        if !node_optional && !self.config.continue_on_error {
            if let Some(tasks) = tasks {
                tasks.abort_all();
            }
            return Err(OrchidError::NodeExecution {
                node_id: id.clone(),
                cause: failure,
            });
        }
        Ok(())
    }

    /// Compose the final graph result from the exit nodes.
    fn assemble_output(&self, state: &ExecState) -> Result<Value> {
        let exits = self.graph.exit_nodes();
        if exits.len() == 1 {
            return state.exit_result(&exits[0]);
        }

        let mut entries = Vec::new();
        for id in exits {
            entries.push((id.as_str().to_string(), state.exit_result(id)?));
        }
        Ok(Value::object(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sequential() {
        let config = ExecutorConfig::default();
        assert_eq!(config.mode, ExecutionMode::Sequential);
        assert!(!config.continue_on_error);
    }

    #[test]
    fn parallel_ceiling_is_at_least_one() {
        let config = ExecutorConfig::default().with_parallel(0);
        assert_eq!(
            config.mode,
            ExecutionMode::Parallel { max_concurrent: 1 }
        );
    }

    #[test]
    fn config_from_env_defaults() {
        // With none of the variables set this must fall back to defaults.
        std::env::remove_var("ORCHID_PARALLEL");
        std::env::remove_var("ORCHID_MAX_CONCURRENT_NODES");
        std::env::remove_var("ORCHID_CONTINUE_ON_ERROR");
        std::env::remove_var("ORCHID_EVENT_BUFFER");

        let config = ExecutorConfig::from_env();
        assert_eq!(config.mode, ExecutionMode::Sequential);
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
    }
}
