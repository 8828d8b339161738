//! Orchestration loop: repeated scheduler runs with a graph-mutation hook.
//!
//! Wraps one graph and one snapshot. Each pass runs the scheduler to
//! completion, then asks an injectable hook whether it mutated the graph
//! (e.g. added nodes reacting to results so far). Completed nodes from
//! prior passes are skipped automatically via the shared snapshot. This is
//! the only place the graph shape may change after initial construction.

use crate::graph::Graph;
use crate::scheduler::{Executor, ExecutorConfig, InvokeContext, Invocation};
use orchid_core::error::Result;
use orchid_core::event::ExecEvent;
use orchid_core::snapshot::{ExecutionSnapshot, SharedSnapshot};
use orchid_core::value::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Everything a graph-update hook may inspect or mutate between passes.
pub struct UpdateContext<'a> {
    /// The graph; the hook may add nodes and connections.
    pub graph: &'a mut Graph,
    /// The snapshot shared across passes.
    pub snapshot: &'a SharedSnapshot,
    /// The original graph input.
    pub input: &'a Value,
    /// The output of the pass that just finished.
    pub output: &'a Value,
    /// The opaque caller-supplied context value.
    pub shared: &'a Value,
}

/// Hook invoked after each scheduler pass.
///
/// Return `true` after mutating the graph to request another pass; `false`
/// ends the loop with the last output.
pub trait GraphUpdate: Send + Sync {
    /// Inspect the pass results and optionally mutate the graph.
    fn update(&self, cx: UpdateContext<'_>) -> Result<bool>;
}

impl<F> GraphUpdate for F
where
    F: Fn(UpdateContext<'_>) -> Result<bool> + Send + Sync,
{
    fn update(&self, cx: UpdateContext<'_>) -> Result<bool> {
        self(cx)
    }
}

/// The default hook: never mutates, one pass only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePass;

impl GraphUpdate for SinglePass {
    fn update(&self, _cx: UpdateContext<'_>) -> Result<bool> {
        Ok(false)
    }
}

/// Drives repeated scheduler runs over one graph and one snapshot.
pub struct Orchestrator {
    graph: Graph,
    config: ExecutorConfig,
    hook: Box<dyn GraphUpdate>,
}

impl Orchestrator {
    /// Wrap a graph with the default single-pass hook.
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            config: ExecutorConfig::default(),
            hook: Box::new(SinglePass),
        }
    }

    /// Set the executor configuration used for every pass.
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a graph-update hook.
    pub fn with_hook(mut self, hook: impl GraphUpdate + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }

    /// Start the orchestration loop.
    ///
    /// Events from every pass are forwarded into the returned invocation's
    /// stream, in order.
    pub fn invoke(self, input: Value, ctx: InvokeContext) -> Invocation {
        let (event_tx, event_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let (result_tx, result_rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = self.drive(input, ctx, event_tx).await;
            let _ = result_tx.send(result);
        });

        Invocation::new(event_rx, result_rx)
    }

    /// Convenience call that discards events and returns only the result.
    pub async fn run(self, input: Value, ctx: InvokeContext) -> Result<Value> {
        self.invoke(input, ctx).wait().await
    }

    async fn drive(
        mut self,
        input: Value,
        mut ctx: InvokeContext,
        events: mpsc::Sender<ExecEvent>,
    ) -> Result<Value> {
        // All passes share one snapshot, so completed nodes are skipped.
        let snapshot = ctx
            .snapshot
            .take()
            .unwrap_or_else(ExecutionSnapshot::shared);
        ctx.snapshot = Some(Arc::clone(&snapshot));

        let mut pass = 0usize;
        loop {
            pass += 1;
            let executor = Executor::with_config(self.graph.clone(), self.config.clone())?;
            let mut invocation = executor.invoke(input.clone(), ctx.clone());
            while let Some(event) = invocation.next_event().await {
                let _ = events.send(event).await;
            }
            let output = invocation.wait().await?;

            let updated = self.hook.update(UpdateContext {
                graph: &mut self.graph,
                snapshot: &snapshot,
                input: &input,
                output: &output,
                shared: &ctx.shared,
            })?;

            if !updated {
                tracing::debug!(graph = %self.graph.name(), passes = pass, "orchestration finished");
                return Ok(output);
            }
            tracing::debug!(graph = %self.graph.name(), pass, "graph updated by hook; running another pass");
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("graph", &self.graph)
            .field("config", &self.config)
            .finish()
    }
}
