//! The `Runnable` contract and its execution context.
//!
//! A runnable is a named unit of work: it accepts one input value,
//! optionally streams progress events through its context, and terminates
//! with exactly one result value or an error. The scheduler consumes this
//! contract; it never looks inside a runnable.

use crate::cancel::CancelFlag;
use crate::error::Result;
use crate::event::{ExecEvent, LogLevel};
use crate::schema::TypeDescriptor;
use crate::types::NodeId;
use crate::value::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A boxed future for async runnable execution.
pub type RunnableFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Execution context handed to every runnable invocation.
///
/// Carries the event emitter (events are tagged with the node id and graph
/// name before they reach the caller), the shared cancellation flag, and
/// the opaque caller-supplied context value.
#[derive(Debug, Clone)]
pub struct RunContext {
    node_id: NodeId,
    graph_name: String,
    events: mpsc::Sender<ExecEvent>,
    cancel: CancelFlag,
    shared: Arc<Value>,
}

impl RunContext {
    /// Create a context for one node invocation. Called by the scheduler.
    pub fn new(
        node_id: NodeId,
        graph_name: impl Into<String>,
        events: mpsc::Sender<ExecEvent>,
        cancel: CancelFlag,
        shared: Arc<Value>,
    ) -> Self {
        Self {
            node_id,
            graph_name: graph_name.into(),
            events,
            cancel,
            shared,
        }
    }

    /// The id of the node being executed.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// The name of the graph being executed.
    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    /// The opaque caller-supplied context value, shared read-only.
    pub fn shared(&self) -> &Value {
        &self.shared
    }

    /// The run's cancellation flag.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Emit a progress event, tagged with this node's id and graph name.
    ///
    /// Events are dropped silently once the caller stops listening.
    pub async fn emit(&self, event: ExecEvent) {
        let event = event
            .with_node_id(self.node_id.clone())
            .with_graph_name(self.graph_name.clone());
        let _ = self.events.send(event).await;
    }

    /// Emit a log-style progress event.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(ExecEvent::log(level, message)).await;
    }
}

/// A named unit of work executed by the scheduler.
pub trait Runnable: Send + Sync {
    /// The runnable's name, used in diagnostics.
    fn name(&self) -> &str;

    /// The declared shape of the input this runnable accepts, if any.
    ///
    /// Absence disables static checking for edges into the node.
    fn input_schema(&self) -> Option<TypeDescriptor> {
        None
    }

    /// The declared shape of the result this runnable produces, if any.
    fn output_schema(&self) -> Option<TypeDescriptor> {
        None
    }

    /// Execute with the assembled input and the run context.
    ///
    /// Progress events go through `ctx.emit`; the future resolves to the
    /// single terminal result. A runnable observing `ctx.is_cancelled()`
    /// should stop and return `OrchidError::Aborted`.
    fn run<'a>(&'a self, input: Value, ctx: RunContext) -> RunnableFuture<'a>;
}

type BoxedRunFn = Box<
    dyn Fn(Value, RunContext) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>>
        + Send
        + Sync,
>;

/// A closure-backed [`Runnable`].
///
/// The minimal way to satisfy the contract; used heavily in tests and for
/// small inline steps.
pub struct FnRunnable {
    name: String,
    input_schema: Option<TypeDescriptor>,
    output_schema: Option<TypeDescriptor>,
    run_fn: BoxedRunFn,
}

impl FnRunnable {
    /// Create a runnable from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            input_schema: None,
            output_schema: None,
            run_fn: Box::new(move |input, ctx| Box::pin(f(input, ctx))),
        }
    }

    /// Create a runnable from a synchronous function of the input alone.
    pub fn from_sync<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, move |input, _ctx| std::future::ready(f(input)))
    }

    /// Declare the input shape.
    pub fn with_input_schema(mut self, schema: TypeDescriptor) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Declare the output shape.
    pub fn with_output_schema(mut self, schema: TypeDescriptor) -> Self {
        self.output_schema = Some(schema);
        self
    }
}

impl std::fmt::Debug for FnRunnable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnRunnable")
            .field("name", &self.name)
            .field("input_schema", &self.input_schema)
            .field("output_schema", &self.output_schema)
            .finish()
    }
}

impl Runnable for FnRunnable {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> Option<TypeDescriptor> {
        self.input_schema.clone()
    }

    fn output_schema(&self) -> Option<TypeDescriptor> {
        self.output_schema.clone()
    }

    fn run<'a>(&'a self, input: Value, ctx: RunContext) -> RunnableFuture<'a> {
        (self.run_fn)(input, ctx)
    }
}
