//! Orchid Executor - Graph execution engine.
//!
//! This crate provides the execution infrastructure for Orchid:
//! - Graph model with named input/output slots and incremental validation
//! - Dependency-driven scheduler (sequential and bounded-parallel modes)
//! - Persistence/resume via the shared execution snapshot
//! - Orchestration loop with a caller-controlled graph-mutation hook
//! - Construction-time diagnostics collector
//!
//! # Example
//!
//! ```ignore
//! use orchid_core::prelude::*;
//! use orchid_executor::prelude::*;
//! use std::sync::Arc;
//!
//! let graph = GraphBuilder::new("pipeline")
//!     .add_node("double", Arc::new(FnRunnable::from_sync("double", |v| {
//!         Ok(Value::float(v.as_f64().unwrap_or(0.0) * 2.0))
//!     })))
//!     .entry(["double"])
//!     .exit(["double"])
//!     .build()?;
//!
//! let executor = Executor::new(graph)?;
//! let result = executor.run(Value::int(21), InvokeContext::new()).await?;
//! ```

#![warn(missing_docs)]

pub mod diagnostics;
pub mod graph;
pub mod observability;
pub mod orchestrator;
pub mod scheduler;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::diagnostics::{Diagnostic, DiagnosticsCollector};
    pub use crate::graph::{
        ConnectOptions, Edge, Graph, GraphBuilder, GraphDescription, GraphNode, NodeOptions,
    };
    pub use crate::orchestrator::{GraphUpdate, Orchestrator, SinglePass, UpdateContext};
    pub use crate::scheduler::{
        ExecutionMode, Executor, ExecutorConfig, InvokeContext, Invocation,
    };
}
