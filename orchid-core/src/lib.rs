//! Orchid Core Library
//!
//! This crate provides the foundational types, traits, and pure logic for
//! the Orchid task-orchestration engine.
//!
//! # Key Components
//!
//! - **Types**: Strongly-typed node and run identifiers
//! - **Value**: The dynamic payload flowing along graph edges
//! - **Schema**: Structural type descriptors and the compatibility validator
//! - **Runnable**: The contract a unit of work implements
//! - **Events**: Progress events streamed to the caller during execution
//! - **Snapshot**: Serializable per-node state enabling resume
//!
//! The graph model, scheduler, and orchestration loop live in the
//! `orchid-executor` crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod event;
pub mod prelude;
pub mod runnable;
pub mod schema;
pub mod snapshot;
pub mod types;
pub mod value;

// Re-export key types at crate root for convenience
pub use cancel::CancelFlag;
pub use error::{OrchidError, Result};
pub use event::{EventKind, ExecEvent, LogLevel};
pub use runnable::{FnRunnable, RunContext, Runnable, RunnableFuture};
pub use schema::{check_compatibility, CompatibilityReport, TypeDescriptor};
pub use snapshot::{ExecutionSnapshot, SharedSnapshot};
pub use types::{NodeId, RunId};
pub use value::Value;
