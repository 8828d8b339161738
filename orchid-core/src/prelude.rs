//! Prelude for convenient imports.
//!
//! ```ignore
//! use orchid_core::prelude::*;
//! ```

pub use crate::cancel::CancelFlag;
pub use crate::error::{OrchidError, Result};
pub use crate::event::{EventKind, ExecEvent, LogLevel};
pub use crate::runnable::{FnRunnable, RunContext, Runnable, RunnableFuture};
pub use crate::schema::{
    check_compatibility, schema_presence, CompatibilityReport, Property, TypeDescriptor, TypeKind,
};
pub use crate::snapshot::{ExecutionSnapshot, SharedSnapshot};
pub use crate::types::{NodeId, RunId};
pub use crate::value::Value;
