//! Dependency-driven execution scheduler.

mod executor;
mod state;

pub use executor::{
    ExecutionMode, Executor, ExecutorConfig, InvokeContext, Invocation, DEFAULT_EVENT_BUFFER,
    DEFAULT_MAX_CONCURRENT,
};
pub use state::ExecState;
