#![forbid(unsafe_code)]

//! Execution of bound statements.

/// Row-by-row batch execution.
pub mod batch;

/// Statement façade.
pub mod command;

pub use batch::{BatchExecutor, ExecuteResult, OutValue};
pub use command::Command;
