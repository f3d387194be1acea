//! Conditional SQL templates with expression guards and batch parameter
//! binding.
//!
//! A statement is written once as a tag-annotated template. At execution
//! time the optional fragments whose guards fail are pruned, array
//! placeholders are expanded, and the remaining placeholders are bound from a
//! [`bind::ParameterCatalog`] and sent to an [`engine::Engine`], once per row
//! when array binds are present.
//!
//! ```
//! use sqlweave::{Command, SqliteEngine, Value};
//!
//! let mut engine = SqliteEngine::open_in_memory()?;
//! Command::new("create table emp (ename text, sal integer)").execute(&mut engine)?;
//!
//! let mut insert = Command::new("insert into emp values (:ename, :sal)");
//! insert
//!     .bind_array("ename", ["KING", "SCOTT"])?
//!     .bind_array("sal", [5000, 3000])?;
//! assert_eq!(insert.execute(&mut engine)?.rows_affected, 2);
//!
//! let mut query = Command::new(
//!     "<query>select ename from emp where 1 = 1 <if>and sal &gt; :min_sal</if></query>",
//! );
//! query.bind_scalar("min_sal", 4000)?;
//! let rows = query.execute(&mut engine)?.rows;
//! assert_eq!(rows[0].get(0), Some(&Value::from("KING")));
//! # Ok::<(), sqlweave::Error>(())
//! ```

#![warn(missing_docs)]

pub mod bind;
pub mod config;
pub mod engine;
/// Error taxonomy.
pub mod error;
pub mod exec;
pub mod expr;
pub mod sqlite_adapter;
pub mod template;
pub mod value;

pub use bind::ParameterCatalog;
pub use config::EngineConfig;
pub use engine::{Engine, EngineError, EngineErrorKind, TransactionScope};
pub use error::{Error, ErrorKind, Result, RowErrorMap};
pub use exec::{Command, ExecuteResult, OutValue};
pub use expr::Evaluator;
pub use sqlite_adapter::SqliteEngine;
pub use template::{normalize_whitespace, prune, used_parameters};
pub use value::{RepeatCounts, Value, VariableContext};
