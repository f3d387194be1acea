#![forbid(unsafe_code)]

//! Engine call contract.
//!
//! The binder never talks to a database directly. It drives an [`Engine`],
//! which executes one statement with a set of named binds and reports either
//! an outcome or a native error. Transactions are opened only by callers,
//! through [`TransactionScope`].

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::value::Value;

/// Classification of a native engine error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    /// Referenced table, column or routine does not exist.
    MissingObject,
    /// Statement text is not valid SQL for the engine.
    InvalidSyntax,
    /// Statement references a bind variable that was not supplied.
    UnboundVariable,
    /// Unique or primary key constraint violated.
    UniqueViolation,
    /// Bind shape the engine cannot handle.
    Unsupported,
    /// Anything else.
    Other,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineErrorKind::MissingObject => "missing object",
            EngineErrorKind::InvalidSyntax => "invalid syntax",
            EngineErrorKind::UnboundVariable => "unbound variable",
            EngineErrorKind::UniqueViolation => "unique violation",
            EngineErrorKind::Unsupported => "unsupported",
            EngineErrorKind::Other => "engine failure",
        };
        f.write_str(name)
    }
}

/// Native failure reported by an engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}{}: {message}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
pub struct EngineError {
    kind: EngineErrorKind,
    code: Option<i32>,
    message: String,
}

impl EngineError {
    /// Creates an error from its classification, native code and message.
    pub fn new(kind: EngineErrorKind, code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    /// Classification of the native code.
    pub fn kind(&self) -> EngineErrorKind {
        self.kind
    }

    /// Native error code, when the engine reports one.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Native message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Direction of a bind parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Value flows to the engine.
    #[default]
    In,
    /// Value flows back from the engine.
    Out,
    /// Both.
    InOut,
}

impl Direction {
    /// True for `Out` and `InOut`.
    pub fn is_output(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }

    /// True for `In` and `InOut`.
    pub fn is_input(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }
}

/// Value carried by a [`BindParam`].
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    /// Single value; for array binds this is the current row's element.
    Scalar(Value),
    /// Sparse associative array keyed by `u32`.
    Assoc(BTreeMap<u32, Value>),
}

/// One named bind sent with a statement.
#[derive(Clone, Debug, PartialEq)]
pub struct BindParam {
    /// Placeholder name without the `:` sigil.
    pub name: String,
    /// Direction.
    pub direction: Direction,
    /// Input value, or the placeholder value for pure outputs.
    pub value: BindValue,
    /// Declared cardinality for associative outputs.
    pub out_capacity: Option<usize>,
}

/// Result row returned by a statement that yields columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    /// Column names.
    pub columns: Vec<String>,
    /// Column values, aligned with `columns`.
    pub values: Vec<Value>,
}

impl Row {
    /// Value at `idx`.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value of the first column named `name`, ignoring ASCII case.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }
}

/// What one engine call produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineOutcome {
    /// Rows inserted, updated or deleted.
    pub rows_affected: u64,
    /// Rows returned by a query.
    pub rows: Vec<Row>,
    /// Values captured for output binds.
    pub out_values: BTreeMap<String, Value>,
}

/// Relational engine driven by the binder.
pub trait Engine {
    /// Executes `sql` once with `binds`.
    fn execute(&mut self, sql: &str, binds: &[BindParam]) -> Result<EngineOutcome, EngineError>;

    /// Opens a transaction.
    fn begin_transaction(&mut self) -> Result<(), EngineError>;

    /// Commits the open transaction.
    fn commit(&mut self) -> Result<(), EngineError>;

    /// Rolls back the open transaction.
    fn rollback(&mut self) -> Result<(), EngineError>;
}

impl<E: Engine + ?Sized> Engine for &mut E {
    fn execute(&mut self, sql: &str, binds: &[BindParam]) -> Result<EngineOutcome, EngineError> {
        (**self).execute(sql, binds)
    }

    fn begin_transaction(&mut self) -> Result<(), EngineError> {
        (**self).begin_transaction()
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), EngineError> {
        (**self).rollback()
    }
}

/// The state of a [`TransactionScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Open and accepting statements.
    Active,
    /// Committed.
    Committed,
    /// Rolled back.
    RolledBack,
}

/// Caller-owned transaction over an engine.
///
/// Statements run through [`TransactionScope::engine`] belong to the
/// transaction. A scope dropped while still active is rolled back.
///
/// ```
/// use sqlweave::engine::TransactionScope;
/// use sqlweave::exec::Command;
/// use sqlweave::sqlite_adapter::SqliteEngine;
///
/// let mut engine = SqliteEngine::open_in_memory()?;
/// Command::new("create table t (x integer)").execute(&mut engine)?;
///
/// let mut tx = TransactionScope::begin(&mut engine)?;
/// let mut insert = Command::new("insert into t values (:x)");
/// insert.bind_scalar("x", 1)?;
/// insert.execute(tx.engine())?;
/// tx.commit()?;
/// # Ok::<(), sqlweave::Error>(())
/// ```
#[derive(Debug)]
pub struct TransactionScope<'e, E: Engine + ?Sized> {
    engine: &'e mut E,
    state: TxState,
}

impl<'e, E: Engine + ?Sized> TransactionScope<'e, E> {
    /// Opens a transaction on `engine`.
    pub fn begin(engine: &'e mut E) -> Result<Self, EngineError> {
        engine.begin_transaction()?;
        debug!("transaction started");
        Ok(Self {
            engine,
            state: TxState::Active,
        })
    }

    /// Engine handle for statements inside the transaction.
    pub fn engine(&mut self) -> &mut E {
        self.engine
    }

    /// Current state.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Commits and ends the scope. A failed commit rolls the transaction
    /// back before the commit error is returned.
    pub fn commit(mut self) -> Result<(), EngineError> {
        match self.engine.commit() {
            Ok(()) => {
                self.state = TxState::Committed;
                debug!("transaction committed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "commit failed; rolling back");
                if let Err(rollback_err) = self.engine.rollback() {
                    warn!(error = %rollback_err, "rollback after failed commit failed");
                }
                self.state = TxState::RolledBack;
                Err(err)
            }
        }
    }

    /// Rolls back and ends the scope.
    pub fn rollback(mut self) -> Result<(), EngineError> {
        self.state = TxState::RolledBack;
        self.engine.rollback()?;
        debug!("transaction rolled back");
        Ok(())
    }
}

impl<E: Engine + ?Sized> Drop for TransactionScope<'_, E> {
    fn drop(&mut self) {
        if self.state == TxState::Active {
            warn!("transaction scope dropped while active; rolling back");
            if let Err(err) = self.engine.rollback() {
                warn!(error = %err, "rollback on drop failed");
            }
            self.state = TxState::RolledBack;
        }
    }
}
