//! [`Engine`] implementation backed by SQLite.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, Statement};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::engine::{
    BindParam, BindValue, Engine, EngineError, EngineErrorKind, EngineOutcome, Row,
};
use crate::value::Value;

const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// SQLite connection driven through named `:placeholder` binds.
///
/// Statements that yield columns, including DML with `RETURNING`, fill output
/// parameters from the returned columns: by matching column name first, then
/// by position among the declared outputs.
pub struct SqliteEngine {
    conn: Connection,
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteEngine {
    /// Opens (or creates) the database at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::open_with(&EngineConfig::default().with_path(path.as_ref()))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, EngineError> {
        Self::open_with(&EngineConfig::in_memory())
    }

    /// Opens a database as described by `config`.
    pub fn open_with(config: &EngineConfig) -> Result<Self, EngineError> {
        let conn = match &config.path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(classify)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(classify)?;
        let journal: String = conn
            .pragma_update_and_check(None, "journal_mode", config.journal_mode.as_pragma(), |row| {
                row.get(0)
            })
            .map_err(classify)?;
        conn.pragma_update(None, "synchronous", config.synchronous.as_pragma())
            .map_err(classify)?;
        conn.pragma_update(None, "foreign_keys", config.foreign_keys)
            .map_err(classify)?;
        debug!(path = ?config.path, journal_mode = %journal, "sqlite engine opened");
        Ok(Self { conn })
    }

    /// Underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Engine for SqliteEngine {
    fn execute(&mut self, sql: &str, binds: &[BindParam]) -> Result<EngineOutcome, EngineError> {
        if let Some(bind) = binds.iter().find(|b| matches!(b.value, BindValue::Assoc(_))) {
            return Err(EngineError::new(
                EngineErrorKind::Unsupported,
                None,
                format!("associative array ':{}' cannot be bound by sqlite", bind.name),
            ));
        }
        trace!(sql, binds = binds.len(), "sqlite execute");
        let mut stmt = self.conn.prepare(sql).map_err(classify)?;
        bind_all(&mut stmt, binds)?;

        if stmt.column_count() == 0 {
            let changed = stmt.raw_execute().map_err(classify)?;
            return Ok(EngineOutcome {
                rows_affected: changed as u64,
                ..EngineOutcome::default()
            });
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
        let readonly = stmt.readonly();
        let mut rows = Vec::new();
        {
            let mut cursor = stmt.raw_query();
            while let Some(row) = cursor.next().map_err(classify)? {
                let values = (0..columns.len())
                    .map(|idx| row.get_ref(idx).map(from_sql))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(classify)?;
                rows.push(Row {
                    columns: columns.clone(),
                    values,
                });
            }
        }
        drop(stmt);
        let rows_affected = if readonly { 0 } else { self.conn.changes() as u64 };

        let mut outcome = EngineOutcome {
            rows_affected,
            rows,
            ..EngineOutcome::default()
        };
        let outputs = binds.iter().filter(|b| b.direction.is_output());
        for (position, bind) in outputs.enumerate() {
            let column = columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&bind.name))
                .or((position < columns.len()).then_some(position));
            let value = match column {
                Some(idx) => collect_column(&outcome.rows, idx),
                None => Value::Null,
            };
            outcome.out_values.insert(bind.name.clone(), value);
        }
        Ok(outcome)
    }

    fn begin_transaction(&mut self) -> Result<(), EngineError> {
        self.conn.execute("BEGIN TRANSACTION", []).map_err(classify)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), EngineError> {
        self.conn.execute("COMMIT", []).map_err(classify)?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), EngineError> {
        self.conn.execute("ROLLBACK", []).map_err(classify)?;
        Ok(())
    }
}

/// Binds every scalar by name. A statement parameter left without a bind is
/// an `UnboundVariable` error rather than an implicit NULL.
fn bind_all(stmt: &mut Statement<'_>, binds: &[BindParam]) -> Result<(), EngineError> {
    let mut bound = vec![false; stmt.parameter_count()];
    for bind in binds {
        let BindValue::Scalar(value) = &bind.value else {
            continue;
        };
        let placeholder = format!(":{}", bind.name);
        if let Some(idx) = stmt.parameter_index(&placeholder).map_err(classify)? {
            stmt.raw_bind_parameter(idx, value).map_err(classify)?;
            bound[idx - 1] = true;
        }
    }
    if let Some(missing) = bound.iter().position(|done| !done) {
        let idx = missing + 1;
        let name = stmt
            .parameter_name(idx)
            .map_or_else(|| format!("?{idx}"), str::to_owned);
        return Err(EngineError::new(
            EngineErrorKind::UnboundVariable,
            None,
            format!("statement parameter '{name}' has no bind"),
        ));
    }
    Ok(())
}

/// One returned row yields its value, several yield a sequence.
fn collect_column(rows: &[Row], idx: usize) -> Value {
    match rows {
        [] => Value::Null,
        [row] => row.get(idx).cloned().unwrap_or_default(),
        many => Value::Seq(
            many.iter()
                .map(|row| row.get(idx).cloned().unwrap_or_default())
                .collect(),
        ),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Seq(_) => {
                return Err(rusqlite::Error::ToSqlConversionFailure(
                    "sequences cannot be bound as a single sqlite value".into(),
                ))
            }
        })
    }
}

/// Maps a rusqlite error onto an [`EngineError`], keeping the extended code.
fn classify(err: rusqlite::Error) -> EngineError {
    let code = err.sqlite_error().map(|e| e.extended_code);
    let message = err.to_string();
    let kind = match code {
        Some(SQLITE_CONSTRAINT_PRIMARYKEY | SQLITE_CONSTRAINT_UNIQUE) => EngineErrorKind::UniqueViolation,
        _ if message.contains("no such table")
            || message.contains("no such column")
            || message.contains("no such function") =>
        {
            EngineErrorKind::MissingObject
        }
        _ if message.contains("syntax error") || message.contains("incomplete input") => {
            EngineErrorKind::InvalidSyntax
        }
        _ if matches!(err, rusqlite::Error::ToSqlConversionFailure(_)) => EngineErrorKind::Unsupported,
        _ => EngineErrorKind::Other,
    };
    EngineError::new(kind, code, message)
}
