//! Row-by-row execution of a catalog against an engine.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bind::{BindKind, BindSpec, ParameterCatalog};
use crate::engine::{BindParam, BindValue, Engine, EngineOutcome, Row};
use crate::error::{Error, Result, RowErrorMap};
use crate::value::Value;

/// Value captured for an output parameter.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutValue {
    /// Single value of a scalar output.
    Scalar(Value),
    /// One entry per successful row in array mode, or the elements of an
    /// associative output.
    Array(Vec<Value>),
}

/// Aggregate result of one execution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecuteResult {
    /// Sum of engine-reported affected rows.
    pub rows_affected: u64,
    /// Rows returned by the statement, across all batched rows.
    pub rows: Vec<Row>,
    /// Output values by parameter name.
    pub out_values: BTreeMap<String, OutValue>,
}

impl ExecuteResult {
    /// Scalar output named `name`.
    pub fn out_scalar(&self, name: &str) -> Option<&Value> {
        match self.out_values.get(name) {
            Some(OutValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    /// Sequence output named `name`.
    pub fn out_array(&self, name: &str) -> Option<&[Value]> {
        match self.out_values.get(name) {
            Some(OutValue::Array(values)) => Some(values),
            _ => None,
        }
    }
}

/// Drives an engine once per logical row of a catalog.
#[derive(Debug)]
pub struct BatchExecutor<'c> {
    catalog: &'c ParameterCatalog,
}

impl<'c> BatchExecutor<'c> {
    /// Creates an executor over `catalog`.
    pub fn new(catalog: &'c ParameterCatalog) -> Self {
        Self { catalog }
    }

    fn sent(&self, used: &BTreeSet<String>) -> Vec<&'c BindSpec> {
        self.catalog
            .iter()
            .filter(|spec| spec.direction.is_output() || used.contains(&spec.name))
            .collect()
    }

    /// Executes `sql`. In array mode rows run sequentially and failures are
    /// collected; otherwise the first engine failure is returned as is.
    pub fn run<E: Engine + ?Sized>(
        &self,
        sql: &str,
        used: &BTreeSet<String>,
        engine: &mut E,
    ) -> Result<ExecuteResult> {
        let specs = self.sent(used);
        match self.catalog.array_bind_count() {
            Some(count) if self.catalog.is_array_bound() => self.run_array(sql, &specs, count, engine),
            _ => self.run_single(sql, &specs, engine),
        }
    }

    fn run_single<E: Engine + ?Sized>(
        &self,
        sql: &str,
        specs: &[&BindSpec],
        engine: &mut E,
    ) -> Result<ExecuteResult> {
        let binds = row_binds(specs, 0);
        let outcome = engine.execute(sql, &binds)?;
        debug!(rows_affected = outcome.rows_affected, rows = outcome.rows.len(), "statement executed");
        let out_values = specs
            .iter()
            .filter(|spec| spec.direction.is_output())
            .map(|spec| {
                let captured = outcome.out_values.get(&spec.name).cloned().unwrap_or_default();
                let out = match spec.kind {
                    BindKind::AssocArray(_) => OutValue::Array(into_sequence(captured)),
                    _ => OutValue::Scalar(captured),
                };
                (spec.name.clone(), out)
            })
            .collect();
        Ok(ExecuteResult {
            rows_affected: outcome.rows_affected,
            rows: outcome.rows,
            out_values,
        })
    }

    fn run_array<E: Engine + ?Sized>(
        &self,
        sql: &str,
        specs: &[&BindSpec],
        count: usize,
        engine: &mut E,
    ) -> Result<ExecuteResult> {
        debug!(array_bind_count = count, binds = specs.len(), "executing array bind");
        let mut result = ExecuteResult::default();
        let mut outs: BTreeMap<String, Vec<Value>> = specs
            .iter()
            .filter(|spec| spec.direction.is_output())
            .map(|spec| (spec.name.clone(), Vec::new()))
            .collect();
        let mut row_errors = RowErrorMap::new();
        for row in 0..count {
            let binds = row_binds(specs, row);
            match engine.execute(sql, &binds) {
                Ok(EngineOutcome {
                    rows_affected,
                    rows,
                    mut out_values,
                }) => {
                    result.rows_affected += rows_affected;
                    result.rows.extend(rows);
                    for (name, captured) in outs.iter_mut() {
                        captured.push(out_values.remove(name).unwrap_or_default());
                    }
                }
                Err(err) => {
                    warn!(row, error = %err, "batched row failed");
                    row_errors.insert(row, err);
                }
            }
        }
        if !row_errors.is_empty() {
            info!(failed = row_errors.len(), attempted = count, "array bind finished with failures");
            return Err(Error::BatchPartialFailure {
                row_errors,
                attempted: count,
            });
        }
        debug!(rows_affected = result.rows_affected, "array bind finished");
        result.out_values = outs
            .into_iter()
            .map(|(name, values)| (name, OutValue::Array(values)))
            .collect();
        Ok(result)
    }
}

fn row_binds(specs: &[&BindSpec], row: usize) -> Vec<BindParam> {
    specs
        .iter()
        .map(|spec| {
            let value = match &spec.kind {
                BindKind::Scalar(value) => BindValue::Scalar(value.clone()),
                BindKind::Array(values) => {
                    BindValue::Scalar(values.get(row).cloned().unwrap_or_default())
                }
                BindKind::AssocArray(map) => BindValue::Assoc(map.clone()),
            };
            BindParam {
                name: spec.name.clone(),
                direction: spec.direction,
                value,
                out_capacity: spec.out_capacity,
            }
        })
        .collect()
}

fn into_sequence(value: Value) -> Vec<Value> {
    match value {
        Value::Seq(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}
