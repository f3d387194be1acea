//! Statement text plus its binds, ready to run.

use std::collections::BTreeSet;

use tracing::debug;

use crate::bind::ParameterCatalog;
use crate::engine::Engine;
use crate::error::Result;
use crate::exec::batch::ExecuteResult;
use crate::template::{is_template, prune, used_parameters};
use crate::value::{RepeatCounts, Value, VariableContext};

/// A statement or template together with its parameter catalog.
///
/// Templates are pruned against the bound input values at execution time,
/// so the same command can yield different SQL as binds change.
///
/// ```
/// use sqlweave::exec::Command;
/// use sqlweave::sqlite_adapter::SqliteEngine;
///
/// let mut engine = SqliteEngine::open_in_memory()?;
/// let mut cmd = Command::new(
///     "<q>SELECT 1 AS x WHERE 1 = 1 <if>AND :flag = 1</if></q>",
/// );
/// cmd.bind_scalar("flag", sqlweave::Value::Null)?;
/// assert_eq!(cmd.render()?.trim(), "SELECT 1 AS x WHERE 1 = 1");
/// let result = cmd.execute(&mut engine)?;
/// assert_eq!(result.rows.len(), 1);
/// # Ok::<(), sqlweave::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Command {
    text: String,
    catalog: ParameterCatalog,
    repeats: RepeatCounts,
    lists: VariableContext,
}

impl Command {
    /// Creates a command without array binds.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            catalog: ParameterCatalog::new(),
            repeats: RepeatCounts::new(),
            lists: VariableContext::new(),
        }
    }

    /// Creates a command that runs `count` rows per execution.
    pub fn with_array_bind_count(text: impl Into<String>, count: usize) -> Result<Self> {
        Ok(Self {
            catalog: ParameterCatalog::with_array_bind_count(count)?,
            ..Self::new(text)
        })
    }

    /// Statement or template text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text, keeping every bind.
    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = text.into();
        self.catalog.reset();
        self
    }

    /// Parameter catalog.
    pub fn catalog(&self) -> &ParameterCatalog {
        &self.catalog
    }

    /// Rows per execution in array mode.
    pub fn array_bind_count(&self) -> Option<usize> {
        self.catalog.array_bind_count()
    }

    /// See [`ParameterCatalog::bind_scalar`].
    pub fn bind_scalar(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<&mut Self> {
        self.catalog.bind_scalar(name, value)?;
        Ok(self)
    }

    /// See [`ParameterCatalog::bind_array`].
    pub fn bind_array<I, V>(&mut self, name: impl Into<String>, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.catalog.bind_array(name, values)?;
        Ok(self)
    }

    /// See [`ParameterCatalog::bind_assoc_array`].
    pub fn bind_assoc_array<I, V>(&mut self, name: impl Into<String>, entries: Option<I>) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (u32, V)>,
        V: Into<Value>,
    {
        self.catalog.bind_assoc_array(name, entries)?;
        Ok(self)
    }

    /// See [`ParameterCatalog::bind_assoc_list`].
    pub fn bind_assoc_list<V: Into<Value>>(
        &mut self,
        name: impl Into<String>,
        values: Option<Vec<V>>,
    ) -> Result<&mut Self> {
        self.catalog.bind_assoc_list(name, values)?;
        Ok(self)
    }

    /// See [`ParameterCatalog::out_param`].
    pub fn out_param(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        self.catalog.out_param(name)?;
        Ok(self)
    }

    /// See [`ParameterCatalog::out_assoc_array`].
    pub fn out_assoc_array(&mut self, name: impl Into<String>, capacity: usize) -> Result<&mut Self> {
        self.catalog.out_assoc_array(name, capacity)?;
        Ok(self)
    }

    /// Binds a list for an `<a>` expansion: each element becomes the scalar
    /// `name0`, `name1`, … and the list length becomes the repeat count.
    pub fn bind_list<I, V>(&mut self, name: impl Into<String>, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let name = name.into();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        for (idx, value) in values.iter().enumerate() {
            self.catalog.bind_scalar(format!("{name}{idx}"), value.clone())?;
        }
        self.repeats.insert(name.clone(), values.len());
        self.lists.insert(name, Value::Seq(values));
        Ok(self)
    }

    /// Values visible to template conditions.
    pub fn context(&self) -> VariableContext {
        let mut context = self.catalog.context();
        context.extend(self.lists.iter().map(|(k, v)| (k.clone(), v.clone())));
        context
    }

    /// SQL that would be sent: the pruned template, or the text itself.
    pub fn render(&self) -> Result<String> {
        if is_template(&self.text) {
            prune(&self.text, &self.context(), &self.repeats)
        } else {
            Ok(self.text.clone())
        }
    }

    /// Placeholders used by the rendered SQL.
    pub fn used_parameters(&self) -> Result<BTreeSet<String>> {
        Ok(used_parameters(&self.render()?))
    }

    /// Prunes, validates and runs the statement on `engine`.
    pub fn execute<E: Engine + ?Sized>(&mut self, engine: &mut E) -> Result<ExecuteResult> {
        let sql = self.render()?;
        let used = used_parameters(&sql);
        debug!(params = used.len(), "command rendered");
        self.catalog.execute(&sql, &used, engine)
    }
}
