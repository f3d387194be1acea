//! Named parameter declarations for one statement.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::engine::{Direction, Engine};
use crate::error::{Error, Result};
use crate::exec::batch::{BatchExecutor, ExecuteResult};
use crate::value::{Value, ValueFamily, VariableContext};

/// Shape and payload of a bind.
#[derive(Clone, Debug, PartialEq)]
pub enum BindKind {
    /// One value sent with every row.
    Scalar(Value),
    /// One value per row of an array bind; length equals the array bind count.
    Array(Vec<Value>),
    /// Sparse associative array sent whole with every row.
    AssocArray(BTreeMap<u32, Value>),
}

impl BindKind {
    fn shape(&self) -> &'static str {
        match self {
            BindKind::Scalar(_) => "scalar",
            BindKind::Array(_) => "array",
            BindKind::AssocArray(_) => "associative array",
        }
    }

    fn same_shape(&self, other: &BindKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// One declared parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct BindSpec {
    /// Placeholder name without the `:` sigil.
    pub name: String,
    /// Shape and value.
    pub kind: BindKind,
    /// Direction.
    pub direction: Direction,
    /// Declared cardinality of an associative output.
    pub out_capacity: Option<usize>,
    family: Option<ValueFamily>,
}

impl BindSpec {
    /// Value family of the non-null payload, if any.
    pub fn family(&self) -> Option<ValueFamily> {
        self.family
    }
}

/// Lifecycle of a catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CatalogState {
    /// Accepting binds; may be executed.
    #[default]
    Building,
    /// Executed; must be rebound before running again.
    Executed,
}

/// Set of named binds for one statement.
///
/// Names are unique. Re-declaring a name replaces its value as long as the
/// shape and value family stay compatible; anything else is an
/// [`Error::Argument`].
///
/// ```
/// use sqlweave::bind::ParameterCatalog;
///
/// let mut catalog = ParameterCatalog::with_array_bind_count(3)?;
/// catalog
///     .bind_array("deptno", [4, 5, 6, 7])?
///     .bind_array("deptname", ["d4", "d5", "d6", "d7"])?;
/// assert_eq!(catalog.array_bind_count(), Some(3));
/// assert!(catalog.bind_array("manager", [1, 2]).is_err());
/// # Ok::<(), sqlweave::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct ParameterCatalog {
    specs: Vec<BindSpec>,
    index: HashMap<String, usize>,
    array_bind_count: Option<usize>,
    state: CatalogState,
}

impl ParameterCatalog {
    /// Creates an empty catalog; the first array bind fixes the array bind count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty catalog with a fixed array bind count.
    pub fn with_array_bind_count(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::argument("array_bind_count", "must be at least 1"));
        }
        Ok(Self {
            array_bind_count: Some(count),
            ..Self::default()
        })
    }

    /// Rows per execution in array mode, once known.
    pub fn array_bind_count(&self) -> Option<usize> {
        self.array_bind_count
    }

    /// True when at least one array bind is declared.
    pub fn is_array_bound(&self) -> bool {
        self.specs
            .iter()
            .any(|spec| matches!(spec.kind, BindKind::Array(_)))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CatalogState {
        self.state
    }

    /// Returns the bind declared as `name`.
    pub fn get(&self, name: &str) -> Option<&BindSpec> {
        self.index.get(name).map(|idx| &self.specs[*idx])
    }

    /// Declared binds in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &BindSpec> {
        self.specs.iter()
    }

    /// Number of declared binds.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Binds a scalar input. Null is allowed.
    pub fn bind_scalar(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<&mut Self> {
        let name = name.into();
        let value = value.into();
        if matches!(value, Value::Seq(_)) {
            return Err(Error::argument(name, "use an array bind for sequences"));
        }
        let family = value.family();
        self.declare(name, BindKind::Scalar(value), family, Direction::In)?;
        Ok(self)
    }

    /// Binds one value per row.
    ///
    /// Fewer values than the array bind count is an error; extra values are
    /// dropped. Without a preset count the first array fixes it.
    pub fn bind_array<I, V>(&mut self, name: impl Into<String>, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let name = name.into();
        let mut values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let count = match self.array_bind_count {
            Some(count) => count,
            None if values.is_empty() => {
                return Err(Error::argument(name, "array bind requires at least one value"))
            }
            None => values.len(),
        };
        if values.len() < count {
            return Err(Error::argument(
                name,
                format!("expected {count} values, got {}", values.len()),
            ));
        }
        values.truncate(count);
        let family = uniform_family(&name, &values)?;
        self.declare(name, BindKind::Array(values), family, Direction::In)?;
        self.array_bind_count = Some(count);
        Ok(self)
    }

    /// Binds a sparse associative array input.
    ///
    /// `None` is a [`Error::NullArgument`]; an empty collection is an
    /// [`Error::OutOfRange`].
    pub fn bind_assoc_array<I, V>(&mut self, name: impl Into<String>, entries: Option<I>) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (u32, V)>,
        V: Into<Value>,
    {
        let name = name.into();
        let Some(entries) = entries else {
            return Err(Error::NullArgument { name });
        };
        let map: BTreeMap<u32, Value> = entries.into_iter().map(|(k, v)| (k, v.into())).collect();
        if map.is_empty() {
            return Err(Error::OutOfRange {
                name,
                message: "associative array must contain at least one element".into(),
            });
        }
        let values: Vec<Value> = map.values().cloned().collect();
        let family = uniform_family(&name, &values)?;
        self.declare(name, BindKind::AssocArray(map), family, Direction::In)?;
        Ok(self)
    }

    /// Binds a list as an associative array keyed from 0.
    pub fn bind_assoc_list<V: Into<Value>>(
        &mut self,
        name: impl Into<String>,
        values: Option<Vec<V>>,
    ) -> Result<&mut Self> {
        let entries = values.map(|values| (0u32..).zip(values));
        self.bind_assoc_array(name, entries)
    }

    /// Declares `name` as an output. An existing input becomes in/out.
    pub fn out_param(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        let name = name.into();
        match self.index.get(&name).copied() {
            Some(idx) => {
                let spec = &mut self.specs[idx];
                if matches!(spec.kind, BindKind::AssocArray(_)) {
                    return Err(Error::argument(
                        name,
                        "declared as an associative array; use out_assoc_array",
                    ));
                }
                spec.direction = merge_output(spec.direction);
            }
            None => self.insert(BindSpec {
                name,
                kind: BindKind::Scalar(Value::Null),
                direction: Direction::Out,
                out_capacity: None,
                family: None,
            }),
        }
        self.state = CatalogState::Building;
        Ok(self)
    }

    /// Declares an associative array output holding up to `capacity` elements.
    pub fn out_assoc_array(&mut self, name: impl Into<String>, capacity: usize) -> Result<&mut Self> {
        let name = name.into();
        if capacity == 0 {
            return Err(Error::OutOfRange {
                name,
                message: "output capacity must be at least 1".into(),
            });
        }
        match self.index.get(&name).copied() {
            Some(idx) => {
                let spec = &mut self.specs[idx];
                if !matches!(spec.kind, BindKind::AssocArray(_)) {
                    return Err(Error::argument(
                        name,
                        format!("already declared as a {}", spec.kind.shape()),
                    ));
                }
                spec.direction = merge_output(spec.direction);
                spec.out_capacity = Some(capacity);
            }
            None => self.insert(BindSpec {
                name,
                kind: BindKind::AssocArray(BTreeMap::new()),
                direction: Direction::Out,
                out_capacity: Some(capacity),
                family: None,
            }),
        }
        self.state = CatalogState::Building;
        Ok(self)
    }

    /// Checks that every placeholder in `used` has a bind.
    pub fn validate(&self, used: &BTreeSet<String>) -> Result<()> {
        match used.iter().find(|name| !self.index.contains_key(name.as_str())) {
            Some(name) => Err(Error::UnboundParameter { name: name.clone() }),
            None => Ok(()),
        }
    }

    /// Input values as a variable context; arrays and associative arrays
    /// appear as sequences.
    pub fn context(&self) -> VariableContext {
        self.specs
            .iter()
            .filter(|spec| spec.direction.is_input())
            .map(|spec| {
                let value = match &spec.kind {
                    BindKind::Scalar(value) => value.clone(),
                    BindKind::Array(values) => Value::Seq(values.clone()),
                    BindKind::AssocArray(map) => Value::Seq(map.values().cloned().collect()),
                };
                (spec.name.clone(), value)
            })
            .collect()
    }

    /// Runs `sql` on `engine`, sending the binds named in `used` plus every
    /// output.
    pub fn execute<E: Engine + ?Sized>(
        &mut self,
        sql: &str,
        used: &BTreeSet<String>,
        engine: &mut E,
    ) -> Result<ExecuteResult> {
        if self.state == CatalogState::Executed {
            return Err(Error::argument(
                "catalog",
                "already executed; rebind parameters before executing again",
            ));
        }
        self.validate(used)?;
        self.state = CatalogState::Executed;
        BatchExecutor::new(self).run(sql, used, engine)
    }

    /// Returns an executed catalog to the building state without changing
    /// any bind.
    pub fn reset(&mut self) {
        self.state = CatalogState::Building;
    }

    fn declare(
        &mut self,
        name: String,
        kind: BindKind,
        family: Option<ValueFamily>,
        direction: Direction,
    ) -> Result<()> {
        self.state = CatalogState::Building;
        let Some(idx) = self.index.get(&name).copied() else {
            debug!(param = %name, shape = kind.shape(), "parameter declared");
            self.insert(BindSpec {
                name,
                kind,
                direction,
                out_capacity: None,
                family,
            });
            return Ok(());
        };
        let spec = &mut self.specs[idx];
        if !spec.kind.same_shape(&kind) {
            return Err(Error::argument(
                name,
                format!(
                    "already declared as a {}, cannot rebind as a {}",
                    spec.kind.shape(),
                    kind.shape()
                ),
            ));
        }
        if let (Some(existing), Some(incoming)) = (spec.family, family) {
            if existing != incoming {
                return Err(Error::argument(
                    name,
                    format!("already declared as {existing}, cannot rebind as {incoming}"),
                ));
            }
        }
        spec.kind = kind;
        spec.family = spec.family.or(family);
        if !spec.direction.is_input() {
            spec.direction = Direction::InOut;
        }
        Ok(())
    }

    fn insert(&mut self, spec: BindSpec) {
        self.index.insert(spec.name.clone(), self.specs.len());
        self.specs.push(spec);
    }
}

fn merge_output(direction: Direction) -> Direction {
    match direction {
        Direction::In | Direction::InOut => Direction::InOut,
        Direction::Out => Direction::Out,
    }
}

/// Family shared by every non-null element.
fn uniform_family(name: &str, values: &[Value]) -> Result<Option<ValueFamily>> {
    let mut family = None;
    for value in values {
        if matches!(value, Value::Seq(_)) {
            return Err(Error::argument(name, "nested sequences cannot be bound"));
        }
        match (family, value.family()) {
            (_, None) => {}
            (None, found) => family = found,
            (Some(expected), Some(found)) if expected != found => {
                return Err(Error::argument(
                    name,
                    format!("mixes {expected} and {found} values"),
                ))
            }
            _ => {}
        }
    }
    Ok(family)
}
