//! Conditional pruning and array expansion.

use tracing::trace;

use crate::error::{Error, Result};
use crate::expr::Evaluator;
use crate::template::params::scan_placeholders;
use crate::template::parser::{parse_template, Branch, Chain, Node};
use crate::value::{RepeatCounts, Value, VariableContext};

/// Prunes `template` against `values` and expands array placeholders using
/// `repeats`.
///
/// ```
/// use sqlweave::template::prune;
/// use sqlweave::value::{RepeatCounts, Value, VariableContext};
///
/// let mut values = VariableContext::new();
/// values.insert("name".into(), Value::from("KING"));
/// values.insert("dept".into(), Value::Null);
/// let sql = prune(
///     "<q>SELECT * FROM emp WHERE 1 = 1<if> AND ename = :name</if><if> AND deptno = :dept</if></q>",
///     &values,
///     &RepeatCounts::new(),
/// )
/// .unwrap();
/// assert_eq!(sql, "SELECT * FROM emp WHERE 1 = 1 AND ename = :name");
/// ```
pub fn prune(template: &str, values: &VariableContext, repeats: &RepeatCounts) -> Result<String> {
    let nodes = parse_template(template)?;
    Pruner { values, repeats }.run(&nodes)
}

struct Pruner<'a> {
    values: &'a VariableContext,
    repeats: &'a RepeatCounts,
}

impl Pruner<'_> {
    fn run(&self, nodes: &[Node]) -> Result<String> {
        self.check_known(nodes, false)?;
        let mut out = String::new();
        self.render(nodes, &mut out)?;
        Ok(out)
    }

    fn is_known(&self, name: &str) -> bool {
        self.values.contains_key(name) || self.repeats.contains_key(name)
    }

    /// Every placeholder inside a branch body must be valued or repeated.
    fn check_known(&self, nodes: &[Node], in_branch: bool) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) if in_branch => {
                    if let Some(name) = scan_placeholders(text).into_iter().find(|n| !self.is_known(n)) {
                        return Err(Error::unknown_parameter(name));
                    }
                }
                Node::Text(_) => {}
                Node::Expand { name, .. } => {
                    if !self.is_known(name) {
                        return Err(Error::unknown_parameter(name.as_str()));
                    }
                }
                Node::Chain(chain) => {
                    for branch in &chain.branches {
                        self.check_known(&branch.body, true)?;
                    }
                    if let Some(body) = &chain.otherwise {
                        self.check_known(body, true)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn render(&self, nodes: &[Node], out: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Expand { name, sep } => self.expand(name, sep, out)?,
                Node::Chain(chain) => {
                    if let Some(body) = self.select(chain)? {
                        self.render(body, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn select<'c>(&self, chain: &'c Chain) -> Result<Option<&'c [Node]>> {
        for (idx, branch) in chain.branches.iter().enumerate() {
            if self.branch_holds(branch)? {
                trace!(branch = idx, "chain branch selected");
                return Ok(Some(&branch.body));
            }
        }
        Ok(chain.otherwise.as_deref())
    }

    fn branch_holds(&self, branch: &Branch) -> Result<bool> {
        match &branch.condition {
            Some(expr) => Evaluator::new(Some(self.values)).matches(expr),
            None => Ok(self.implicit_holds(&branch.body)),
        }
    }

    /// Implicit guard: every placeholder directly in the body is given.
    fn implicit_holds(&self, body: &[Node]) -> bool {
        body.iter().all(|node| match node {
            Node::Text(text) => scan_placeholders(text)
                .into_iter()
                .all(|name| self.values.get(name).is_some_and(Value::is_given)),
            Node::Expand { name, .. } => match self.values.get(name) {
                Some(value) => value.is_given(),
                None => self.repeats.get(name).is_some_and(|count| *count > 0),
            },
            Node::Chain(_) => true,
        })
    }

    fn expand(&self, name: &str, sep: &str, out: &mut String) -> Result<()> {
        let count = match self.repeats.get(name) {
            Some(count) => *count,
            None => self
                .values
                .get(name)
                .and_then(Value::as_seq)
                .map(<[Value]>::len)
                .ok_or_else(|| Error::unknown_parameter(name))?,
        };
        for idx in 0..count {
            if idx > 0 {
                out.push_str(sep);
            }
            out.push(':');
            out.push_str(name);
            out.push_str(&idx.to_string());
        }
        Ok(())
    }
}
