//! Evaluation of parsed conditions against a [`VariableContext`].

use crate::error::{Error, Result};
use crate::expr::ast::{Condition, RelOp};
use crate::expr::parser::parse;
use crate::value::{Value, VariableContext};

/// Evaluates guard expressions against an optional variable context.
///
/// The evaluator only reads the context, so one instance can be shared across
/// threads and called repeatedly.
///
/// ```
/// use sqlweave::expr::Evaluator;
/// use sqlweave::value::{Value, VariableContext};
///
/// let mut vars = VariableContext::new();
/// vars.insert("choice".into(), Value::Int(3));
/// let eval = Evaluator::new(Some(&vars));
/// assert!(eval.matches("$choice = 3").unwrap());
/// assert!(!eval.matches("$choice < 2").unwrap());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Evaluator<'a> {
    context: Option<&'a VariableContext>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator. `None` means no variables can be referenced.
    pub fn new(context: Option<&'a VariableContext>) -> Self {
        Self { context }
    }

    /// Parses and evaluates `expression`.
    pub fn matches(&self, expression: &str) -> Result<bool> {
        let condition = parse(expression)?;
        self.evaluate(&condition)
    }

    /// Evaluates an already parsed condition.
    ///
    /// Every variable is resolved up front so that short-circuiting never hides
    /// an unknown name.
    pub fn evaluate(&self, condition: &Condition) -> Result<bool> {
        let mut missing = None;
        condition.for_each_var(&mut |name| {
            if missing.is_none() && self.lookup(name).is_none() {
                missing = Some(name.to_owned());
            }
        });
        if let Some(name) = missing {
            return Err(Error::unknown_variable(name));
        }
        Ok(self.eval_bool(condition))
    }

    fn lookup(&self, name: &str) -> Option<&'a Value> {
        self.context.and_then(|ctx| ctx.get(name))
    }

    fn eval_bool(&self, condition: &Condition) -> bool {
        match condition {
            Condition::Var(name) => self.lookup(name).is_some_and(Value::truthy),
            Condition::Number(n) => *n != 0.0 && !n.is_nan(),
            Condition::Text(s) => !s.is_empty(),
            Condition::Not(inner) => !self.eval_bool(inner),
            Condition::And(lhs, rhs) => self.eval_bool(lhs) && self.eval_bool(rhs),
            Condition::Or(lhs, rhs) => self.eval_bool(lhs) || self.eval_bool(rhs),
            Condition::Compare { op, lhs, rhs } => {
                let lhs = self.operand(lhs);
                let rhs = self.operand(rhs);
                compare(*op, &lhs, &rhs)
            }
        }
    }

    fn operand(&self, condition: &Condition) -> Value {
        match condition {
            Condition::Var(name) => self.lookup(name).cloned().unwrap_or(Value::Null),
            Condition::Number(n) => Value::Float(*n),
            Condition::Text(s) => Value::Text(s.clone()),
            other => Value::Bool(self.eval_bool(other)),
        }
    }
}

/// Applies a relational operator with loose typing.
///
/// Sequences compare existentially, nulls never compare, booleans compare by
/// truthiness for (in)equality, and everything else compares numerically when
/// both sides parse as numbers and as text otherwise.
pub fn compare(op: RelOp, lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Seq(items), other) => items.iter().any(|item| compare(op, item, other)),
        (other, Value::Seq(items)) => items.iter().any(|item| compare(op, other, item)),
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(_), _) | (_, Value::Bool(_)) if matches!(op, RelOp::Eq | RelOp::Ne) => {
            op.holds(lhs.truthy().cmp(&rhs.truthy()))
        }
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(l), Some(r)) => l.partial_cmp(&r).is_some_and(|ord| op.holds(ord)),
            _ => op.holds(lhs.as_text().cmp(&rhs.as_text())),
        },
    }
}
