//! Condition syntax tree produced by the expression parser.

use std::fmt;

/// Relational operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl RelOp {
    /// Source spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            RelOp::Eq => "=",
            RelOp::Ne => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        }
    }

    /// Applies the operator to an ordering result.
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            RelOp::Eq => ordering == Equal,
            RelOp::Ne => ordering != Equal,
            RelOp::Lt => ordering == Less,
            RelOp::Le => ordering != Greater,
            RelOp::Gt => ordering == Greater,
            RelOp::Ge => ordering != Less,
        }
    }
}

/// Parsed condition.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// `$name`
    Var(String),
    /// Numeric literal.
    Number(f64),
    /// Quoted text literal.
    Text(String),
    /// `not(expr)`
    Not(Box<Condition>),
    /// `lhs and rhs`
    And(Box<Condition>, Box<Condition>),
    /// `lhs or rhs`
    Or(Box<Condition>, Box<Condition>),
    /// `lhs op rhs`
    Compare {
        /// Operator.
        op: RelOp,
        /// Left operand.
        lhs: Box<Condition>,
        /// Right operand.
        rhs: Box<Condition>,
    },
}

impl Condition {
    /// Visits every variable reference in evaluation order.
    pub fn for_each_var<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Condition::Var(name) => f(name),
            Condition::Number(_) | Condition::Text(_) => {}
            Condition::Not(inner) => inner.for_each_var(f),
            Condition::And(lhs, rhs) | Condition::Or(lhs, rhs) => {
                lhs.for_each_var(f);
                rhs.for_each_var(f);
            }
            Condition::Compare { lhs, rhs, .. } => {
                lhs.for_each_var(f);
                rhs.for_each_var(f);
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Var(name) => write!(f, "${name}"),
            Condition::Number(n) => write!(f, "{n}"),
            Condition::Text(s) => write!(f, "'{s}'"),
            Condition::Not(inner) => write!(f, "not({inner})"),
            Condition::And(lhs, rhs) => write!(f, "({lhs} and {rhs})"),
            Condition::Or(lhs, rhs) => write!(f, "({lhs} or {rhs})"),
            Condition::Compare { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
        }
    }
}
