#![forbid(unsafe_code)]

//! Guard expression language.
//!
//! Expressions are small boolean/relational formulas over `$name` variables,
//! e.g. `$salary > 1000 and not($dept = 'HR')`. They guard the explicit
//! branches of a template.

/// Condition syntax tree.
pub mod ast;

/// Evaluation against a variable context.
pub mod eval;

/// Expression tokenizer and parser.
pub mod parser;

pub use ast::{Condition, RelOp};
pub use eval::{compare, Evaluator};
pub use parser::parse;
