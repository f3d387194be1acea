#![forbid(unsafe_code)]

//! Tag-annotated query templates.
//!
//! A template wraps SQL in a root element and marks optional fragments with
//! `<if>`, `<elsif c='…'>` and `<else>`. An `<if>` without a condition keeps
//! its body only when every placeholder it mentions has a value; `<a>` tags
//! expand an array placeholder into `:name0, :name1, …`.

/// Placeholder scanning helpers.
pub mod params;

/// Template document parser.
pub mod parser;

/// Pruning and expansion.
pub mod prune;

pub use params::{is_template, normalize_whitespace, scan_placeholders, used_parameters};
pub use parser::{parse_template, Branch, Chain, Node};
pub use prune::prune;
