#![forbid(unsafe_code)]

//! Parameter binding.
//!
//! A [`ParameterCatalog`] holds scalar, array and associative-array binds for
//! one statement and hands them to the batch executor.

/// Parameter catalog.
pub mod catalog;

pub use catalog::{BindKind, BindSpec, CatalogState, ParameterCatalog};
