//! Filter evaluation
//!
//! Receivers carry four ordered filter lists (jurisdictional, quality,
//! routing, processingMode). Each entry names a predicate kind with
//! kind-specific arguments in function-call syntax. This module parses
//! the specs and evaluates reports against them.

pub mod engine;
pub mod predicate;

pub use engine::{FilterDecision, FilterEngine, FilterList, Rejection};
pub use predicate::{parse_filter_spec, FilterPredicate};
