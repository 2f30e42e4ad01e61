//! Translation schema engine
//!
//! Schemas describe how an internal report maps to an output message
//! format. This module provides:
//! - the recursive schema tree ([`Schema`], [`SchemaElement`])
//! - validation with memoized results ([`Schema::is_valid`],
//!   [`Schema::validate`])
//! - the process-wide, versioned [`SchemaRegistry`] with swap-on-reload
//!   semantics, and the [`SupportedMessageTypes`] registry
//!
//! Validation never throws for individual element failures: every error
//! across the whole tree surfaces in one flat ordered list, prefixed with
//! the schema or element that produced it.

pub mod model;
pub mod registry;
pub mod validator;

pub use model::{Schema, SchemaElement, ValidationState};
pub use registry::{SchemaRegistry, SupportedMessageTypes};
