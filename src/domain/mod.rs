//! Domain models and types for Courier.
//!
//! This module contains the core domain models, types, and business rules.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`Topic`], [`SchemaName`], [`ReceiverId`])
//! - **Report records** ([`ReportRecord`]) with path-based field access
//! - **Output formats** ([`ReportFormat`])
//! - **Error types** ([`CourierError`], [`TransportError`], [`ExpressionError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Courier uses the newtype pattern for identifiers to prevent mixing
//! different name kinds:
//!
//! ```rust
//! use courier::domain::{Topic, SchemaName};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let topic = Topic::new("covid-19")?;
//! let schema = SchemaName::new("covid-19")?;
//! // let wrong: Topic = schema;  // Compile error!
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, CourierError>`]. Validation
//! paths aggregate errors into lists instead of raising them; transport
//! delivery is the only class that surfaces a raised failure.

pub mod errors;
pub mod ids;
pub mod report;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{
    CourierError, ExpressionError, FilterPredicateError, TransportError, TransportErrorKind,
};
pub use ids::{ReceiverId, SchemaName, Topic};
pub use report::{ReportFormat, ReportRecord};
pub use result::Result;
