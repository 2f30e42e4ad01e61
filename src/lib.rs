// Courier - health-data report routing engine
// Copyright (c) 2025 Courier Contributors
// Licensed under the MIT License

//! # Courier - health-data report routing
//!
//! Courier routes structured health-data reports from senders to many
//! independently configured receivers, transforming each report into a
//! receiver-specific format and delivering it over a receiver-specific
//! transport, on a receiver-specific schedule.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Validating** recursive translation schemas with memoized results
//! - **Resolving** polymorphic translation configuration (HL7 / REDOX /
//!   CUSTOM) into a concrete format, schema, and defaults
//! - **Filtering** reports per receiver with named, parameterized
//!   predicates
//! - **Batching** admitted reports on per-receiver schedules
//! - **Dispatching** rendered batches over SFTP, FTPS, AS2, email, blob
//!   storage, or GAEN endpoints with bounded retries
//!
//! ## Architecture
//!
//! Courier follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`router`] - Pipeline orchestration (admission, tick, dispatch)
//! - [`expression`] - Expression compiler and evaluator
//! - [`schema`] - Schema tree, validation, and registry
//! - [`filter`] - Filter predicate parsing and evaluation
//! - [`batch`] - Accumulation buffers and the batch scheduler
//! - [`transport`] - Transport adapters and the dispatch factory
//! - [`settings`] - Settings model and TOML loading
//! - [`domain`] - Core domain types and errors
//! - [`logging`] - Structured logging bootstrap
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::domain::ReportRecord;
//! use courier::router::RouterEngine;
//! use courier::schema::SchemaRegistry;
//! use courier::settings::load_settings;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Arc::new(load_settings("courier.toml")?);
//!     let registry = Arc::new(SchemaRegistry::default());
//!
//!     let engine = RouterEngine::new(settings, registry);
//!
//!     let report = ReportRecord::new("covid-19", serde_json::json!({
//!         "patient": { "state": "PA" }
//!     }));
//!     let outcome = engine.route_report(report).await?;
//!     println!("Admitted to {} receiver(s)", outcome.admitted.len());
//!
//!     engine.tick(chrono::Utc::now()).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Courier uses the [`domain::CourierError`] type for all errors.
//! Validation and filter problems are aggregated into lists and
//! returned, never thrown; transport failures are the only raised class
//! and are converted into a pending-retry state at the scheduler
//! boundary.
//!
//! ## Logging
//!
//! Courier uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!("Starting tick");
//! warn!(receiver = "pa-phd.elr", "No reports accumulated");
//! ```

pub mod batch;
pub mod cli;
pub mod domain;
pub mod expression;
pub mod filter;
pub mod logging;
pub mod router;
pub mod schema;
pub mod settings;
pub mod transport;
