//! # tcapgen-core
//!
//! A library for rewriting business Protocol Buffer schemas into table
//! schemas accepted by TcaplusDB, a key-value document store.
//!
//! The store wants every entity to declare a primary key, every field to
//! carry a dense positive sequence number, and nested records, foreign
//! enumerations and maps to be normalized to something it can hold. This
//! crate provides:
//! - Parsing `.proto` sources into a small schema model
//! - Classifying each top-level message into a storage category
//! - Rewriting field lists and types per category
//! - Emitting the destination `.proto` files and a per-file report
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`schema`]: Parsed schema model and store
//! - [`classify`]: Message categories and the classification phase
//! - [`resolve`]: Field type lookup against shared definitions
//! - [`rewrite`]: Per-category field rewriting
//! - [`blob`]: Blob container aggregation
//! - [`emit`]: Destination documents and `.proto` rendering
//! - [`run`]: Two-phase run coordination and reporting
//! - [`config`]: Run configuration
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use tcapgen_core::{run, Config, SourceFile, WriterConfig};
//! use std::fs;
//!
//! let config = Config::default();
//! let sources = ["common.proto", "enumm_entity.proto", "role.proto"]
//!     .into_iter()
//!     .map(|name| Ok(SourceFile::new(name, fs::read_to_string(name)?)))
//!     .collect::<std::io::Result<Vec<_>>>()?;
//!
//! let output = run(sources, &config)?;
//! let writer_config = WriterConfig::from_config(&config);
//! for destination in &output.destinations {
//!     if let Some(text) = destination.render(&writer_config) {
//!         fs::write(&destination.file_name, text)?;
//!     }
//! }
//! print!("{}", output.report());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`SchemaWriter`]: Customize how destination documents are written
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod blob;
pub mod classify;
pub mod config;
pub mod emit;
pub mod error;
pub mod resolve;
pub mod rewrite;
pub mod run;
pub mod schema;

// Re-export primary types for convenience
pub use classify::{classify, Category, Classification, Direction};
pub use config::Config;
pub use emit::{
    Destination, DestinationKind, SchemaDocument, SchemaWriter, StatsWriter, WriterConfig,
};
pub use error::{Error, Result};
pub use run::{run, RunOutput, RunReport, SourceFile};
pub use schema::{ParsedFile, SchemaStore};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
