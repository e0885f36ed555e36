//! miz-merge library crate.
//!
//! The primary interface is the `miz-merge` binary. This lib.rs exposes the
//! merge engine so integration tests and benchmarks can drive documents,
//! archives and the table codec directly without going through the CLI.

pub mod archive;
pub mod config;
pub mod document;
pub mod error;
pub mod ids;
pub mod index;
pub mod merge;
pub mod parking;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod select;
pub mod tree;

// Binary-only modules (not re-exported): format, telemetry.
