//! Infrastructure layer for Formflow.
//!
//! Implements the repository traits defined in `formflow-core` on SQLite, and
//! provides config loading and data directory resolution.

pub mod config;
pub mod filesystem;
pub mod sqlite;
