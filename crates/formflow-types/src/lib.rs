//! Shared domain types for Formflow.
//!
//! This crate contains the types shared by every layer of the form workflow
//! engine: workflow nodes and versions, validation violations, question
//! references, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod form;
pub mod question;
pub mod workflow;
