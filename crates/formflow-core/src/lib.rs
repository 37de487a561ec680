//! Business logic and repository trait definitions for Formflow.
//!
//! This crate holds the form workflow graph engine: the graph model, the
//! two-tier validator, and the service that mediates every workflow edit.
//! It also defines the "ports" (repository traits) that the infrastructure
//! layer implements. It depends only on `formflow-types` -- never on
//! `formflow-infra` or any database/IO crate.

pub mod repository;
pub mod service;
pub mod workflow;
