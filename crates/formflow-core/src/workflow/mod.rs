//! Form workflow graph engine.
//!
//! - [`graph`]: flat node list decoded into a navigable graph, plus the
//!   structural mutations used by single-node edits.
//! - [`validator`]: relaxed (draft) and strict (activation) validation.
//! - [`identity`]: node-identifier stability checks across edits.

pub mod graph;
pub mod identity;
pub mod validator;
