//! Business logic services (use cases).

pub mod workflow;
