//! Core domain models for pipelines
//!
//! This module defines the pipeline definition, the run-scoped execution
//! graph, validation and configuration loading.

pub mod config;
pub mod graph;
pub mod pipeline;
pub mod state;
pub mod validation;

pub use graph::*;
pub use pipeline::*;
pub use state::*;
pub use validation::{ValidationError, ValidationResult};
