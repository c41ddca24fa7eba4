//! Core domain models for matrixci
//!
//! This module defines the fundamental data structures that represent
//! pipelines, triggers, matrices, steps, and their execution results.

pub mod config;
pub mod context;
pub mod error;
pub mod matrix;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod trigger;

pub use context::*;
pub use error::ConfigError;
pub use matrix::{MatrixAxis, MatrixExpander, MatrixSpec, RunConfiguration};
pub use pipeline::*;
pub use state::*;
pub use step::*;
pub use trigger::{Event, EventKind, TriggerMatcher, TriggerRule};
