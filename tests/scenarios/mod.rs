//! Scenario-based tests for matrixci

mod fail_fast;
mod matrix_failures;
mod substitution;
mod triggers;
mod workspace;
