//! Configuration errors

use thiserror::Error;

/// Errors raised while loading or validating a pipeline descriptor.
///
/// Every variant is fatal: no run configuration starts once one of these
/// has been returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read pipeline file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pipeline YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Pipeline name must not be empty")]
    MissingName,

    #[error("Duplicate step ID: {0}")]
    DuplicateStep(String),

    #[error("Step '{0}' must declare exactly one of 'run' or 'uses'")]
    InvalidStepAction(String),

    #[error("Unknown event kind '{0}' (expected 'push' or 'pull_request')")]
    UnknownEvent(String),

    #[error("Invalid branch pattern '{pattern}': {reason}")]
    InvalidBranchPattern { pattern: String, reason: String },

    #[error("Matrix axis '{0}' has no values")]
    EmptyAxis(String),

    #[error("'{field}' must be a string, number or boolean")]
    NonScalarValue { field: String },

    #[error("Matrix axis '{axis}' has a non-scalar value")]
    InvalidMatrixValue { axis: String },

    #[error("Matrix {kind} entry must be a mapping of axis names to scalar values")]
    InvalidMatrixEntry { kind: &'static str },

    #[error("Matrix exclusions removed every run configuration")]
    EmptyMatrix,

    #[error("Step '{step}' references undeclared matrix variable '{variable}'")]
    UndeclaredMatrixVariable { step: String, variable: String },

    #[error("Step '{step}' uses unknown action '{action}'")]
    UnknownAction { step: String, action: String },

    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),
}
