//! Actions - the pluggable units of work a step invokes

pub mod checkout;
pub mod registry;
pub mod shell;

pub use checkout::CheckoutAction;
pub use registry::ActionRegistry;
pub use shell::ShellAction;

use crate::workspace::Workspace;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameters handed to an action, already bound to one run configuration
#[derive(Debug, Clone, Default)]
pub struct ActionParams {
    pub step_id: String,
    /// Rendered `with:` parameters
    pub inputs: BTreeMap<String, String>,
    /// Environment for any process the action spawns
    pub env: BTreeMap<String, String>,
}

impl ActionParams {
    pub fn input(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str) -> Result<&str, ActionError> {
        self.input(name).ok_or_else(|| {
            ActionError::InvalidInput(format!("step '{}' is missing input '{}'", self.step_id, name))
        })
    }
}

/// What an action reports once it ran to completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutput {
    pub exit_code: i32,
    /// Combined stdout and stderr
    pub output: String,
}

impl ActionOutput {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn success(output: impl Into<String>) -> Self {
        Self::new(0, output)
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors from action execution
#[derive(Error, Debug, Clone)]
pub enum ActionError {
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A unit of work a step can invoke
#[async_trait]
pub trait Action: Send + Sync {
    async fn execute(
        &self,
        params: &ActionParams,
        workspace: &Workspace,
    ) -> Result<ActionOutput, ActionError>;
}
