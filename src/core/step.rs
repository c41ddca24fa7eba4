//! Step domain model

use crate::core::{
    config::{scalar_map, StepConfig},
    context::{placeholders, RunContext, UndefinedVariable},
    ConfigError,
};
use std::collections::{BTreeMap, HashSet};

/// Action reference that `run:` steps resolve to
pub const SHELL_ACTION: &str = "shell";

/// A single step in a pipeline
///
/// Steps are declared once and replayed for every run configuration.
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name
    pub name: String,

    /// Action reference resolved through the action registry
    pub action: String,

    /// Action parameters (templates, rendered per run)
    pub with: BTreeMap<String, String>,

    /// Step-level environment (templates, rendered per run)
    pub env: BTreeMap<String, String>,

    /// Timeout in seconds
    pub timeout_secs: u64,
}

/// A step with its parameters bound to one run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStep {
    pub inputs: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Result<Self, ConfigError> {
        let id = config.step_id().to_string();

        let mut with = scalar_map(&config.with, &format!("steps.{}.with", id))?;
        let action = match (&config.run, &config.uses) {
            (Some(script), None) => {
                with.insert("script".to_string(), script.clone());
                if let Some(shell) = &config.shell {
                    with.insert("shell".to_string(), shell.clone());
                }
                SHELL_ACTION.to_string()
            }
            (None, Some(uses)) if !uses.trim().is_empty() => uses.trim().to_string(),
            _ => return Err(ConfigError::InvalidStepAction(id)),
        };

        Ok(Step {
            env: scalar_map(&config.env, &format!("steps.{}.env", id))?,
            id,
            name: config.name.clone(),
            action,
            with,
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
        })
    }

    /// Every placeholder referenced by this step's parameters and environment
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.with
            .values()
            .chain(self.env.values())
            .flat_map(|template| placeholders(template))
    }

    /// Reject `${{ matrix.x }}` references to axes the matrix never assigns
    pub fn check_matrix_references(&self, declared: &HashSet<&str>) -> Result<(), ConfigError> {
        for reference in self.references() {
            if let Some(axis) = reference.strip_prefix("matrix.") {
                if !declared.contains(axis) {
                    return Err(ConfigError::UndeclaredMatrixVariable {
                        step: self.id.clone(),
                        variable: axis.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Bind parameters and environment to a run context
    pub fn render(&self, context: &RunContext) -> Result<RenderedStep, UndefinedVariable> {
        let inputs = self
            .with
            .iter()
            .map(|(k, v)| Ok((k.clone(), context.render(v)?)))
            .collect::<Result<BTreeMap<_, _>, UndefinedVariable>>()?;

        let mut env = context.env.clone();
        for (key, value) in &self.env {
            env.insert(key.clone(), context.render(value)?);
        }

        Ok(RenderedStep { inputs, env })
    }
}

#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 3600, // 1 hour
        }
    }
}
