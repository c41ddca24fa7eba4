//! Pipeline domain model

use crate::core::{
    config::{scalar_map, PipelineConfig},
    matrix::{MatrixExpander, MatrixSpec, RunConfiguration},
    step::{Step, StepDefaults},
    trigger::{Event, TriggerMatcher},
    ConfigError,
};
use crate::workspace::CheckoutSource;
use std::collections::{BTreeMap, HashSet};

/// A compiled, immutable pipeline definition
///
/// Built once from a [`PipelineConfig`] and shared read-only between every
/// run configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Pipeline variables (`${{ vars.<name> }}`)
    pub variables: BTreeMap<String, String>,

    /// Trigger rules
    pub triggers: TriggerMatcher,

    /// Declared matrix
    pub matrix: MatrixSpec,

    /// Ordered steps, replayed for every run configuration
    pub steps: Vec<Step>,

    /// Checkout target materialized into every workspace
    pub checkout: CheckoutSource,

    /// Environment passed to every step
    pub env: BTreeMap<String, String>,

    /// Descriptor-level cap on concurrent run configurations
    pub max_parallel: Option<usize>,

    /// Abort sibling runs after the first failure
    pub cancel_on_failure: bool,

    /// Expanded run configurations
    configurations: Vec<RunConfiguration>,
}

impl Pipeline {
    /// Compile and validate a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        if config.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }

        let variables = config.variables_as_string_map()?;
        let env = scalar_map(&config.env, "env")?;
        let triggers = TriggerMatcher::from_config(&config.triggers)?;

        let matrix = match &config.strategy.matrix {
            Some(mapping) => MatrixSpec::from_yaml(mapping)?,
            None => MatrixSpec::default(),
        };
        let configurations = MatrixExpander::expand(&matrix)?;

        if config.strategy.max_parallel == Some(0) {
            return Err(ConfigError::InvalidStrategy(
                "max_parallel must be at least 1".to_string(),
            ));
        }

        let defaults = StepDefaults {
            timeout_secs: config
                .default_timeout_secs
                .unwrap_or(StepDefaults::default().timeout_secs),
        };

        let declared = matrix.variable_names();
        let mut seen = HashSet::new();
        let mut steps = Vec::with_capacity(config.steps.len());

        for step_config in &config.steps {
            if !seen.insert(step_config.step_id()) {
                return Err(ConfigError::DuplicateStep(step_config.step_id().to_string()));
            }

            let step = Step::from_config(step_config, &defaults)?;
            step.check_matrix_references(&declared)?;
            steps.push(step);
        }

        Ok(Pipeline {
            name: config.name.clone(),
            variables,
            triggers,
            checkout: CheckoutSource::from_config(&config.workspace, |path| {
                config.resolve_path(path)
            }),
            matrix,
            steps,
            env,
            max_parallel: config.strategy.max_parallel,
            cancel_on_failure: config.strategy.cancel_on_failure,
            configurations,
        })
    }

    /// Check whether an event starts this pipeline
    pub fn admits(&self, event: &Event) -> bool {
        self.triggers.admits(event)
    }

    /// Run configurations in index order
    pub fn configurations(&self) -> &[RunConfiguration] {
        &self.configurations
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Step IDs in execution order
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }
}
