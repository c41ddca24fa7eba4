//! Action registry

use crate::actions::{Action, CheckoutAction, ShellAction};
use crate::core::{step::SHELL_ACTION, ConfigError, Pipeline};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps action references to implementations
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `shell` and `checkout`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(SHELL_ACTION, ShellAction::new());
        registry.register("checkout", CheckoutAction);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, action: impl Action + 'static) {
        self.actions.insert(name.into(), Arc::new(action));
    }

    /// Resolve a reference; a trailing `@version` is ignored
    pub fn get(&self, reference: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(base_name(reference)).cloned()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.actions.contains_key(base_name(reference))
    }

    /// Registered action names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check that every step of a pipeline refers to a registered action
    pub fn check(&self, pipeline: &Pipeline) -> Result<(), ConfigError> {
        match pipeline.steps.iter().find(|s| !self.contains(&s.action)) {
            Some(step) => Err(ConfigError::UnknownAction {
                step: step.id.clone(),
                action: step.action.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn base_name(reference: &str) -> &str {
    reference.split('@').next().unwrap_or(reference)
}
