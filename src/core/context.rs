//! Run context - variables available to a single run configuration

use crate::core::{Pipeline, RunConfiguration};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// A `${{ ... }}` reference with no value in the run context
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Undefined variable '{0}'")]
pub struct UndefinedVariable(pub String);

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").expect("valid placeholder regex")
    })
}

/// Names referenced by `${{ name }}` placeholders in a template
pub fn placeholders(template: &str) -> Vec<&str> {
    placeholder_regex()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Execution context for one run configuration
///
/// Holds the flattened variable namespace (`matrix.*`, `vars.*`, `env.*`,
/// `workspace.path`, `pipeline.name`, `run.*`) and the environment handed
/// to every action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    /// Flattened variables used for `${{ ... }}` substitution
    pub variables: HashMap<String, String>,

    /// Base environment for every step of the run
    pub env: BTreeMap<String, String>,
}

impl RunContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context for a run configuration bound to a workspace
    pub fn for_run(pipeline: &Pipeline, run: &RunConfiguration, workspace: &Path) -> Self {
        let mut context = Self::new();
        let workspace = workspace.display().to_string();

        context.set_variable("pipeline.name", &pipeline.name);
        context.set_variable("workspace.path", &workspace);
        context.set_variable("run.index", &run.index().to_string());
        context.set_variable("run.label", &run.label());

        for (key, value) in &pipeline.variables {
            context.set_variable(&format!("vars.{}", key), value);
        }

        context.env.insert("CI".to_string(), "true".to_string());
        context
            .env
            .insert("MATRIXCI_WORKSPACE".to_string(), workspace);
        context
            .env
            .insert("MATRIXCI_RUN_INDEX".to_string(), run.index().to_string());

        // Keys only some include entries add are empty elsewhere
        for name in pipeline.matrix.variable_names() {
            context.set_variable(&format!("matrix.{}", name), "");
        }

        for (axis, value) in run.values() {
            context.set_variable(&format!("matrix.{}", axis), value);
            context.env.insert(matrix_env_name(axis), value.clone());
        }

        for (key, value) in &pipeline.env {
            context.env.insert(key.clone(), value.clone());
            context.set_variable(&format!("env.{}", key), value);
        }

        context
    }

    /// Set a variable
    pub fn set_variable(&mut self, key: &str, value: &str) {
        self.variables.insert(key.to_string(), value.to_string());
    }

    /// Get a variable
    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Substitute every `${{ name }}` placeholder
    pub fn render(&self, template: &str) -> Result<String, UndefinedVariable> {
        let mut missing = None;

        let rendered = placeholder_regex().replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match self.variables.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(name) => Err(UndefinedVariable(name)),
            None => Ok(rendered.into_owned()),
        }
    }
}

/// `python-version` -> `MATRIX_PYTHON_VERSION`
pub fn matrix_env_name(axis: &str) -> String {
    let suffix: String = axis
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("MATRIX_{}", suffix)
}
