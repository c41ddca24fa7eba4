//! Pipeline configuration from YAML

use crate::core::{ConfigError, Pipeline};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level pipeline descriptor loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Pipeline variables, available to steps as `${{ vars.<name> }}`
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,

    /// Trigger rules keyed by event kind
    #[serde(default, rename = "on")]
    pub triggers: BTreeMap<String, Option<TriggerConfig>>,

    /// Matrix and concurrency settings
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Checkout target materialized into every workspace
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Environment passed to every step
    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// Ordered pipeline steps
    pub steps: Vec<StepConfig>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Directory the descriptor was loaded from, used to resolve local paths
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// Branch filters for a single event kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Branch patterns that admit the event (empty = every branch)
    #[serde(default)]
    pub branches: Vec<String>,

    /// Branch patterns that discard the event even if `branches` matched
    #[serde(default, alias = "branches-ignore")]
    pub branches_ignore: Vec<String>,
}

/// Matrix and worker pool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Axis name -> values, plus optional `include` / `exclude` lists
    #[serde(default)]
    pub matrix: Option<Mapping>,

    /// Maximum number of run configurations executing at once
    #[serde(default, alias = "max-parallel")]
    pub max_parallel: Option<usize>,

    /// Abort not-yet-started steps of sibling runs after the first failure
    #[serde(default)]
    pub cancel_on_failure: bool,
}

/// Checkout target configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Local directory or git URL to materialize (none = empty workspace)
    #[serde(default)]
    pub source: Option<String>,

    /// Branch or tag to clone (git sources only)
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,

    /// Whether to resolve nested sub-repositories of git sources
    #[serde(default)]
    pub submodules: SubmoduleMode,

    /// Nested sub-repositories for local sources
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// How nested sub-repositories of a git source are resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmoduleMode {
    #[default]
    None,
    Recursive,
}

/// A nested sub-repository copied into the workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Destination path inside the parent checkout
    pub path: String,

    /// Source directory, relative to the descriptor
    pub source: String,

    /// Sub-repositories nested inside this one
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier (defaults to the name)
    #[serde(default)]
    pub id: Option<String>,

    /// Human-readable step name
    pub name: String,

    /// Shell script to run (shorthand for `uses: shell`)
    #[serde(default)]
    pub run: Option<String>,

    /// Shell used for `run` steps
    #[serde(default)]
    pub shell: Option<String>,

    /// Action reference, e.g. `checkout`
    #[serde(default)]
    pub uses: Option<String>,

    /// Action parameters
    #[serde(default)]
    pub with: BTreeMap<String, Value>,

    /// Step-level environment
    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// Timeout for this step (overrides global)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl StepConfig {
    /// The step ID, falling back to the name
    pub fn step_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        config.validate()?;
        Ok(config)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    ///
    /// Compiles the descriptor and throws the result away, so every check
    /// performed while building a [`Pipeline`] also runs here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_pipeline().map(|_| ())
    }

    /// Get variables as string map
    pub fn variables_as_string_map(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        scalar_map(&self.variables, "variables")
    }

    /// Resolve a path from the descriptor relative to its directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) if Path::new(path).is_relative() => base.join(path),
            _ => PathBuf::from(path),
        }
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Result<Pipeline, ConfigError> {
        Pipeline::from_config(self)
    }
}

/// Render a YAML scalar the way it appears in a shell environment
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Convert a map of YAML scalars into strings
pub(crate) fn scalar_map(
    values: &BTreeMap<String, Value>,
    section: &str,
) -> Result<BTreeMap<String, String>, ConfigError> {
    values
        .iter()
        .map(|(key, value)| {
            scalar_to_string(value)
                .map(|s| (key.clone(), s))
                .ok_or_else(|| ConfigError::NonScalarValue {
                    field: format!("{}.{}", section, key),
                })
        })
        .collect()
}
