//! Workspace manager - one isolated working directory per run configuration

pub mod materializer;

pub use materializer::{EmptyMaterializer, GitMaterializer, LocalMaterializer, Materializer};

use crate::core::{
    config::{ModuleConfig, SubmoduleMode, WorkspaceConfig},
    RunConfiguration,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while provisioning or tearing down a workspace
///
/// A provisioning error fails only the run configuration it belongs to.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Failed to create workspace under {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkout source not found: {0}")]
    MissingSource(PathBuf),

    #[error("Failed to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("Failed to remove workspace {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Materializer task failed: {0}")]
    Internal(String),
}

/// A nested sub-repository copied into a local checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedModule {
    /// Destination inside the parent checkout
    pub path: PathBuf,
    pub source: PathBuf,
    pub modules: Vec<NestedModule>,
}

impl NestedModule {
    fn from_config(config: &ModuleConfig, resolve: &impl Fn(&str) -> PathBuf) -> Self {
        Self {
            path: PathBuf::from(&config.path),
            source: resolve(&config.source),
            modules: config
                .modules
                .iter()
                .map(|m| NestedModule::from_config(m, resolve))
                .collect(),
        }
    }
}

/// The checkout target every workspace is filled with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutSource {
    /// No source declared
    Empty,
    /// A directory tree on the local filesystem
    Local {
        path: PathBuf,
        modules: Vec<NestedModule>,
    },
    /// A git repository
    Git {
        url: String,
        git_ref: Option<String>,
        recursive: bool,
    },
}

const GIT_URL_PREFIXES: &[&str] = &["http://", "https://", "ssh://", "git://", "git@", "file://"];

impl CheckoutSource {
    /// Build from the `workspace:` section; `resolve` maps descriptor-relative paths
    pub fn from_config(config: &WorkspaceConfig, resolve: impl Fn(&str) -> PathBuf) -> Self {
        let Some(source) = config.source.as_deref() else {
            return CheckoutSource::Empty;
        };

        let remote = GIT_URL_PREFIXES.iter().any(|p| source.starts_with(p));
        if remote || source.ends_with(".git") {
            // Repository paths without a scheme are relative to the descriptor
            let url = if remote {
                source.to_string()
            } else {
                resolve(source).display().to_string()
            };
            CheckoutSource::Git {
                url,
                git_ref: config.git_ref.clone(),
                recursive: config.submodules == SubmoduleMode::Recursive,
            }
        } else {
            CheckoutSource::Local {
                path: resolve(source),
                modules: config
                    .modules
                    .iter()
                    .map(|m| NestedModule::from_config(m, &resolve))
                    .collect(),
            }
        }
    }

    /// The materializer that fills a workspace with this source
    pub fn materializer(&self) -> Arc<dyn Materializer> {
        match self {
            CheckoutSource::Empty => Arc::new(EmptyMaterializer),
            CheckoutSource::Local { path, modules } => {
                Arc::new(LocalMaterializer::new(path.clone(), modules.clone()))
            }
            CheckoutSource::Git {
                url,
                git_ref,
                recursive,
            } => Arc::new(GitMaterializer::new(url.clone(), git_ref.clone(), *recursive)),
        }
    }
}

/// A provisioned working directory, owned by exactly one run configuration
///
/// Dropping a workspace removes its directory.
#[derive(Debug)]
pub struct Workspace {
    run_index: usize,
    dir: TempDir,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn run_index(&self) -> usize {
        self.run_index
    }

    /// Workspace in a fresh temporary directory, without materialization
    pub fn temporary(run_index: usize) -> std::io::Result<Self> {
        Ok(Self {
            run_index,
            dir: tempfile::tempdir()?,
        })
    }
}

/// Provisions and releases workspaces under a root directory
pub struct WorkspaceManager {
    root: PathBuf,
    materializer: Arc<dyn Materializer>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, materializer: Arc<dyn Materializer>) -> Self {
        Self {
            root: root.into(),
            materializer,
        }
    }

    /// Default root: `<cache dir>/matrixci/workspaces`
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("matrixci")
            .join("workspaces")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh directory and materialize the checkout target into it
    pub async fn acquire(&self, run: &RunConfiguration) -> Result<Workspace, ProvisioningError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ProvisioningError::Create {
                path: self.root.clone(),
                source,
            })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("run-{}-", run.index()))
            .tempdir_in(&self.root)
            .map_err(|source| ProvisioningError::Create {
                path: self.root.clone(),
                source,
            })?;

        debug!("Provisioning workspace {} for run {}", dir.path().display(), run);

        // On error `dir` is dropped here and the partial checkout removed
        self.materializer.materialize(dir.path()).await?;

        info!("Workspace ready for run {}: {}", run, dir.path().display());
        Ok(Workspace {
            run_index: run.index(),
            dir,
        })
    }

    /// Remove all state of a workspace
    pub fn release(&self, workspace: Workspace) -> Result<(), ProvisioningError> {
        let path = workspace.path().to_path_buf();
        debug!("Releasing workspace {}", path.display());
        workspace
            .dir
            .close()
            .map_err(|source| ProvisioningError::Cleanup { path, source })
    }
}
