//! Materializers fill a fresh workspace with the checkout target

use crate::workspace::{NestedModule, ProvisioningError};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// Strategy that fills a workspace directory
#[async_trait]
pub trait Materializer: Send + Sync {
    async fn materialize(&self, dir: &Path) -> Result<(), ProvisioningError>;
}

/// Leaves the workspace empty
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMaterializer;

#[async_trait]
impl Materializer for EmptyMaterializer {
    async fn materialize(&self, _dir: &Path) -> Result<(), ProvisioningError> {
        Ok(())
    }
}

/// Copies a local directory tree plus its nested sub-repositories
#[derive(Debug, Clone)]
pub struct LocalMaterializer {
    source: PathBuf,
    modules: Vec<NestedModule>,
}

impl LocalMaterializer {
    pub fn new(source: impl Into<PathBuf>, modules: Vec<NestedModule>) -> Self {
        Self {
            source: source.into(),
            modules,
        }
    }
}

#[async_trait]
impl Materializer for LocalMaterializer {
    async fn materialize(&self, dir: &Path) -> Result<(), ProvisioningError> {
        let source = self.source.clone();
        let modules = self.modules.clone();
        let dir = dir.to_path_buf();

        tokio::task::spawn_blocking(move || {
            copy_checkout(&source, &dir)?;
            copy_modules(&modules, &dir)
        })
        .await
        .map_err(|e| ProvisioningError::Internal(e.to_string()))?
    }
}

fn copy_checkout(source: &Path, dest: &Path) -> Result<(), ProvisioningError> {
    if !source.is_dir() {
        return Err(ProvisioningError::MissingSource(source.to_path_buf()));
    }
    debug!("Copying {} into {}", source.display(), dest.display());
    let guard = fs::canonicalize(dest).unwrap_or_else(|_| dest.to_path_buf());
    copy_tree(source, dest, &guard).map_err(|source_err| ProvisioningError::Copy {
        path: source.to_path_buf(),
        source: source_err,
    })
}

fn copy_modules(modules: &[NestedModule], parent: &Path) -> Result<(), ProvisioningError> {
    for module in modules {
        let dest = parent.join(&module.path);
        fs::create_dir_all(&dest).map_err(|source| ProvisioningError::Copy {
            path: dest.clone(),
            source,
        })?;
        copy_checkout(&module.source, &dest)?;
        copy_modules(&module.modules, &dest)?;
    }
    Ok(())
}

/// Recursive copy that never descends into the workspace being filled
fn copy_tree(source: &Path, dest: &Path, workspace: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let target = dest.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if workspace.starts_with(fs::canonicalize(&path)?) {
                continue;
            }
            copy_tree(&path, &target, workspace)?;
        } else if file_type.is_symlink() {
            copy_symlink(&path, &target)?;
        } else {
            fs::copy(&path, &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(path: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(path)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(path: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(path, target).map(|_| ())
}

/// Clones a git repository, optionally with its submodules
#[derive(Debug, Clone)]
pub struct GitMaterializer {
    url: String,
    git_ref: Option<String>,
    recursive: bool,
    /// `-c key=value` overrides passed to every git invocation
    config: Vec<(String, String)>,
}

impl GitMaterializer {
    pub fn new(url: String, git_ref: Option<String>, recursive: bool) -> Self {
        Self {
            url,
            git_ref,
            recursive,
            config: Vec::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.push((key.into(), value.into()));
        self
    }

    async fn git(&self, command: &str, args: &[&str], cwd: &Path) -> Result<(), ProvisioningError> {
        debug!("git {} {:?} in {}", command, args, cwd.display());

        let mut git = Command::new("git");
        for (key, value) in &self.config {
            git.arg("-c").arg(format!("{}={}", key, value));
        }

        let output = git
            .arg(command)
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProvisioningError::Git {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("git {} exited with {}: {}", command, output.status, stderr.trim());
            return Err(ProvisioningError::Git {
                command: command.to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Materializer for GitMaterializer {
    async fn materialize(&self, dir: &Path) -> Result<(), ProvisioningError> {
        let dest = dir.to_string_lossy();
        let mut args = vec!["--quiet"];
        if let Some(git_ref) = &self.git_ref {
            args.extend(["--branch", git_ref.as_str()]);
        }
        args.extend([self.url.as_str(), dest.as_ref()]);

        self.git("clone", &args, dir).await?;

        if self.recursive {
            self.git("submodule", &["update", "--init", "--recursive"], dir)
                .await?;
        }

        Ok(())
    }
}
