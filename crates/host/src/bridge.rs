//! The capability surface handed to portable recipes

use crate::content::FileContent;
use crate::effects::{EffectLog, HostEffect};
use crate::process::{run_process, scrubbed_command};
use crate::scope::HostScope;
use async_trait::async_trait;
use chrono::Utc;
use plasma_core::{Error, Result};
use plasma_utils::{expand_glob, to_slash};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Operations a recipe may perform against the host.
///
/// Paths are relative to the execution root. Every implementation must
/// confine them to that root.
#[async_trait]
pub trait HostCapabilities: Send + Sync {
    /// Files matching `pattern`, relative and sorted
    async fn glob(&self, pattern: &str) -> Result<Vec<String>>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Lowercase hex SHA-256 of a file
    async fn hash_file(&self, path: &str) -> Result<String>;

    async fn read_file(&self, path: &str) -> Result<FileContent>;

    /// Write a file, creating parent directories
    async fn write_file(&self, path: &str, content: FileContent) -> Result<()>;

    /// Run a command and return its exit code
    async fn exec(&self, command: &str, args: &[String]) -> Result<i32>;
}

/// Filesystem and process backed implementation of [`HostCapabilities`]
#[derive(Debug, Clone)]
pub struct HostBridge {
    scope: HostScope,
    env: BTreeMap<String, String>,
    effects: Arc<EffectLog>,
}

impl HostBridge {
    /// Create a bridge over `scope`.
    ///
    /// `env` is the complete environment spawned commands will see.
    #[must_use]
    pub fn new(scope: HostScope, env: BTreeMap<String, String>, effects: Arc<EffectLog>) -> Self {
        Self {
            scope,
            env,
            effects,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &HostScope {
        &self.scope
    }

    #[must_use]
    pub fn effects(&self) -> &Arc<EffectLog> {
        &self.effects
    }

    fn recipe_label(&self) -> String {
        self.effects.recipe().display().to_string()
    }
}

fn read_error(path: &Path, e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::NotFound => Error::not_found(path),
        _ if path.is_dir() => Error::is_directory(path),
        _ => Error::file_system(path, "read", e),
    }
}

#[async_trait]
impl HostCapabilities for HostBridge {
    async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let root = self.scope.root().to_path_buf();
        let pattern_owned = pattern.to_string();
        let matches = tokio::task::spawn_blocking(move || expand_glob(&root, &pattern_owned))
            .await
            .map_err(|e| Error::configuration(format!("glob task failed: {e}")))??;
        debug!(pattern, count = matches.len(), "glob");
        Ok(matches.iter().map(|p| to_slash(p)).collect())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let scoped = self.scope.resolve(path)?;
        Ok(tokio::fs::try_exists(&scoped.absolute).await.unwrap_or(false))
    }

    async fn hash_file(&self, path: &str) -> Result<String> {
        let scoped = self.scope.resolve(path)?;
        if scoped.absolute.is_dir() {
            return Err(Error::is_directory(&scoped.absolute));
        }
        plasma_utils::hash_file(&scoped.absolute).await
    }

    async fn read_file(&self, path: &str) -> Result<FileContent> {
        let scoped = self.scope.resolve(path)?;
        if scoped.absolute.is_dir() {
            return Err(Error::is_directory(&scoped.absolute));
        }
        let bytes = tokio::fs::read(&scoped.absolute)
            .await
            .map_err(|e| read_error(&scoped.absolute, e))?;
        Ok(FileContent::from_bytes(bytes))
    }

    async fn write_file(&self, path: &str, content: FileContent) -> Result<()> {
        let scoped = self.scope.resolve_for_write(path)?;
        if scoped.absolute.is_dir() {
            return Err(Error::is_directory(&scoped.absolute));
        }
        if let Some(parent) = scoped.absolute.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::file_system(parent, "create parent directory", e))?;
        }
        let bytes = content.into_bytes();
        tokio::fs::write(&scoped.absolute, &bytes)
            .await
            .map_err(|e| Error::file_system(&scoped.absolute, "write", e))?;

        self.effects.record(HostEffect::Wrote {
            path: scoped.display_relative(),
            bytes: bytes.len(),
            at: Utc::now(),
        });
        Ok(())
    }

    async fn exec(&self, command: &str, args: &[String]) -> Result<i32> {
        let mut child = scrubbed_command(command, self.scope.root(), &self.env);
        child.args(args);
        let output = run_process(child, command, &self.recipe_label()).await?;

        self.effects.record(HostEffect::Exec {
            command: command.to_string(),
            args: args.to_vec(),
            exit_code: output.exit_code,
            at: Utc::now(),
        });
        Ok(output.exit_code)
    }
}
