//! Private per-execution workspaces
//!
//! Each execution runs in a fresh temporary directory holding copies of the
//! recipe's resolved inputs and the recipe script itself, at the same relative
//! paths they have next to the recipe. Concurrent executions never observe
//! each other's writes, and nothing an execution does touches the recipe
//! directory until outputs are materialised.

use plasma_cache::ResolvedInput;
use plasma_core::{Error, Result};
use plasma_recipe::Recipe;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// A staged workspace, deleted on drop
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    script: PathBuf,
}

impl Workspace {
    /// Create a workspace for `recipe` containing `inputs`
    pub fn stage(recipe: &Recipe, inputs: &[ResolvedInput]) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("plasma-run-")
            .tempdir()
            .map_err(|e| Error::file_system(std::env::temp_dir(), "create staging directory", e))?;

        for input in inputs {
            let target = dir.path().join(&input.path);
            copy_file(&input.absolute, &target)?;
        }

        let script = dir.path().join(recipe.file_name());
        fs::write(&script, recipe.source())
            .map_err(|e| Error::file_system(&script, "stage recipe script", e))?;

        debug!(
            recipe = %recipe.path().display(),
            workspace = %dir.path().display(),
            inputs = inputs.len(),
            "Staged workspace"
        );

        Ok(Self { dir, script })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Staged copy of the recipe script
    #[must_use]
    pub fn script(&self) -> &Path {
        &self.script
    }
}

fn copy_file(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::file_system(parent, "create staging subdirectory", e))?;
    }
    fs::copy(source, target).map_err(|e| Error::input_unavailable(source, e))?;
    Ok(())
}
