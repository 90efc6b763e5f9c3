//! Execution backends
//!
//! The runtime kind of a recipe selects exactly one backend: `portable`
//! recipes run on a registered [`PortableInterpreter`] with the host bridge
//! injected, `standard:<name>` recipes run as a subprocess of `<name>`.

mod portable;
mod standard;

pub use portable::{PortableBackend, PortableInterpreter};
pub use standard::StandardBackend;

use plasma_core::Result;
use plasma_host::{EffectLog, HostScope};
use plasma_recipe::Recipe;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Everything a backend needs for one execution
#[derive(Debug)]
pub struct ExecutionContext<'a> {
    pub recipe: &'a Recipe,
    /// Staged workspace the recipe runs in
    pub workspace: &'a Path,
    /// Staged copy of the recipe script
    pub script: &'a Path,
    /// The complete environment visible to the recipe
    pub env: BTreeMap<String, String>,
    pub scope: HostScope,
    pub effects: Arc<EffectLog>,
}

/// Runs a recipe to completion inside its workspace.
///
/// `Ok(())` is success. Any error is the recipe's failure; a non-zero
/// interpreter exit is reported as `RecipeFailure` with its exit code.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn execute(&self, ctx: ExecutionContext<'_>) -> Result<()>;
}
