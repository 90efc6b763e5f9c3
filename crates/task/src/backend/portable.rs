use super::{Backend, ExecutionContext};
use async_trait::async_trait;
use plasma_core::Result;
use plasma_host::{HostBridge, HostCapabilities};
use plasma_recipe::Recipe;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// An embedded script interpreter for `portable` recipes.
///
/// Implementations must not touch the filesystem or spawn processes except
/// through `host`. Returning an error marks the execution as failed.
#[async_trait]
pub trait PortableInterpreter: Send + Sync {
    /// Interpreter name for logs
    fn name(&self) -> &str;

    /// Version string folded into keys when a recipe asks for it
    fn version(&self) -> String;

    /// Evaluate the recipe body
    async fn run(&self, recipe: &Recipe, host: Arc<dyn HostCapabilities>) -> Result<()>;
}

/// Backend that delegates to a [`PortableInterpreter`]
pub struct PortableBackend {
    interpreter: Arc<dyn PortableInterpreter>,
}

impl PortableBackend {
    #[must_use]
    pub fn new(interpreter: Arc<dyn PortableInterpreter>) -> Self {
        Self { interpreter }
    }
}

impl fmt::Debug for PortableBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortableBackend")
            .field("interpreter", &self.interpreter.name())
            .finish()
    }
}

#[async_trait]
impl Backend for PortableBackend {
    async fn execute(&self, ctx: ExecutionContext<'_>) -> Result<()> {
        debug!(
            recipe = %ctx.recipe.path().display(),
            interpreter = self.interpreter.name(),
            "Running portable recipe"
        );
        let host: Arc<dyn HostCapabilities> =
            Arc::new(HostBridge::new(ctx.scope, ctx.env, ctx.effects));
        self.interpreter.run(ctx.recipe, host).await
    }
}
