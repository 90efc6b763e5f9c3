use super::{Backend, ExecutionContext};
use async_trait::async_trait;
use plasma_core::{Error, Result};
use plasma_host::{run_process, scrubbed_command, HostEffect};
use std::path::PathBuf;
use tracing::debug;

/// Backend that runs the staged script with an external interpreter
#[derive(Debug, Clone)]
pub struct StandardBackend {
    interpreter: String,
}

impl StandardBackend {
    #[must_use]
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    /// Locate the interpreter on `PATH`
    pub fn resolve(&self) -> Result<PathBuf> {
        which::which(&self.interpreter).map_err(|e| {
            Error::spawn(
                &self.interpreter,
                std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
            )
        })
    }
}

#[async_trait]
impl Backend for StandardBackend {
    async fn execute(&self, ctx: ExecutionContext<'_>) -> Result<()> {
        let program = self.resolve()?;
        debug!(
            recipe = %ctx.recipe.path().display(),
            interpreter = %program.display(),
            "Running standard recipe"
        );

        let mut command = scrubbed_command(&program, ctx.workspace, &ctx.env);
        command.arg(ctx.script);
        let recipe_label = ctx.recipe.path().display().to_string();
        let output = run_process(command, &self.interpreter, &recipe_label).await?;
        ctx.effects.record(HostEffect::Exec {
            command: program.display().to_string(),
            args: vec![ctx.script.display().to_string()],
            exit_code: output.exit_code,
            at: chrono::Utc::now(),
        });

        if output.success() {
            Ok(())
        } else {
            Err(Error::recipe_failure(
                ctx.recipe.path(),
                format!("{} exited with code {}", self.interpreter, output.exit_code),
                Some(output.exit_code),
            ))
        }
    }
}
