//! Recipe execution state machine
//!
//! ```text
//! Pending -> Running -> Succeeded
//!                    -> Failed
//!                    -> TimedOut
//! ```
//!
//! Staging failures move straight from `Pending` to `Failed`. Failures never
//! escape as errors: they are captured in the returned [`ExecutionResult`].

use crate::backend::{Backend, ExecutionContext, PortableBackend, PortableInterpreter, StandardBackend};
use crate::capture::collect_outputs;
use crate::staging::Workspace;
use plasma_cache::{Artifacts, ResolvedInput};
use plasma_core::{EnvSnapshot, Error, RuntimeKind, BASELINE_ENV_VARS};
use plasma_host::{EffectLog, HostScope, OutputPolicy};
use plasma_recipe::Recipe;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

/// Exit code reported for timed out executions, as `timeout(1)` does
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Lifecycle of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl ExecutionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded | ExecutionState::Failed | ExecutionState::TimedOut
        )
    }

    #[must_use]
    pub fn can_transition_to(self, next: ExecutionState) -> bool {
        matches!(
            (self, next),
            (ExecutionState::Pending, ExecutionState::Running)
                | (ExecutionState::Pending, ExecutionState::Failed)
                | (ExecutionState::Running, ExecutionState::Succeeded)
                | (ExecutionState::Running, ExecutionState::Failed)
                | (ExecutionState::Running, ExecutionState::TimedOut)
        )
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::Pending => "pending",
            ExecutionState::Running => "running",
            ExecutionState::Succeeded => "succeeded",
            ExecutionState::Failed => "failed",
            ExecutionState::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Final status of an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Succeeded,
    Failed {
        message: String,
        exit_code: Option<i32>,
    },
    TimedOut {
        after: Duration,
    },
}

impl ExecutionStatus {
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        match self {
            ExecutionStatus::Succeeded => ExecutionState::Succeeded,
            ExecutionStatus::Failed { .. } => ExecutionState::Failed,
            ExecutionStatus::TimedOut { .. } => ExecutionState::TimedOut,
        }
    }

    /// Process exit code for a command-line front end
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecutionStatus::Succeeded => 0,
            ExecutionStatus::Failed { .. } => 1,
            ExecutionStatus::TimedOut { .. } => TIMEOUT_EXIT_CODE,
        }
    }

    fn failed(error: &Error) -> Self {
        let exit_code = match error {
            Error::RecipeFailure { exit_code, .. } => *exit_code,
            _ => None,
        };
        ExecutionStatus::Failed {
            message: error.to_string(),
            exit_code,
        }
    }
}

/// What an execution produced; immutable once returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub outputs: Artifacts,
    pub duration: Duration,
}

impl ExecutionResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }

    /// The failure as an error, `None` on success
    #[must_use]
    pub fn error(&self, recipe: &Recipe) -> Option<Error> {
        match &self.status {
            ExecutionStatus::Succeeded => None,
            ExecutionStatus::Failed { message, exit_code } => {
                Some(Error::recipe_failure(recipe.path(), message.clone(), *exit_code))
            }
            ExecutionStatus::TimedOut { after } => Some(Error::timed_out(recipe.path(), *after)),
        }
    }
}

/// Environment a recipe sees: the baseline variables plus its declared ones
#[must_use]
pub fn recipe_environment(recipe: &Recipe, env: &EnvSnapshot) -> BTreeMap<String, String> {
    BASELINE_ENV_VARS
        .iter()
        .copied()
        .chain(recipe.env_names())
        .filter_map(|name| Some((name.to_string(), env.get(name)?.to_string())))
        .collect()
}

/// Selects a backend for each recipe and runs it in a staged workspace
pub struct Executor {
    portable: Option<Arc<dyn PortableInterpreter>>,
    timeout: Duration,
    output_policy: OutputPolicy,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("portable", &self.portable.as_ref().map(|p| p.name().to_string()))
            .field("timeout", &self.timeout)
            .field("output_policy", &self.output_policy)
            .finish()
    }
}

struct StateTracker<'a> {
    recipe: &'a Recipe,
    state: ExecutionState,
}

impl StateTracker<'_> {
    fn transition(&mut self, next: ExecutionState) {
        if self.state.can_transition_to(next) {
            debug!(recipe = %self.recipe.path().display(), from = %self.state, to = %next, "Execution state");
        } else {
            warn!(recipe = %self.recipe.path().display(), from = %self.state, to = %next, "Unexpected execution state transition");
        }
        self.state = next;
    }
}

impl Executor {
    #[must_use]
    pub fn new(
        portable: Option<Arc<dyn PortableInterpreter>>,
        timeout: Duration,
        output_policy: OutputPolicy,
    ) -> Self {
        Self {
            portable,
            timeout,
            output_policy,
        }
    }

    #[must_use]
    pub fn portable_interpreter(&self) -> Option<&Arc<dyn PortableInterpreter>> {
        self.portable.as_ref()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn backend(&self, runtime: &RuntimeKind) -> Result<Box<dyn Backend>, Error> {
        match runtime {
            RuntimeKind::Portable => self
                .portable
                .as_ref()
                .map(|interp| Box::new(PortableBackend::new(interp.clone())) as Box<dyn Backend>)
                .ok_or_else(|| {
                    Error::unsupported("portable runtime", "no portable interpreter is registered")
                }),
            RuntimeKind::Standard { interpreter } => {
                Ok(Box::new(StandardBackend::new(interpreter.clone())))
            }
        }
    }

    /// Run `recipe` once with its resolved inputs
    pub async fn execute(
        &self,
        recipe: &Recipe,
        inputs: &[ResolvedInput],
        env: &EnvSnapshot,
    ) -> ExecutionResult {
        let span = tracing::info_span!("execute", recipe = %recipe.path().display(), runtime = %recipe.runtime());
        self.execute_inner(recipe, inputs, env).instrument(span).await
    }

    async fn execute_inner(
        &self,
        recipe: &Recipe,
        inputs: &[ResolvedInput],
        env: &EnvSnapshot,
    ) -> ExecutionResult {
        let started = Instant::now();
        let mut tracker = StateTracker {
            recipe,
            state: ExecutionState::Pending,
        };

        let finish = |tracker: &mut StateTracker<'_>, status: ExecutionStatus, outputs: Artifacts| {
            tracker.transition(status.state());
            ExecutionResult {
                status,
                outputs,
                duration: started.elapsed(),
            }
        };

        let prepared = self.backend(recipe.runtime()).and_then(|backend| {
            let workspace = Workspace::stage(recipe, inputs)?;
            let scope = HostScope::new(workspace.path(), recipe.output_prefixes(), self.output_policy)?;
            Ok((backend, workspace, scope))
        });
        let (backend, workspace, scope) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(error = %e, "Execution could not start");
                return finish(&mut tracker, ExecutionStatus::failed(&e), Artifacts::new());
            }
        };

        tracker.transition(ExecutionState::Running);
        let ctx = ExecutionContext {
            recipe,
            workspace: workspace.path(),
            script: workspace.script(),
            env: recipe_environment(recipe, env),
            scope,
            effects: Arc::new(EffectLog::new(recipe.path())),
        };

        match tokio::time::timeout(self.timeout, backend.execute(ctx)).await {
            Err(_) => {
                warn!(after = ?self.timeout, "Recipe timed out");
                finish(
                    &mut tracker,
                    ExecutionStatus::TimedOut {
                        after: self.timeout,
                    },
                    Artifacts::new(),
                )
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Recipe failed");
                finish(&mut tracker, ExecutionStatus::failed(&e), Artifacts::new())
            }
            Ok(Ok(())) => match collect_outputs(workspace.path(), &recipe.output_prefixes()) {
                Ok(outputs) => {
                    info!(outputs = outputs.len(), elapsed = ?started.elapsed(), "Recipe succeeded");
                    finish(&mut tracker, ExecutionStatus::Succeeded, outputs)
                }
                Err(e) => {
                    warn!(error = %e, "Capturing outputs failed");
                    finish(&mut tracker, ExecutionStatus::failed(&e), Artifacts::new())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use ExecutionState::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(TimedOut));
        assert!(!Succeeded.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Succeeded));
        assert!(TimedOut.is_terminal());
        assert!(!Running.is_terminal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExecutionStatus::Succeeded.exit_code(), 0);
        assert_eq!(
            ExecutionStatus::Failed {
                message: "boom".into(),
                exit_code: Some(3)
            }
            .exit_code(),
            1
        );
        assert_eq!(
            ExecutionStatus::TimedOut {
                after: Duration::from_secs(1)
            }
            .exit_code(),
            TIMEOUT_EXIT_CODE
        );
    }

    #[test]
    fn test_recipe_environment_is_scrubbed() {
        let recipe =
            Recipe::from_source("r.js", "//PLASMA env \"FOO\" \"MISSING\"\n", None).unwrap();
        let env = EnvSnapshot::new()
            .with("FOO", "bar")
            .with("PATH", "/bin")
            .with("SECRET", "x");
        let visible = recipe_environment(&recipe, &env);
        assert_eq!(visible.get("FOO").map(String::as_str), Some("bar"));
        assert_eq!(visible.get("PATH").map(String::as_str), Some("/bin"));
        assert!(!visible.contains_key("SECRET"));
        assert!(!visible.contains_key("MISSING"));
    }

    #[tokio::test]
    async fn test_portable_without_interpreter_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let recipe = Recipe::from_source(dir.path().join("r.js"), "run();\n", None).unwrap();
        let executor = Executor::new(None, Duration::from_secs(5), OutputPolicy::Capture);
        let result = executor.execute(&recipe, &[], &EnvSnapshot::new()).await;
        assert!(matches!(result.status, ExecutionStatus::Failed { .. }));
        assert!(result.outputs.is_empty());
    }
}
