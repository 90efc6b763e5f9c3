//! Runtime version resolution, memoised per engine

use crate::backend::PortableInterpreter;
use dashmap::DashMap;
use plasma_core::{Error, Result, RuntimeKind, BASELINE_ENV_VARS};
use plasma_host::{run_process, scrubbed_command};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves and remembers `<interpreter> --version` output
#[derive(Debug, Default)]
pub struct RuntimeVersions {
    resolved: DashMap<String, String>,
}

impl RuntimeVersions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Version string for `runtime`.
    ///
    /// Portable runtimes report their interpreter's version. Standard runtimes
    /// run `<interpreter> --version` once and reuse the first line of output.
    pub async fn resolve(
        &self,
        runtime: &RuntimeKind,
        portable: Option<&Arc<dyn PortableInterpreter>>,
    ) -> Result<String> {
        let interpreter = match runtime {
            RuntimeKind::Portable => {
                return portable.map(|interp| interp.version()).ok_or_else(|| {
                    Error::unsupported(
                        "portable runtime",
                        "no portable interpreter is registered",
                    )
                })
            }
            RuntimeKind::Standard { interpreter } => interpreter,
        };

        if let Some(version) = self.resolved.get(interpreter) {
            return Ok(version.clone());
        }

        let program = which::which(interpreter).map_err(|e| {
            Error::spawn(
                interpreter,
                std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
            )
        })?;

        let env: BTreeMap<String, String> = BASELINE_ENV_VARS
            .iter()
            .filter_map(|name| Some((name.to_string(), std::env::var(name).ok()?)))
            .collect();
        let cwd = std::env::temp_dir();
        let mut command = scrubbed_command(&program, &cwd, &env);
        command.arg("--version");
        let output = run_process(command, interpreter, "runtime-version").await?;

        if !output.success() {
            return Err(Error::spawn(
                interpreter,
                std::io::Error::other(format!(
                    "'{interpreter} --version' exited with code {}",
                    output.exit_code
                )),
            ));
        }

        let version = first_line(&output.stdout)
            .or_else(|| first_line(&output.stderr))
            .unwrap_or_default()
            .to_string();
        debug!(interpreter, version = %version, "Resolved runtime version");
        self.resolved
            .insert(interpreter.clone(), version.clone());
        Ok(version)
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}
