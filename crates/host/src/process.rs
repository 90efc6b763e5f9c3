//! Child process execution shared by `exec` and the standard backend

use plasma_core::{Error, Result};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// Exit status and captured streams of a finished child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Build a command that sees only `env`, running in `cwd`.
///
/// The child is killed when the returned command's future is dropped, which
/// is how timeouts cancel it.
pub fn scrubbed_command(
    program: impl AsRef<OsStr>,
    cwd: &Path,
    env: &BTreeMap<String, String>,
) -> Command {
    let mut command = Command::new(program);
    command
        .current_dir(cwd)
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Run a prepared command to completion.
///
/// stdout and stderr are forwarded as tracing events attributed to `recipe`.
/// Only a failure to start the process is an error; any exit status is
/// returned as a code.
pub async fn run_process(mut command: Command, label: &str, recipe: &str) -> Result<ProcessOutput> {
    let child = command.spawn().map_err(|e| Error::spawn(label, e))?;
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| Error::spawn(label, e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    for line in stdout.lines() {
        tracing::info!(recipe = %recipe, command = %label, event_type = "output", "{line}");
    }
    for line in stderr.lines() {
        tracing::warn!(recipe = %recipe, command = %label, event_type = "error_output", "{line}");
    }

    let exit_code = exit_code(output.status);
    tracing::debug!(recipe = %recipe, command = %label, exit_code, "Process finished");

    Ok(ProcessOutput {
        exit_code,
        stdout,
        stderr,
    })
}

/// Exit code, mapping death by signal to `128 + signo`
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env() -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        if let Ok(path) = std::env::var("PATH") {
            env.insert("PATH".to_string(), path);
        }
        env
    }

    #[tokio::test]
    async fn test_exit_codes() {
        let dir = TempDir::new().unwrap();
        let ok = run_process(scrubbed_command("true", dir.path(), &env()), "true", "t")
            .await
            .unwrap();
        assert!(ok.success());

        let failed = run_process(scrubbed_command("false", dir.path(), &env()), "false", "t")
            .await
            .unwrap();
        assert_eq!(failed.exit_code, 1);
    }

    #[tokio::test]
    async fn test_signal_exit_code() {
        let dir = TempDir::new().unwrap();
        let mut command = scrubbed_command("sh", dir.path(), &env());
        command.arg("-c").arg("kill -9 $$");
        let output = run_process(command, "sh", "t").await.unwrap();
        assert_eq!(output.exit_code, 128 + 9);
    }

    #[tokio::test]
    async fn test_environment_is_scrubbed() {
        let dir = TempDir::new().unwrap();
        let mut env = env();
        env.insert("ONLY_THIS".to_string(), "1".to_string());
        let mut command = scrubbed_command("sh", dir.path(), &env);
        command.arg("-c").arg("env");
        let output = run_process(command, "sh", "t").await.unwrap();
        assert!(output.stdout.contains("ONLY_THIS=1"));
        assert!(!output.stdout.contains("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let result = run_process(
            scrubbed_command("definitely-not-a-real-binary-xyz", dir.path(), &env()),
            "definitely-not-a-real-binary-xyz",
            "t",
        )
        .await;
        assert!(matches!(result, Err(Error::Spawn { .. })));
    }
}
