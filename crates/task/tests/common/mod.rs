//! Shared fixtures for engine integration tests
//!
//! `ScriptedInterpreter` is a tiny portable interpreter whose recipes are a
//! list of commands, one per line:
//!
//! ```text
//! write <path> <content...>
//! copy <from> <to>
//! exec <command> <args...>
//! sleep <millis>
//! fail <message...>
//! ```

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use plasma_core::{Error, Result};
use plasma_host::HostCapabilities;
use plasma_recipe::Recipe;
use plasma_task::PortableInterpreter;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct ScriptedInterpreter {
    version: String,
    runs: AtomicUsize,
    exec_codes: Mutex<Vec<i32>>,
}

impl ScriptedInterpreter {
    pub fn new() -> Arc<Self> {
        Self::with_version("scripted-1.0")
    }

    pub fn with_version(version: &str) -> Arc<Self> {
        Arc::new(Self {
            version: version.to_string(),
            runs: AtomicUsize::new(0),
            exec_codes: Mutex::new(Vec::new()),
        })
    }

    /// Number of times a recipe body was evaluated
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Exit codes observed by `exec` commands, in order
    pub fn exec_codes(&self) -> Vec<i32> {
        self.exec_codes.lock().clone()
    }
}

#[async_trait]
impl PortableInterpreter for ScriptedInterpreter {
    fn name(&self) -> &str {
        "scripted"
    }

    fn version(&self) -> String {
        self.version.clone()
    }

    async fn run(&self, recipe: &Recipe, host: Arc<dyn HostCapabilities>) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        for line in recipe.body().lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
                continue;
            }
            let mut words = line.split_whitespace();
            let command = words.next().unwrap_or_default();
            let rest: Vec<&str> = words.collect();

            match command {
                "write" => {
                    let (path, content) = rest
                        .split_first()
                        .ok_or_else(|| Error::recipe_failure(recipe.path(), "write needs a path", None))?;
                    host.write_file(path, content.join(" ").into()).await?;
                }
                "copy" => {
                    let [from, to] = &rest[..] else {
                        return Err(Error::recipe_failure(recipe.path(), "copy needs two paths", None));
                    };
                    let content = host.read_file(from).await?;
                    host.write_file(to, content).await?;
                }
                "exec" => {
                    let (cmd, args) = rest
                        .split_first()
                        .ok_or_else(|| Error::recipe_failure(recipe.path(), "exec needs a command", None))?;
                    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    let code = host.exec(cmd, &args).await?;
                    self.exec_codes.lock().push(code);
                }
                "sleep" => {
                    let millis: u64 = rest.first().and_then(|m| m.parse().ok()).unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                }
                "fail" => {
                    return Err(Error::recipe_failure(recipe.path(), rest.join(" "), None));
                }
                other => {
                    return Err(Error::recipe_failure(
                        recipe.path(),
                        format!("unknown command '{other}'"),
                        None,
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Write a recipe file into `dir` and return its path
pub fn write_recipe(dir: &Path, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, source).unwrap();
    path
}
