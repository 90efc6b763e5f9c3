//! Record of side effects performed through the bridge

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// One side effect attributed to a recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEffect {
    Wrote {
        path: String,
        bytes: usize,
        at: DateTime<Utc>,
    },
    Exec {
        command: String,
        args: Vec<String>,
        exit_code: i32,
        at: DateTime<Utc>,
    },
}

/// Append-only effect log for a single execution
#[derive(Debug)]
pub struct EffectLog {
    recipe: PathBuf,
    entries: Mutex<Vec<HostEffect>>,
}

impl EffectLog {
    #[must_use]
    pub fn new(recipe: impl Into<PathBuf>) -> Self {
        Self {
            recipe: recipe.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn recipe(&self) -> &Path {
        &self.recipe
    }

    pub fn record(&self, effect: HostEffect) {
        tracing::debug!(recipe = %self.recipe.display(), effect = ?effect, "Host effect");
        self.entries.lock().push(effect);
    }

    /// Copy of the entries recorded so far
    #[must_use]
    pub fn snapshot(&self) -> Vec<HostEffect> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
