//! Path confinement for capability calls

use plasma_core::{Error, IoResultExt, Result};
use plasma_utils::{normalize_relative, to_slash};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What happens to writes outside the declared output prefixes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputPolicy {
    /// Allow the write; only files under output prefixes are cached
    #[default]
    Capture,
    /// Reject the write with `PathEscape`
    Enforce,
}

impl std::str::FromStr for OutputPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "capture" => Ok(OutputPolicy::Capture),
            "enforce" => Ok(OutputPolicy::Enforce),
            other => Err(Error::configuration(format!(
                "unknown output policy '{other}' (expected capture or enforce)"
            ))),
        }
    }
}

/// The directory a recipe may touch and the prefixes it declared as outputs
#[derive(Debug, Clone)]
pub struct HostScope {
    root: PathBuf,
    outputs: Vec<PathBuf>,
    policy: OutputPolicy,
}

/// A path accepted by the scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedPath {
    /// Absolute location on disk
    pub absolute: PathBuf,
    /// Location relative to the scope root
    pub relative: PathBuf,
}

impl ScopedPath {
    /// Relative location with `/` separators
    #[must_use]
    pub fn display_relative(&self) -> String {
        to_slash(&self.relative)
    }
}

impl HostScope {
    /// Build a scope rooted at an existing directory.
    ///
    /// Output prefixes are relative to the root; escaping prefixes are
    /// rejected.
    pub fn new<I, S>(root: impl AsRef<Path>, outputs: I, policy: OutputPolicy) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root = root.as_ref();
        let root = root.canonicalize().fs_context(root, "canonicalize scope root")?;
        let outputs = outputs
            .into_iter()
            .map(|prefix| {
                let prefix = prefix.as_ref();
                normalize_relative(Path::new(prefix))
                    .ok_or_else(|| Error::path_escape(prefix, &root))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root,
            outputs,
            policy,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    #[must_use]
    pub fn policy(&self) -> OutputPolicy {
        self.policy
    }

    /// Whether a root-relative path falls under a declared output prefix.
    ///
    /// Matching is per path component, so `dist` does not cover `distro/x`.
    #[must_use]
    pub fn is_output(&self, relative: &Path) -> bool {
        self.outputs.iter().any(|prefix| relative.starts_with(prefix))
    }

    /// Resolve a path for reading.
    pub fn resolve(&self, path: &str) -> Result<ScopedPath> {
        let requested = Path::new(path);
        let normalized = if requested.is_absolute() {
            requested
                .strip_prefix(&self.root)
                .ok()
                .and_then(normalize_relative)
        } else {
            normalize_relative(requested)
        };
        let relative = normalized.ok_or_else(|| Error::path_escape(path, &self.root))?;

        let absolute = self.root.join(&relative);
        self.check_ancestors(&absolute, path)?;

        Ok(ScopedPath { absolute, relative })
    }

    /// Resolve a path for writing, applying the output policy.
    pub fn resolve_for_write(&self, path: &str) -> Result<ScopedPath> {
        let scoped = self.resolve(path)?;
        if scoped.relative.as_os_str().is_empty() {
            return Err(Error::is_directory(&scoped.absolute));
        }
        if self.policy == OutputPolicy::Enforce && !self.is_output(&scoped.relative) {
            return Err(Error::path_escape(path, self.outputs_description()));
        }
        Ok(scoped)
    }

    /// Reject paths whose nearest existing ancestor resolves outside the root
    fn check_ancestors(&self, absolute: &Path, requested: &str) -> Result<()> {
        let mut candidate = Some(absolute);
        while let Some(current) = candidate {
            if current.symlink_metadata().is_ok() {
                let resolved = current
                    .canonicalize()
                    .map_err(|_| Error::path_escape(requested, &self.root))?;
                if !resolved.starts_with(&self.root) {
                    return Err(Error::path_escape(requested, &self.root));
                }
                return Ok(());
            }
            candidate = current.parent();
        }
        Err(Error::path_escape(requested, &self.root))
    }

    fn outputs_description(&self) -> PathBuf {
        let prefixes: Vec<String> = self.outputs.iter().map(|p| to_slash(p)).collect();
        PathBuf::from(format!("outputs [{}]", prefixes.join(", ")))
    }
}
