//! Loaded recipes

use crate::directive::{Directive, RuntimeOptions};
use crate::parser::{parse_header, CommentStyle};
use plasma_core::{IoResultExt, Result, RuntimeKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// A parsed recipe, immutable once loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    path: PathBuf,
    source: String,
    body: String,
    directives: Vec<Directive>,
    runtime: RuntimeKind,
}

impl Recipe {
    /// Read and parse a recipe file.
    ///
    /// The runtime is taken from `runtime` when given, otherwise from a
    /// `plasma run <runtime>` shebang, otherwise `portable`.
    pub async fn load(path: impl AsRef<Path>, runtime: Option<RuntimeKind>) -> Result<Self> {
        let path = path.as_ref();
        let path = tokio::fs::canonicalize(path)
            .await
            .fs_context(path, "canonicalize")?;
        let source = tokio::fs::read_to_string(&path)
            .await
            .fs_context(&path, "read")?;
        Self::from_source(path, source, runtime)
    }

    /// Parse recipe text that has already been read
    pub fn from_source(
        path: impl Into<PathBuf>,
        source: impl Into<String>,
        runtime: Option<RuntimeKind>,
    ) -> Result<Self> {
        let path = path.into();
        let source = source.into();
        let header = parse_header(&source, CommentStyle::for_path(&path))?;
        let runtime = runtime
            .or(header.shebang_runtime)
            .unwrap_or(RuntimeKind::Portable);

        debug!(
            recipe = %path.display(),
            runtime = %runtime,
            directives = header.directives.len(),
            "Loaded recipe"
        );

        Ok(Self {
            path,
            source,
            body: header.body,
            directives: header.directives,
            runtime,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that input patterns and output prefixes are relative to
    #[must_use]
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// File name of the recipe script
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("recipe")
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Source with directive lines blanked
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    #[must_use]
    pub fn runtime(&self) -> &RuntimeKind {
        &self.runtime
    }

    /// Whether any `input` directive is present, even one matching nothing
    #[must_use]
    pub fn declares_inputs(&self) -> bool {
        self.directives
            .iter()
            .any(|d| matches!(d, Directive::Input { .. }))
    }

    #[must_use]
    pub fn input_patterns(&self) -> Vec<&str> {
        self.directives
            .iter()
            .filter_map(|d| match d {
                Directive::Input { pattern } => Some(pattern.as_str()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn output_prefixes(&self) -> Vec<&str> {
        self.directives
            .iter()
            .filter_map(|d| match d {
                Directive::Output { prefix } => Some(prefix.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Union of all `env` directives
    #[must_use]
    pub fn env_names(&self) -> BTreeSet<&str> {
        self.directives
            .iter()
            .filter_map(|d| match d {
                Directive::Env { names } => Some(names.iter().map(String::as_str)),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Cache lifetime, `None` when caching is disabled
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.directives.iter().find_map(|d| match d {
            Directive::Cache { ttl } if !ttl.is_zero() => Some(*ttl),
            _ => None,
        })
    }

    #[must_use]
    pub fn runtime_options(&self) -> Option<&RuntimeOptions> {
        self.directives.iter().find_map(|d| match d {
            Directive::Runtime { options } => Some(options),
            _ => None,
        })
    }

    /// Whether the runtime version is part of the cache key
    #[must_use]
    pub fn includes_runtime_version(&self) -> bool {
        self.runtime_options()
            .is_some_and(|options| options.include_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasma_core::Error;
    use tempfile::TempDir;

    const PORTABLE_FIXTURE: &str = r#"//PLASMA input "src/**/*.ts"
//PLASMA output "build/"
//PLASMA cache ttl="30m"
//PLASMA env "NODE_ENV" "API_URL"
//PLASMA runtime include-version=true

const files = await plasma.glob("src/**/*.ts");
"#;

    #[test]
    fn test_accessors() {
        let recipe = Recipe::from_source("/work/build.js", PORTABLE_FIXTURE, None).unwrap();
        assert_eq!(recipe.runtime(), &RuntimeKind::Portable);
        assert_eq!(recipe.dir(), Path::new("/work"));
        assert_eq!(recipe.file_name(), "build.js");
        assert_eq!(recipe.input_patterns(), vec!["src/**/*.ts"]);
        assert_eq!(recipe.output_prefixes(), vec!["build/"]);
        assert_eq!(
            recipe.env_names().into_iter().collect::<Vec<_>>(),
            vec!["API_URL", "NODE_ENV"]
        );
        assert_eq!(recipe.cache_ttl(), Some(Duration::from_secs(1800)));
        assert!(recipe.includes_runtime_version());
        assert!(recipe.declares_inputs());
        assert!(!recipe.body().contains("PLASMA"));
        assert!(recipe.source().contains("PLASMA"));
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let recipe = Recipe::from_source("r.js", "//PLASMA cache ttl=\"0\"\n", None).unwrap();
        assert_eq!(recipe.cache_ttl(), None);
        assert_eq!(recipe.dir(), Path::new("."));
    }

    #[test]
    fn test_runtime_precedence() {
        let source = "#!/usr/bin/env -S plasma run python3\nprint(1)\n";
        let from_shebang = Recipe::from_source("r.py", source, None).unwrap();
        assert_eq!(from_shebang.runtime().interpreter(), Some("python3"));

        let explicit =
            Recipe::from_source("r.py", source, Some(RuntimeKind::Portable)).unwrap();
        assert!(explicit.runtime().is_portable());
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("build.js");
        std::fs::write(&path, PORTABLE_FIXTURE).unwrap();

        let recipe = Recipe::load(&path, None).await.unwrap();
        assert!(recipe.path().is_absolute());
        assert_eq!(recipe.dir(), dir.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Recipe::load(dir.path().join("nope.js"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileSystem { .. }));
    }
}
