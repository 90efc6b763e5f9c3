//! Builder methods for creating errors with context

use super::types::Error;
use std::path::PathBuf;
use std::time::Duration;

// Helper methods for creating errors with context
impl Error {
    /// Create a directive error for a given header line
    #[must_use]
    pub fn directive(line: usize, keyword: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Directive {
            line,
            keyword: keyword.into(),
            message: message.into(),
        }
    }

    /// Create an invalid duration error
    #[must_use]
    pub fn invalid_duration(value: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidDuration {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an input unavailable error
    #[must_use]
    pub fn input_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::InputUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Create a path escape error
    #[must_use]
    pub fn path_escape(path: impl Into<PathBuf>, scope: impl Into<PathBuf>) -> Self {
        Error::PathEscape {
            path: path.into(),
            scope: scope.into(),
        }
    }

    /// Create a not found error
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Error::NotFound { path: path.into() }
    }

    /// Create an is-a-directory error
    #[must_use]
    pub fn is_directory(path: impl Into<PathBuf>) -> Self {
        Error::IsDirectory { path: path.into() }
    }

    /// Create a spawn error
    #[must_use]
    pub fn spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        Error::Spawn {
            command: command.into(),
            source,
        }
    }

    /// Create a recipe failure
    #[must_use]
    pub fn recipe_failure(
        recipe: impl Into<PathBuf>,
        message: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Error::RecipeFailure {
            recipe: recipe.into(),
            message: message.into(),
            exit_code,
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timed_out(recipe: impl Into<PathBuf>, duration: Duration) -> Self {
        Error::TimedOut {
            recipe: recipe.into(),
            duration,
        }
    }

    /// Create a cache store error
    #[must_use]
    pub fn cache_store(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Error::CacheStore {
            operation: operation.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported feature error
    #[must_use]
    pub fn unsupported(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Unsupported {
            feature: feature.into(),
            message: message.into(),
        }
    }
}
