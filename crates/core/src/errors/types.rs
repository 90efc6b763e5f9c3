//! Core error type definitions

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for plasma operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for plasma operations using thiserror
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or unknown directive in a recipe header
    #[error("invalid directive '{keyword}' on line {line}: {message}")]
    Directive {
        line: usize,
        keyword: String,
        message: String,
    },

    /// Duration literal with an unknown unit or no digits
    #[error("invalid duration '{value}': {message}")]
    InvalidDuration { value: String, message: String },

    /// A declared input could not be read while building the cache key
    #[error("input '{}' is unavailable: {source}", path.display())]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A path resolved outside the scope it was allowed to touch
    #[error("path '{}' escapes its allowed scope '{}'", path.display(), scope.display())]
    PathEscape { path: PathBuf, scope: PathBuf },

    /// A capability call referenced a missing file
    #[error("no such file: '{}'", path.display())]
    NotFound { path: PathBuf },

    /// A file operation was attempted on a directory
    #[error("'{}' is a directory", path.display())]
    IsDirectory { path: PathBuf },

    /// An external process could not be started
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The recipe raised an unhandled error or its interpreter exited non-zero
    #[error("recipe '{}' failed: {message}", recipe.display())]
    RecipeFailure {
        recipe: PathBuf,
        message: String,
        exit_code: Option<i32>,
    },

    /// The execution exceeded its wall-clock budget
    #[error("recipe '{}' timed out after {duration:?}", recipe.display())]
    TimedOut { recipe: PathBuf, duration: Duration },

    /// Reading or writing the cache store failed
    #[error("cache store {operation} failed for '{}': {message}", path.display())]
    CacheStore {
        operation: String,
        path: PathBuf,
        message: String,
    },

    /// File system operations outside of the capability bridge
    #[error("file system {operation} operation failed for '{}': {source}", path.display())]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Unsupported operation errors
    #[error("unsupported feature '{feature}': {message}")]
    Unsupported { feature: String, message: String },
}

impl Error {
    /// Whether the error happened before any side effect took place.
    ///
    /// Parse and key-construction failures abort a run before the recipe is
    /// executed or the cache is touched.
    #[must_use]
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            Error::Directive { .. }
                | Error::InvalidDuration { .. }
                | Error::InputUnavailable { .. }
                | Error::PathEscape { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::Json {
            message: source.to_string(),
            source,
        }
    }
}
