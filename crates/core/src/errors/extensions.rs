//! Extension traits for error handling

use super::types::{Error, Result};
use std::path::Path;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Configuration {
            message: format!("{}: {}", message.into(), e),
        })
    }
}

/// Attach a path and operation to raw I/O failures
pub trait IoResultExt<T> {
    fn fs_context(self, path: &Path, operation: &str) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn fs_context(self, path: &Path, operation: &str) -> Result<T> {
        self.map_err(|e| Error::file_system(path.to_path_buf(), operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_message() {
        let parsed: std::result::Result<u32, _> = "abc".parse::<u32>();
        let err = parsed.context("PLASMA_WORKERS").unwrap_err();
        assert!(err.to_string().starts_with("configuration error: PLASMA_WORKERS"));
    }

    #[test]
    fn test_fs_context_keeps_path() {
        let res: std::io::Result<()> = Err(std::io::Error::from(std::io::ErrorKind::NotFound));
        match res.fs_context(Path::new("/tmp/missing"), "read") {
            Err(Error::FileSystem { path, operation, .. }) => {
                assert_eq!(path, Path::new("/tmp/missing"));
                assert_eq!(operation, "read");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
