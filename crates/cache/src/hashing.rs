//! Input resolution and content hashing for cache keys

use plasma_core::{Error, Result};
use plasma_utils::{expand_glob, to_slash};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A declared input file after glob expansion
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolvedInput {
    /// Path relative to the recipe directory, `/` separated
    pub path: String,
    /// Lowercase hex SHA-256 of the contents
    pub hash: String,
    #[serde(skip)]
    pub absolute: PathBuf,
}

/// Incremental SHA-256 over serialized key material
#[derive(Debug, Default)]
pub struct ContentHasher {
    hasher: Sha256,
}

impl ContentHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a value in its canonical JSON form
    pub fn hash_content<T: Serialize>(&mut self, content: &T) -> Result<()> {
        let serialized = serde_json::to_vec(content).map_err(|e| Error::Json {
            message: "failed to serialize content for hashing".to_string(),
            source: e,
        })?;
        self.hasher.update(&serialized);
        Ok(())
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    #[must_use]
    pub fn finalize(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

/// Stream a file through SHA-256 without following a final symlink
pub fn hash_input_file(path: &Path) -> Result<String> {
    let file = open_nofollow(path).map_err(|e| Error::input_unavailable(path, e))?;
    let mut reader = BufReader::with_capacity(8192, file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| Error::input_unavailable(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(unix)]
fn open_nofollow(path: &Path) -> std::io::Result<File> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW)
        .open(path)
}

#[cfg(not(unix))]
fn open_nofollow(path: &Path) -> std::io::Result<File> {
    let metadata = path.symlink_metadata()?;
    if metadata.file_type().is_symlink() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "symlinked inputs are not hashed",
        ));
    }
    File::open(path)
}

/// Expand input patterns under `root` and hash every match.
///
/// Files matched by several patterns appear once. The result is sorted by
/// path. A pattern that matches nothing contributes nothing.
pub fn resolve_inputs<'a, I>(root: &Path, patterns: I) -> Result<Vec<ResolvedInput>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut files = BTreeSet::new();
    for pattern in patterns {
        let matched = expand_glob(root, pattern)?;
        if matched.is_empty() {
            debug!(pattern, root = %root.display(), "Input pattern matched no files");
        }
        files.extend(matched);
    }

    files
        .into_iter()
        .map(|relative| {
            let absolute = readable_path(root, &root.join(&relative))?;
            Ok(ResolvedInput {
                path: to_slash(&relative),
                hash: hash_input_file(&absolute)?,
                absolute,
            })
        })
        .collect()
}

/// Resolve a symlinked input to its target, which must stay inside `root`
fn readable_path(root: &Path, path: &Path) -> Result<PathBuf> {
    let metadata = path
        .symlink_metadata()
        .map_err(|e| Error::input_unavailable(path, e))?;
    if !metadata.file_type().is_symlink() {
        return Ok(path.to_path_buf());
    }

    let target = path
        .canonicalize()
        .map_err(|e| Error::input_unavailable(path, e))?;
    let scope = root
        .canonicalize()
        .map_err(|e| Error::input_unavailable(root, e))?;
    if !target.starts_with(&scope) {
        return Err(Error::input_unavailable(
            path,
            std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!(
                    "symlink target '{}' is outside '{}'",
                    target.display(),
                    scope.display()
                ),
            ),
        ));
    }
    debug!(input = %path.display(), target = %target.display(), "Resolved symlinked input");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasma_utils::sha256_hex;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_resolves_and_deduplicates() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.js", "a");
        write(dir.path(), "src/b.js", "b");

        let inputs = resolve_inputs(dir.path(), ["src/*.js", "src/a.js"]).unwrap();
        let paths: Vec<_> = inputs.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.js", "src/b.js"]);
        assert_eq!(inputs[0].hash, sha256_hex(b"a"));
    }

    #[test]
    fn test_escaping_pattern() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            resolve_inputs(dir.path(), ["../**/*.js"]),
            Err(Error::PathEscape { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_input() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "secret.txt", "x");
        let path = dir.path().join("secret.txt");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything; only assert when the permission bit holds
        if File::open(&path).is_err() {
            assert!(matches!(
                hash_input_file(&path),
                Err(Error::InputUnavailable { .. })
            ));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_hashes_target() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "data/real.json", "v1");
        std::os::unix::fs::symlink("data/real.json", dir.path().join("cfg.json")).unwrap();

        let first = resolve_inputs(dir.path(), ["cfg.json"]).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].path, "cfg.json");
        assert_eq!(first[0].hash, sha256_hex(b"v1"));

        write(dir.path(), "data/real.json", "v2");
        let second = resolve_inputs(dir.path(), ["cfg.json"]).unwrap();
        assert_eq!(second[0].hash, sha256_hex(b"v2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_outside_root_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write(outside.path(), "cfg.json", "v1");
        std::os::unix::fs::symlink(outside.path().join("cfg.json"), dir.path().join("cfg.json"))
            .unwrap();

        assert!(matches!(
            resolve_inputs(dir.path(), ["cfg.json"]),
            Err(Error::InputUnavailable { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_unavailable() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink("gone.json", dir.path().join("cfg.json")).unwrap();

        assert!(matches!(
            resolve_inputs(dir.path(), ["*.json"]),
            Err(Error::InputUnavailable { .. })
        ));
    }

    #[test]
    fn test_content_hasher_is_order_sensitive() {
        let mut a = ContentHasher::new();
        a.hash_content(&("x", 1)).unwrap();
        let mut b = ContentHasher::new();
        b.hash_content(&("x", 2)).unwrap();
        assert_ne!(a.finalize(), b.finalize());
    }
}
