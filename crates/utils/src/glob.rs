//! Glob expansion relative to a root directory
//!
//! `*` never crosses a `/`; `**` does. Matching runs against `/`-separated
//! relative paths so results are identical across platforms.

use crate::atomic_file::is_temp_artifact;
use crate::paths::{pattern_escapes, to_slash};
use globset::{GlobBuilder, GlobMatcher};
use plasma_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

/// Compile a recipe glob, rejecting patterns that could leave `root`
pub fn compile_glob(pattern: &str, root: &Path) -> Result<GlobMatcher> {
    if pattern_escapes(pattern) {
        return Err(Error::path_escape(pattern, root));
    }
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| Error::configuration(format!("invalid glob pattern '{pattern}': {e}")))
}

/// Expand `pattern` under `root`, returning sorted relative file paths.
///
/// Directories and in-progress atomic-write temp files are never returned.
/// Symlinks are not followed while walking; a matching symlink is returned
/// as-is unless it points at a directory, and callers decide how to read it.
pub fn expand_glob(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = compile_glob(pattern, root)?;
    let mut matches = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::file_system(path, "walk directory", e.into())
        })?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            if entry.path().is_dir() {
                continue;
            }
        } else if !file_type.is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .is_some_and(is_temp_artifact)
        {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if matcher.is_match(to_slash(relative)) {
            matches.push(relative.to_path_buf());
        }
    }

    matches.sort();
    trace!(pattern, root = %root.display(), count = matches.len(), "Expanded glob");
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in ["src/a.js", "src/nested/b.js", "src/c.ts", "top.js"] {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file).unwrap();
        }
        dir
    }

    #[test]
    fn test_single_star_stays_in_directory() {
        let dir = tree();
        let found = expand_glob(dir.path(), "src/*.js").unwrap();
        assert_eq!(found, vec![PathBuf::from("src/a.js")]);
    }

    #[test]
    fn test_double_star_recurses() {
        let dir = tree();
        let found = expand_glob(dir.path(), "src/**/*.js").unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("src/a.js"), PathBuf::from("src/nested/b.js")]
        );
    }

    #[test]
    fn test_no_matches_is_empty() {
        let dir = tree();
        assert!(expand_glob(dir.path(), "*.rs").unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_returned() {
        let dir = tree();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("cfg.json"), "{}").unwrap();
        std::os::unix::fs::symlink(outside.path().join("cfg.json"), dir.path().join("cfg.json"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling.json"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("src"), dir.path().join("linked")).unwrap();

        let found = expand_glob(dir.path(), "*.json").unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("cfg.json"), PathBuf::from("dangling.json")]
        );
        assert!(expand_glob(dir.path(), "linked*").unwrap().is_empty());
    }

    #[test]
    fn test_escaping_patterns_rejected() {
        let dir = tree();
        assert!(matches!(
            expand_glob(dir.path(), "../*"),
            Err(Error::PathEscape { .. })
        ));
        assert!(matches!(
            expand_glob(dir.path(), "/etc/*"),
            Err(Error::PathEscape { .. })
        ));
    }
}
