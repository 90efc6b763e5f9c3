//! Output capture from a workspace and materialisation into the recipe dir

use plasma_cache::Artifacts;
use plasma_core::{Error, Result};
use plasma_utils::{is_temp_artifact, normalize_relative, to_slash, write_atomic};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Read every file under one of `prefixes`.
///
/// Prefixes match whole path components: `dist/` covers `dist/app.js` but
/// not `distro/app.js`. No prefixes means no artifacts.
pub fn collect_outputs(workspace: &Path, prefixes: &[&str]) -> Result<Artifacts> {
    let mut artifacts = Artifacts::new();
    if prefixes.is_empty() {
        return Ok(artifacts);
    }

    let prefixes: Vec<PathBuf> = prefixes
        .iter()
        .map(|prefix| {
            normalize_relative(Path::new(prefix)).ok_or_else(|| Error::path_escape(*prefix, workspace))
        })
        .collect::<Result<_>>()?;

    for entry in WalkDir::new(workspace).follow_links(false) {
        let entry =
            entry.map_err(|e| Error::file_system(workspace, "walk workspace", e.into()))?;
        if !entry.file_type().is_file()
            || entry.file_name().to_str().is_some_and(is_temp_artifact)
        {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(workspace) else {
            continue;
        };
        if !prefixes.iter().any(|prefix| relative.starts_with(prefix)) {
            continue;
        }
        let bytes = fs::read(entry.path())
            .map_err(|e| Error::file_system(entry.path(), "read output", e))?;
        trace!(path = %relative.display(), bytes = bytes.len(), "Captured output");
        artifacts.insert(to_slash(relative), bytes);
    }

    debug!(count = artifacts.len(), "Collected outputs");
    Ok(artifacts)
}

/// Write artifacts under `dest`, each file replaced atomically
pub fn materialize(dest: &Path, artifacts: &Artifacts) -> Result<()> {
    for (path, bytes) in artifacts {
        let relative =
            normalize_relative(Path::new(path)).ok_or_else(|| Error::path_escape(path, dest))?;
        write_atomic(&dest.join(relative), bytes)?;
    }
    debug!(dest = %dest.display(), count = artifacts.len(), "Materialized outputs");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &[u8]) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_component_wise_prefixes() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "dist/app.js", b"app");
        write(dir.path(), "dist/nested/x.map", b"map");
        write(dir.path(), "distro/other.js", b"no");
        write(dir.path(), "out/result.txt", b"result");
        write(dir.path(), "out/skip.txt", b"skip");

        let artifacts = collect_outputs(dir.path(), &["dist/", "out/result.txt"]).unwrap();
        let keys: Vec<_> = artifacts.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["dist/app.js", "dist/nested/x.map", "out/result.txt"]);
    }

    #[test]
    fn test_no_prefixes_no_artifacts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "dist/app.js", b"app");
        assert!(collect_outputs(dir.path(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_materialize_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut artifacts = Artifacts::new();
        artifacts.insert("out/a/b.bin".to_string(), vec![0, 255, 7]);
        materialize(dir.path(), &artifacts).unwrap();
        assert_eq!(fs::read(dir.path().join("out/a/b.bin")).unwrap(), vec![0, 255, 7]);

        let mut escaping = Artifacts::new();
        escaping.insert("../x".to_string(), vec![1]);
        assert!(matches!(
            materialize(dir.path(), &escaping),
            Err(Error::PathEscape { .. })
        ));
    }
}
