//! Crash-safe file publication
//!
//! Content is written to a hidden sibling file and renamed over the target,
//! so a reader sees either the previous file or the complete new one.

use plasma_core::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Hidden sibling file that is removed unless it was published
struct StagedFile {
    path: PathBuf,
    published: bool,
}

impl StagedFile {
    fn create(dir: &Path) -> Result<(Self, File)> {
        let path = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| Error::file_system(&path, "create temporary file", e))?;
        Ok((
            Self {
                path,
                published: false,
            },
            file,
        ))
    }

    fn publish(mut self, target: &Path) -> Result<()> {
        fs::rename(&self.path, target)
            .map_err(|e| Error::file_system(target, "atomic rename", e))?;
        self.published = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.published {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Atomically replace `path` with `content`, creating parent directories
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .ok_or_else(|| {
            Error::configuration(format!("'{}' has no parent directory", path.display()))
        })?;
    fs::create_dir_all(dir).map_err(|e| Error::file_system(dir, "create parent directory", e))?;

    let (staged, mut file) = StagedFile::create(dir)?;
    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|e| Error::file_system(&staged.path, "write temporary file", e))?;
    drop(file);

    staged.publish(path)
}

/// Whether a file name belongs to an unpublished atomic write
#[must_use]
pub fn is_temp_artifact(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}
