//! Artifact output.
//!
//! Artifacts are written to a temporary file in the destination directory
//! and renamed over the target only once every byte is on disk. A build that
//! fails, or a process that dies mid-write, leaves the previous artifact in
//! place.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{EasyReadError, Result};

/// Bytes written to a temporary file beside `target`, not yet visible there.
///
/// Dropping a staged file without committing removes the temporary file.
pub struct StagedFile {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Write `bytes` next to `path`, creating parent directories.
    pub fn stage(path: &Path, bytes: &[u8]) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| EasyReadError::io(dir, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| EasyReadError::io(dir, e))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| EasyReadError::io(tmp.path(), e))?;
        Ok(StagedFile {
            tmp,
            target: path.to_path_buf(),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temporary file over the target.
    pub fn commit(self) -> Result<PathBuf> {
        let StagedFile { tmp, target } = self;
        tmp.persist(&target)
            .map_err(|e| EasyReadError::io(&target, e.error))?;
        log::debug!("wrote {}", target.display());
        Ok(target)
    }
}

/// Atomically replace `path` with `bytes`, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    StagedFile::stage(path, bytes)?.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_directories_and_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out/easy_read.pdf");
        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"second");

        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(leftovers.len(), 1, "temporary files left behind");
    }

    #[test]
    fn unwritable_destination_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        // A regular file cannot be used as a parent directory.
        let err = write_atomic(&blocker.join("out.pdf"), b"data").unwrap_err();
        assert!(matches!(err, EasyReadError::Io { .. }));
        assert_eq!(std::fs::read(&blocker).unwrap(), b"x");
    }

    #[test]
    fn staged_file_is_invisible_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("easy_read.docx");
        std::fs::write(&target, b"old").unwrap();

        let staged = StagedFile::stage(&target, b"new").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
        assert_eq!(staged.commit().unwrap(), target);
        assert_eq!(std::fs::read(&target).unwrap(), b"new");

        drop(StagedFile::stage(&target, b"discarded").unwrap());
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
