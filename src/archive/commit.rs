//! Temp-file-then-rename commit protocol
//!
//! A rewrite streams into `<original-absolute-path>.tmp.zip`. The temp file is
//! owned by a [`TempFile`] guard that deletes it on drop, so every early return
//! and every `?` leaves no temp file behind. Only [`TempFile::commit`] moves it
//! over the original.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const TEMP_SUFFIX: &str = ".tmp.zip";

/// `<absolute original path>.tmp.zip`
pub(crate) fn temp_path_for(original: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(original)?;
    let mut name = absolute.into_os_string();
    name.push(TEMP_SUFFIX);
    Ok(PathBuf::from(name))
}

#[derive(Debug)]
pub(crate) struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    /// Create the temp file and return the guard plus a handle.
    ///
    /// Fails with `AlreadyExists` if the path is taken; a leftover temp file
    /// may be the recovery copy of an earlier failed commit.
    pub(crate) fn create(path: PathBuf) -> Result<(Self, File)> {
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok((Self { path, armed: true }, file))
    }

    /// Move the temp file over `original`.
    ///
    /// Rename-over is tried first. Where the platform refuses to replace an
    /// existing file, the original is removed and the rename retried; if that
    /// second rename fails the temp file is kept and [`Error::Commit`] names it.
    pub(crate) fn commit(self, original: &Path) -> Result<()> {
        self.commit_with(original, |from, to| fs::rename(from, to))
    }

    fn commit_with<F>(mut self, original: &Path, mut rename: F) -> Result<()>
    where
        F: FnMut(&Path, &Path) -> io::Result<()>,
    {
        let first = match rename(&self.path, original) {
            Ok(()) => {
                self.armed = false;
                return Ok(());
            },
            Err(e) => e,
        };
        tracing::debug!(error = %first, "rename over original failed, removing original first");

        // Original still intact here; dropping `self` removes the temp file
        fs::remove_file(original)?;

        match rename(&self.path, original) {
            Ok(()) => {
                self.armed = false;
                Ok(())
            },
            Err(source) => {
                self.armed = false;
                tracing::error!(
                    temp = %self.path.display(),
                    "original removed but commit rename failed"
                );
                Err(Error::Commit {
                    original: original.to_path_buf(),
                    temp: self.path.clone(),
                    source,
                })
            },
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort; never masks the error that caused the drop
            let _ = fs::remove_file(&self.path);
        }
    }
}
