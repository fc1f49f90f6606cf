use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

/// Where tools stage files on their way in and out of the environment.
///
/// Each staged file is a [`NamedTempFile`], deleted when dropped, so it
/// disappears on every path out of a tool call.
#[derive(Clone, Debug)]
pub struct StagingDir {
    dir: PathBuf,
}

impl StagingDir {
    /// Stages files in `dir`, which must exist.
    #[inline]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the staging directory.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn create(&self, suffix: &str) -> io::Result<NamedTempFile> {
        Builder::new()
            .prefix("terminal-agent-")
            .suffix(suffix)
            .tempfile_in(&self.dir)
    }
}

impl Default for StagingDir {
    /// Stages files in the OS temp directory.
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}
