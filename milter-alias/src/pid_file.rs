use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use milter_alias_common::internal;

/// Holds our process id on disk for as long as we are serving.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes the current process id to `path`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// If the file cannot be written.
    pub async fn create(path: &Path) -> anyhow::Result<Self> {
        tokio::fs::write(path, format!("{}\n", std::process::id()))
            .await
            .with_context(|| format!("Unable to write PID file {}", path.display()))?;

        internal!(level = DEBUG, "Wrote PID file {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub async fn remove(self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => internal!(level = DEBUG, "Removed PID file {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => internal!(
                level = ERROR,
                "Unable to remove PID file {}: {err}",
                self.path.display()
            ),
        }
    }
}
