use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration settings derived from CLI arguments.
#[derive(Debug, Clone)]
pub struct Config {
    /// Snapshot document the session reads from and saves to.
    pub snapshot_path: PathBuf,
    /// How long an authoring error stays visible.
    pub notice_window: Duration,
    /// Save the snapshot after every completed derivation.
    pub autosave: bool,
}

impl Config {
    /// Creates a new Config instance from validated arguments.
    pub fn new(snapshot_path: PathBuf, notice_window: Duration, autosave: bool) -> Self {
        Config {
            snapshot_path,
            notice_window,
            autosave,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.snapshot_path.as_os_str().is_empty() {
            bail!("Snapshot path must not be empty");
        }
        if let Some(parent) = self.snapshot_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Snapshot directory does not exist: {}", parent.display());
            }
        }
        Ok(())
    }
}
