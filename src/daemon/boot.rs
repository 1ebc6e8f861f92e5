//! Boot recovery flag.
//!
//! A restart wipes every armed timer. The daemon does not re-arm on its
//! own; it leaves a durable flag for the owning application, which reads
//! it through `status` and clears it with `ack-reschedule`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// File name of the flag inside the data directory.
pub const RESCHEDULE_FLAG_FILE: &str = "reschedule_pending.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RescheduleFlag {
    raised_at: DateTime<Local>,
}

/// Raises and consumes the pending-reschedule flag.
#[derive(Debug, Clone)]
pub struct BootRecoveryHandler {
    flag_path: PathBuf,
}

impl BootRecoveryHandler {
    #[must_use]
    pub fn new(flag_path: impl Into<PathBuf>) -> Self {
        Self {
            flag_path: flag_path.into(),
        }
    }

    pub fn flag_path(&self) -> &Path {
        &self.flag_path
    }

    /// Writes the flag. Raising an already raised flag refreshes its
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag file cannot be written.
    pub fn raise(&self) -> Result<()> {
        if let Some(parent) = self.flag_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
        }

        let flag = RescheduleFlag {
            raised_at: Local::now(),
        };
        let json = serde_json::to_vec_pretty(&flag).context("Failed to serialize reschedule flag")?;
        std::fs::write(&self.flag_path, json)
            .with_context(|| format!("Failed to write reschedule flag: {:?}", self.flag_path))?;

        info!("Timers lost, reschedule flag raised at {:?}", self.flag_path);
        Ok(())
    }

    /// Returns true while the flag is raised.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.flag_path.exists()
    }

    /// Returns when the flag was raised, if it is raised and readable.
    #[must_use]
    pub fn raised_at(&self) -> Option<DateTime<Local>> {
        let bytes = std::fs::read(&self.flag_path).ok()?;
        match serde_json::from_slice::<RescheduleFlag>(&bytes) {
            Ok(flag) => Some(flag.raised_at),
            Err(e) => {
                warn!("Unreadable reschedule flag: {}", e);
                None
            }
        }
    }

    /// Reads and clears the flag. Returns whether it was raised.
    pub fn consume(&self) -> bool {
        match std::fs::remove_file(&self.flag_path) {
            Ok(()) => {
                info!("Reschedule flag consumed");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No reschedule flag to consume");
                false
            }
            Err(e) => {
                warn!("Failed to clear reschedule flag: {}", e);
                false
            }
        }
    }
}
