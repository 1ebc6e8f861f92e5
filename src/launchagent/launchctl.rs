//! Thin wrapper over the macOS `launchctl` command.

use std::path::Path;
use std::process::Command;

use super::error::{LaunchAgentError, Result};

fn run(action: &str, plist_path: &Path) -> Result<std::process::Output> {
    Command::new("launchctl")
        .arg(action)
        .arg(plist_path)
        .output()
        .map_err(|e| LaunchAgentError::LaunchctlExecution(e.to_string()))
}

/// Registers the agent with launchd (`launchctl load`).
///
/// # Errors
///
/// Returns an error if launchctl cannot run or rejects the plist.
pub fn load(plist_path: &Path) -> Result<()> {
    let output = run("load", plist_path)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LaunchAgentError::ServiceLoad(stderr.trim().to_string()));
    }

    tracing::debug!("launchctl load succeeded for {:?}", plist_path);
    Ok(())
}

/// Removes the agent from launchd (`launchctl unload`).
///
/// Fails when the agent was not loaded; callers clearing stale state ignore
/// the error.
///
/// # Errors
///
/// Returns an error if launchctl cannot run or the agent is not loaded.
pub fn unload(plist_path: &Path) -> Result<()> {
    let output = run("unload", plist_path)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!("launchctl unload failed (may be already unloaded): {}", stderr);
        return Err(LaunchAgentError::ServiceUnload(stderr.trim().to_string()));
    }

    tracing::debug!("launchctl unload succeeded for {:?}", plist_path);
    Ok(())
}
