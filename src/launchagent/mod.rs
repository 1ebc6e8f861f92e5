//! LaunchAgent management for macOS.
//!
//! Installs the Adhan daemon as a per-user LaunchAgent so that it starts at
//! login and is restarted by launchd after a crash. A login start is treated
//! by the daemon like a reboot: it raises the pending-reschedule flag.

pub mod error;
pub mod launchctl;
pub mod plist;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::DaemonConfig;

pub use error::{LaunchAgentError, Result};
pub use plist::AdhanLaunchAgent;

/// Returns `~/Library/LaunchAgents/dev.adhan.daemon.plist`.
///
/// # Errors
///
/// Returns an error if the home directory is unknown.
pub fn plist_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or(LaunchAgentError::HomeDirectoryNotFound)?;
    Ok(home_dir.join(format!(
        "Library/LaunchAgents/{}.plist",
        AdhanLaunchAgent::LABEL
    )))
}

/// Returns true when the agent plist exists.
pub fn is_installed() -> bool {
    plist_path().map(|path| path.exists()).unwrap_or(false)
}

/// Installs and loads the LaunchAgent.
///
/// `config_file` is forwarded to the daemon when the user chose a
/// non-default configuration. Reinstalling replaces a loaded agent.
///
/// # Errors
///
/// Returns an error if the binary cannot be located, a file cannot be
/// written, or launchctl rejects the agent.
pub fn install(config: &DaemonConfig, config_file: Option<&Path>) -> Result<()> {
    let binary_path = resolve_binary_path()?;

    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir).map_err(LaunchAgentError::DirectoryCreation)?;

    let mut agent = AdhanLaunchAgent::new(binary_path, &log_dir).with_env("RUST_LOG", "info");
    if let Some(path) = config_file {
        agent = agent.with_config_file(path);
    }
    let plist_xml = agent.to_xml()?;

    let plist_path = plist_path()?;
    if let Some(parent) = plist_path.parent() {
        fs::create_dir_all(parent).map_err(LaunchAgentError::DirectoryCreation)?;
    }
    fs::write(&plist_path, plist_xml).map_err(LaunchAgentError::PlistWrite)?;

    let mut perms = fs::metadata(&plist_path)
        .map_err(LaunchAgentError::PermissionSet)?
        .permissions();
    perms.set_mode(0o644);
    fs::set_permissions(&plist_path, perms).map_err(LaunchAgentError::PermissionSet)?;

    // A previous install may still be loaded.
    let _ = launchctl::unload(&plist_path);
    launchctl::load(&plist_path)?;

    tracing::info!("LaunchAgent installed at {:?}", plist_path);
    Ok(())
}

/// Unloads and removes the LaunchAgent. Succeeds when nothing is installed.
///
/// # Errors
///
/// Returns an error if the plist cannot be removed.
pub fn uninstall() -> Result<()> {
    let plist_path = plist_path()?;
    if !plist_path.exists() {
        tracing::info!("LaunchAgent plist does not exist, nothing to uninstall");
        return Ok(());
    }

    let _ = launchctl::unload(&plist_path);
    fs::remove_file(&plist_path).map_err(LaunchAgentError::PlistRemove)?;

    tracing::info!("LaunchAgent uninstalled");
    Ok(())
}

/// Resolves the absolute path of the running adhan executable.
fn resolve_binary_path() -> Result<String> {
    let path = std::env::current_exe()
        .and_then(|path| path.canonicalize())
        .map_err(|e| LaunchAgentError::BinaryPathResolution(e.to_string()))?;
    Ok(path.to_string_lossy().into_owned())
}
