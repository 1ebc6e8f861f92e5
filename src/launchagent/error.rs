//! Error types for LaunchAgent management.

use std::io;
use thiserror::Error;

/// LaunchAgent management error type.
#[derive(Debug, Error)]
pub enum LaunchAgentError {
    /// The adhan executable could not be located.
    #[error("Failed to resolve adhan binary path: {0}")]
    BinaryPathResolution(String),

    /// Home directory not found.
    #[error("Failed to get home directory")]
    HomeDirectoryNotFound,

    /// Failed to create directory.
    #[error("Failed to create directory: {0}")]
    DirectoryCreation(#[source] io::Error),

    /// Failed to write plist file.
    #[error("Failed to write plist file: {0}")]
    PlistWrite(#[source] io::Error),

    /// Failed to remove plist file.
    #[error("Failed to remove plist file: {0}")]
    PlistRemove(#[source] io::Error),

    /// Failed to serialize plist.
    #[error("Failed to serialize plist: {0}")]
    PlistSerialize(#[source] plist::Error),

    /// Failed to convert plist to UTF-8 string.
    #[error("Failed to convert plist to UTF-8: {0}")]
    PlistUtf8(#[source] std::string::FromUtf8Error),

    /// Failed to set file permissions.
    #[error("Failed to set file permissions: {0}")]
    PermissionSet(#[source] io::Error),

    /// launchctl could not be started.
    #[error("Failed to execute launchctl: {0}")]
    LaunchctlExecution(String),

    /// launchctl refused to load the agent.
    #[error("Failed to load LaunchAgent: {0}")]
    ServiceLoad(String),

    /// launchctl refused to unload the agent.
    #[error("Failed to unload LaunchAgent: {0}")]
    ServiceUnload(String),
}

impl LaunchAgentError {
    /// Returns a hint for the user, when one applies.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::BinaryPathResolution(_) => {
                Some("Install adhan somewhere on PATH and run the command again")
            }
            Self::ServiceLoad(_) => Some("Run 'adhan uninstall' and then 'adhan install'"),
            Self::LaunchctlExecution(_) => Some("LaunchAgents are only available on macOS"),
            _ => None,
        }
    }
}

/// Result type for LaunchAgent operations.
pub type Result<T> = std::result::Result<T, LaunchAgentError>;
