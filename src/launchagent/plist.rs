//! Plist definition for the Adhan LaunchAgent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::error::{LaunchAgentError, Result};

/// LaunchAgent plist running `adhan daemon` at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdhanLaunchAgent {
    #[serde(rename = "Label")]
    pub label: String,

    /// Executable followed by its arguments
    #[serde(rename = "ProgramArguments")]
    pub program_arguments: Vec<String>,

    #[serde(rename = "RunAtLoad")]
    pub run_at_load: bool,

    /// Restart the daemon whenever it exits
    #[serde(rename = "KeepAlive")]
    pub keep_alive: bool,

    #[serde(rename = "StandardOutPath")]
    pub standard_out_path: String,

    #[serde(rename = "StandardErrorPath")]
    pub standard_error_path: String,

    #[serde(
        rename = "EnvironmentVariables",
        skip_serializing_if = "Option::is_none"
    )]
    pub environment_variables: Option<HashMap<String, String>>,
}

impl AdhanLaunchAgent {
    /// launchd label of the daemon.
    pub const LABEL: &'static str = "dev.adhan.daemon";

    /// Creates an agent running `<binary_path> daemon`, logging under `log_dir`.
    pub fn new(binary_path: impl Into<String>, log_dir: &Path) -> Self {
        Self {
            label: Self::LABEL.to_string(),
            program_arguments: vec![binary_path.into(), "daemon".to_string()],
            run_at_load: true,
            keep_alive: true,
            standard_out_path: log_dir.join("stdout.log").to_string_lossy().into_owned(),
            standard_error_path: log_dir.join("stderr.log").to_string_lossy().into_owned(),
            environment_variables: None,
        }
    }

    /// Passes `--config <path>` to the daemon.
    pub fn with_config_file(mut self, path: &Path) -> Self {
        self.program_arguments.push("--config".to_string());
        self.program_arguments
            .push(path.to_string_lossy().into_owned());
        self
    }

    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_variables
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Renders the plist as XML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_xml(&self) -> Result<String> {
        let mut buf = Vec::new();
        plist::to_writer_xml(&mut buf, self).map_err(LaunchAgentError::PlistSerialize)?;
        String::from_utf8(buf).map_err(LaunchAgentError::PlistUtf8)
    }
}
