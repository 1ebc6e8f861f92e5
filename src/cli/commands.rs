//! Command definitions for the Adhan CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::types::{IpcRequest, Slot};

// ============================================================================
// CLI Structure
// ============================================================================

/// Adhan CLI - prayer-time alarm daemon and client
#[derive(Parser, Debug)]
#[command(
    name = "adhan",
    version,
    about = "Prayer-time Adhan alarms from the command line",
    long_about = "Schedules daily Adhan alarms and plays them through a background daemon.\n\
                  Prayer times are supplied by the caller as HH:MM.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the daemon configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Schedule the daily alarm for a prayer
    Schedule(ScheduleArgs),

    /// Cancel the alarm for a prayer
    Cancel(CancelArgs),

    /// Play the Adhan for a prayer now
    Trigger {
        /// Prayer name (fajr, dhuhr, asr, maghrib, isha, test)
        slot: String,
    },

    /// Stop the Adhan and remove its notification
    Dismiss,

    /// Apply the selected sound to the notification channel
    UpdateSound,

    /// Check whether exact alarms are permitted
    CanScheduleExact,

    /// Check whether power optimization is disabled
    PowerStatus,

    /// Preview an Adhan sound
    Preview {
        /// Sound identifier (see `adhan sounds`)
        sound: String,
    },

    /// Stop the sound preview
    StopPreview,

    /// List the Adhan sound catalog
    Sounds,

    /// Show alarms, playback and reschedule state
    Status,

    /// Acknowledge that every alarm has been scheduled again after a restart
    AckReschedule,

    /// Report a system restart to the daemon
    #[command(hide = true)]
    BootCompleted,

    /// Run as daemon (background service)
    #[command(hide = true)]
    Daemon,

    /// Install LaunchAgent for auto-start on login
    Install,

    /// Uninstall LaunchAgent
    Uninstall,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Commands {
    /// Returns the daemon request for commands served over IPC.
    #[must_use]
    pub fn to_request(&self) -> Option<IpcRequest> {
        let request = match self {
            Commands::Schedule(args) => IpcRequest::Schedule {
                slot: args.slot.clone(),
                time: args.time.clone(),
                request_code: args.request_code,
            },
            Commands::Cancel(args) => IpcRequest::Cancel {
                slot: args.slot.clone(),
                request_code: args.request_code,
            },
            Commands::Trigger { slot } => IpcRequest::Trigger { slot: slot.clone() },
            Commands::Dismiss => IpcRequest::Dismiss,
            Commands::UpdateSound => IpcRequest::UpdateSound,
            Commands::CanScheduleExact => IpcRequest::CanScheduleExact,
            Commands::PowerStatus => IpcRequest::PowerStatus,
            Commands::Preview { sound } => IpcRequest::Preview {
                sound: sound.clone(),
            },
            Commands::StopPreview => IpcRequest::StopPreview,
            Commands::Sounds => IpcRequest::Sounds,
            Commands::Status => IpcRequest::Status,
            Commands::AckReschedule => IpcRequest::AckReschedule,
            Commands::BootCompleted => IpcRequest::BootCompleted,
            Commands::Daemon
            | Commands::Install
            | Commands::Uninstall
            | Commands::Completions { .. } => return None,
        };
        Some(request)
    }
}

// ============================================================================
// Command Arguments
// ============================================================================

/// Arguments for the schedule command
#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    /// Prayer name (fajr, dhuhr, asr, maghrib, isha, test)
    #[arg(value_parser = validate_slot)]
    pub slot: String,

    /// Local time of day as HH:MM
    #[arg(value_parser = validate_time)]
    pub time: String,

    /// Override the timer key of the alarm
    #[arg(long)]
    pub request_code: Option<u32>,
}

/// Arguments for the cancel command
#[derive(Args, Debug, Clone)]
pub struct CancelArgs {
    /// Prayer name (fajr, dhuhr, asr, maghrib, isha, test)
    #[arg(value_parser = validate_slot)]
    pub slot: String,

    /// Timer key the alarm was scheduled under
    #[arg(long)]
    pub request_code: Option<u32>,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validates a prayer name.
fn validate_slot(s: &str) -> Result<String, String> {
    s.parse::<Slot>()?;
    Ok(s.to_string())
}

/// Validates an HH:MM time of day.
fn validate_time(s: &str) -> Result<String, String> {
    crate::daemon::parse_time(s).map_err(|e| e.to_string())?;
    Ok(s.trim().to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_no_args() {
            let cli = Cli::parse_from(["adhan"]);
            assert!(cli.command.is_none());
            assert!(!cli.verbose);
            assert!(cli.config.is_none());
        }

        #[test]
        fn test_parse_verbose_flag() {
            let cli = Cli::parse_from(["adhan", "-v", "status"]);
            assert!(cli.verbose);
            assert!(matches!(cli.command, Some(Commands::Status)));
        }

        #[test]
        fn test_parse_config_flag() {
            let cli = Cli::parse_from(["adhan", "--config", "/tmp/adhan.json", "sounds"]);
            assert_eq!(cli.config, Some(PathBuf::from("/tmp/adhan.json")));
        }

        #[test]
        fn test_parse_kebab_case_commands() {
            let cases = [
                ("update-sound", IpcRequest::UpdateSound),
                ("can-schedule-exact", IpcRequest::CanScheduleExact),
                ("power-status", IpcRequest::PowerStatus),
                ("stop-preview", IpcRequest::StopPreview),
                ("ack-reschedule", IpcRequest::AckReschedule),
                ("boot-completed", IpcRequest::BootCompleted),
                ("dismiss", IpcRequest::Dismiss),
            ];
            for (arg, expected) in cases {
                let cli = Cli::parse_from(["adhan", arg]);
                assert_eq!(cli.command.unwrap().to_request(), Some(expected), "{}", arg);
            }
        }

        #[test]
        fn test_local_commands_have_no_request() {
            for arg in ["daemon", "install", "uninstall"] {
                let cli = Cli::parse_from(["adhan", arg]);
                assert!(cli.command.unwrap().to_request().is_none());
            }
        }
    }

    mod schedule_tests {
        use super::*;

        #[test]
        fn test_parse_schedule() {
            let cli = Cli::parse_from(["adhan", "schedule", "Fajr", "05:12"]);
            match cli.command {
                Some(Commands::Schedule(args)) => {
                    assert_eq!(args.slot, "Fajr");
                    assert_eq!(args.time, "05:12");
                    assert_eq!(args.request_code, None);
                }
                _ => panic!("Expected Schedule command"),
            }
        }

        #[test]
        fn test_parse_schedule_with_request_code() {
            let cli = Cli::parse_from(["adhan", "schedule", "isha", "20:05", "--request-code", "7"]);
            let request = cli.command.unwrap().to_request().unwrap();
            assert_eq!(
                request,
                IpcRequest::Schedule {
                    slot: "isha".to_string(),
                    time: "20:05".to_string(),
                    request_code: Some(7),
                }
            );
        }

        #[test]
        fn test_schedule_rejects_bad_time() {
            let result = Cli::try_parse_from(["adhan", "schedule", "fajr", "5am"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_schedule_rejects_unknown_slot() {
            let result = Cli::try_parse_from(["adhan", "schedule", "sunrise", "06:00"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_parse_cancel() {
            let cli = Cli::parse_from(["adhan", "cancel", "Fajr (Test)"]);
            assert_eq!(
                cli.command.unwrap().to_request(),
                Some(IpcRequest::Cancel {
                    slot: "Fajr (Test)".to_string(),
                    request_code: None,
                })
            );
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_validate_time() {
            assert_eq!(validate_time("05:12"), Ok("05:12".to_string()));
            assert!(validate_time("24:00").is_err());
            assert!(validate_time("").is_err());
        }

        #[test]
        fn test_validate_slot() {
            assert!(validate_slot("maghrib").is_ok());
            assert!(validate_slot("MAGHRIB").is_ok());
            assert!(validate_slot("tahajjud").is_err());
        }
    }
}
