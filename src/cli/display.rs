//! Display utilities for the Adhan CLI.
//!
//! This module provides formatted output for:
//! - Success messages
//! - Error messages
//! - Status display
//! - Sound catalog listing

use chrono::{DateTime, Local};

use crate::types::{AlarmRequest, IpcResponse, SessionOutcome, SessionSnapshot, SoundInfo};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the daemon's message for a command.
    pub fn show_success(response: &IpcResponse) {
        if !response.message.is_empty() {
            println!("* {}", response.message);
        }
    }

    /// Shows a scheduled alarm.
    pub fn show_scheduled(response: &IpcResponse) {
        Self::show_success(response);
        if let Some(alarm) = response.data.as_ref().and_then(|d| d.alarm.as_ref()) {
            println!("  {}", Self::format_alarm(alarm));
        }
    }

    /// Shows the answer to a yes/no capability query.
    pub fn show_capability(response: &IpcResponse) {
        let value = response.data.as_ref().and_then(|d| {
            d.can_schedule_exact
                .or(d.power_optimization_disabled)
        });
        match value {
            Some(value) => println!("{}", value),
            None => Self::show_success(response),
        }
        if !response.message.is_empty() && value.is_some() {
            println!("  {}", response.message);
        }
    }

    /// Shows the daemon status.
    pub fn show_status(response: &IpcResponse) {
        println!("Adhan status");
        println!("─────────────────────────────");

        let Some(data) = &response.data else {
            println!("The daemon is not running");
            return;
        };

        if let Some(session) = &data.session {
            println!("Playback: {}", Self::format_session(session));
        }

        match data.alarms.as_deref() {
            Some([]) | None => println!("Alarms:   none scheduled"),
            Some(alarms) => {
                println!("Alarms:");
                for alarm in alarms {
                    println!("  {}", Self::format_alarm(alarm));
                }
            }
        }

        if data.can_schedule_exact == Some(false) {
            println!("Note:     exact alarms not permitted, alarms fire best-effort");
        }
        if data.reschedule_pending == Some(true) {
            println!("{}", Self::format_restart_notice(data.reschedule_raised_at.as_ref()));
        }
    }

    /// Shows the sound catalog.
    pub fn show_sounds(response: &IpcResponse) {
        let sounds = response
            .data
            .as_ref()
            .and_then(|d| d.sounds.as_deref())
            .unwrap_or_default();
        if sounds.is_empty() {
            println!("No sounds available");
            return;
        }
        for sound in sounds {
            println!("{}", Self::format_sound(sound));
        }
    }

    /// Shows a success message for LaunchAgent installation.
    pub fn show_install_success() {
        println!("* LaunchAgent installed");
        println!("  The daemon will start automatically at login");
    }

    /// Shows a success message for LaunchAgent uninstallation.
    pub fn show_uninstall_success() {
        println!("* LaunchAgent uninstalled");
        println!("  The daemon will no longer start at login");
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("Error: {}", message);
    }

    fn format_alarm(alarm: &AlarmRequest) -> String {
        format!(
            "{:<8} {}  {:<11} #{}",
            alarm.slot.display_name(),
            alarm.target.format("%Y-%m-%d %H:%M"),
            alarm.precision.as_str(),
            alarm.request_code
        )
    }

    fn format_session(session: &SessionSnapshot) -> String {
        let mut line = session.state.as_str().to_string();
        if let Some(slot) = session.slot {
            line.push_str(&format!(" ({}", slot));
            if let Some(sound) = &session.sound {
                line.push_str(&format!(", {}", sound));
            }
            line.push(')');
        }
        match &session.last_outcome {
            Some(SessionOutcome::Completed { error: Some(e) }) => {
                line.push_str(&format!(", last failed: {}", e));
            }
            Some(outcome) if session.slot.is_none() => {
                line.push_str(&format!(", last {}", outcome.state().as_str()));
            }
            _ => {}
        }
        line
    }

    fn format_restart_notice(raised_at: Option<&DateTime<Local>>) -> String {
        let detected = match raised_at {
            Some(at) => format!("Restart detected at {}", at.format("%Y-%m-%d %H:%M")),
            None => "Restart detected".to_string(),
        };
        format!(
            "{}: schedule every prayer again, then run 'adhan ack-reschedule'",
            detected
        )
    }

    fn format_sound(sound: &SoundInfo) -> String {
        let mark = if sound.installed { "✓" } else { "✗" };
        format!("{} {:<28} {}", mark, sound.name, sound.label)
    }
}

// ============================================================================
// Tests
// ============================================================================
