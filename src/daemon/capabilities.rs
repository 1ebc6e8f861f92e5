//! Platform capability queries.
//!
//! Answers whether precise timers are permitted and whether the system's
//! power management leaves the daemon alone. Neither answer ever fails a
//! call; unknown states are reported as the permissive value.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

/// Capability queries consulted when arming alarms.
pub trait Capabilities: Send + Sync {
    /// Whether precise wake timers are permitted.
    fn can_schedule_exact(&self) -> bool;

    /// Whether power optimization is disabled for the daemon.
    fn is_power_optimization_disabled(&self) -> bool;
}

/// Capabilities backed by the daemon configuration and the host system.
#[derive(Debug)]
pub struct SystemCapabilities {
    exact_allowed: AtomicBool,
}

impl SystemCapabilities {
    #[must_use]
    pub fn new(exact_allowed: bool) -> Self {
        Self {
            exact_allowed: AtomicBool::new(exact_allowed),
        }
    }

    /// Grants or revokes the precise-timer permission at runtime.
    pub fn set_exact_allowed(&self, allowed: bool) {
        self.exact_allowed.store(allowed, Ordering::SeqCst);
    }
}

impl Capabilities for SystemCapabilities {
    fn can_schedule_exact(&self) -> bool {
        self.exact_allowed.load(Ordering::SeqCst)
    }

    fn is_power_optimization_disabled(&self) -> bool {
        if !cfg!(target_os = "macos") {
            return true;
        }

        match Command::new("pmset").arg("-g").output() {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let disabled = system_sleep_disabled(&stdout);
                debug!("pmset reports system sleep disabled: {}", disabled);
                disabled
            }
            Ok(output) => {
                warn!("pmset exited with {}", output.status);
                true
            }
            Err(e) => {
                warn!("Failed to run pmset: {}", e);
                true
            }
        }
    }
}

/// Parses `pmset -g` output; system sleep of 0 minutes means disabled.
#[must_use]
pub fn system_sleep_disabled(pmset_output: &str) -> bool {
    pmset_output.lines().any(|line| {
        let mut fields = line.split_whitespace();
        fields.next() == Some("sleep") && fields.next().and_then(|v| v.parse::<u32>().ok()) == Some(0)
    })
}

/// Capabilities with fixed answers for testing.
#[derive(Debug)]
pub struct MockCapabilities {
    exact: AtomicBool,
    power_optimization_disabled: AtomicBool,
}

impl MockCapabilities {
    #[must_use]
    pub fn new(exact: bool, power_optimization_disabled: bool) -> Self {
        Self {
            exact: AtomicBool::new(exact),
            power_optimization_disabled: AtomicBool::new(power_optimization_disabled),
        }
    }

    pub fn set_exact(&self, exact: bool) {
        self.exact.store(exact, Ordering::SeqCst);
    }
}

impl Default for MockCapabilities {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl Capabilities for MockCapabilities {
    fn can_schedule_exact(&self) -> bool {
        self.exact.load(Ordering::SeqCst)
    }

    fn is_power_optimization_disabled(&self) -> bool {
        self.power_optimization_disabled.load(Ordering::SeqCst)
    }
}
