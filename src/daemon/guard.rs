//! Execution guard held while a dispatcher activation runs.
//!
//! The guard is an RAII wrapper over a [`WakeLock`]. It is released when
//! dropped or, if an activation overruns, by a timeout task. Whichever
//! happens first wins; the lock is released exactly once.

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Default cap on a guarded activation.
pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(60);

/// A platform facility that keeps the host awake.
pub trait WakeLock: Send + Sync {
    fn acquire(&self, tag: &str);
    fn release(&self, tag: &str);
}

// ============================================================================
// ExecutionGuard
// ============================================================================

/// Holds a wake lock for the lifetime of a dispatcher activation.
///
/// Must be acquired from within a tokio runtime.
pub struct ExecutionGuard {
    lock: Arc<dyn WakeLock>,
    tag: String,
    released: Arc<AtomicBool>,
    timeout_task: JoinHandle<()>,
}

impl ExecutionGuard {
    /// Acquires `lock` and schedules its forced release after `timeout`.
    pub fn acquire(lock: Arc<dyn WakeLock>, tag: impl Into<String>, timeout: Duration) -> Self {
        let tag = tag.into();
        lock.acquire(&tag);
        debug!("Execution guard '{}' acquired ({:?})", tag, timeout);

        let released = Arc::new(AtomicBool::new(false));
        let timeout_task = {
            let lock = Arc::clone(&lock);
            let released = Arc::clone(&released);
            let tag = tag.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if !released.swap(true, Ordering::SeqCst) {
                    warn!("Execution guard '{}' timed out, releasing", tag);
                    lock.release(&tag);
                }
            })
        };

        Self {
            lock,
            tag,
            released,
            timeout_task,
        }
    }

    /// Returns true once the lock has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Releases the lock now. Later releases are no-ops.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.lock.release(&self.tag);
            debug!("Execution guard '{}' released", self.tag);
        }
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.timeout_task.abort();
        self.release();
    }
}

// ============================================================================
// SystemWakeLock
// ============================================================================

/// Keeps macOS from idle-sleeping by running `caffeinate -i` while held.
///
/// Elsewhere acquiring and releasing only log.
#[derive(Debug, Default)]
pub struct SystemWakeLock {
    child: Mutex<Option<Child>>,
}

impl SystemWakeLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WakeLock for SystemWakeLock {
    fn acquire(&self, tag: &str) {
        if !cfg!(target_os = "macos") {
            debug!("Wake lock '{}' acquired (no-op)", tag);
            return;
        }

        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if child.is_some() {
            return;
        }
        match Command::new("caffeinate")
            .arg("-i")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(process) => *child = Some(process),
            Err(e) => warn!("Failed to start caffeinate for '{}': {}", tag, e),
        }
    }

    fn release(&self, tag: &str) {
        let taken = self
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut process) = taken {
            if let Err(e) = process.kill() {
                warn!("Failed to stop caffeinate for '{}': {}", tag, e);
            }
            let _ = process.wait();
        } else {
            debug!("Wake lock '{}' released (no-op)", tag);
        }
    }
}

impl Drop for SystemWakeLock {
    fn drop(&mut self) {
        self.release("shutdown");
    }
}

// ============================================================================
// RecordingWakeLock
// ============================================================================

/// Wake lock that counts acquisitions and releases for testing.
#[derive(Debug, Default)]
pub struct RecordingWakeLock {
    events: Mutex<Vec<(String, bool)>>,
}

impl RecordingWakeLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of acquisitions so far.
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.count(true)
    }

    /// Number of releases so far.
    #[must_use]
    pub fn released(&self) -> usize {
        self.count(false)
    }

    /// Returns true if every acquisition has been released.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.acquired() == self.released()
    }

    fn count(&self, acquire: bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, a)| *a == acquire)
            .count()
    }
}

impl WakeLock for RecordingWakeLock {
    fn acquire(&self, tag: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((tag.to_string(), true));
    }

    fn release(&self, tag: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((tag.to_string(), false));
    }
}
