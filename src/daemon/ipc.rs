//! IPC server for the Adhan daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for alarm commands
//! - Integration with the Dispatcher for command execution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::sound::label_for;
use crate::types::{request_code_for, IpcRequest, IpcResponse, ResponseData, Slot};

use super::dispatcher::Dispatcher;
use super::scheduler::parse_time;
use super::signal::Signal;

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Socket binding error
    #[error("Failed to bind socket: {0}")]
    BindError(String),

    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

impl IpcError {
    /// Returns true if the client misbehaved rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Timeout | Self::RequestTooLarge)
    }
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .map_err(|e| IpcError::BindError(e.to_string()))
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until the client shuts down its write side, up to
    /// `MAX_REQUEST_SIZE` bytes, under a read timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let mut buffer = Vec::with_capacity(1024);
        let mut limited = (&mut *stream).take(MAX_REQUEST_SIZE as u64 + 1);

        let read_result = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            limited.read_to_end(&mut buffer),
        )
        .await;

        match read_result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        }

        if buffer.is_empty() {
            anyhow::bail!("Connection closed by client");
        }
        if buffer.len() > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge.into());
        }

        let request: IpcRequest =
            serde_json::from_slice(&buffer).context("Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;
        stream
            .shutdown()
            .await
            .context("Failed to close response stream")?;

        Ok(())
    }

    /// Serves connections one at a time until the task is cancelled.
    pub async fn serve(&self, handler: &RequestHandler) {
        loop {
            let mut stream = match self.accept().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("{:#}", e);
                    continue;
                }
            };

            let response = match Self::receive_request(&mut stream).await {
                Ok(request) => handler.handle(request),
                Err(e) if is_client_fault(&e) => {
                    debug!("Rejected request: {:#}", e);
                    IpcResponse::error(format!("Invalid request: {}", e))
                }
                Err(e) => {
                    warn!("Failed to read request: {:#}", e);
                    IpcResponse::error(format!("Failed to read request: {}", e))
                }
            };

            if let Err(e) = Self::send_response(&mut stream, &response).await {
                debug!("Client went away: {:#}", e);
            }
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

/// Whether a failed receive is the client's doing. Anything that is not a
/// server-side [`IpcError`] (malformed JSON, an empty request) counts.
fn is_client_fault(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<IpcError>()
        .map_or(true, IpcError::is_client_error)
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the [`Dispatcher`].
pub struct RequestHandler {
    dispatcher: Arc<Dispatcher>,
}

impl RequestHandler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Handles an IPC request and returns the appropriate response.
    ///
    /// Must run inside a tokio runtime.
    pub fn handle(&self, request: IpcRequest) -> IpcResponse {
        debug!("IPC request: {:?}", request);
        match request {
            IpcRequest::Schedule {
                slot,
                time,
                request_code,
            } => self.handle_schedule(&slot, &time, request_code),
            IpcRequest::Cancel { slot, request_code } => self.handle_cancel(&slot, request_code),
            IpcRequest::Trigger { slot } => self.handle_trigger(&slot),
            IpcRequest::Dismiss => self.handle_dismiss(),
            IpcRequest::UpdateSound => self.handle_update_sound(),
            IpcRequest::CanScheduleExact => {
                let exact = self.dispatcher.can_schedule_exact();
                IpcResponse::success(
                    if exact {
                        "Exact alarms are permitted"
                    } else {
                        "Exact alarms are not permitted; alarms fire best-effort"
                    },
                    Some(ResponseData {
                        can_schedule_exact: Some(exact),
                        ..Default::default()
                    }),
                )
            }
            IpcRequest::PowerStatus => {
                let disabled = self.dispatcher.is_power_optimization_disabled();
                IpcResponse::success(
                    if disabled {
                        "Power optimization is disabled"
                    } else {
                        "Power optimization is enabled; alarms may be delayed"
                    },
                    Some(ResponseData {
                        power_optimization_disabled: Some(disabled),
                        ..Default::default()
                    }),
                )
            }
            IpcRequest::Preview { sound } => self.handle_preview(&sound),
            IpcRequest::StopPreview => {
                if self.dispatcher.previewer().stop() {
                    IpcResponse::success("Preview stopped", None)
                } else {
                    IpcResponse::success("No preview playing", None)
                }
            }
            IpcRequest::Sounds => IpcResponse::success(
                "",
                Some(ResponseData {
                    sounds: Some(self.dispatcher.library().catalog()),
                    ..Default::default()
                }),
            ),
            IpcRequest::Status => self.handle_status(),
            IpcRequest::AckReschedule => {
                let consumed = self.dispatcher.boot().consume();
                IpcResponse::success(
                    if consumed {
                        "Reschedule acknowledged"
                    } else {
                        "No reschedule pending"
                    },
                    Some(ResponseData {
                        reschedule_pending: Some(false),
                        ..Default::default()
                    }),
                )
            }
            IpcRequest::BootCompleted => {
                self.dispatcher.handle(Signal::BootCompleted);
                IpcResponse::success(
                    "Boot recorded; every alarm must be scheduled again",
                    Some(ResponseData {
                        reschedule_pending: Some(self.dispatcher.boot().is_pending()),
                        ..Default::default()
                    }),
                )
            }
        }
    }

    fn handle_schedule(&self, slot: &str, time: &str, request_code: Option<u32>) -> IpcResponse {
        let slot = Slot::parse_or_default(slot);
        let time = match parse_time(time) {
            Ok(time) => time,
            Err(e) => return IpcResponse::error(e.to_string()),
        };
        let request_code = request_code.unwrap_or(slot.request_code());

        let alarm = self.dispatcher.scheduler().schedule(slot, time, request_code);
        IpcResponse::success(
            format!(
                "{} scheduled for {} ({})",
                slot,
                alarm.target.format("%Y-%m-%d %H:%M"),
                alarm.precision.as_str()
            ),
            Some(ResponseData {
                alarm: Some(alarm),
                ..Default::default()
            }),
        )
    }

    fn handle_cancel(&self, slot: &str, request_code: Option<u32>) -> IpcResponse {
        let request_code = request_code.unwrap_or_else(|| request_code_for(slot));
        let message = if self.dispatcher.scheduler().cancel(request_code) {
            format!("Cancelled alarm {}", request_code)
        } else {
            format!("No alarm scheduled under {}", request_code)
        };
        IpcResponse::success(message, None)
    }

    fn handle_trigger(&self, slot: &str) -> IpcResponse {
        let slot = Slot::parse_or_default(slot);
        match self.dispatcher.trigger_immediately(slot) {
            Ok(()) => IpcResponse::success(
                format!("{} Adhan playing", slot),
                Some(ResponseData {
                    session: Some(self.dispatcher.delivery().snapshot()),
                    ..Default::default()
                }),
            ),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    fn handle_dismiss(&self) -> IpcResponse {
        let was_active = self.dispatcher.delivery().state().is_active();
        self.dispatcher.handle(Signal::DismissRequested);
        IpcResponse::success(
            if was_active {
                "Adhan dismissed"
            } else {
                "Nothing playing"
            },
            Some(ResponseData {
                session: Some(self.dispatcher.delivery().snapshot()),
                ..Default::default()
            }),
        )
    }

    fn handle_update_sound(&self) -> IpcResponse {
        let sound = self.dispatcher.update_sound();
        let label = label_for(&sound).unwrap_or(&sound);
        IpcResponse::success(format!("Notification sound set to {}", label), None)
    }

    fn handle_preview(&self, sound: &str) -> IpcResponse {
        match self.dispatcher.previewer().play(sound) {
            Ok(source) => {
                let label = label_for(source.name()).unwrap_or(source.name());
                IpcResponse::success(format!("Previewing {}", label), None)
            }
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    fn handle_status(&self) -> IpcResponse {
        IpcResponse::success(
            "",
            Some(ResponseData {
                alarms: Some(self.dispatcher.scheduler().pending()),
                session: Some(self.dispatcher.delivery().snapshot()),
                can_schedule_exact: Some(self.dispatcher.can_schedule_exact()),
                reschedule_pending: Some(self.dispatcher.boot().is_pending()),
                reschedule_raised_at: self.dispatcher.boot().raised_at(),
                ..Default::default()
            }),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
