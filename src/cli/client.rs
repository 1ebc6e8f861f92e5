//! IPC Client for communicating with the Adhan daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::config::DaemonConfig;
use crate::types::{IpcRequest, IpcResponse};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: u64 = 65536;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
#[derive(Debug, Clone)]
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a client for the socket named by the daemon configuration.
    #[must_use]
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::with_socket_path(config.socket_path.clone())
    }

    /// Creates a new IPC client with a custom socket path.
    #[must_use]
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends a request and returns the daemon's successful response.
    ///
    /// Transport failures are retried; an error answer from the daemon is
    /// returned at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is unreachable or rejects the request.
    pub async fn send(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let response = self.send_request_with_retry(request).await?;
        if response.is_error() {
            anyhow::bail!("{}", response.message);
        }
        Ok(response)
    }

    /// Sends a status query to the daemon.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is unreachable.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send(&IpcRequest::Status).await
    }

    /// Sends a request to the daemon with retry logic.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut attempt = 1;
        loop {
            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!("Request failed (attempt {}/{}): {}", attempt, MAX_RETRIES, e);
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a single request to the daemon.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timed out")?
            .with_context(|| {
                format!(
                    "Cannot reach the daemon at {:?}. Start it with 'adhan daemon'",
                    self.socket_path
                )
            })?;

        let request_json = serde_json::to_vec(request).context("Failed to serialize request")?;

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(&request_json),
        )
        .await
        .context("Write timed out")?
        .context("Failed to send request")?;

        // Shutdown write side to signal end of request
        stream
            .shutdown()
            .await
            .context("Failed to finish request")?;

        let mut buffer = Vec::new();
        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            (&mut stream).take(MAX_RESPONSE_SIZE).read_to_end(&mut buffer),
        )
        .await
        .context("Read timed out")?
        .context("Failed to receive response")?;

        if buffer.is_empty() {
            anyhow::bail!("The daemon closed the connection without answering");
        }

        serde_json::from_slice(&buffer).context("Failed to parse response")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseData;
    use std::sync::Arc;
    use tokio::net::UnixListener;
    use tokio::sync::Mutex;

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    fn create_temp_socket_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        // Keep the directory so it's not deleted
        std::mem::forget(dir);
        path
    }

    fn create_mock_server(socket_path: &Path) -> UnixListener {
        let _ = std::fs::remove_file(socket_path);
        if let Some(parent) = socket_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        UnixListener::bind(socket_path).unwrap()
    }

    async fn read_request(stream: &mut UnixStream) -> IpcRequest {
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await.unwrap();
        serde_json::from_slice(&buffer).unwrap()
    }

    async fn write_response(stream: &mut UnixStream, response: &IpcResponse) {
        let json = serde_json::to_vec(response).unwrap();
        stream.write_all(&json).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    // ------------------------------------------------------------------------
    // IpcClient Tests
    // ------------------------------------------------------------------------

    mod client_tests {
        use super::*;

        #[test]
        fn test_with_socket_path() {
            let path = PathBuf::from("/tmp/test.sock");
            let client = IpcClient::with_socket_path(path.clone());
            assert_eq!(client.socket_path(), path);
        }

        #[test]
        fn test_from_config() {
            let config = DaemonConfig::with_data_dir("/tmp/adhan-client");
            let client = IpcClient::from_config(&config);
            assert_eq!(client.socket_path(), config.socket_path);
        }

        #[tokio::test]
        async fn test_connection_failure() {
            let socket_path = PathBuf::from("/tmp/nonexistent_adhan_socket_12345.sock");
            let client = IpcClient::with_socket_path(socket_path);

            let err = client.status().await.unwrap_err();
            assert!(format!("{:#}", err).contains("adhan daemon"));
        }

        #[tokio::test]
        async fn test_send_status_request() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);

            let server_handle = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                assert_eq!(request, IpcRequest::Status);

                let response = IpcResponse::success(
                    "",
                    Some(ResponseData {
                        alarms: Some(Vec::new()),
                        reschedule_pending: Some(false),
                        ..Default::default()
                    }),
                );
                write_response(&mut stream, &response).await;
            });

            let client = IpcClient::with_socket_path(socket_path);
            let response = client.status().await.unwrap();

            assert_eq!(response.status, "success");
            let data = response.data.unwrap();
            assert_eq!(data.reschedule_pending, Some(false));

            server_handle.await.unwrap();
        }

        #[tokio::test]
        async fn test_send_schedule_request() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);

            let received = Arc::new(Mutex::new(None));
            let received_clone = received.clone();

            let server_handle = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                *received_clone.lock().await = Some(read_request(&mut stream).await);
                write_response(&mut stream, &IpcResponse::success("Fajr scheduled", None)).await;
            });

            let client = IpcClient::with_socket_path(socket_path);
            let request = IpcRequest::Schedule {
                slot: "fajr".to_string(),
                time: "05:12".to_string(),
                request_code: None,
            };
            let response = client.send(&request).await.unwrap();

            assert_eq!(response.message, "Fajr scheduled");
            server_handle.await.unwrap();
            assert_eq!(received.lock().await.clone(), Some(request));
        }

        #[tokio::test]
        async fn test_error_response_is_not_retried() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);
            let connections = Arc::new(Mutex::new(0u32));
            let counter = connections.clone();

            let server_handle = tokio::spawn(async move {
                loop {
                    let Ok((mut stream, _)) = listener.accept().await else {
                        break;
                    };
                    *counter.lock().await += 1;
                    let _ = read_request(&mut stream).await;
                    write_response(
                        &mut stream,
                        &IpcResponse::error("Sound file not found: nope"),
                    )
                    .await;
                }
            });

            let client = IpcClient::with_socket_path(socket_path);
            let result = client
                .send(&IpcRequest::Preview {
                    sound: "nope".to_string(),
                })
                .await;

            let error_msg = result.unwrap_err().to_string();
            assert_eq!(error_msg, "Sound file not found: nope");
            assert_eq!(*connections.lock().await, 1);

            server_handle.abort();
        }

        #[tokio::test]
        async fn test_empty_response_is_error() {
            let socket_path = create_temp_socket_path();
            let listener = create_mock_server(&socket_path);

            let server_handle = tokio::spawn(async move {
                for _ in 0..MAX_RETRIES {
                    if let Ok((mut stream, _)) = listener.accept().await {
                        let _ = read_request(&mut stream).await;
                        drop(stream);
                    }
                }
            });

            let client = IpcClient::with_socket_path(socket_path);
            assert!(client.send(&IpcRequest::Dismiss).await.is_err());

            server_handle.abort();
        }
    }
}
