//! Integration tests for daemon-CLI IPC communication.
//!
//! These tests run the real socket server and client against a daemon
//! built from test doubles:
//! - Scheduling and cancelling alarms
//! - Trigger, dismiss and preview
//! - Reschedule flag round trip
//! - Error handling for bad input and unreachable daemons

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;

use adhan::cli::IpcClient;
use adhan::daemon::{IpcServer, RequestHandler};
use adhan::sound::DEFAULT_SOUND;
use adhan::types::{DeliveryState, IpcRequest, IpcResponse, Slot};

use common::{create_temp_socket_path, TestDaemon};

// ============================================================================
// Test Helpers
// ============================================================================

struct Harness {
    daemon: TestDaemon,
    client: IpcClient,
    socket_path: PathBuf,
    server: JoinHandle<()>,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Starts the IPC server for a fresh test daemon.
fn start_server() -> Harness {
    let daemon = TestDaemon::new();
    let socket_path = create_temp_socket_path();
    let server = IpcServer::new(&socket_path).unwrap();
    let handler = RequestHandler::new(Arc::clone(&daemon.dispatcher));
    let server = tokio::spawn(async move { server.serve(&handler).await });

    Harness {
        daemon,
        client: IpcClient::with_socket_path(socket_path.clone()),
        socket_path,
        server,
    }
}

fn schedule(slot: &str, time: &str) -> IpcRequest {
    IpcRequest::Schedule {
        slot: slot.to_string(),
        time: time.to_string(),
        request_code: None,
    }
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test]
async fn test_schedule_via_ipc() {
    let h = start_server();

    let response = h.client.send(&schedule("Fajr", "05:12")).await.unwrap();

    let alarm = response.data.unwrap().alarm.unwrap();
    assert_eq!(alarm.slot, Slot::Fajr);
    assert_eq!(alarm.request_code, 100);
    assert!(response.message.starts_with("Fajr scheduled for"));
    assert_eq!(h.daemon.dispatcher.scheduler().pending(), vec![alarm]);
}

#[tokio::test]
async fn test_status_lists_alarms_and_session() {
    let h = start_server();
    h.client.send(&schedule("asr", "15:40")).await.unwrap();
    h.client.send(&schedule("isha", "20:05")).await.unwrap();

    let data = h.client.status().await.unwrap().data.unwrap();

    let codes: Vec<u32> = data.alarms.unwrap().iter().map(|a| a.request_code).collect();
    assert_eq!(codes.len(), 2);
    assert!(codes.contains(&102));
    assert!(codes.contains(&104));
    assert_eq!(data.session.unwrap().state, DeliveryState::Idle);
    assert_eq!(data.can_schedule_exact, Some(true));
    assert_eq!(data.reschedule_pending, Some(false));
}

#[tokio::test]
async fn test_cancel_via_ipc() {
    let h = start_server();
    h.client.send(&schedule("maghrib", "18:02")).await.unwrap();

    let cancel = IpcRequest::Cancel {
        slot: "Maghrib".to_string(),
        request_code: None,
    };
    let response = h.client.send(&cancel).await.unwrap();
    assert_eq!(response.message, "Cancelled alarm 103");

    let response = h.client.send(&cancel).await.unwrap();
    assert_eq!(response.message, "No alarm scheduled under 103");
}

#[tokio::test]
async fn test_invalid_time_is_rejected() {
    let h = start_server();

    let result = h.client.send(&schedule("fajr", "25:00")).await;

    assert!(result.is_err());
    assert!(h.daemon.dispatcher.scheduler().pending().is_empty());
}

// ============================================================================
// Playback
// ============================================================================

#[tokio::test]
async fn test_trigger_and_dismiss_via_ipc() {
    let h = start_server();

    let trigger = IpcRequest::Trigger {
        slot: "Isha".to_string(),
    };
    let response = h.client.send(&trigger).await.unwrap();
    assert_eq!(response.message, "Isha Adhan playing");
    assert_eq!(h.daemon.output.play_count(), 1);

    let response = h.client.send(&IpcRequest::Dismiss).await.unwrap();
    assert_eq!(response.message, "Adhan dismissed");
    assert_eq!(h.daemon.output.live_tracks(), 0);

    let response = h.client.send(&IpcRequest::Dismiss).await.unwrap();
    assert_eq!(response.message, "Nothing playing");
}

#[tokio::test]
async fn test_trigger_unknown_slot_falls_back_to_fajr() {
    let h = start_server();

    let trigger = IpcRequest::Trigger {
        slot: "sunrise".to_string(),
    };
    let response = h.client.send(&trigger).await.unwrap();

    assert_eq!(response.message, "Fajr Adhan playing");
}

#[tokio::test]
async fn test_preview_round_trip() {
    let h = start_server();

    let preview = IpcRequest::Preview {
        sound: DEFAULT_SOUND.to_string(),
    };
    let response = h.client.send(&preview).await.unwrap();
    assert_eq!(response.message, "Previewing Makkah Adhan");
    assert_eq!(h.daemon.dispatcher.delivery().state(), DeliveryState::Idle);

    let response = h.client.send(&IpcRequest::StopPreview).await.unwrap();
    assert_eq!(response.message, "Preview stopped");
    let response = h.client.send(&IpcRequest::StopPreview).await.unwrap();
    assert_eq!(response.message, "No preview playing");
}

#[tokio::test]
async fn test_preview_missing_sound_is_error() {
    let h = start_server();

    let preview = IpcRequest::Preview {
        sound: "athan_mishary_alafasi".to_string(),
    };
    let err = h.client.send(&preview).await.unwrap_err();

    assert!(err.to_string().contains("Sound file not found"));
}

#[tokio::test]
async fn test_sounds_catalog() {
    let h = start_server();

    let data = h.client.send(&IpcRequest::Sounds).await.unwrap().data.unwrap();
    let sounds = data.sounds.unwrap();

    let makkah = sounds.iter().find(|s| s.name == DEFAULT_SOUND).unwrap();
    assert!(makkah.installed);
    assert!(sounds.iter().any(|s| !s.installed));
}

// ============================================================================
// Capabilities and recovery
// ============================================================================

#[tokio::test]
async fn test_capability_queries() {
    let h = start_server();

    let data = h
        .client
        .send(&IpcRequest::CanScheduleExact)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(data.can_schedule_exact, Some(true));

    let data = h
        .client
        .send(&IpcRequest::PowerStatus)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(data.power_optimization_disabled, Some(true));
}

#[tokio::test]
async fn test_boot_and_acknowledge_via_ipc() {
    let h = start_server();

    let response = h.client.send(&IpcRequest::BootCompleted).await.unwrap();
    assert_eq!(response.data.unwrap().reschedule_pending, Some(true));
    let status = h.client.status().await.unwrap().data.unwrap();
    assert_eq!(status.reschedule_pending, Some(true));

    let response = h.client.send(&IpcRequest::AckReschedule).await.unwrap();
    assert_eq!(response.message, "Reschedule acknowledged");
    let response = h.client.send(&IpcRequest::AckReschedule).await.unwrap();
    assert_eq!(response.message, "No reschedule pending");
}

#[tokio::test]
async fn test_update_sound_via_ipc() {
    let h = start_server();
    h.daemon.prefs.set_sound(Some("athan_mishary_alafasi"));

    let response = h.client.send(&IpcRequest::UpdateSound).await.unwrap();

    assert_eq!(response.message, "Notification sound set to Mishary Al-Afasi");
    assert_eq!(h.daemon.notifications.channels().len(), 1);
}

// ============================================================================
// Error handling
// ============================================================================

#[tokio::test]
async fn test_malformed_request_gets_error_response() {
    let h = start_server();

    let mut stream = UnixStream::connect(&h.socket_path).await.unwrap();
    stream.write_all(b"{\"command\":\"launch\"}").await.unwrap();
    stream.shutdown().await.unwrap();
    let mut buffer = Vec::new();
    stream.read_to_end(&mut buffer).await.unwrap();

    let response: IpcResponse = serde_json::from_slice(&buffer).unwrap();
    assert!(response.is_error());
    assert!(response.message.starts_with("Invalid request"));

    // The server keeps serving afterwards.
    assert!(h.client.status().await.is_ok());
}

#[tokio::test]
async fn test_unreachable_daemon() {
    let client = IpcClient::with_socket_path(create_temp_socket_path());

    let err = client.status().await.unwrap_err();

    assert!(err.to_string().contains("adhan daemon"));
}
