//! Per-connection reader/writer tasks (§4.10, T4). The reader owns the
//! socket's read half plus the heartbeat timer and dispatches incoming
//! messages by type; the writer owns the write half and drains a bounded
//! mpsc channel fed by the reader (heartbeats, the initial config frame)
//! and by the server's broadcast fan-out (detection events).

use crate::nfc::NfcCorrelator;
use rf_sentinel_common::error::SubscriberError;
use rf_sentinel_common::wire::{ClientMessage, ServerInfo, ServerMessage};
use rf_sentinel_common::{Clock, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cap on how long a connection's writer is given to flush its queue
/// after the reader side has gone away, before it is abandoned (§4.11).
const FINAL_FLUSH_CAP: Duration = Duration::from_secs(5);
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type ConnectionId = u64;
pub type Registry = Mutex<HashMap<ConnectionId, mpsc::Sender<ServerMessage>>>;

pub struct ConnectionParams {
    pub id: ConnectionId,
    pub center_frequency_hz: u64,
    pub sample_rate_hz: u32,
    pub queue_capacity: usize,
    pub heartbeat_interval_s: f64,
    pub heartbeat_timeout_s: f64,
}

async fn writer_loop(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut rx: mpsc::Receiver<ServerMessage>,
    id: ConnectionId,
) -> Result<(), SubscriberError> {
    while let Some(message) = rx.recv().await {
        let mut json = match serde_json::to_string(&message) {
            Ok(s) => s,
            Err(e) => {
                warn!(connection = id, error = %e, "failed to serialize outgoing message");
                continue;
            }
        };
        json.push('\n');
        write_half
            .write_all(json.as_bytes())
            .await
            .map_err(SubscriberError::Write)?;
    }
    Ok(())
}

async fn reader_loop(
    read_half: tokio::net::tcp::OwnedReadHalf,
    params: &ConnectionParams,
    tx: mpsc::Sender<ServerMessage>,
    nfc: &NfcCorrelator,
    clock: &dyn Clock,
    cancel: &CancellationToken,
) -> Result<(), SubscriberError> {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    // Checked at a finer cadence than `heartbeat_interval_s` itself, so the
    // `heartbeat_timeout_s` deadline (§4.10) is observed shortly after it's
    // crossed rather than only at the next scheduled heartbeat send.
    const CHECK_INTERVAL_S: f64 = 1.0;
    let mut check_interval = tokio::time::interval(Duration::from_secs_f64(CHECK_INTERVAL_S));
    check_interval.tick().await; // first tick fires immediately; skip it
    let mut last_heartbeat_rx: Timestamp = clock.now();
    let mut last_heartbeat_tx: Timestamp = clock.now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = check_interval.tick() => {
                let now = clock.now();
                if last_heartbeat_tx.elapsed_since(&now) >= params.heartbeat_interval_s {
                    if tx.send(ServerMessage::Heartbeat).await.is_err() {
                        return Ok(());
                    }
                    last_heartbeat_tx = now;
                }
                if last_heartbeat_rx.elapsed_since(&now) > params.heartbeat_timeout_s {
                    return Err(SubscriberError::HeartbeatTimeout);
                }
            }
            result = reader.read_line(&mut line) => {
                match result {
                    Ok(0) => {
                        debug!(connection = params.id, "connection closed by peer");
                        return Ok(());
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if !trimmed.is_empty() {
                            dispatch(trimmed, params.id, &tx, nfc, clock, &mut last_heartbeat_rx).await;
                        }
                        line.clear();
                    }
                    Err(e) => return Err(SubscriberError::Read(e)),
                }
            }
        }
    }
}

async fn dispatch(
    raw: &str,
    id: ConnectionId,
    tx: &mpsc::Sender<ServerMessage>,
    nfc: &NfcCorrelator,
    clock: &dyn Clock,
    last_heartbeat_rx: &mut Timestamp,
) {
    match serde_json::from_str::<ClientMessage>(raw) {
        Ok(ClientMessage::Heartbeat) => {
            *last_heartbeat_rx = clock.now();
            let _ = tx.send(ServerMessage::Heartbeat).await;
        }
        Ok(ClientMessage::Status { fields }) => {
            debug!(connection = id, status = %fields, "subscriber status");
        }
        Ok(ClientMessage::NfcDetection { tag_id, .. }) => {
            nfc.record(tag_id, clock.now());
        }
        Ok(ClientMessage::Error { fields }) => {
            warn!(connection = id, error = %fields, "subscriber reported error");
        }
        Ok(ClientMessage::Unknown) => {
            debug!(connection = id, "unknown message type, ignored");
        }
        Err(e) => {
            let err = SubscriberError::MalformedJson(e);
            warn!(connection = id, error = %err, "malformed json from subscriber");
        }
    }
}

/// Drives one accepted connection end to end: sends the config frame,
/// runs the reader/writer tasks, and removes the connection from
/// `registry` on exit regardless of how it ended.
pub async fn handle_connection(
    stream: TcpStream,
    params: ConnectionParams,
    registry: Arc<Registry>,
    nfc: Arc<NfcCorrelator>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    active_connections: Arc<AtomicUsize>,
) {
    let id = params.id;
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel(params.queue_capacity);

    {
        let mut guard = registry.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(id, tx.clone());
    }
    active_connections.fetch_add(1, Ordering::Relaxed);

    let config_message = ServerMessage::Config {
        rtl_frequency: params.center_frequency_hz,
        sample_rate: params.sample_rate_hz,
        server_info: ServerInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: vec!["rf_monitoring".to_string(), "nfc_detection".to_string()],
        },
    };
    if tx.send(config_message).await.is_ok() {
        let writer_handle = tokio::spawn(writer_loop(write_half, rx, id));
        if let Err(e) = reader_loop(read_half, &params, tx.clone(), &nfc, clock.as_ref(), &cancel).await {
            warn!(connection = id, error = %e, "reader closed with error");
        }
        drop(tx);
        match tokio::time::timeout(FINAL_FLUSH_CAP, writer_handle).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(connection = id, error = %e, "writer closed with error"),
            Ok(Err(_)) => warn!(connection = id, "writer task panicked"),
            Err(_) => warn!(connection = id, "writer did not flush within the shutdown cap, abandoning"),
        }
    }

    {
        let mut guard = registry.lock().unwrap_or_else(|e| e.into_inner());
        guard.remove(&id);
    }
    active_connections.fetch_sub(1, Ordering::Relaxed);
    info!(connection = id, "subscriber disconnected");
}
