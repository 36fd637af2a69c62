//! C10: the subscriber TCP server. One accept loop (T3) spawns a task per
//! connection (T4); [`Publisher::publish`] fans a [`DetectionEvent`] out
//! to every connection's mpsc sender, dropping it for any connection
//! whose queue is full rather than blocking the rest (§5's
//! backpressure-drop rule).
//!
//! [`SubscriberServer::new`] splits the accept-loop [`Worker`] from its
//! [`Publisher`] handle so the orchestrator's pipeline driver can publish
//! events without contending with `run`'s `&mut self` borrow — the two
//! share only `Arc`-wrapped state.

use crate::connection::{handle_connection, ConnectionId, ConnectionParams, Registry};
use crate::nfc::NfcCorrelator;
use async_trait::async_trait;
use rf_sentinel_common::model::DetectionEvent;
use rf_sentinel_common::wire::{to_wire, ServerMessage};
use rf_sentinel_common::worker::Worker;
use rf_sentinel_common::{Clock, SystemClock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SubscriberServerConfig {
    pub port: u16,
    pub center_frequency_hz: u64,
    pub sample_rate_hz: u32,
    pub queue_capacity: usize,
    pub heartbeat_interval_s: f64,
    pub heartbeat_timeout_s: f64,
}

/// A cloneable handle for broadcasting [`DetectionEvent`]s, independent of
/// the [`SubscriberServer`] worker that owns the accept loop.
#[derive(Clone)]
pub struct Publisher {
    sample_rate_hz: u32,
    registry: Arc<Registry>,
    nfc: Arc<NfcCorrelator>,
    clock: Arc<dyn Clock>,
    active_connections: Arc<AtomicUsize>,
}

impl Publisher {
    /// Connections currently registered, for the orchestrator's health
    /// snapshot (§4.11).
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Converts `event` to its wire form, applies any pending NFC
    /// correlation, and sends it to every connected subscriber. A
    /// connection whose queue is full is skipped, not blocked on (§5).
    pub async fn publish(&self, event: &DetectionEvent) {
        let mut wire = to_wire(event, self.sample_rate_hz);
        if let Some(tag_id) = self.nfc.correlate(self.clock.now()) {
            wire.nfc_correlated = Some(true);
            wire.nfc_tag_id = tag_id;
        }
        let message = ServerMessage::SignalDetection(Box::new(wire));

        let senders: Vec<(ConnectionId, tokio::sync::mpsc::Sender<ServerMessage>)> = {
            let guard = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        for (id, tx) in senders {
            if tx.try_send(message.clone()).is_err() {
                warn!(connection = id, "subscriber queue full or closed, dropping event");
            }
        }
    }
}

/// C10: accepts subscriber connections and drives each one's
/// reader/writer/heartbeat loop. Bound during [`Worker::initial_trigger`]
/// rather than `new`, matching the SDR transport's connect-on-trigger
/// shape so the orchestrator can treat every worker's startup failure
/// uniformly.
pub struct SubscriberServer {
    config: SubscriberServerConfig,
    registry: Arc<Registry>,
    nfc: Arc<NfcCorrelator>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    next_id: AtomicU64,
    active_connections: Arc<AtomicUsize>,
    listener: Option<TcpListener>,
}

impl SubscriberServer {
    /// Builds the worker and a [`Publisher`] handle sharing its
    /// connection registry.
    pub fn new(config: SubscriberServerConfig, cancel: CancellationToken) -> (Self, Publisher) {
        let registry = Arc::new(Mutex::new(HashMap::new()));
        let nfc = Arc::new(NfcCorrelator::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let active_connections = Arc::new(AtomicUsize::new(0));

        let publisher = Publisher {
            sample_rate_hz: config.sample_rate_hz,
            registry: registry.clone(),
            nfc: nfc.clone(),
            clock: clock.clone(),
            active_connections: active_connections.clone(),
        };

        let server = Self {
            config,
            registry,
            nfc,
            clock,
            cancel,
            next_id: AtomicU64::new(1),
            active_connections,
            listener: None,
        };
        (server, publisher)
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Whether [`Worker::initial_trigger`] bound the listening socket.
    /// Meant to be checked once, right after `initial_trigger`, before the
    /// server is moved into its spawned task.
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }
}

#[async_trait]
impl Worker for SubscriberServer {
    async fn initial_trigger(&mut self) {
        match TcpListener::bind(("0.0.0.0", self.config.port)).await {
            Ok(listener) => {
                info!(port = self.config.port, "subscriber server listening");
                self.listener = Some(listener);
            }
            Err(e) => {
                error!(port = self.config.port, error = %e, "failed to bind subscriber port");
            }
        }
    }

    async fn run(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                            info!(connection = id, peer = %peer, "subscriber connected");
                            let params = ConnectionParams {
                                id,
                                center_frequency_hz: self.config.center_frequency_hz,
                                sample_rate_hz: self.config.sample_rate_hz,
                                queue_capacity: self.config.queue_capacity,
                                heartbeat_interval_s: self.config.heartbeat_interval_s,
                                heartbeat_timeout_s: self.config.heartbeat_timeout_s,
                            };
                            tokio::spawn(handle_connection(
                                stream,
                                params,
                                self.registry.clone(),
                                self.nfc.clone(),
                                self.clock.clone(),
                                self.cancel.clone(),
                                self.active_connections.clone(),
                            ));
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_sentinel_common::model::{ModulationClass, SignalFeatures, SignalType};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .expect("bind ephemeral port")
            .local_addr()
            .expect("addr")
            .port()
    }

    fn benign_event() -> DetectionEvent {
        DetectionEvent {
            id: 1,
            kind: rf_sentinel_common::model::DetectionKind::Benign,
            threat_level: 0.0,
            confidence: 0.9,
            signal_type: SignalType::KeyFob,
            timestamp_s: 1_700_000_000.0,
            features: SignalFeatures {
                timestamp_s: 1_700_000_000.0,
                timestamp: None,
                frequency_hz: 433_920_000,
                power_spectrum_db: vec![-20.0],
                burst_start_times_s: vec![0.0],
                inter_burst_intervals_s: vec![],
                modulation_class: ModulationClass::Fsk,
                frequency_deviation_hz: 30_000.0,
                bandwidth_hz: 50_000.0,
                snr_db: 20.0,
                rssi_dbm: -45.0,
                peak_frequencies_hz: vec![],
            },
            indicators: Vec::new(),
            primary_evidence: None,
            recommended_action: "Monitor".to_string(),
            nfc_correlated: None,
            nfc_tag_id: None,
        }
    }

    #[tokio::test]
    async fn sends_config_frame_then_published_event() {
        let port = free_port();
        let cancel = CancellationToken::new();
        let (mut server, publisher) = SubscriberServer::new(
            SubscriberServerConfig {
                port,
                center_frequency_hz: 433_920_000,
                sample_rate_hz: 2_048_000,
                queue_capacity: 16,
                heartbeat_interval_s: 30.0,
                heartbeat_timeout_s: 60.0,
            },
            cancel.clone(),
        );
        server.initial_trigger().await;
        let handle = tokio::spawn(async move { server.run().await });

        let stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read config line");
        assert!(line.contains("\"type\":\"config\""));

        // Wait for the connection to register before publishing.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        publisher.publish(&benign_event()).await;

        line.clear();
        reader.read_line(&mut line).await.expect("read event line");
        assert!(line.contains("\"type\":\"signal_detection\""));
        assert!(line.contains("key_fob_transmission"));

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn subscriber_heartbeat_reply_is_acked() {
        let port = free_port();
        let cancel = CancellationToken::new();
        let (mut server, _publisher) = SubscriberServer::new(
            SubscriberServerConfig {
                port,
                center_frequency_hz: 433_920_000,
                sample_rate_hz: 2_048_000,
                queue_capacity: 16,
                heartbeat_interval_s: 30.0,
                heartbeat_timeout_s: 60.0,
            },
            cancel.clone(),
        );
        server.initial_trigger().await;
        let handle = tokio::spawn(async move { server.run().await });

        let stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read config line");

        write_half.write_all(b"{\"type\":\"heartbeat\"}\n").await.expect("send heartbeat");
        line.clear();
        reader.read_line(&mut line).await.expect("read ack");
        assert!(line.contains("\"type\":\"heartbeat\""));

        cancel.cancel();
        let _ = handle.await;
    }
}
