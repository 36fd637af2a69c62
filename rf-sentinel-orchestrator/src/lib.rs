//! C11: the orchestrator. Initializes every other component in leaf-first
//! order (C1, C2, C3, C4, C5, C6, C7, C8, C9, C10 — §4.11), wires the
//! per-frame pipeline driver (T2) between C1's frame channel and C10's
//! publisher, and owns shutdown: cancel C1, drain in-flight frames, close
//! C10 with a bounded per-connection final flush, join every background
//! task.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod health;
mod pipeline;

use health::{ComponentStatus, HealthSnapshot, Readiness};
use rf_sentinel_common::config::SentinelConfig;
use rf_sentinel_common::error::ConfigError;
use rf_sentinel_common::model::IQFrame;
use rf_sentinel_common::worker::Worker;
use rf_sentinel_history::SignalHistory;
use rf_sentinel_subscriber::{Publisher, SubscriberServer, SubscriberServerConfig};
use rf_sentinel_transport::{
    BurstTrainSpec, ConnectionHealth, MockFrameSource, SdrTransport, SdrTransportConfig,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Bound on the transport→pipeline frame channel. Full ⇒ the transport
/// drops the frame at the boundary rather than blocking (§5).
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Cap on how long shutdown waits for each background task to join (§4.11).
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The synthetic mock-mode frame period: how often [`MockFrameSource`]
/// renders and pushes a new burst train.
const MOCK_FRAME_PERIOD_S: f64 = 0.05;

/// §6: "SDR permanently unreachable for > 10 minutes after first success"
/// — the threshold the orchestrator's caller uses to choose exit code 2.
pub const SDR_UNREACHABLE_EXIT_WINDOW_S: f64 = 600.0;

/// A running instance of the rf-sentinel pipeline: every component from
/// C1 through C10, wired and pulling frames.
pub struct Orchestrator {
    config: SentinelConfig,
    history: Arc<SignalHistory>,
    publisher: Publisher,
    transport_health: Arc<ConnectionHealth>,
    cancel: CancellationToken,
    started_at: Instant,
    frames_processed: Arc<AtomicU64>,
    events_generated: Arc<AtomicU64>,
    fatal: Arc<AtomicBool>,
    transport_handle: Option<JoinHandle<()>>,
    pipeline_handle: Option<JoinHandle<()>>,
    subscriber_handle: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Initializes C1-C10 in leaf-first order and begins pulling frames
    /// (§4.11). In mock mode, C1 is replaced by [`MockFrameSource`]; every
    /// other component is unchanged, per §4.11's "only legitimate way to
    /// operate without real hardware".
    pub async fn start(config: SentinelConfig) -> Result<Self, ConfigError> {
        let cancel = CancellationToken::new();

        // C5: the shared signal history, built before any component that
        // reads or writes it.
        let history = Arc::new(SignalHistory::new(
            config.history_max_entries,
            config.history_window_s,
        ));

        // C10: bind the listener before C1 starts pushing frames, so the
        // first events have somewhere to go.
        let (mut subscriber_server, publisher) = SubscriberServer::new(
            SubscriberServerConfig {
                port: config.subscriber_port,
                center_frequency_hz: config.center_frequency_hz,
                sample_rate_hz: config.sample_rate_hz,
                queue_capacity: config.subscriber_queue_capacity,
                heartbeat_interval_s: config.heartbeat_interval_s,
                heartbeat_timeout_s: config.heartbeat_timeout_s,
            },
            cancel.clone(),
        );
        subscriber_server.initial_trigger().await;
        let subscriber_handle = Some(tokio::spawn(async move {
            subscriber_server.run().await;
        }));

        // C1+C2: either the real SDR transport or the mock frame source,
        // pushing IQFrames into the pipeline driver's channel.
        let (frame_tx, frame_rx) = mpsc::channel::<IQFrame>(FRAME_CHANNEL_CAPACITY);
        let transport_health = Arc::new(ConnectionHealth::default());

        let transport_handle = Some(if config.mock_mode {
            info!("starting in mock mode: synthetic frame source replaces the SDR transport");
            let mut source = MockFrameSource::new(
                BurstTrainSpec::default(),
                config.center_frequency_hz,
                config.sample_rate_hz,
                MOCK_FRAME_PERIOD_S,
                frame_tx,
                cancel.clone(),
            );
            tokio::spawn(async move {
                source.run().await;
            })
        } else {
            let mut transport = SdrTransport::new(
                SdrTransportConfig {
                    host: config.sdr_host.clone(),
                    port: config.sdr_port,
                    center_frequency_hz: config.center_frequency_hz,
                    sample_rate_hz: config.sample_rate_hz,
                    gain: config.gain,
                },
                frame_tx,
                cancel.clone(),
                transport_health.clone(),
            );
            tokio::spawn(async move {
                transport.run().await;
            })
        });

        // T2: the pipeline driver (C3 → C4 → C9-write → C10-broadcast).
        let frames_processed = Arc::new(AtomicU64::new(0));
        let events_generated = Arc::new(AtomicU64::new(0));
        let fatal = Arc::new(AtomicBool::new(false));

        let pipeline_handle = Some(tokio::spawn(pipeline::run(
            frame_rx,
            history.clone(),
            publisher.clone(),
            config.clone(),
            cancel.clone(),
            frames_processed.clone(),
            events_generated.clone(),
            fatal.clone(),
        )));

        Ok(Self {
            config,
            history,
            publisher,
            transport_health,
            cancel,
            started_at: Instant::now(),
            frames_processed,
            events_generated,
            fatal,
            transport_handle,
            pipeline_handle,
            subscriber_handle,
        })
    }

    /// A point-in-time view of the running system (§4.11).
    pub fn health(&self) -> HealthSnapshot {
        let transport_status = if self.config.mock_mode {
            ComponentStatus::Up
        } else if self.transport_health.ever_connected() {
            match self.transport_health.seconds_since_last_success() {
                Some(secs) if secs > self.config.heartbeat_timeout_s => ComponentStatus::Degraded,
                _ => ComponentStatus::Up,
            }
        } else {
            ComponentStatus::Down
        };

        let readiness = if transport_status == ComponentStatus::Down || self.fatal.load(Ordering::Relaxed) {
            Readiness::Degraded
        } else {
            Readiness::Ready
        };

        HealthSnapshot {
            transport_status,
            subscriber_server_status: ComponentStatus::Up,
            uptime: self.started_at.elapsed(),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            events_generated: self.events_generated.load(Ordering::Relaxed),
            active_subscribers: self.publisher.active_connections(),
            readiness,
            mock_mode: self.config.mock_mode,
        }
    }

    /// Whether the pipeline hit a fatal C5 invariant violation (§7):
    /// the orchestrator's caller should exit with code 1.
    pub fn hit_fatal_error(&self) -> bool {
        self.fatal.load(Ordering::Relaxed)
    }

    /// Whether the SDR has gone unreachable for longer than
    /// [`SDR_UNREACHABLE_EXIT_WINDOW_S`] after at least one successful
    /// connect (§6: exit code 2). Always `false` in mock mode.
    pub fn sdr_permanently_unreachable(&self) -> bool {
        if self.config.mock_mode {
            return false;
        }
        self.transport_health.ever_connected()
            && self
                .transport_health
                .seconds_since_last_success()
                .map(|secs| secs > SDR_UNREACHABLE_EXIT_WINDOW_S)
                .unwrap_or(false)
    }

    /// Signals every owned task to stop, then joins each with a bounded
    /// wait so a stuck subscriber write can't hang shutdown indefinitely
    /// (§4.11: "each connection gets a best-effort final flush with a 5s
    /// cap"). Order follows §4.11: stop C1 first so no new frames enter
    /// while the pipeline and subscriber server drain.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.transport_handle.take() {
            let _ = tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, handle).await;
        }
        if let Some(handle) = self.pipeline_handle.take() {
            let _ = tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, handle).await;
        }
        if let Some(handle) = self.subscriber_handle.take() {
            let _ = tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, handle).await;
        }
        info!("orchestrator shutdown complete");
    }
}
