//! C1: SDR control/data transport. Owns one TCP connection to a co-located
//! SDR daemon, replays configuration on every reconnect, and decodes the
//! resulting byte stream into [`IQFrame`]s (C2) fed to the pipeline driver.

use crate::iq;
use crate::retry::RetryConfig;
use async_trait::async_trait;
use rf_sentinel_common::config::Gain;
use rf_sentinel_common::error::TransportError;
use rf_sentinel_common::model::IQFrame;
use rf_sentinel_common::worker::Worker;
use rf_sentinel_common::{Clock, SystemClock};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Maximum size of one pulled chunk (§4.1).
const MAX_CHUNK_BYTES: usize = 16 * 1024;

const OPCODE_SET_FREQUENCY: u8 = 0x01;
const OPCODE_SET_SAMPLE_RATE: u8 = 0x02;
const OPCODE_SET_GAIN: u8 = 0x04;
/// Sentinel gain value meaning "auto" (§4.1).
const GAIN_AUTO_SENTINEL: i32 = -1;

/// Tracks whether the SDR has ever successfully connected, so the
/// orchestrator can apply the "permanently unreachable for >10 minutes
/// after first success" exit-code rule (§6) without the transport itself
/// knowing about process exit codes.
#[derive(Debug, Default)]
pub struct ConnectionHealth {
    last_success: std::sync::Mutex<Option<std::time::Instant>>,
}

impl ConnectionHealth {
    fn record_success(&self) {
        let mut guard = self.last_success.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(std::time::Instant::now());
    }

    pub fn ever_connected(&self) -> bool {
        self.last_success.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Seconds elapsed since the last successful connect, if any.
    pub fn seconds_since_last_success(&self) -> Option<f64> {
        self.last_success
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|t| t.elapsed().as_secs_f64())
    }
}

pub struct SdrTransportConfig {
    pub host: String,
    pub port: u16,
    pub center_frequency_hz: u64,
    pub sample_rate_hz: u32,
    pub gain: Gain,
}

/// C1+C2 combined: connects, configures, reads the raw byte stream,
/// decodes it into [`IQFrame`]s, and pushes them to the pipeline driver
/// over a bounded channel. Frames are dropped (not queued) when the
/// channel is full, per §5's "the pipeline drops whole frames at the
/// transport boundary under overload".
pub struct SdrTransport {
    config: SdrTransportConfig,
    retry: RetryConfig,
    sender: mpsc::Sender<IQFrame>,
    cancel: CancellationToken,
    health: Arc<ConnectionHealth>,
    clock: Arc<dyn Clock>,
}

impl SdrTransport {
    pub fn new(
        config: SdrTransportConfig,
        sender: mpsc::Sender<IQFrame>,
        cancel: CancellationToken,
        health: Arc<ConnectionHealth>,
    ) -> Self {
        Self {
            config,
            retry: RetryConfig::new(),
            sender,
            cancel,
            health,
            clock: Arc::new(SystemClock),
        }
    }

    async fn connect_and_configure(&self) -> Result<TcpStream, TransportError> {
        let mut stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
            .await
            .map_err(TransportError::Connect)?;
        self.send_command(&mut stream, OPCODE_SET_FREQUENCY, self.config.center_frequency_hz as u32)
            .await?;
        self.send_command(&mut stream, OPCODE_SET_SAMPLE_RATE, self.config.sample_rate_hz)
            .await?;
        let gain_param = match self.config.gain {
            Gain::TenthsDb(v) => v,
            Gain::Auto => GAIN_AUTO_SENTINEL,
        } as u32;
        self.send_command(&mut stream, OPCODE_SET_GAIN, gain_param).await?;
        Ok(stream)
    }

    async fn send_command(&self, stream: &mut TcpStream, opcode: u8, param: u32) -> Result<(), TransportError> {
        let mut buf = [0u8; 5];
        buf[0] = opcode;
        buf[1..5].copy_from_slice(&param.to_be_bytes());
        stream.write_all(&buf).await.map_err(TransportError::Write)
    }

    async fn read_loop(&self, stream: &mut TcpStream) -> Result<(), TransportError> {
        let mut buf = vec![0u8; MAX_CHUNK_BYTES];
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                result = stream.read(&mut buf) => {
                    let n = result.map_err(TransportError::Read)?;
                    if n == 0 {
                        return Err(TransportError::Eof);
                    }
                    let samples = iq::decode(&buf[..n]);
                    if samples.is_empty() {
                        continue;
                    }
                    let frame = IQFrame {
                        samples,
                        center_frequency_hz: self.config.center_frequency_hz,
                        sample_rate_hz: self.config.sample_rate_hz,
                        timestamp: self.clock.now(),
                    };
                    if self.sender.try_send(frame).is_err() {
                        debug!("pipeline backpressured, dropping frame at transport boundary");
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Worker for SdrTransport {
    async fn run(&mut self) {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            match self.connect_and_configure().await {
                Ok(mut stream) => {
                    attempt = 0;
                    self.health.record_success();
                    info!(
                        host = %self.config.host,
                        port = self.config.port,
                        "sdr connected and configured"
                    );
                    if let Err(e) = self.read_loop(&mut stream).await {
                        warn!(error = %e, "sdr stream interrupted, will reconnect");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "sdr connect failed, will retry");
                }
            }
            if self.cancel.is_cancelled() {
                return;
            }
            attempt += 1;
            let delay = self.retry.delay_for_attempt(attempt);
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
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
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn sends_three_config_commands_on_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let health = Arc::new(ConnectionHealth::default());
        let transport = SdrTransport::new(
            SdrTransportConfig {
                host: addr.ip().to_string(),
                port: addr.port(),
                center_frequency_hz: 433_920_000,
                sample_rate_hz: 2_048_000,
                gain: Gain::Auto,
            },
            tx,
            cancel,
            health,
        );

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 15];
            sock.read_exact(&mut buf).await.expect("read config commands");
            buf
        });

        let _stream = transport.connect_and_configure().await.expect("connect");
        let buf = server.await.expect("join");

        assert_eq!(buf[0], OPCODE_SET_FREQUENCY);
        assert_eq!(u32::from_be_bytes(buf[1..5].try_into().unwrap()), 433_920_000);
        assert_eq!(buf[5], OPCODE_SET_SAMPLE_RATE);
        assert_eq!(u32::from_be_bytes(buf[6..10].try_into().unwrap()), 2_048_000);
        assert_eq!(buf[10], OPCODE_SET_GAIN);
    }
}
