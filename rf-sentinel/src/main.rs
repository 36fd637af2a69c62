//! CLI entry point for the rf-sentinel automotive RF security monitor.
//!
//! Parses configuration from flags/env vars, initializes tracing, starts
//! the orchestrator, and runs until either a shutdown signal arrives or a
//! fatal condition is observed, translating runtime state into the
//! process exit codes from §6: 0 normal, 1 fatal init/invariant error, 2
//! SDR permanently unreachable for more than ten minutes after its first
//! successful connect.

#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

use clap::Parser;
use rf_sentinel_common::config::{BruteForceThresholds, Gain, SentinelConfigBuilder};
use rf_sentinel_orchestrator::Orchestrator;
use std::time::Duration;

/// How often the main loop polls orchestrator health for the SDR
/// permanently-unreachable condition while waiting for a shutdown signal.
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "rf-sentinel", about = "Automotive RF security monitor")]
struct Cli {
    /// Host of the co-located SDR daemon's control/data socket.
    #[arg(long, env = "RF_SENTINEL_SDR_HOST", default_value = "127.0.0.1")]
    sdr_host: String,

    /// Port of the co-located SDR daemon's control/data socket.
    #[arg(long, env = "RF_SENTINEL_SDR_PORT", default_value_t = 1234)]
    sdr_port: u16,

    /// Center frequency in Hz. Must fall within tolerance of 315 MHz or
    /// 433.92 MHz.
    #[arg(long, env = "RF_SENTINEL_CENTER_FREQUENCY_HZ", default_value_t = 433_920_000)]
    center_frequency_hz: u64,

    /// IQ sample rate in Hz.
    #[arg(long, env = "RF_SENTINEL_SAMPLE_RATE_HZ", default_value_t = 2_048_000)]
    sample_rate_hz: u32,

    /// Fixed gain in tenths of a dB. Omit for automatic gain control.
    #[arg(long, env = "RF_SENTINEL_GAIN_TENTHS_DB")]
    gain_tenths_db: Option<i32>,

    /// Port the subscriber TCP server listens on.
    #[arg(long, env = "RF_SENTINEL_SUBSCRIBER_PORT", default_value_t = 8888)]
    subscriber_port: u16,

    /// Run against a synthetic frame source instead of real SDR hardware.
    #[arg(long, env = "RF_SENTINEL_MOCK")]
    mock: bool,

    /// Rolling signal history window, in seconds.
    #[arg(long, env = "RF_SENTINEL_HISTORY_WINDOW_S", default_value_t = 300.0)]
    history_window_s: f64,

    /// Maximum number of entries retained in signal history.
    #[arg(long, env = "RF_SENTINEL_HISTORY_MAX_ENTRIES", default_value_t = 1000)]
    history_max_entries: usize,

    /// Similarity threshold above which two signals are considered a
    /// replay candidate.
    #[arg(long, env = "RF_SENTINEL_REPLAY_SIMILARITY_THRESHOLD", default_value_t = 0.95)]
    replay_similarity_threshold: f64,

    /// Maximum age, in seconds, of a historical signal still eligible as a
    /// replay match.
    #[arg(long, env = "RF_SENTINEL_REPLAY_MAX_TIME_WINDOW_S", default_value_t = 300.0)]
    replay_max_time_window_s: f64,

    /// Noise-floor rise, in dB, that counts as jamming.
    #[arg(long, env = "RF_SENTINEL_JAMMING_NOISE_THRESHOLD_DB", default_value_t = 10.0)]
    jamming_noise_threshold_db: f64,

    /// Fraction of the band that must show interference to count as
    /// jamming.
    #[arg(long, env = "RF_SENTINEL_JAMMING_INTERFERENCE_THRESHOLD", default_value_t = 0.8)]
    jamming_interference_threshold: f64,

    /// Per-connection outbound event queue capacity before events are
    /// dropped for that subscriber.
    #[arg(long, env = "RF_SENTINEL_SUBSCRIBER_QUEUE_CAPACITY", default_value_t = 256)]
    subscriber_queue_capacity: usize,

    /// Seconds between heartbeats sent to each subscriber.
    #[arg(long, env = "RF_SENTINEL_HEARTBEAT_INTERVAL_S", default_value_t = 30.0)]
    heartbeat_interval_s: f64,

    /// Seconds without a subscriber heartbeat before the connection is
    /// closed.
    #[arg(long, env = "RF_SENTINEL_HEARTBEAT_TIMEOUT_S", default_value_t = 60.0)]
    heartbeat_timeout_s: f64,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let gain = match cli.gain_tenths_db {
        Some(db) => Gain::TenthsDb(db),
        None => Gain::Auto,
    };

    let config = SentinelConfigBuilder::new()
        .set_sdr_host(cli.sdr_host)
        .set_sdr_port(cli.sdr_port)
        .set_center_frequency_hz(cli.center_frequency_hz)
        .set_sample_rate_hz(cli.sample_rate_hz)
        .set_gain(gain)
        .set_subscriber_port(cli.subscriber_port)
        .set_mock_mode(cli.mock)
        .set_history_window_s(cli.history_window_s)
        .set_history_max_entries(cli.history_max_entries)
        .set_replay_similarity_threshold(cli.replay_similarity_threshold)
        .set_replay_max_time_window_s(cli.replay_max_time_window_s)
        .set_jamming_noise_threshold_db(cli.jamming_noise_threshold_db)
        .set_jamming_interference_threshold(cli.jamming_interference_threshold)
        .set_brute_force_thresholds(BruteForceThresholds::default())
        .set_subscriber_queue_capacity(cli.subscriber_queue_capacity)
        .set_heartbeat_interval_s(cli.heartbeat_interval_s)
        .set_heartbeat_timeout_s(cli.heartbeat_timeout_s)
        .build();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    let orchestrator = match Orchestrator::start(config).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "failed to start orchestrator");
            std::process::exit(1);
        }
    };

    tracing::info!("rf-sentinel running, press ctrl-c to stop");
    let exit_code = run_until_shutdown(&orchestrator).await;
    orchestrator.shutdown().await;
    std::process::exit(exit_code);
}

/// Waits for either a shutdown signal or a fatal runtime condition,
/// returning the process exit code the condition maps to (§6).
async fn run_until_shutdown(orchestrator: &Orchestrator) -> i32 {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                return 0;
            }
            _ = tokio::time::sleep(HEALTH_POLL_INTERVAL) => {
                if orchestrator.hit_fatal_error() {
                    tracing::error!("fatal invariant violation, shutting down");
                    return 1;
                }
                if orchestrator.sdr_permanently_unreachable() {
                    tracing::error!("sdr unreachable for too long, shutting down");
                    return 2;
                }
            }
        }
    }
}
