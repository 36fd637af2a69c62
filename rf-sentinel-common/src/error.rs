//! Error types shared across the workspace. Per §7 of the design: transient
//! I/O is recovered locally by its own component, configuration and
//! invariant errors are fatal at the orchestrator boundary.

use thiserror::Error;

/// Errors fatal at startup (§7 "Configuration error"): exit code 1.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("center frequency {0} Hz is outside the supported ISM bands")]
    UnsupportedFrequency(u64),
    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(u32),
    #[error("gain out of range: {0}")]
    InvalidGain(String),
    #[error("subscriber port {0} is invalid")]
    InvalidPort(u16),
}

/// Errors fatal once detected at runtime (§7 "Invariant violations in C5"):
/// exit code 1, indicates a code defect rather than bad data.
#[derive(Debug, Error)]
pub enum InvariantError {
    #[error("signal history insertion timestamp went backwards")]
    NonMonotoneInsertion,
    #[error("signal history capacity breach after eviction: {0} entries, max {1}")]
    CapacityBreach(usize, usize),
}

/// Transient transport errors (§7): logged at warn, recovered by
/// reconnect/backoff inside C1.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("sdr connect failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("sdr stream ended (eof)")]
    Eof,
    #[error("sdr write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("sdr read failed: {0}")]
    Read(#[source] std::io::Error),
}

/// Subscriber-connection errors (§7): logged at warn, the connection is
/// dropped but other subscribers are unaffected.
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("heartbeat timeout")]
    HeartbeatTimeout,
    #[error("malformed json: {0}")]
    MalformedJson(#[source] serde_json::Error),
}
