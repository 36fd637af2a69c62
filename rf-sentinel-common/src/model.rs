//! Shared data model: [`IQFrame`], [`SignalFeatures`], [`Detection`],
//! [`StoredSignal`], [`ThreatEvidence`], [`DetectionEvent`] and the
//! subscriber-side [`SubscriberStatus`].

use crate::time::Timestamp;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A chunk of complex baseband samples produced by C2. Non-owning
/// consumers must not retain it past one pipeline step.
#[derive(Debug, Clone)]
pub struct IQFrame {
    pub samples: Vec<Complex64>,
    pub center_frequency_hz: u64,
    pub sample_rate_hz: u32,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulationClass {
    Fsk,
    Ask,
    Unknown,
}

/// The sufficient statistic of one frame, produced by C3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalFeatures {
    pub timestamp_s: f64,
    #[serde(skip)]
    pub timestamp: Option<Timestamp>,
    pub frequency_hz: u64,
    pub power_spectrum_db: Vec<f64>,
    pub burst_start_times_s: Vec<f64>,
    pub inter_burst_intervals_s: Vec<f64>,
    pub modulation_class: ModulationClass,
    pub frequency_deviation_hz: f64,
    pub bandwidth_hz: f64,
    pub snr_db: f64,
    pub rssi_dbm: f64,
    pub peak_frequencies_hz: Vec<f64>,
}

impl SignalFeatures {
    pub fn burst_count(&self) -> usize {
        self.burst_start_times_s.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    KeyFob,
    Tpms,
    Unknown,
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalType::KeyFob => "key_fob",
            SignalType::Tpms => "tpms",
            SignalType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A classifier output, produced by C4. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub id: u64,
    pub signal_type: SignalType,
    pub confidence: f64,
    pub features: SignalFeatures,
    pub timestamp_s: f64,
    #[serde(skip)]
    pub timestamp: Option<Timestamp>,
    pub classification_details: HashMap<String, String>,
}

/// A record owned exclusively by C5: a [`Detection`] plus the moment it was
/// inserted into the store.
#[derive(Debug, Clone)]
pub struct StoredSignal {
    pub id: u64,
    pub detection: Detection,
    pub insertion_ts: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BruteForceLevel {
    Benign,
    Suspicious,
    Moderate,
    High,
    Critical,
}

impl std::fmt::Display for BruteForceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BruteForceLevel::Benign => "benign",
            BruteForceLevel::Suspicious => "suspicious",
            BruteForceLevel::Moderate => "moderate",
            BruteForceLevel::High => "high",
            BruteForceLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JammingPatternKind {
    Continuous,
    Pulse,
    Sweep,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BruteForceAttackType {
    RapidBurst,
    SustainedBruteForce,
    Persistent,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingAnomaly {
    pub burst_count_match: bool,
    pub timing_precision_s: f64,
    pub power_difference_db: f64,
    pub frequency_stability: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayEvidence {
    pub original_timestamp: f64,
    pub replay_timestamp: f64,
    pub signal_similarity: f64,
    pub timing_anomaly: TimingAnomaly,
    pub spectrum_correlation: f64,
    pub timing_similarity: f64,
    pub frequency_deviation_hz: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JammingEvidence {
    pub noise_floor_elevation: f64,
    pub broadband: bool,
    pub pattern_kind: JammingPatternKind,
    pub affected_frequency_range_hz: (f64, f64),
    pub duration_s: f64,
    pub snr_degradation_db: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowStats {
    pub window_s: f64,
    pub count: usize,
    pub rate_per_minute: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticalSummary {
    pub total_attempts: usize,
    pub mean_interval_s: f64,
    pub stddev_interval_s: f64,
    pub peak_rate_per_minute: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BruteForceEvidence {
    pub threat_level: BruteForceLevel,
    pub attack_type: BruteForceAttackType,
    pub window_stats: Vec<WindowStats>,
    pub statistical_summary: StatisticalSummary,
    /// Mean similarity of this signal against up to the last 5 same-type
    /// entries in the history (§4.8 "signal consistency"); not scored by
    /// the escalation rules, carried for downstream forensic display.
    pub signal_consistency: f64,
    pub recommended_actions: Vec<String>,
}

/// A discriminated union of the evidence produced by C6/C7/C8.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "evidence_type", rename_all = "snake_case")]
pub enum ThreatEvidence {
    Replay(ReplayEvidence),
    Jamming(JammingEvidence),
    BruteForce(BruteForceEvidence),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    Benign,
    Replay,
    Jamming,
    BruteForce,
    UnknownThreat,
}

/// One detector's contribution to a [`DetectionEvent`]: its kind,
/// confidence, and the evidence it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    pub kind: DetectionKind,
    pub confidence: f64,
    pub evidence: ThreatEvidence,
}

/// The broadcast unit emitted by C9 and fanned out by C10.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub id: u64,
    pub kind: DetectionKind,
    pub threat_level: f64,
    pub confidence: f64,
    pub signal_type: SignalType,
    pub timestamp_s: f64,
    pub features: SignalFeatures,
    pub indicators: Vec<Indicator>,
    pub primary_evidence: Option<ThreatEvidence>,
    pub recommended_action: String,
    pub nfc_correlated: Option<bool>,
    pub nfc_tag_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberStatus {
    Connecting,
    Connected,
    HeartbeatTimeout,
    Error,
    Closed,
}
