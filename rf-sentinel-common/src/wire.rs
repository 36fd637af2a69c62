//! Newline-delimited JSON wire types for the subscriber socket (§6).
//! Discriminated by `type`, the idiomatic replacement for the reference
//! implementation's `message.get("type")` string dispatch.

use crate::model::{DetectionEvent, DetectionKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub version: String,
    pub capabilities: Vec<String>,
}

/// Messages the server sends to a subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "config")]
    Config {
        rtl_frequency: u64,
        sample_rate: u32,
        server_info: ServerInfo,
    },
    #[serde(rename = "heartbeat")]
    Heartbeat,
    #[serde(rename = "signal_detection")]
    SignalDetection(Box<WireDetectionEvent>),
}

/// The wire representation of a [`crate::model::DetectionEvent`] per §6's
/// field list (a subset of the full internal type, display-sufficient
/// features and primary evidence only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDetectionEvent {
    pub id: u64,
    pub kind: String,
    pub threat_level: f64,
    pub confidence: f64,
    pub signal_type: String,
    pub timestamp: f64,
    pub frequency_mhz: f64,
    pub sample_rate: u32,
    pub features: WireFeatures,
    pub evidence: Option<Value>,
    pub recommended_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfc_correlated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfc_tag_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFeatures {
    pub rssi_dbm: f64,
    pub snr_db: f64,
    pub modulation_class: String,
    pub bandwidth_hz: f64,
    pub burst_count: usize,
    pub peak_frequencies_hz: Vec<f64>,
}

/// Renders a [`DetectionKind`] the way scenario 1 of the end-to-end tests
/// expects: benign events are named after the signal they carry
/// (`"key_fob_transmission"`), threat-bearing events after the kind that
/// fired (`"replay"`, `"jamming"`, `"brute_force"`, `"unknown_threat"`).
fn wire_kind(event: &DetectionEvent) -> String {
    match event.kind {
        DetectionKind::Benign => format!("{}_transmission", event.signal_type),
        DetectionKind::Replay => "replay".to_string(),
        DetectionKind::Jamming => "jamming".to_string(),
        DetectionKind::BruteForce => "brute_force".to_string(),
        DetectionKind::UnknownThreat => "unknown_threat".to_string(),
    }
}

/// Converts an internal [`DetectionEvent`] to the subset of fields the
/// subscriber wire format carries (§6): display-sufficient features and
/// the primary evidence only, never the full indicator list or the raw
/// power spectrum.
pub fn to_wire(event: &DetectionEvent, sample_rate_hz: u32) -> WireDetectionEvent {
    let evidence = event
        .primary_evidence
        .as_ref()
        .and_then(|e| serde_json::to_value(e).ok());

    WireDetectionEvent {
        id: event.id,
        kind: wire_kind(event),
        threat_level: event.threat_level,
        confidence: event.confidence,
        signal_type: event.signal_type.to_string(),
        timestamp: event.timestamp_s,
        frequency_mhz: event.features.frequency_hz as f64 / 1_000_000.0,
        sample_rate: sample_rate_hz,
        features: WireFeatures {
            rssi_dbm: event.features.rssi_dbm,
            snr_db: event.features.snr_db,
            modulation_class: format!("{:?}", event.features.modulation_class).to_lowercase(),
            bandwidth_hz: event.features.bandwidth_hz,
            burst_count: event.features.burst_count(),
            peak_frequencies_hz: event.features.peak_frequencies_hz.clone(),
        },
        evidence,
        recommended_action: event.recommended_action.clone(),
        nfc_correlated: event.nfc_correlated,
        nfc_tag_id: event.nfc_tag_id.clone(),
    }
}

/// Messages a subscriber sends to the server, dispatched by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Heartbeat,
    Status {
        #[serde(flatten)]
        fields: Value,
    },
    NfcDetection {
        tag_id: Option<String>,
        #[serde(flatten)]
        fields: Value,
    },
    Error {
        #[serde(flatten)]
        fields: Value,
    },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Indicator, ModulationClass, SignalFeatures, SignalType};

    fn benign_event() -> DetectionEvent {
        DetectionEvent {
            id: 1,
            kind: DetectionKind::Benign,
            threat_level: 0.0,
            confidence: 0.9,
            signal_type: SignalType::KeyFob,
            timestamp_s: 1_700_000_000.0,
            features: SignalFeatures {
                timestamp_s: 1_700_000_000.0,
                timestamp: None,
                frequency_hz: 433_920_000,
                power_spectrum_db: vec![-20.0, -30.0],
                burst_start_times_s: vec![0.0, 0.015],
                inter_burst_intervals_s: vec![0.015],
                modulation_class: ModulationClass::Fsk,
                frequency_deviation_hz: 30_000.0,
                bandwidth_hz: 50_000.0,
                snr_db: 20.0,
                rssi_dbm: -45.0,
                peak_frequencies_hz: vec![400_000.0],
            },
            indicators: Vec::new(),
            primary_evidence: None,
            recommended_action: "Monitor".to_string(),
            nfc_correlated: None,
            nfc_tag_id: None,
        }
    }

    #[test]
    fn benign_kind_is_signal_type_transmission() {
        let event = benign_event();
        let wire = to_wire(&event, 2_048_000);
        assert_eq!(wire.kind, "key_fob_transmission");
    }

    #[test]
    fn r1_round_trip_is_lossless_over_documented_fields() {
        let event = benign_event();
        let wire = to_wire(&event, 2_048_000);
        let json = serde_json::to_string(&wire).expect("serialize");
        let parsed: WireDetectionEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.id, wire.id);
        assert_eq!(parsed.kind, wire.kind);
        assert_eq!(parsed.features.burst_count, wire.features.burst_count);
        assert_eq!(parsed.frequency_mhz, 433.92);
    }

    #[test]
    fn threat_kind_ignores_signal_type() {
        let mut event = benign_event();
        event.kind = DetectionKind::Replay;
        let _ = Indicator {
            kind: DetectionKind::Replay,
            confidence: 0.95,
            evidence: crate::model::ThreatEvidence::Replay(crate::model::ReplayEvidence {
                original_timestamp: 0.0,
                replay_timestamp: 1.0,
                signal_similarity: 0.97,
                timing_anomaly: crate::model::TimingAnomaly {
                    burst_count_match: true,
                    timing_precision_s: 0.0001,
                    power_difference_db: 1.0,
                    frequency_stability: true,
                },
                spectrum_correlation: 0.96,
                timing_similarity: 0.98,
                frequency_deviation_hz: 100.0,
            }),
        };
        let wire = to_wire(&event, 2_048_000);
        assert_eq!(wire.kind, "replay");
    }
}
