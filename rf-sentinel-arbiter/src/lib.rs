//! C9: the threat arbiter. Runs the three detectors over one
//! [`Detection`], folds their output into a single
//! [`DetectionEvent`](rf_sentinel_common::model::DetectionEvent), and is
//! the only component permitted to write into [`SignalHistory`] (§4.9).
//!
//! Grounded on `examples/original_source/backend/detection/event_logic.py`
//! for the kind/weight/action mapping.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

use rf_sentinel_common::config::SentinelConfig;
use rf_sentinel_common::error::InvariantError;
use rf_sentinel_common::model::{Detection, DetectionEvent, DetectionKind, Indicator};
use rf_sentinel_common::Timestamp;
use rf_sentinel_detect::{detect_brute_force, detect_jamming, detect_replay};
use rf_sentinel_history::SignalHistory;

fn weight_for(kind: DetectionKind) -> f64 {
    match kind {
        DetectionKind::Replay => 0.9,
        DetectionKind::Jamming => 0.8,
        DetectionKind::BruteForce => 0.7,
        DetectionKind::UnknownThreat => 0.5,
        DetectionKind::Benign => 0.0,
    }
}

fn recommended_action(kind: DetectionKind, indicators: &[Indicator]) -> String {
    match kind {
        DetectionKind::Benign => "Monitor".to_string(),
        DetectionKind::Replay => {
            "Alert security personnel: possible replay attack detected".to_string()
        }
        DetectionKind::Jamming => {
            "Activate anti-jamming countermeasures and alert security personnel".to_string()
        }
        DetectionKind::BruteForce => indicators
            .iter()
            .find(|i| i.kind == DetectionKind::BruteForce)
            .and_then(|i| match &i.evidence {
                rf_sentinel_common::model::ThreatEvidence::BruteForce(ev) => {
                    ev.recommended_actions.first().cloned()
                }
                _ => None,
            })
            .unwrap_or_else(|| "Increase monitoring frequency for this frequency band".to_string()),
        DetectionKind::UnknownThreat => {
            "Alert security personnel: unclassified threat indicator".to_string()
        }
    }
}

/// Runs C6/C7/C8 over `detection`, merges the results into a
/// [`DetectionEvent`] (§4.9), writes `detection` into `history`, and
/// returns the event. An [`InvariantError`] here is fatal, per the
/// history store's own write-path contract.
pub async fn arbitrate(
    detection: Detection,
    history: &SignalHistory,
    config: &SentinelConfig,
    now: Timestamp,
) -> Result<DetectionEvent, InvariantError> {
    let (replay, jamming, brute_force) = tokio::join!(
        async {
            detect_replay(
                &detection,
                history,
                config.replay_similarity_threshold,
                config.replay_max_time_window_s,
                now,
            )
        },
        async {
            detect_jamming(
                &detection,
                history,
                config.history_window_s,
                config.jamming_noise_threshold_db,
                config.jamming_interference_threshold,
                now,
            )
        },
        async { detect_brute_force(&detection, history, &config.brute_force, now) },
    );

    let indicators: Vec<Indicator> = [replay, jamming, brute_force].into_iter().flatten().collect();

    let event = if indicators.is_empty() {
        DetectionEvent {
            id: detection.id,
            kind: DetectionKind::Benign,
            threat_level: 0.0,
            confidence: detection.confidence,
            signal_type: detection.signal_type,
            timestamp_s: detection.timestamp_s,
            features: detection.features.clone(),
            indicators: Vec::new(),
            primary_evidence: None,
            recommended_action: recommended_action(DetectionKind::Benign, &[]),
            nfc_correlated: None,
            nfc_tag_id: None,
        }
    } else {
        let primary = indicators
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
            .unwrap_or(0);

        let total_weight: f64 = indicators.iter().map(|i| weight_for(i.kind)).sum();
        let weighted_sum: f64 = indicators
            .iter()
            .map(|i| i.confidence * weight_for(i.kind))
            .sum();
        let threat_level = if total_weight > 0.0 {
            (weighted_sum / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let confidence = indicators
            .iter()
            .map(|i| i.confidence)
            .fold(0.0, f64::max);
        let kind = indicators[primary].kind;
        let primary_evidence = Some(indicators[primary].evidence.clone());

        DetectionEvent {
            id: detection.id,
            kind,
            threat_level,
            confidence,
            signal_type: detection.signal_type,
            timestamp_s: detection.timestamp_s,
            features: detection.features.clone(),
            recommended_action: recommended_action(kind, &indicators),
            indicators,
            primary_evidence,
            nfc_correlated: None,
            nfc_tag_id: None,
        }
    };

    history.add(detection, now)?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_sentinel_common::model::{ModulationClass, SignalFeatures, SignalType};
    use rf_sentinel_common::time::test_util::FixedClock;
    use rf_sentinel_common::Clock;
    use std::collections::HashMap;

    fn key_fob_detection(id: u64, timestamp_s: f64) -> Detection {
        Detection {
            id,
            signal_type: SignalType::KeyFob,
            confidence: 0.9,
            features: SignalFeatures {
                timestamp_s,
                timestamp: None,
                frequency_hz: 433_920_000,
                power_spectrum_db: vec![-10.0, -20.0, -5.0, -30.0],
                burst_start_times_s: vec![0.0, 0.015, 0.030, 0.045],
                inter_burst_intervals_s: vec![0.015, 0.015, 0.015],
                modulation_class: ModulationClass::Fsk,
                frequency_deviation_hz: 30_000.0,
                bandwidth_hz: 50_000.0,
                snr_db: 20.0,
                rssi_dbm: -45.0,
                peak_frequencies_hz: vec![400_000.0],
            },
            timestamp_s,
            timestamp: None,
            classification_details: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn scenario_1_benign_key_fob_has_no_indicators() {
        let clock = FixedClock::new(0.0);
        let history = SignalHistory::new(1000, 300.0);
        let config = SentinelConfig::default();

        let detection = key_fob_detection(1, clock.now().unix_seconds);
        let event = arbitrate(detection, &history, &config, clock.now())
            .await
            .expect("arbitrate succeeds");

        assert_eq!(event.kind, DetectionKind::Benign);
        assert_eq!(event.threat_level, 0.0);
        assert!(event.indicators.is_empty());
        assert_eq!(event.recommended_action, "Monitor");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn scenario_2_replay_is_flagged_and_written_back() {
        let clock = FixedClock::new(0.0);
        let history = SignalHistory::new(1000, 300.0);
        let config = SentinelConfig::default();

        let original = key_fob_detection(1, clock.now().unix_seconds);
        arbitrate(original, &history, &config, clock.now())
            .await
            .expect("first arbitration succeeds");

        clock.advance(60.0);
        let replayed = key_fob_detection(2, clock.now().unix_seconds);
        let event = arbitrate(replayed, &history, &config, clock.now())
            .await
            .expect("second arbitration succeeds");

        assert_eq!(event.kind, DetectionKind::Replay);
        assert!(event.threat_level >= 0.8);
        assert_eq!(history.len(), 2);
    }
}
