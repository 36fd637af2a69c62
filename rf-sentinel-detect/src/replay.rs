//! C6: replay-attack detection (§4.6). Compares the current detection
//! against recent history entries of any type; the first candidate whose
//! similarity, delay, and timing anomaly all qualify is the verdict — at
//! most one replay indicator per input detection.
//!
//! Thresholds and the timing-anomaly rule are grounded on
//! `examples/original_source/backend/detection/replay_attack_detector.py`.

use rf_sentinel_common::model::{
    Detection, DetectionKind, Indicator, ThreatEvidence, TimingAnomaly, ReplayEvidence,
};
use rf_sentinel_common::Timestamp;
use rf_sentinel_history::SignalHistory;

/// Replay attacks occur within a reasonable delay window: not immediate
/// (which would be a normal retransmission) and not stale.
const MIN_REPLAY_DELAY_S: f64 = 1.0;
/// Timing precision below this threshold is suspiciously exact for two
/// independently-captured transmissions.
const TIMING_PRECISION_THRESHOLD_S: f64 = 0.001;
/// Power difference above this threshold between otherwise-identical
/// signals suggests a relayed/replayed transmission rather than the
/// original re-transmitting itself.
const POWER_DIFFERENCE_THRESHOLD_DB: f64 = 10.0;
/// Two frequencies within this span are considered the same emitter.
const FREQUENCY_STABILITY_THRESHOLD_HZ: f64 = 1_000.0;

fn stddev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mu = xs.iter().sum::<f64>() / xs.len() as f64;
    (xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

fn timing_anomaly(current: &Detection, historical: &Detection) -> TimingAnomaly {
    let a = &current.features.burst_start_times_s;
    let b = &historical.features.burst_start_times_s;
    let burst_count_match = a.len() == b.len();

    let timing_precision_s = if burst_count_match && !a.is_empty() {
        let diffs: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| x - y).collect();
        if diffs.len() == 1 {
            diffs[0].abs()
        } else {
            stddev(&diffs)
        }
    } else {
        0.0
    };

    let power_difference_db = (current.features.rssi_dbm - historical.features.rssi_dbm).abs();
    let frequency_stability = (current.features.frequency_hz as f64
        - historical.features.frequency_hz as f64)
        .abs()
        < FREQUENCY_STABILITY_THRESHOLD_HZ;

    TimingAnomaly {
        burst_count_match,
        timing_precision_s,
        power_difference_db,
        frequency_stability,
    }
}

fn has_replay_timing_characteristics(anomaly: &TimingAnomaly) -> bool {
    anomaly.burst_count_match
        && (anomaly.timing_precision_s < TIMING_PRECISION_THRESHOLD_S
            || anomaly.power_difference_db > POWER_DIFFERENCE_THRESHOLD_DB)
}

/// Checks `detection` against `history` for a replay verdict (§4.6).
/// `similarity_threshold` and `max_time_window_s` come from
/// [`SentinelConfig`](rf_sentinel_common::config::SentinelConfig); ties
/// between equally-similar candidates are broken in favor of the most
/// recent one, since history is walked newest-first.
pub fn detect_replay(
    detection: &Detection,
    history: &SignalHistory,
    similarity_threshold: f64,
    max_time_window_s: f64,
    now: Timestamp,
) -> Option<Indicator> {
    let candidates = history.recent(max_time_window_s, now);

    for candidate in candidates.iter().rev() {
        let delta_s = candidate.insertion_ts.elapsed_since(&now);
        if !(MIN_REPLAY_DELAY_S..=max_time_window_s).contains(&delta_s) {
            continue;
        }

        let similarity = rf_sentinel_history::similarity(detection, &candidate.detection);
        if similarity < similarity_threshold {
            continue;
        }

        let anomaly = timing_anomaly(detection, &candidate.detection);
        if !has_replay_timing_characteristics(&anomaly) {
            continue;
        }

        let spectrum_correlation =
            rf_sentinel_history::similarity::spectrum_correlation(detection, &candidate.detection);
        let timing_similarity =
            rf_sentinel_history::similarity::burst_timing_similarity(detection, &candidate.detection);
        let frequency_deviation_hz =
            (detection.features.frequency_deviation_hz - candidate.detection.features.frequency_deviation_hz)
                .abs();

        let evidence = ReplayEvidence {
            original_timestamp: candidate.detection.timestamp_s,
            replay_timestamp: detection.timestamp_s,
            signal_similarity: similarity,
            timing_anomaly: anomaly,
            spectrum_correlation,
            timing_similarity,
            frequency_deviation_hz,
        };

        return Some(Indicator {
            kind: DetectionKind::Replay,
            confidence: similarity,
            evidence: ThreatEvidence::Replay(evidence),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_sentinel_common::model::{ModulationClass, SignalFeatures, SignalType};
    use rf_sentinel_common::time::test_util::FixedClock;
    use rf_sentinel_common::Clock;
    use std::collections::HashMap;

    fn key_fob_detection(rssi_dbm: f64) -> Detection {
        Detection {
            id: 1,
            signal_type: SignalType::KeyFob,
            confidence: 0.9,
            features: SignalFeatures {
                timestamp_s: 0.0,
                timestamp: None,
                frequency_hz: 433_920_000,
                power_spectrum_db: vec![-10.0, -20.0, -5.0, -30.0],
                burst_start_times_s: vec![0.0, 0.015, 0.030, 0.045],
                inter_burst_intervals_s: vec![0.015, 0.015, 0.015],
                modulation_class: ModulationClass::Fsk,
                frequency_deviation_hz: 30_000.0,
                bandwidth_hz: 50_000.0,
                snr_db: 20.0,
                rssi_dbm,
                peak_frequencies_hz: vec![400_000.0],
            },
            timestamp_s: 0.0,
            timestamp: None,
            classification_details: HashMap::new(),
        }
    }

    #[test]
    fn scenario_2_identical_signal_60s_later_is_replay() {
        let clock = FixedClock::new(0.0);
        let history = SignalHistory::new(1000, 300.0);
        let original = key_fob_detection(-45.0);
        history.add(original.clone(), clock.now()).expect("add");

        clock.advance(60.0);
        let mut replayed = key_fob_detection(-45.0);
        replayed.timestamp_s = clock.now().unix_seconds;

        let indicator = detect_replay(&replayed, &history, 0.95, 300.0, clock.now())
            .expect("replay should be detected");
        assert_eq!(indicator.kind, DetectionKind::Replay);
        assert!(indicator.confidence >= 0.95);
        match indicator.evidence {
            ThreatEvidence::Replay(ev) => {
                assert_eq!(ev.original_timestamp, original.timestamp_s);
                assert!(ev.signal_similarity >= 0.95);
            }
            _ => panic!("expected replay evidence"),
        }
    }

    #[test]
    fn immediate_retransmission_is_not_flagged() {
        let clock = FixedClock::new(0.0);
        let history = SignalHistory::new(1000, 300.0);
        history.add(key_fob_detection(-45.0), clock.now()).expect("add");
        clock.advance(0.2);
        let current = key_fob_detection(-45.0);
        assert!(detect_replay(&current, &history, 0.95, 300.0, clock.now()).is_none());
    }

    #[test]
    fn dissimilar_signal_is_not_flagged() {
        let clock = FixedClock::new(0.0);
        let history = SignalHistory::new(1000, 300.0);
        history.add(key_fob_detection(-45.0), clock.now()).expect("add");
        clock.advance(30.0);
        let mut current = key_fob_detection(-80.0);
        current.features.power_spectrum_db = vec![-90.0, -95.0, -80.0, -70.0];
        current.features.frequency_deviation_hz = 5_000.0;
        assert!(detect_replay(&current, &history, 0.95, 300.0, clock.now()).is_none());
    }

    #[test]
    fn stale_capture_beyond_window_is_not_flagged() {
        let clock = FixedClock::new(0.0);
        let history = SignalHistory::new(1000, 1000.0);
        history.add(key_fob_detection(-45.0), clock.now()).expect("add");
        clock.advance(301.0);
        let current = key_fob_detection(-45.0);
        assert!(detect_replay(&current, &history, 0.95, 300.0, clock.now()).is_none());
    }
}
