//! C4: scores [`SignalFeatures`] against the key-fob and TPMS signatures
//! (§4.4) and emits zero, one, or multiple [`Detection`]s per frame.
//!
//! Each signature is a data table of named predicates and weights rather
//! than a hand-duplicated function per signal type, so a future third
//! signature is a data addition, not a new code path.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

use rf_sentinel_common::model::{Detection, ModulationClass, SignalFeatures, SignalType};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DETECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_DETECTION_ID.fetch_add(1, Ordering::Relaxed)
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

type Predicate = fn(&SignalFeatures) -> bool;

struct Signature {
    signal_type: SignalType,
    min_confidence: f64,
    predicates: &'static [(&'static str, Predicate, f64)],
}

fn is_fsk(f: &SignalFeatures) -> bool {
    f.modulation_class == ModulationClass::Fsk
}

fn key_fob_burst_count(f: &SignalFeatures) -> bool {
    (3..=8).contains(&f.burst_count())
}

fn key_fob_interval(f: &SignalFeatures) -> bool {
    let m = mean(&f.inter_burst_intervals_s);
    (0.010..=0.020).contains(&m)
}

fn key_fob_deviation(f: &SignalFeatures) -> bool {
    (20_000.0..=50_000.0).contains(&f.frequency_deviation_hz)
}

fn key_fob_bandwidth(f: &SignalFeatures) -> bool {
    (10_000.0..=100_000.0).contains(&f.bandwidth_hz)
}

fn snr_at_least_10(f: &SignalFeatures) -> bool {
    f.snr_db >= 10.0
}

fn tpms_burst_count(f: &SignalFeatures) -> bool {
    (1..=3).contains(&f.burst_count())
}

fn tpms_deviation(f: &SignalFeatures) -> bool {
    (10_000.0..=30_000.0).contains(&f.frequency_deviation_hz)
}

fn tpms_bandwidth(f: &SignalFeatures) -> bool {
    (5_000.0..=50_000.0).contains(&f.bandwidth_hz)
}

const KEY_FOB_PREDICATES: &[(&str, Predicate, f64)] = &[
    ("modulation_fsk", is_fsk, 0.30),
    ("burst_count_3_8", key_fob_burst_count, 0.20),
    ("interval_10_20ms", key_fob_interval, 0.20),
    ("deviation_20_50khz", key_fob_deviation, 0.15),
    ("bandwidth_10_100khz", key_fob_bandwidth, 0.10),
    ("snr_ge_10db", snr_at_least_10, 0.05),
];

const TPMS_PREDICATES: &[(&str, Predicate, f64)] = &[
    ("modulation_fsk", is_fsk, 0.30),
    ("burst_count_1_3", tpms_burst_count, 0.25),
    ("deviation_10_30khz", tpms_deviation, 0.20),
    ("bandwidth_5_50khz", tpms_bandwidth, 0.15),
    ("snr_ge_10db", snr_at_least_10, 0.10),
];

const SIGNATURES: &[Signature] = &[
    Signature {
        signal_type: SignalType::KeyFob,
        min_confidence: 0.6,
        predicates: KEY_FOB_PREDICATES,
    },
    Signature {
        signal_type: SignalType::Tpms,
        min_confidence: 0.6,
        predicates: TPMS_PREDICATES,
    },
];

fn score(signature: &Signature, features: &SignalFeatures) -> (f64, HashMap<String, String>) {
    let mut confidence = 0.0;
    let mut details = HashMap::new();
    for (name, predicate, weight) in signature.predicates {
        let matched = predicate(features);
        if matched {
            confidence += weight;
        }
        details.insert((*name).to_string(), matched.to_string());
    }
    (confidence, details)
}

/// Evaluates both signatures independently against `features`, emitting a
/// [`Detection`] for each whose confidence reaches its `min_confidence`.
pub fn classify(features: &SignalFeatures) -> Vec<Detection> {
    let mut detections = Vec::new();
    for signature in SIGNATURES {
        let (confidence, details) = score(signature, features);
        if confidence >= signature.min_confidence {
            detections.push(Detection {
                id: next_id(),
                signal_type: signature.signal_type,
                confidence,
                features: features.clone(),
                timestamp_s: features.timestamp_s,
                timestamp: features.timestamp,
                classification_details: details,
            });
        }
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_sentinel_common::model::IQFrame;
    use rf_sentinel_common::{Clock, SystemClock};
    use rf_sentinel_transport::BurstTrainSpec;

    fn key_fob_features() -> SignalFeatures {
        let sample_rate = 2_048_000;
        let spec = BurstTrainSpec {
            burst_count: 4,
            burst_spacing_s: 0.015,
            burst_duration_s: 0.004,
            deviation_hz: 30_000.0,
            tone_freq_hz: 20_000.0,
            amplitude: 1.0,
            noise_floor_amplitude: 0.001,
        };
        let samples = rf_sentinel_transport::mock::render_burst_train(&spec, sample_rate);
        let frame = IQFrame {
            samples,
            center_frequency_hz: 433_920_000,
            sample_rate_hz: sample_rate,
            timestamp: SystemClock.now(),
        };
        rf_sentinel_features::extract_features(&frame)
    }

    #[test]
    fn scenario_1_benign_key_fob_classifies_with_high_confidence() {
        let features = key_fob_features();
        let detections = classify(&features);
        let key_fob = detections
            .iter()
            .find(|d| d.signal_type == SignalType::KeyFob)
            .expect("key-fob signature should fire for scenario 1 features");
        assert!(key_fob.confidence >= 0.85, "confidence was {}", key_fob.confidence);
    }

    #[test]
    fn flat_envelope_emits_no_detections() {
        let features = SignalFeatures {
            timestamp_s: 0.0,
            timestamp: None,
            frequency_hz: 433_920_000,
            power_spectrum_db: Vec::new(),
            burst_start_times_s: Vec::new(),
            inter_burst_intervals_s: Vec::new(),
            modulation_class: ModulationClass::Unknown,
            frequency_deviation_hz: 0.0,
            bandwidth_hz: 0.0,
            snr_db: 0.0,
            rssi_dbm: -120.0,
            peak_frequencies_hz: Vec::new(),
        };
        assert!(classify(&features).is_empty());
    }

    #[test]
    fn detections_carry_distinct_ids() {
        let features = key_fob_features();
        let a = classify(&features);
        let b = classify(&features);
        assert_ne!(a[0].id, b[0].id);
    }
}
