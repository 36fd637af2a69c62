//! The similarity function shared by C5's `find_similar`, the replay
//! detector (C6), and the brute-force detector's signal-consistency check
//! (§4.5). Range [0,1]; undefined inputs resolve to 0, except for a
//! detection compared with itself (P3: `similarity(x, x) = 1`).

use rf_sentinel_common::model::Detection;

const WEIGHT_SPECTRUM: f64 = 0.40;
const WEIGHT_TIMING: f64 = 0.30;
const WEIGHT_FREQ_DEVIATION: f64 = 0.20;
const WEIGHT_BANDWIDTH: f64 = 0.10;

fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let a = &a[..n];
    let b = &b[..n];
    if a == b {
        return 1.0;
    }
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    let r = cov / (var_a.sqrt() * var_b.sqrt());
    if r.is_nan() {
        0.0
    } else {
        r.clamp(-1.0, 1.0)
    }
}

fn proximity(a: f64, b: f64) -> f64 {
    let denom = a.abs().max(b.abs());
    if denom <= 0.0 {
        return 1.0;
    }
    (1.0 - (a - b).abs() / denom).clamp(0.0, 1.0)
}

/// Fallback spectrum-similarity used when either detection lacks a power
/// spectrum: the average of RSSI proximity and peak-count proximity.
fn fallback_spectrum_similarity(a: &Detection, b: &Detection) -> f64 {
    let rssi_prox = proximity(a.features.rssi_dbm, b.features.rssi_dbm);
    let peak_prox = proximity(
        a.features.peak_frequencies_hz.len() as f64,
        b.features.peak_frequencies_hz.len() as f64,
    );
    0.5 * rssi_prox + 0.5 * peak_prox
}

fn spectrum_similarity(a: &Detection, b: &Detection) -> f64 {
    if a.features.power_spectrum_db.is_empty() || b.features.power_spectrum_db.is_empty() {
        fallback_spectrum_similarity(a, b)
    } else {
        pearson_correlation(&a.features.power_spectrum_db, &b.features.power_spectrum_db)
            .max(0.0)
    }
}

/// `1 - max_interval_diff/avg_interval` when both interval lists are
/// non-empty and of equal length; `None` (excluded from the weighted sum)
/// when either is empty, since there's nothing comparable.
fn timing_similarity(a: &Detection, b: &Detection) -> Option<f64> {
    let ia = &a.features.inter_burst_intervals_s;
    let ib = &b.features.inter_burst_intervals_s;
    if ia.is_empty() || ib.is_empty() || ia.len() != ib.len() {
        return None;
    }
    let avg = (ia.iter().chain(ib.iter()).sum::<f64>()) / (ia.len() + ib.len()) as f64;
    if avg <= 0.0 {
        return Some(1.0);
    }
    let max_diff = ia
        .iter()
        .zip(ib.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max);
    Some((1.0 - max_diff / avg).clamp(0.0, 1.0))
}

/// The spectrum component of [`similarity`] on its own, exposed for
/// detectors (C6) that need the raw correlation rather than the blended
/// score.
pub fn spectrum_correlation(a: &Detection, b: &Detection) -> f64 {
    spectrum_similarity(a, b)
}

/// The burst-timing component of [`similarity`] on its own; `0.0` when
/// the two detections have nothing comparable (empty or mismatched burst
/// counts).
pub fn burst_timing_similarity(a: &Detection, b: &Detection) -> f64 {
    timing_similarity(a, b).unwrap_or(0.0)
}

/// Computes the weighted similarity between two detections, renormalizing
/// weights to the components both detections actually supply.
pub fn similarity(a: &Detection, b: &Detection) -> f64 {
    let spectrum = spectrum_similarity(a, b);
    let timing = timing_similarity(a, b);
    let freq_dev = proximity(a.features.frequency_deviation_hz, b.features.frequency_deviation_hz);
    let bandwidth = proximity(a.features.bandwidth_hz, b.features.bandwidth_hz);

    let mut total_weight = WEIGHT_SPECTRUM + WEIGHT_FREQ_DEVIATION + WEIGHT_BANDWIDTH;
    let mut weighted_sum = spectrum * WEIGHT_SPECTRUM + freq_dev * WEIGHT_FREQ_DEVIATION + bandwidth * WEIGHT_BANDWIDTH;

    if let Some(t) = timing {
        total_weight += WEIGHT_TIMING;
        weighted_sum += t * WEIGHT_TIMING;
    }

    if total_weight <= 0.0 {
        return 0.0;
    }
    (weighted_sum / total_weight).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_sentinel_common::model::{ModulationClass, SignalFeatures};
    use std::collections::HashMap;

    fn detection_with(features: SignalFeatures) -> Detection {
        Detection {
            id: 1,
            signal_type: rf_sentinel_common::model::SignalType::KeyFob,
            confidence: 0.9,
            features,
            timestamp_s: 0.0,
            timestamp: None,
            classification_details: HashMap::new(),
        }
    }

    fn sample_features() -> SignalFeatures {
        SignalFeatures {
            timestamp_s: 0.0,
            timestamp: None,
            frequency_hz: 433_920_000,
            power_spectrum_db: vec![-10.0, -20.0, -30.0, -5.0],
            burst_start_times_s: vec![0.0, 0.015, 0.030],
            inter_burst_intervals_s: vec![0.015, 0.015],
            modulation_class: ModulationClass::Fsk,
            frequency_deviation_hz: 30_000.0,
            bandwidth_hz: 50_000.0,
            snr_db: 20.0,
            rssi_dbm: -45.0,
            peak_frequencies_hz: vec![400_000.0, 440_000.0],
        }
    }

    #[test]
    fn p3_self_similarity_is_one() {
        let d = detection_with(sample_features());
        assert!((similarity(&d, &d) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn p3_self_similarity_is_one_with_all_zero_features() {
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
            rssi_dbm: 0.0,
            peak_frequencies_hz: Vec::new(),
        };
        let d = detection_with(features);
        assert!((similarity(&d, &d) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn p4_similarity_stays_in_unit_range() {
        let a = detection_with(sample_features());
        let mut other = sample_features();
        other.frequency_deviation_hz = 5_000.0;
        other.bandwidth_hz = 10_000.0;
        other.power_spectrum_db = vec![1.0, 2.0, 3.0, 4.0];
        other.inter_burst_intervals_s = vec![0.1, 0.2, 0.3];
        let b = detection_with(other);
        let s = similarity(&a, &b);
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn dissimilar_signals_score_lower_than_identical() {
        let a = detection_with(sample_features());
        let mut other = sample_features();
        other.frequency_deviation_hz = 1_000.0;
        other.bandwidth_hz = 200_000.0;
        other.power_spectrum_db = vec![-90.0, -95.0, -80.0, -70.0];
        let b = detection_with(other);
        assert!(similarity(&a, &b) < similarity(&a, &a));
    }
}
