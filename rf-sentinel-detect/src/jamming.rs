//! C7: jamming detection (§4.7). Blends a noise-floor-elevation factor, a
//! broadband-spectrum factor, and the strongest of four named interference
//! patterns (continuous/pulse/sweep/spot) into one confidence score.
//!
//! Grounded on
//! `examples/original_source/backend/detection/jamming_detector.py`. That
//! module computes several of its factors over linear power; our spectra
//! are dB-only (§2), so each dB-denominated formula below operates on
//! `10^(db/10)` in place of the original's raw power reading — documented
//! as a resolved ambiguity rather than silently changing units.

use rf_sentinel_common::model::{
    Detection, DetectionKind, Indicator, JammingEvidence, JammingPatternKind, ThreatEvidence,
};
use rf_sentinel_common::Timestamp;
use rf_sentinel_history::SignalHistory;

const FREQUENCY_TOLERANCE_HZ: f64 = 1_000_000.0;
const BASELINE_LOOKBACK: usize = 50;
const FLATNESS_THRESHOLD: f64 = 0.8;
const BROADBAND_MEAN_THRESHOLD_LINEAR: f64 = 1.0;

fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

fn noise_floor_db(features: &rf_sentinel_common::model::SignalFeatures) -> f64 {
    features
        .power_spectrum_db
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min)
}

fn median(xs: &mut [f64]) -> f64 {
    if xs.is_empty() {
        return f64::NEG_INFINITY;
    }
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = xs.len() / 2;
    if xs.len() % 2 == 0 {
        (xs[mid - 1] + xs[mid]) / 2.0
    } else {
        xs[mid]
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn variance(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mu = mean(xs);
    xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / xs.len() as f64
}

fn stddev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

/// Spectral flatness: geometric mean over arithmetic mean of the positive
/// linear power bins. `0.0` when fewer than two positive bins exist.
fn spectral_flatness(power_spectrum_db: &[f64]) -> (f64, f64) {
    let linear: Vec<f64> = power_spectrum_db
        .iter()
        .map(|db| db_to_linear(*db))
        .filter(|p| *p > 0.0)
        .collect();
    if linear.len() < 2 {
        return (0.0, 0.0);
    }
    let arithmetic = mean(&linear);
    let log_mean = linear.iter().map(|p| p.ln()).sum::<f64>() / linear.len() as f64;
    let geometric = log_mean.exp();
    if arithmetic <= 0.0 {
        (0.0, arithmetic)
    } else {
        (geometric / arithmetic, arithmetic)
    }
}

fn frequency_matches(a: u64, b: u64) -> bool {
    (a as f64 - b as f64).abs() <= FREQUENCY_TOLERANCE_HZ
}

/// Continuous jamming: elevated, low-variance power sustained over the
/// whole window.
fn continuous_confidence(power_series: &[f64]) -> Option<(f64, f64)> {
    if power_series.len() < 5 {
        return None;
    }
    let mean_power = mean(power_series);
    let var = variance(power_series);
    if mean_power > -30.0 && var < 25.0 {
        let confidence = ((mean_power + 50.0) / 50.0).clamp(0.0, 1.0);
        let duration_s = power_series.len() as f64 * 0.1;
        Some((confidence, duration_s))
    } else {
        None
    }
}

/// Pulse jamming: repeated power spikes at a roughly constant interval.
fn pulse_confidence(power_series: &[f64], sample_interval_s: f64) -> Option<f64> {
    if power_series.len() < 10 {
        return None;
    }
    let mu = mean(power_series);
    let sigma = stddev(power_series);
    let threshold = mu + 1.5 * sigma;
    let peak_indices: Vec<usize> = power_series
        .iter()
        .enumerate()
        .filter(|(_, p)| **p > threshold)
        .map(|(i, _)| i)
        .collect();
    if peak_indices.len() < 3 {
        return None;
    }
    let intervals: Vec<f64> = peak_indices
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 * sample_interval_s)
        .collect();
    let mean_interval = mean(&intervals);
    if mean_interval <= 0.0 {
        return None;
    }
    let cv = stddev(&intervals) / mean_interval;
    if cv < 0.1 {
        Some((peak_indices.len() as f64 / 10.0).min(1.0))
    } else {
        None
    }
}

/// Sweep jamming: power trending monotonically in one direction across
/// most of the window.
fn sweep_confidence(power_series: &[f64]) -> Option<f64> {
    if power_series.len() < 8 {
        return None;
    }
    let diffs: Vec<f64> = power_series.windows(2).map(|w| w[1] - w[0]).collect();
    let positive = diffs.iter().filter(|d| **d > 0.01).count();
    let negative = diffs.iter().filter(|d| **d < -0.01).count();
    let total = diffs.len();
    if total == 0 {
        return None;
    }
    let directional_consistency = positive.max(negative) as f64 / total as f64;
    let mean_power = mean(power_series);
    if directional_consistency > 0.6 && mean_power > -40.0 {
        Some((directional_consistency * (mean_power + 60.0) / 60.0).clamp(0.0, 1.0))
    } else {
        None
    }
}

/// Spot jamming: one narrow band far above the rest of the spectrum.
fn spot_confidence(power_spectrum_db: &[f64]) -> Option<f64> {
    if power_spectrum_db.len() < 2 {
        return None;
    }
    let linear: Vec<f64> = power_spectrum_db.iter().map(|db| db_to_linear(*db)).collect();
    let max_power = linear.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg_power = mean(&linear);
    if avg_power <= 0.0 {
        return None;
    }
    let ratio = max_power / avg_power;
    if ratio > 10.0 && max_power > 2.0 {
        Some((ratio / 10.0).min(1.0))
    } else {
        None
    }
}

struct PatternResult {
    kind: JammingPatternKind,
    confidence: f64,
    duration_s: f64,
}

fn strongest_pattern(power_series: &[f64], power_spectrum_db: &[f64], sample_interval_s: f64) -> Option<PatternResult> {
    let mut best: Option<PatternResult> = None;
    if let Some((confidence, duration_s)) = continuous_confidence(power_series) {
        best = Some(PatternResult { kind: JammingPatternKind::Continuous, confidence, duration_s });
    }
    if let Some(confidence) = pulse_confidence(power_series, sample_interval_s) {
        if best.as_ref().map(|b| confidence > b.confidence).unwrap_or(true) {
            best = Some(PatternResult { kind: JammingPatternKind::Pulse, confidence, duration_s: power_series.len() as f64 * sample_interval_s });
        }
    }
    if let Some(confidence) = sweep_confidence(power_series) {
        if best.as_ref().map(|b| confidence > b.confidence).unwrap_or(true) {
            best = Some(PatternResult { kind: JammingPatternKind::Sweep, confidence, duration_s: power_series.len() as f64 * sample_interval_s });
        }
    }
    if let Some(confidence) = spot_confidence(power_spectrum_db) {
        if best.as_ref().map(|b| confidence > b.confidence).unwrap_or(true) {
            best = Some(PatternResult { kind: JammingPatternKind::Spot, confidence, duration_s: sample_interval_s });
        }
    }
    best
}

/// Weighted blend of noise/broadband/pattern factors, gated so that a
/// single weak factor never carries a verdict on its own (§4.7).
fn combined_confidence(noise: Option<f64>, broadband: Option<f64>, pattern: Option<f64>) -> f64 {
    let factors: Vec<(f64, f64)> = [
        (noise, 0.3),
        (broadband, 0.2),
        (pattern, 0.5),
    ]
    .into_iter()
    .filter_map(|(v, w)| v.map(|v| (v, w)))
    .collect();

    if factors.len() < 2 {
        if factors.len() == 1 && factors[0].0 > 0.8 {
            return factors[0].0;
        }
        return 0.0;
    }

    let total_weight: f64 = factors.iter().map(|(_, w)| w).sum();
    let weighted: f64 = factors.iter().map(|(v, w)| v * w).sum();
    if total_weight <= 0.0 {
        0.0
    } else {
        weighted / total_weight
    }
}

/// Checks `detection` for a jamming verdict using `history` as the
/// baseline and power-over-time series (§4.7). `noise_threshold_db` and
/// `interference_threshold` come from
/// [`SentinelConfig`](rf_sentinel_common::config::SentinelConfig): the
/// former gates the noise-floor-elevation factor, the latter gates the
/// overall verdict ("verdict if > interference_threshold").
pub fn detect_jamming(
    detection: &Detection,
    history: &SignalHistory,
    baseline_window_s: f64,
    noise_threshold_db: f64,
    interference_threshold: f64,
    now: Timestamp,
) -> Option<Indicator> {
    let mut recent = history.recent(baseline_window_s, now);
    recent.retain(|s| frequency_matches(s.detection.features.frequency_hz, detection.features.frequency_hz));
    recent.truncate(BASELINE_LOOKBACK.min(recent.len()));

    let mut baseline_floors: Vec<f64> = recent
        .iter()
        .map(|s| noise_floor_db(&s.detection.features))
        .filter(|v| v.is_finite())
        .collect();

    let current_floor = noise_floor_db(&detection.features);
    let noise_factor = if current_floor.is_finite() && !baseline_floors.is_empty() {
        let baseline = median(&mut baseline_floors);
        let elevation = current_floor - baseline;
        if elevation.abs() > noise_threshold_db {
            Some((elevation.abs() / (2.0 * noise_threshold_db)).min(1.0))
        } else {
            None
        }
    } else {
        None
    };
    let noise_floor_elevation = if current_floor.is_finite() && !baseline_floors.is_empty() {
        current_floor - median(&mut baseline_floors)
    } else {
        0.0
    };

    let (flatness, arithmetic_mean) = spectral_flatness(&detection.features.power_spectrum_db);
    let broadband = flatness > FLATNESS_THRESHOLD && arithmetic_mean > BROADBAND_MEAN_THRESHOLD_LINEAR;
    let broadband_factor = if broadband { Some(1.0) } else { None };

    let mut power_series: Vec<f64> = recent.iter().map(|s| s.detection.features.rssi_dbm).collect();
    power_series.push(detection.features.rssi_dbm);
    let sample_interval_s = if recent.len() >= 2 {
        baseline_window_s / recent.len() as f64
    } else {
        0.1
    };

    let pattern = strongest_pattern(&power_series, &detection.features.power_spectrum_db, sample_interval_s);
    let pattern_factor = pattern.as_ref().map(|p| p.confidence);

    let confidence = combined_confidence(noise_factor, broadband_factor, pattern_factor);
    if confidence <= interference_threshold {
        return None;
    }

    let pattern_kind = pattern.as_ref().map(|p| p.kind).unwrap_or(JammingPatternKind::Continuous);
    let duration_s = pattern.as_ref().map(|p| p.duration_s).unwrap_or(0.0);
    let bandwidth_half = detection.features.bandwidth_hz / 2.0;
    let center = detection.features.frequency_hz as f64;

    let evidence = JammingEvidence {
        noise_floor_elevation,
        broadband,
        pattern_kind,
        affected_frequency_range_hz: (center - bandwidth_half, center + bandwidth_half),
        duration_s,
        snr_degradation_db: (20.0 - detection.features.snr_db).max(0.0),
        confidence,
    };

    Some(Indicator {
        kind: DetectionKind::Jamming,
        confidence,
        evidence: ThreatEvidence::Jamming(evidence),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_sentinel_common::model::{ModulationClass, SignalFeatures, SignalType};
    use rf_sentinel_common::time::test_util::FixedClock;
    use rf_sentinel_common::Clock;
    use std::collections::HashMap;

    fn detection_with(power_spectrum_db: Vec<f64>, rssi_dbm: f64, snr_db: f64) -> Detection {
        Detection {
            id: 1,
            signal_type: SignalType::Unknown,
            confidence: 0.9,
            features: SignalFeatures {
                timestamp_s: 0.0,
                timestamp: None,
                frequency_hz: 433_920_000,
                power_spectrum_db,
                burst_start_times_s: vec![],
                inter_burst_intervals_s: vec![],
                modulation_class: ModulationClass::Unknown,
                frequency_deviation_hz: 0.0,
                bandwidth_hz: 2_000_000.0,
                snr_db,
                rssi_dbm,
                peak_frequencies_hz: vec![],
            },
            timestamp_s: 0.0,
            timestamp: None,
            classification_details: HashMap::new(),
        }
    }

    #[test]
    fn scenario_3_continuous_elevated_noise_is_flagged() {
        let clock = FixedClock::new(0.0);
        let history = SignalHistory::new(1000, 300.0);
        for _ in 0..10 {
            history
                .add(detection_with(vec![-90.0, -92.0, -88.0], -85.0, 20.0), clock.now())
                .expect("add");
            clock.advance(0.1);
        }

        let jammed = detection_with(vec![-20.0, -22.0, -18.0, -21.0], -20.0, 2.0);
        let indicator = detect_jamming(&jammed, &history, 300.0, 10.0, 0.8, clock.now());
        assert!(indicator.is_some());
        let indicator = indicator.expect("jamming detected");
        assert_eq!(indicator.kind, DetectionKind::Jamming);
        assert!(indicator.confidence > 0.0);
    }

    #[test]
    fn quiet_spectrum_is_not_flagged() {
        let clock = FixedClock::new(0.0);
        let history = SignalHistory::new(1000, 300.0);
        for _ in 0..10 {
            history
                .add(detection_with(vec![-90.0, -92.0, -88.0], -85.0, 20.0), clock.now())
                .expect("add");
            clock.advance(0.1);
        }
        let quiet = detection_with(vec![-91.0, -93.0, -89.0], -86.0, 19.0);
        assert!(detect_jamming(&quiet, &history, 300.0, 10.0, 0.8, clock.now()).is_none());
    }

    #[test]
    fn empty_history_yields_no_baseline_verdict() {
        let clock = FixedClock::new(0.0);
        let history = SignalHistory::new(1000, 300.0);
        let current = detection_with(vec![-20.0, -22.0], -20.0, 5.0);
        // No baseline and no broadband/pattern signal with a single sample.
        assert!(detect_jamming(&current, &history, 300.0, 10.0, 0.8, clock.now()).is_none());
    }
}
