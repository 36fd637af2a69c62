//! C3: per-frame feature extraction. Deterministically computes
//! [`SignalFeatures`] from an [`IQFrame`] (§4.3). Never panics or
//! propagates an error on numeric edge cases (empty input, zero
//! variance, NaN in intermediate ratios) — those resolve to the
//! well-defined zero/floor values the spec calls for.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod burst;
pub mod modulation;
pub mod spectrum;

use rf_sentinel_common::model::{IQFrame, SignalFeatures};

fn median(xs: &mut [f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = xs.len() / 2;
    if xs.len() % 2 == 0 {
        (xs[mid - 1] + xs[mid]) / 2.0
    } else {
        xs[mid]
    }
}

/// `10*log10(max(|s|^2) / median(|s|^2))`, 0 when the denominator is 0.
fn snr_db(power: &[f64]) -> f64 {
    if power.is_empty() {
        return 0.0;
    }
    let max_power = power.iter().cloned().fold(0.0, f64::max);
    let mut sorted = power.to_vec();
    let median_power = median(&mut sorted);
    if median_power <= 0.0 {
        return 0.0;
    }
    let ratio = max_power / median_power;
    if !ratio.is_finite() || ratio <= 0.0 {
        0.0
    } else {
        10.0 * ratio.log10()
    }
}

/// `10*log10(mean(|s|^2) + 1e-12) - 30`.
fn rssi_dbm(power: &[f64]) -> f64 {
    if power.is_empty() {
        return 10.0 * (1e-12f64).log10() - 30.0;
    }
    let mean_power = power.iter().sum::<f64>() / power.len() as f64;
    10.0 * (mean_power + 1e-12).log10() - 30.0
}

/// Computes [`SignalFeatures`] for one [`IQFrame`].
pub fn extract_features(frame: &IQFrame) -> SignalFeatures {
    let power: Vec<f64> = frame.samples.iter().map(|s| s.norm_sqr()).collect();
    let power_spectrum_db = spectrum::power_spectrum_db(&frame.samples);
    let bursts = burst::detect_bursts(&power, frame.sample_rate_hz);
    let burst_start_times_s = burst::burst_start_times_s(&bursts, frame.sample_rate_hz);
    let inter_burst_intervals_s = burst::inter_burst_intervals_s(&burst_start_times_s);

    let f_inst = modulation::instantaneous_frequency_hz(&frame.samples, frame.sample_rate_hz);
    let modulation_class = modulation::classify_modulation(&f_inst);
    let frequency_deviation_hz = modulation::frequency_deviation_hz(&f_inst);

    let bandwidth_hz = spectrum::bandwidth_hz(&power_spectrum_db, frame.sample_rate_hz);
    let peak_frequencies_hz = spectrum::peak_frequencies_hz(&power_spectrum_db, frame.sample_rate_hz);

    SignalFeatures {
        timestamp_s: frame.timestamp.unix_seconds,
        timestamp: Some(frame.timestamp),
        frequency_hz: frame.center_frequency_hz,
        power_spectrum_db,
        burst_start_times_s,
        inter_burst_intervals_s,
        modulation_class,
        frequency_deviation_hz,
        bandwidth_hz,
        snr_db: snr_db(&power),
        rssi_dbm: rssi_dbm(&power),
        peak_frequencies_hz,
    }
}
