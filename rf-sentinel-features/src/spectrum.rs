//! Power spectrum, bandwidth, and peak-frequency extraction (§4.3).

use num_complex::Complex64;
use rustfft::FftPlanner;

/// dB floor applied to the power spectrum, per §4.3.
pub const POWER_FLOOR_DB: f64 = -120.0; // 10*log10(1e-12)

/// Hann window of length `n`.
pub fn hann_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (n as f64 - 1.0)).cos())
        .collect()
}

/// Windowed DFT magnitude-squared, converted to dB with a floor of
/// [`POWER_FLOOR_DB`]. Output length equals `samples.len()`.
pub fn power_spectrum_db(samples: &[Complex64]) -> Vec<f64> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }
    let window = hann_window(n);
    let mut buf: Vec<Complex64> = samples
        .iter()
        .zip(window.iter())
        .map(|(s, w)| s * w)
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buf);

    buf.iter()
        .map(|c| {
            let power = c.norm_sqr();
            (10.0 * power.log10()).max(POWER_FLOOR_DB)
        })
        .collect()
}

/// Maps FFT bin index `k` (of `n` total bins) at `sample_rate_hz` to its
/// signed frequency in Hz, folding bins past Nyquist to negative
/// frequencies as `rustfft`'s unnormalized DFT orders them.
pub fn bin_frequency_hz(k: usize, n: usize, sample_rate_hz: u32) -> f64 {
    let k_signed = if k <= n / 2 { k as i64 } else { k as i64 - n as i64 };
    k_signed as f64 * sample_rate_hz as f64 / n as f64
}

/// Frequencies where power exceeds `peak - 3 dB`; bandwidth is the span
/// between the outermost such bins, mapped to Hz.
pub fn bandwidth_hz(spectrum_db: &[f64], sample_rate_hz: u32) -> f64 {
    let Some(peak) = spectrum_db.iter().cloned().fold(None, max_opt) else {
        return 0.0;
    };
    let threshold = peak - 3.0;
    let n = spectrum_db.len();
    let mut min_bin: Option<usize> = None;
    let mut max_bin: Option<usize> = None;
    for (i, &p) in spectrum_db.iter().enumerate() {
        if p >= threshold {
            min_bin = Some(min_bin.map_or(i, |m| m.min(i)));
            max_bin = Some(max_bin.map_or(i, |m| m.max(i)));
        }
    }
    match (min_bin, max_bin) {
        (Some(lo), Some(hi)) if n > 0 => {
            let f_lo = bin_frequency_hz(lo, n, sample_rate_hz);
            let f_hi = bin_frequency_hz(hi, n, sample_rate_hz);
            (f_hi - f_lo).abs()
        }
        _ => 0.0,
    }
}

/// Local maxima in `spectrum_db` at or above `peak - 10 dB`, with a
/// minimum bin separation of 10, returned as ascending absolute-value
/// frequencies in Hz.
pub fn peak_frequencies_hz(spectrum_db: &[f64], sample_rate_hz: u32) -> Vec<f64> {
    let n = spectrum_db.len();
    if n == 0 {
        return Vec::new();
    }
    let Some(peak) = spectrum_db.iter().cloned().fold(None, max_opt) else {
        return Vec::new();
    };
    let threshold = peak - 10.0;
    const MIN_SEPARATION: usize = 10;

    let mut candidates: Vec<usize> = Vec::new();
    for i in 0..n {
        if spectrum_db[i] < threshold {
            continue;
        }
        let prev = if i == 0 { spectrum_db[i] } else { spectrum_db[i - 1] };
        let next = if i + 1 == n { spectrum_db[i] } else { spectrum_db[i + 1] };
        if spectrum_db[i] >= prev && spectrum_db[i] >= next {
            candidates.push(i);
        }
    }

    let mut selected: Vec<usize> = Vec::new();
    for &c in &candidates {
        if selected
            .last()
            .map(|&last| c - last >= MIN_SEPARATION)
            .unwrap_or(true)
        {
            selected.push(c);
        }
    }

    let mut freqs: Vec<f64> = selected
        .into_iter()
        .map(|bin| bin_frequency_hz(bin, n, sample_rate_hz).abs())
        .collect();
    freqs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    freqs
}

fn max_opt(acc: Option<f64>, x: f64) -> Option<f64> {
    match acc {
        None => Some(x),
        Some(m) => Some(m.max(x)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_window_endpoints_are_zero() {
        let w = hann_window(8);
        assert!(w[0].abs() < 1e-9);
        assert!(w[7].abs() < 1e-9);
    }

    #[test]
    fn power_spectrum_length_matches_input() {
        let samples = vec![Complex64::new(1.0, 0.0); 64];
        let spectrum = power_spectrum_db(&samples);
        assert_eq!(spectrum.len(), 64);
    }

    #[test]
    fn empty_input_yields_empty_spectrum() {
        assert!(power_spectrum_db(&[]).is_empty());
    }

    #[test]
    fn bin_frequency_folds_past_nyquist() {
        assert_eq!(bin_frequency_hz(0, 8, 800), 0.0);
        assert_eq!(bin_frequency_hz(4, 8, 800), -400.0);
    }

    #[test]
    fn bandwidth_is_zero_for_empty_spectrum() {
        assert_eq!(bandwidth_hz(&[], 1000), 0.0);
    }

    #[test]
    fn peak_frequencies_are_ascending() {
        let mut spectrum = vec![-120.0; 128];
        spectrum[10] = 0.0;
        spectrum[60] = -1.0;
        let peaks = peak_frequencies_hz(&spectrum, 128_000);
        assert!(peaks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(peaks.len(), 2);
    }
}
