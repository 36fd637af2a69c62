//! Modulation classification and frequency-deviation estimation (§4.3),
//! from the differentiated unwrapped instantaneous phase.

use num_complex::Complex64;
use rf_sentinel_common::model::ModulationClass;

/// Unwraps a phase sequence so consecutive samples never jump by more
/// than π.
pub fn unwrap_phase(phase: &[f64]) -> Vec<f64> {
    if phase.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(phase.len());
    out.push(phase[0]);
    let mut offset = 0.0;
    for i in 1..phase.len() {
        let mut delta = phase[i] - phase[i - 1];
        while delta > std::f64::consts::PI {
            delta -= 2.0 * std::f64::consts::PI;
            offset -= 2.0 * std::f64::consts::PI;
        }
        while delta < -std::f64::consts::PI {
            delta += 2.0 * std::f64::consts::PI;
            offset += 2.0 * std::f64::consts::PI;
        }
        out.push(phase[i] + offset);
    }
    out
}

/// Instantaneous frequency in Hz: the derivative of unwrapped phase,
/// scaled by the sample rate.
pub fn instantaneous_frequency_hz(samples: &[Complex64], sample_rate_hz: u32) -> Vec<f64> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let phase: Vec<f64> = samples.iter().map(|s| s.arg()).collect();
    let unwrapped = unwrap_phase(&phase);
    unwrapped
        .windows(2)
        .map(|w| (w[1] - w[0]) * sample_rate_hz as f64 / (2.0 * std::f64::consts::PI))
        .collect()
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn stddev(xs: &[f64], mu: f64) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        (xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
    }
}

/// FSK if the instantaneous-frequency range exceeds 10 kHz and its
/// stddev exceeds 5 kHz; ASK if the stddev is below 1 kHz; Unknown
/// otherwise.
pub fn classify_modulation(f_inst: &[f64]) -> ModulationClass {
    if f_inst.is_empty() {
        return ModulationClass::Unknown;
    }
    let lo = f_inst.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = f_inst.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    let mu = mean(f_inst);
    let sigma = stddev(f_inst, mu);

    if range > 10_000.0 && sigma > 5_000.0 {
        ModulationClass::Fsk
    } else if sigma < 1_000.0 {
        ModulationClass::Ask
    } else {
        ModulationClass::Unknown
    }
}

/// Half the peak-to-peak of the mean-subtracted instantaneous frequency.
pub fn frequency_deviation_hz(f_inst: &[f64]) -> f64 {
    if f_inst.is_empty() {
        return 0.0;
    }
    let mu = mean(f_inst);
    let centered: Vec<f64> = f_inst.iter().map(|f| f - mu).collect();
    let lo = centered.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = centered.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (hi - lo).max(0.0) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_samples_yield_empty_frequency_series() {
        assert!(instantaneous_frequency_hz(&[], 1000).is_empty());
    }

    #[test]
    fn constant_phase_classifies_ask() {
        let f_inst = vec![0.0; 100];
        assert_eq!(classify_modulation(&f_inst), ModulationClass::Ask);
    }

    #[test]
    fn wide_swinging_frequency_classifies_fsk() {
        let mut f_inst = Vec::new();
        for i in 0..200 {
            f_inst.push(if i % 2 == 0 { 30_000.0 } else { -30_000.0 });
        }
        assert_eq!(classify_modulation(&f_inst), ModulationClass::Fsk);
    }

    #[test]
    fn deviation_is_non_negative() {
        let f_inst = vec![1000.0, -1000.0, 500.0, -500.0];
        assert!(frequency_deviation_hz(&f_inst) >= 0.0);
    }

    #[test]
    fn unwrap_removes_discontinuities() {
        let phase = vec![3.0, -3.0, 3.0, -3.0];
        let unwrapped = unwrap_phase(&phase);
        for w in unwrapped.windows(2) {
            assert!((w[1] - w[0]).abs() < std::f64::consts::PI + 1e-6);
        }
    }
}
