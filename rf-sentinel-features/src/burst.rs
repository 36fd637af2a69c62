//! Burst detection (§4.3): moving-average power smoothing, adaptive
//! thresholding, and clustering of above-threshold indices into bursts.

/// A run of contiguous above-threshold samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Burst {
    pub start_index: usize,
    pub end_index: usize,
}

fn moving_average(power: &[f64], window: usize) -> Vec<f64> {
    let n = power.len();
    if n == 0 {
        return Vec::new();
    }
    let w = window.max(1);
    let mut out = Vec::with_capacity(n);
    let mut sum = 0.0;
    for i in 0..n {
        sum += power[i];
        if i >= w {
            sum -= power[i - w];
        }
        let count = (i + 1).min(w) as f64;
        out.push(sum / count);
    }
    out
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

/// Detects bursts in one frame's instantaneous power series.
///
/// Window is `max(1, floor(sample_rate*0.001))`, clamped below the frame
/// length. Threshold is `mean + 2*stddev` normally, or
/// `mean + max(stddev, 0.5*mean)` when the envelope is near-constant
/// (`stddev < 0.1*mean`). A gap larger than
/// `max(window, floor(sample_rate*0.005))` samples starts a new burst.
pub fn detect_bursts(power: &[f64], sample_rate_hz: u32) -> Vec<Burst> {
    let n = power.len();
    if n == 0 {
        return Vec::new();
    }

    let window = ((sample_rate_hz as f64 * 0.001).floor() as usize)
        .max(1)
        .min(n.saturating_sub(1).max(1));
    let smoothed = moving_average(power, window);

    let mu = mean(&smoothed);
    let sigma = stddev(&smoothed, mu);
    let threshold = if sigma < 0.1 * mu {
        mu + sigma.max(0.5 * mu)
    } else {
        mu + 2.0 * sigma
    };

    let gap_limit = window.max((sample_rate_hz as f64 * 0.005).floor() as usize);

    let mut bursts: Vec<Burst> = Vec::new();
    let mut current: Option<Burst> = None;

    for (i, &v) in smoothed.iter().enumerate() {
        if v > threshold {
            match &mut current {
                Some(b) => b.end_index = i,
                None => current = Some(Burst { start_index: i, end_index: i }),
            }
        } else if let Some(b) = current {
            bursts.push(b);
            current = None;
        }
    }
    if let Some(b) = current {
        bursts.push(b);
    }

    merge_close_bursts(bursts, gap_limit)
}

fn merge_close_bursts(bursts: Vec<Burst>, gap_limit: usize) -> Vec<Burst> {
    if bursts.is_empty() {
        return bursts;
    }
    let mut merged: Vec<Burst> = vec![bursts[0]];
    for b in bursts.into_iter().skip(1) {
        let last = merged.last_mut().expect("merged is non-empty by construction");
        if b.start_index.saturating_sub(last.end_index) <= gap_limit {
            last.end_index = b.end_index;
        } else {
            merged.push(b);
        }
    }
    merged
}

/// Burst start times in seconds, derived from `sample_rate_hz`.
pub fn burst_start_times_s(bursts: &[Burst], sample_rate_hz: u32) -> Vec<f64> {
    bursts
        .iter()
        .map(|b| b.start_index as f64 / sample_rate_hz as f64)
        .collect()
}

/// Inter-burst intervals, derived from consecutive start times.
/// Invariant (P2): `len() == max(0, start_times.len() - 1)`.
pub fn inter_burst_intervals_s(start_times: &[f64]) -> Vec<f64> {
    if start_times.len() < 2 {
        return Vec::new();
    }
    start_times.windows(2).map(|w| w[1] - w[0]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_power_yields_no_bursts() {
        assert!(detect_bursts(&[], 1000).is_empty());
    }

    #[test]
    fn flat_power_yields_no_bursts() {
        let power = vec![1.0; 1000];
        assert!(detect_bursts(&power, 1000).is_empty());
    }

    #[test]
    fn single_spike_is_one_burst() {
        let mut power = vec![0.01; 1000];
        for p in power.iter_mut().skip(400).take(50) {
            *p = 10.0;
        }
        let bursts = detect_bursts(&power, 1000);
        assert_eq!(bursts.len(), 1);
    }

    #[test]
    fn interval_count_matches_invariant_p2() {
        let starts = vec![0.0, 0.015, 0.030, 0.045];
        let intervals = inter_burst_intervals_s(&starts);
        assert_eq!(intervals.len(), starts.len() - 1);
        assert!(intervals.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn zero_or_one_starts_yield_empty_intervals() {
        assert!(inter_burst_intervals_s(&[]).is_empty());
        assert!(inter_burst_intervals_s(&[1.0]).is_empty());
    }
}
