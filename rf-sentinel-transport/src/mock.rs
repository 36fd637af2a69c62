//! Synthetic frame source used in mock mode (§4.11) and for end-to-end
//! tests: the only legitimate way to run the core without SDR hardware.
//! Produces the same [`IQFrame`] shape C1+C2 would, over the same channel.

use async_trait::async_trait;
use num_complex::Complex64;
use rf_sentinel_common::model::IQFrame;
use rf_sentinel_common::worker::Worker;
use rf_sentinel_common::{Clock, SystemClock};
use std::f64::consts::PI;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Parameters of one synthetic FSK burst train, matching the "benign
/// key-fob" shape used in end-to-end scenario 1.
#[derive(Debug, Clone)]
pub struct BurstTrainSpec {
    pub burst_count: usize,
    pub burst_spacing_s: f64,
    pub burst_duration_s: f64,
    pub deviation_hz: f64,
    pub tone_freq_hz: f64,
    pub amplitude: f64,
    pub noise_floor_amplitude: f64,
}

impl Default for BurstTrainSpec {
    fn default() -> Self {
        Self {
            burst_count: 4,
            burst_spacing_s: 0.015,
            burst_duration_s: 0.004,
            deviation_hz: 30_000.0,
            tone_freq_hz: 20_000.0,
            amplitude: 1.0,
            noise_floor_amplitude: 0.02,
        }
    }
}

/// Renders `spec` into one frame's worth of complex baseband samples at
/// `sample_rate_hz`.
pub fn render_burst_train(spec: &BurstTrainSpec, sample_rate_hz: u32) -> Vec<Complex64> {
    let total_duration_s =
        spec.burst_count as f64 * spec.burst_spacing_s + spec.burst_duration_s * 2.0;
    let n = (total_duration_s * sample_rate_hz as f64).ceil() as usize;
    let mut samples = Vec::with_capacity(n);
    let mut phase = 0.0f64;
    let dt = 1.0 / sample_rate_hz as f64;

    for i in 0..n {
        let t = i as f64 * dt;
        let mut in_burst = false;
        for b in 0..spec.burst_count {
            let start = b as f64 * spec.burst_spacing_s;
            if t >= start && t < start + spec.burst_duration_s {
                in_burst = true;
                break;
            }
        }

        let (amp, inst_freq) = if in_burst {
            let bit = (t / (spec.burst_duration_s / 2.0)) as u64 % 2;
            let f = if bit == 0 {
                spec.tone_freq_hz + spec.deviation_hz
            } else {
                spec.tone_freq_hz - spec.deviation_hz
            };
            (spec.amplitude, f)
        } else {
            (spec.noise_floor_amplitude, spec.tone_freq_hz)
        };

        phase += 2.0 * PI * inst_freq * dt;
        samples.push(Complex64::from_polar(amp, phase));
    }
    samples
}

/// A [`Worker`] that periodically renders a [`BurstTrainSpec`] and pushes
/// it as an [`IQFrame`] to the pipeline driver, standing in for C1+C2.
pub struct MockFrameSource {
    spec: BurstTrainSpec,
    center_frequency_hz: u64,
    sample_rate_hz: u32,
    period_s: f64,
    sender: mpsc::Sender<IQFrame>,
    cancel: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl MockFrameSource {
    pub fn new(
        spec: BurstTrainSpec,
        center_frequency_hz: u64,
        sample_rate_hz: u32,
        period_s: f64,
        sender: mpsc::Sender<IQFrame>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            spec,
            center_frequency_hz,
            sample_rate_hz,
            period_s,
            sender,
            cancel,
            clock: Arc::new(SystemClock),
        }
    }
}

#[async_trait]
impl Worker for MockFrameSource {
    async fn run(&mut self) {
        loop {
            let samples = render_burst_train(&self.spec, self.sample_rate_hz);
            let frame = IQFrame {
                samples,
                center_frequency_hz: self.center_frequency_hz,
                sample_rate_hz: self.sample_rate_hz,
                timestamp: self.clock.now(),
            };
            if self.sender.try_send(frame).is_err() {
                tracing::debug!("pipeline backpressured, dropping synthetic frame");
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(std::time::Duration::from_secs_f64(self.period_s)) => {}
            }
        }
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nonempty_burst_train() {
        let spec = BurstTrainSpec::default();
        let samples = render_burst_train(&spec, 2_048_000);
        assert!(!samples.is_empty());
    }

    #[test]
    fn burst_windows_are_louder_than_gaps() {
        let spec = BurstTrainSpec::default();
        let sample_rate = 2_048_000u32;
        let samples = render_burst_train(&spec, sample_rate);
        let dt = 1.0 / sample_rate as f64;

        let mid_first_burst = (spec.burst_duration_s / 2.0 / dt) as usize;
        let mid_gap = ((spec.burst_duration_s + spec.burst_spacing_s / 2.0) / dt) as usize;

        assert!(samples[mid_first_burst].norm() > samples[mid_gap].norm());
    }
}
