//! Configuration surface accepted from the orchestrator's caller (§6):
//! SDR tuning, subscriber port, mock mode, history limits, and every
//! detector threshold.

use crate::error::ConfigError;

/// Gain setting for the SDR: a fixed value in tenths of a dB, or automatic
/// gain control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gain {
    TenthsDb(i32),
    Auto,
}

/// Per-window rate thresholds and window sizes for the brute-force
/// detector (C8). Exposed as configuration per §9's open question rather
/// than hard-coded, with the values from the reference implementation as
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BruteForceThresholds {
    pub short_window_s: f64,
    pub medium_window_s: f64,
    pub long_window_s: f64,
    pub suspicious_rate_per_min: f64,
    pub moderate_rate_per_min: f64,
    pub high_rate_per_min: f64,
    pub critical_rate_per_min: f64,
    pub rapid_burst_interval_s: f64,
    pub sustained_min_window_s: f64,
}

impl Default for BruteForceThresholds {
    fn default() -> Self {
        Self {
            short_window_s: 30.0,
            medium_window_s: 60.0,
            long_window_s: 300.0,
            suspicious_rate_per_min: 5.0,
            moderate_rate_per_min: 10.0,
            high_rate_per_min: 20.0,
            critical_rate_per_min: 40.0,
            rapid_burst_interval_s: 2.0,
            sustained_min_window_s: 120.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentinelConfig {
    pub sdr_host: String,
    pub sdr_port: u16,
    pub center_frequency_hz: u64,
    pub sample_rate_hz: u32,
    pub gain: Gain,
    pub subscriber_port: u16,
    pub mock_mode: bool,

    pub history_window_s: f64,
    pub history_max_entries: usize,

    pub jamming_noise_threshold_db: f64,
    pub jamming_interference_threshold: f64,

    pub replay_similarity_threshold: f64,
    pub replay_max_time_window_s: f64,

    pub brute_force: BruteForceThresholds,

    pub subscriber_queue_capacity: usize,
    pub heartbeat_interval_s: f64,
    pub heartbeat_timeout_s: f64,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            sdr_host: "127.0.0.1".to_string(),
            sdr_port: 1234,
            center_frequency_hz: 433_920_000,
            sample_rate_hz: 2_048_000,
            gain: Gain::Auto,
            subscriber_port: 8888,
            mock_mode: false,
            history_window_s: 300.0,
            history_max_entries: 1000,
            jamming_noise_threshold_db: 10.0,
            jamming_interference_threshold: 0.8,
            replay_similarity_threshold: 0.95,
            replay_max_time_window_s: 300.0,
            brute_force: BruteForceThresholds::default(),
            subscriber_queue_capacity: 256,
            heartbeat_interval_s: 30.0,
            heartbeat_timeout_s: 60.0,
        }
    }
}

/// The two ISM bands this monitor is built for. A configured center
/// frequency must fall within a `SUPPORTED_BAND_TOLERANCE_HZ` window of one
/// of these.
const SUPPORTED_BANDS_HZ: [u64; 2] = [315_000_000, 433_920_000];
const SUPPORTED_BAND_TOLERANCE_HZ: u64 = 1_000_000;

/// Builds a [`SentinelConfig`], validating on [`build`](Self::build).
/// Mirrors the `set_*(&mut self, ...) -> &mut Self` builder shape used
/// elsewhere in this codebase for multi-field configuration objects.
#[derive(Debug, Default)]
pub struct SentinelConfigBuilder {
    config: SentinelConfig,
}

impl SentinelConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SentinelConfig::default(),
        }
    }

    pub fn set_sdr_host(&mut self, host: impl Into<String>) -> &mut Self {
        self.config.sdr_host = host.into();
        self
    }

    pub fn set_sdr_port(&mut self, port: u16) -> &mut Self {
        self.config.sdr_port = port;
        self
    }

    pub fn set_center_frequency_hz(&mut self, hz: u64) -> &mut Self {
        self.config.center_frequency_hz = hz;
        self
    }

    pub fn set_sample_rate_hz(&mut self, hz: u32) -> &mut Self {
        self.config.sample_rate_hz = hz;
        self
    }

    pub fn set_gain(&mut self, gain: Gain) -> &mut Self {
        self.config.gain = gain;
        self
    }

    pub fn set_subscriber_port(&mut self, port: u16) -> &mut Self {
        self.config.subscriber_port = port;
        self
    }

    pub fn set_mock_mode(&mut self, mock: bool) -> &mut Self {
        self.config.mock_mode = mock;
        self
    }

    pub fn set_history_window_s(&mut self, secs: f64) -> &mut Self {
        self.config.history_window_s = secs;
        self
    }

    pub fn set_history_max_entries(&mut self, n: usize) -> &mut Self {
        self.config.history_max_entries = n;
        self
    }

    pub fn set_jamming_noise_threshold_db(&mut self, db: f64) -> &mut Self {
        self.config.jamming_noise_threshold_db = db;
        self
    }

    pub fn set_jamming_interference_threshold(&mut self, t: f64) -> &mut Self {
        self.config.jamming_interference_threshold = t;
        self
    }

    pub fn set_replay_similarity_threshold(&mut self, t: f64) -> &mut Self {
        self.config.replay_similarity_threshold = t;
        self
    }

    pub fn set_replay_max_time_window_s(&mut self, secs: f64) -> &mut Self {
        self.config.replay_max_time_window_s = secs;
        self
    }

    pub fn set_brute_force_thresholds(&mut self, thresholds: BruteForceThresholds) -> &mut Self {
        self.config.brute_force = thresholds;
        self
    }

    pub fn set_subscriber_queue_capacity(&mut self, capacity: usize) -> &mut Self {
        self.config.subscriber_queue_capacity = capacity;
        self
    }

    pub fn set_heartbeat_interval_s(&mut self, secs: f64) -> &mut Self {
        self.config.heartbeat_interval_s = secs;
        self
    }

    pub fn set_heartbeat_timeout_s(&mut self, secs: f64) -> &mut Self {
        self.config.heartbeat_timeout_s = secs;
        self
    }

    pub fn build(&self) -> Result<SentinelConfig, ConfigError> {
        let cfg = self.config.clone();

        let in_band = SUPPORTED_BANDS_HZ.iter().any(|band| {
            cfg.center_frequency_hz.abs_diff(*band) <= SUPPORTED_BAND_TOLERANCE_HZ
        });
        if !in_band {
            return Err(ConfigError::UnsupportedFrequency(cfg.center_frequency_hz));
        }
        if cfg.sample_rate_hz == 0 {
            return Err(ConfigError::InvalidSampleRate(cfg.sample_rate_hz));
        }
        if let Gain::TenthsDb(db) = cfg.gain {
            if !(0..=500).contains(&db) {
                return Err(ConfigError::InvalidGain(format!("{db} (tenths of dB)")));
            }
        }
        if cfg.subscriber_port == 0 {
            return Err(ConfigError::InvalidPort(cfg.subscriber_port));
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_successfully() {
        let cfg = SentinelConfigBuilder::new().build().expect("defaults are valid");
        assert_eq!(cfg.center_frequency_hz, 433_920_000);
    }

    #[test]
    fn rejects_unsupported_frequency() {
        let err = SentinelConfigBuilder::new()
            .set_center_frequency_hz(900_000_000)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFrequency(_)));
    }

    #[test]
    fn accepts_315_mhz_band() {
        let cfg = SentinelConfigBuilder::new()
            .set_center_frequency_hz(315_000_000)
            .build()
            .expect("315 MHz is a supported band");
        assert_eq!(cfg.center_frequency_hz, 315_000_000);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let err = SentinelConfigBuilder::new()
            .set_sample_rate_hz(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSampleRate(0)));
    }

    #[test]
    fn rejects_out_of_range_gain() {
        let err = SentinelConfigBuilder::new()
            .set_gain(Gain::TenthsDb(1000))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGain(_)));
    }

    #[test]
    fn custom_subscriber_and_heartbeat_settings_propagate() {
        let cfg = SentinelConfigBuilder::new()
            .set_subscriber_queue_capacity(64)
            .set_heartbeat_interval_s(5.0)
            .set_heartbeat_timeout_s(15.0)
            .build()
            .expect("valid config");
        assert_eq!(cfg.subscriber_queue_capacity, 64);
        assert_eq!(cfg.heartbeat_interval_s, 5.0);
        assert_eq!(cfg.heartbeat_timeout_s, 15.0);
    }

    #[test]
    fn rejects_zero_port() {
        let err = SentinelConfigBuilder::new()
            .set_subscriber_port(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(0)));
    }
}
