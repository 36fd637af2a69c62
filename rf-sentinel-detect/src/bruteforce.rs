//! C8: brute-force detection (§4.8). Rates over three nested windows
//! (30s/60s/300s) against per-threshold transmission counts, escalated by
//! rapid-burst and sustained-activity patterns, then reported alongside
//! recent-history signal consistency for forensic display.
//!
//! Grounded on
//! `examples/original_source/backend/rtl_sdr/brute_force_detector.py`.
//! That module's escalation logic applies a suspicious→moderate special
//! case and then a general one-level bump in sequence, which together let
//! a suspicious-level signal jump two levels to 'high' in one call — almost
//! certainly unintended. This port applies a single clean one-level bump
//! instead, matching "escalation rules apply in order, never demoting".

use rf_sentinel_common::config::BruteForceThresholds;
use rf_sentinel_common::model::{
    BruteForceAttackType, BruteForceEvidence, BruteForceLevel, Detection, DetectionKind,
    Indicator, SignalType, StatisticalSummary, ThreatEvidence, WindowStats,
};
use rf_sentinel_common::Timestamp;
use rf_sentinel_history::SignalHistory;

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn stddev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mu = mean(xs);
    (xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

fn rate_per_minute(count: usize, window_s: f64) -> f64 {
    if window_s <= 0.0 {
        0.0
    } else {
        count as f64 * 60.0 / window_s
    }
}

fn base_level_and_confidence(rate: f64, thresholds: &BruteForceThresholds) -> (BruteForceLevel, f64) {
    if rate >= thresholds.critical_rate_per_min {
        (BruteForceLevel::Critical, 0.9)
    } else if rate >= thresholds.high_rate_per_min {
        (BruteForceLevel::High, 0.8)
    } else if rate >= thresholds.moderate_rate_per_min {
        (BruteForceLevel::Moderate, 0.7)
    } else if rate >= thresholds.suspicious_rate_per_min {
        (BruteForceLevel::Suspicious, 0.6)
    } else {
        (BruteForceLevel::Benign, 0.0)
    }
}

fn bump_one_level(level: BruteForceLevel) -> BruteForceLevel {
    match level {
        BruteForceLevel::Benign => BruteForceLevel::Benign,
        BruteForceLevel::Suspicious => BruteForceLevel::Moderate,
        BruteForceLevel::Moderate => BruteForceLevel::High,
        BruteForceLevel::High => BruteForceLevel::Critical,
        BruteForceLevel::Critical => BruteForceLevel::Critical,
    }
}

fn recommended_actions(level: BruteForceLevel) -> Vec<String> {
    let actions: &[&str] = match level {
        BruteForceLevel::Benign => &[],
        BruteForceLevel::Suspicious => &[
            "Increase monitoring frequency for this frequency band",
            "Log all transmissions for forensic review",
        ],
        BruteForceLevel::Moderate => &[
            "Implement immediate rate limiting",
            "Alert security personnel",
            "Increase logging detail",
        ],
        BruteForceLevel::High => &[
            "Activate active countermeasures",
            "Notify vehicle owner immediately",
            "Consider temporary key fob lockout",
        ],
        BruteForceLevel::Critical => &[
            "EMERGENCY: Implement all countermeasures",
            "Isolate affected systems immediately",
            "Contact law enforcement if attack continues",
        ],
    };
    actions.iter().map(|s| s.to_string()).collect()
}

fn attack_type_for(
    rapid_burst_count: usize,
    sustained: bool,
    level: BruteForceLevel,
) -> BruteForceAttackType {
    if rapid_burst_count > 10 {
        BruteForceAttackType::RapidBurst
    } else if sustained {
        BruteForceAttackType::SustainedBruteForce
    } else if level >= BruteForceLevel::Moderate {
        BruteForceAttackType::Persistent
    } else {
        BruteForceAttackType::Unknown
    }
}

/// Checks the signal-type history for a brute-force verdict (§4.8).
/// `now` establishes the three rolling windows; history is filtered to
/// `detection.signal_type` since a brute-force attack targets one signal
/// type at a time.
pub fn detect_brute_force(
    detection: &Detection,
    history: &SignalHistory,
    thresholds: &BruteForceThresholds,
    now: Timestamp,
) -> Option<Indicator> {
    let short = history.recent_by_type(detection.signal_type, thresholds.short_window_s, now);
    let medium = history.recent_by_type(detection.signal_type, thresholds.medium_window_s, now);
    let long = history.recent_by_type(detection.signal_type, thresholds.long_window_s, now);

    // `recent_by_type` does not include `detection` itself (it has not yet
    // been written to history by the arbiter), so every window count is
    // "history plus the current frame".
    let short_count = short.len() + 1;
    let medium_count = medium.len() + 1;
    let long_count = long.len() + 1;

    let medium_rate = rate_per_minute(medium_count, thresholds.medium_window_s);
    let (mut level, mut confidence) = base_level_and_confidence(medium_rate, thresholds);
    if level == BruteForceLevel::Benign {
        return None;
    }

    let mut timestamps: Vec<f64> = medium.iter().map(|s| s.detection.timestamp_s).collect();
    timestamps.push(detection.timestamp_s);
    timestamps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();

    // "Signal consistency" (§4.8) doubles as the brute-force detector's
    // "pattern confidence": near-identical repeated transmissions across the
    // last up to 5 same-type entries are the signature of a scripted replay
    // sweep rather than independent legitimate presses.
    let signal_consistency = {
        let same_type = history.recent_by_type(detection.signal_type, thresholds.long_window_s, now);
        let recent_five: Vec<_> = same_type.iter().rev().take(5).collect();
        if recent_five.is_empty() {
            1.0
        } else {
            mean(&recent_five
                .iter()
                .map(|s| rf_sentinel_history::similarity(detection, &s.detection))
                .collect::<Vec<_>>())
        }
    };
    let pattern_confident = signal_consistency > 0.95;

    // Escalation rules, applied in order, never demoting (§4.8/§9 P6). The
    // base-"suspicious"-under-moderate-rate special case is subsumed by this
    // rule: it names the same condition (pattern confidence > 0.95) as the
    // gate for escalating a suspicious-but-below-moderate-rate signal.
    if pattern_confident {
        level = bump_one_level(level);
    }

    let rapid_burst_count = intervals.iter().filter(|d| **d < thresholds.rapid_burst_interval_s).count();
    if rapid_burst_count > 10 {
        confidence = (confidence + 0.2).min(1.0);
        if level == BruteForceLevel::Suspicious {
            level = bump_one_level(level);
        }
    }

    let sustained = long_count > 50 && thresholds.long_window_s >= thresholds.sustained_min_window_s;
    if sustained {
        confidence = (confidence + 0.1).min(1.0);
    }

    let window_stats = vec![
        WindowStats {
            window_s: thresholds.short_window_s,
            count: short_count,
            rate_per_minute: rate_per_minute(short_count, thresholds.short_window_s),
        },
        WindowStats {
            window_s: thresholds.medium_window_s,
            count: medium_count,
            rate_per_minute: medium_rate,
        },
        WindowStats {
            window_s: thresholds.long_window_s,
            count: long_count,
            rate_per_minute: rate_per_minute(long_count, thresholds.long_window_s),
        },
    ];

    let statistical_summary = StatisticalSummary {
        total_attempts: long_count,
        mean_interval_s: mean(&intervals),
        stddev_interval_s: stddev(&intervals),
        peak_rate_per_minute: window_stats.iter().map(|w| w.rate_per_minute).fold(0.0, f64::max),
    };

    let attack_type = attack_type_for(rapid_burst_count, sustained, level);

    let evidence = BruteForceEvidence {
        threat_level: level,
        attack_type,
        window_stats,
        statistical_summary,
        signal_consistency,
        recommended_actions: recommended_actions(level),
    };

    Some(Indicator {
        kind: DetectionKind::BruteForce,
        confidence,
        evidence: ThreatEvidence::BruteForce(evidence),
    })
}
