//! NFC-correlation annotation: a `nfc_detection` message from any
//! subscriber marks a pending tag read that the next broadcast event
//! within ±2 s is stamped with (§4.10). A single pending slot, last
//! writer wins; consumed by the first event that falls in its window.

use rf_sentinel_common::Timestamp;
use std::sync::Mutex;

const CORRELATION_WINDOW_S: f64 = 2.0;

struct PendingNfc {
    tag_id: Option<String>,
    received_at: Timestamp,
}

pub struct NfcCorrelator {
    pending: Mutex<Option<PendingNfc>>,
}

impl NfcCorrelator {
    pub fn new() -> Self {
        Self { pending: Mutex::new(None) }
    }

    pub fn record(&self, tag_id: Option<String>, now: Timestamp) {
        let mut guard = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(PendingNfc { tag_id, received_at: now });
    }

    /// Consumes the pending tag read if `now` falls within its window;
    /// drops it unconsumed if the window has already elapsed.
    pub fn correlate(&self, now: Timestamp) -> Option<Option<String>> {
        let mut guard = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let pending = guard.take()?;
        if pending.received_at.elapsed_since(&now).abs() <= CORRELATION_WINDOW_S {
            Some(pending.tag_id)
        } else {
            None
        }
    }
}

impl Default for NfcCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_sentinel_common::time::test_util::FixedClock;
    use rf_sentinel_common::Clock;

    #[test]
    fn correlates_within_window() {
        let clock = FixedClock::new(0.0);
        let correlator = NfcCorrelator::new();
        correlator.record(Some("tag-1".to_string()), clock.now());
        clock.advance(1.5);
        assert_eq!(correlator.correlate(clock.now()), Some(Some("tag-1".to_string())));
    }

    #[test]
    fn expires_outside_window() {
        let clock = FixedClock::new(0.0);
        let correlator = NfcCorrelator::new();
        correlator.record(None, clock.now());
        clock.advance(5.0);
        assert_eq!(correlator.correlate(clock.now()), None);
    }

    #[test]
    fn consumed_once() {
        let clock = FixedClock::new(0.0);
        let correlator = NfcCorrelator::new();
        correlator.record(Some("tag-2".to_string()), clock.now());
        assert!(correlator.correlate(clock.now()).is_some());
        assert_eq!(correlator.correlate(clock.now()), None);
    }
}
