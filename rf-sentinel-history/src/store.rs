//! C5: the bounded, time-windowed signal history store.

use crate::similarity::similarity;
use rf_sentinel_common::error::InvariantError;
use rf_sentinel_common::model::{Detection, SignalType, StoredSignal};
use rf_sentinel_common::Timestamp;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::error;

pub struct SignalHistory {
    entries: RwLock<VecDeque<StoredSignal>>,
    max_entries: usize,
    max_age_s: f64,
    last_insertion: RwLock<Option<Timestamp>>,
    next_id: AtomicU64,
}

impl SignalHistory {
    pub fn new(max_entries: usize, max_age_s: f64) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries,
            max_age_s,
            last_insertion: RwLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Appends `detection`, then evicts by age (oldest-first) and by
    /// cardinality (oldest-first). Returns an [`InvariantError`] if the
    /// insertion timestamp goes backwards or capacity is breached after
    /// eviction — both indicate a code defect, not bad data (§7), and the
    /// orchestrator treats them as fatal.
    pub fn add(&self, detection: Detection, now: Timestamp) -> Result<u64, InvariantError> {
        {
            let mut last = self.last_insertion.write().unwrap_or_else(|e| e.into_inner());
            if let Some(prev) = *last {
                if now.unix_seconds < prev.unix_seconds {
                    error!("signal history insertion timestamp went backwards");
                    return Err(InvariantError::NonMonotoneInsertion);
                }
            }
            *last = Some(now);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push_back(StoredSignal {
            id,
            detection,
            insertion_ts: now,
        });

        while let Some(front) = entries.front() {
            if front.insertion_ts.elapsed_since(&now) > self.max_age_s {
                entries.pop_front();
            } else {
                break;
            }
        }
        while entries.len() > self.max_entries {
            entries.pop_front();
        }

        if entries.len() > self.max_entries {
            return Err(InvariantError::CapacityBreach(entries.len(), self.max_entries));
        }
        Ok(id)
    }

    fn snapshot(&self) -> Vec<StoredSignal> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Entries with `now - insertion_ts <= window_s`.
    pub fn recent(&self, window_s: f64, now: Timestamp) -> Vec<StoredSignal> {
        self.snapshot()
            .into_iter()
            .filter(|s| s.insertion_ts.elapsed_since(&now) <= window_s)
            .collect()
    }

    /// As [`Self::recent`], filtered to `signal_type`.
    pub fn recent_by_type(&self, signal_type: SignalType, window_s: f64, now: Timestamp) -> Vec<StoredSignal> {
        self.recent(window_s, now)
            .into_iter()
            .filter(|s| s.detection.signal_type == signal_type)
            .collect()
    }

    /// Sequential scan over `recent(window_s)` returning entries whose
    /// similarity to `detection` meets `threshold`.
    pub fn find_similar(&self, detection: &Detection, threshold: f64, window_s: f64, now: Timestamp) -> Vec<StoredSignal> {
        self.recent(window_s, now)
            .into_iter()
            .filter(|s| similarity(detection, &s.detection) >= threshold)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
