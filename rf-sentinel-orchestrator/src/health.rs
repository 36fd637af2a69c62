//! The health snapshot exposed by [`crate::Orchestrator::health`] (§4.11):
//! component statuses, uptime, running counts, and a ready/degraded/mock
//! flag for whatever surfaces the orchestrator to an operator.

use std::time::Duration;

/// Status of one owned component, as last observed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatus {
    /// Running normally.
    Up,
    /// Running in a degraded mode the orchestrator can tolerate (e.g. the
    /// SDR transport reconnecting).
    Degraded,
    /// Not running (init failed, or shut down).
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Degraded,
}

/// A point-in-time view of the running system, built fresh on each call
/// to [`crate::Orchestrator::health`] rather than maintained incrementally.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub transport_status: ComponentStatus,
    pub subscriber_server_status: ComponentStatus,
    pub uptime: Duration,
    pub frames_processed: u64,
    pub events_generated: u64,
    pub active_subscribers: usize,
    pub readiness: Readiness,
    pub mock_mode: bool,
}
