//! The pipeline driver (T2, §5): C3 → C4 → {C5 write via C9} → C10-broadcast,
//! run on a single dedicated task so that C5's "observed state for frame N
//! includes all writes from frames < N" holds by construction — one task,
//! sequential `.await` points only at explicit boundaries, never interleaved
//! with another frame's pipeline run.

use rf_sentinel_common::config::SentinelConfig;
use rf_sentinel_common::model::IQFrame;
use rf_sentinel_common::{Clock, SystemClock};
use rf_sentinel_history::SignalHistory;
use rf_sentinel_subscriber::Publisher;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Runs one frame through C3/C4/C9/C10. A [`rf_sentinel_common::error::InvariantError`]
/// from C5's write path is fatal (§7): logged, `fatal` is raised, and the
/// loop returns so the orchestrator can bring the process down with exit
/// code 1.
async fn process_frame(
    frame: IQFrame,
    history: &SignalHistory,
    publisher: &Publisher,
    config: &SentinelConfig,
    clock: &dyn Clock,
    events_generated: &AtomicU64,
) -> Result<(), rf_sentinel_common::error::InvariantError> {
    let features = rf_sentinel_features::extract_features(&frame);
    let detections = rf_sentinel_classifier::classify(&features);

    for detection in detections {
        let now = clock.now();
        let event = rf_sentinel_arbiter::arbitrate(detection, history, config, now).await?;
        publisher.publish(&event).await;
        events_generated.fetch_add(1, Ordering::Relaxed);
    }
    Ok(())
}

/// Drives the per-frame pipeline until cancelled, the frame channel closes
/// (the transport task exited), or a fatal invariant violation is hit.
pub async fn run(
    mut frame_rx: mpsc::Receiver<IQFrame>,
    history: Arc<SignalHistory>,
    publisher: Publisher,
    config: SentinelConfig,
    cancel: CancellationToken,
    frames_processed: Arc<AtomicU64>,
    events_generated: Arc<AtomicU64>,
    fatal: Arc<AtomicBool>,
) {
    let clock = SystemClock;
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = frame_rx.recv() => match frame {
                Some(frame) => frame,
                None => return,
            },
        };

        if let Err(e) = process_frame(frame, &history, &publisher, &config, &clock, &events_generated).await {
            error!(error = %e, "signal history invariant violated, aborting pipeline");
            fatal.store(true, Ordering::SeqCst);
            cancel.cancel();
            return;
        }
        frames_processed.fetch_add(1, Ordering::Relaxed);
    }
}
