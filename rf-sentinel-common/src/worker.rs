//! Generic worker lifecycle, shared by every long-running component the
//! orchestrator (C11) owns: the SDR transport, the pipeline driver, and the
//! subscriber accept loop.

use async_trait::async_trait;

/// A component that runs a cooperative loop until cancelled.
///
/// `run` is expected to loop internally, reacting to a cancellation signal
/// at its own suspension points; the orchestrator races it against a
/// [`tokio_util::sync::CancellationToken`] rather than calling it
/// repeatedly.
#[async_trait]
pub trait Worker {
    /// Main worker loop. Returns once cancelled or once it exits on its own
    /// (a fatal, unrecoverable condition).
    async fn run(&mut self);

    /// Hook called once before `run`, to do any work that must happen
    /// before the loop starts (e.g. an initial connect).
    async fn initial_trigger(&mut self) {}

    /// Hook called when the orchestrator is shutting down, before the
    /// worker's task is joined. Used to flush in-flight state.
    fn shutdown(&mut self) {}
}

#[async_trait]
impl Worker for Box<dyn Worker + Send + Sync> {
    async fn run(&mut self) {
        (**self).run().await
    }

    async fn initial_trigger(&mut self) {
        (**self).initial_trigger().await
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
