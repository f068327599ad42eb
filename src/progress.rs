//! Progress-callback trait for per-stage conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to follow a
//! conversion as it moves through the pipeline stages.
//!
//! # Why callbacks instead of channels?
//!
//! A callback keeps the library ignorant of how the host reports progress:
//! the CLI drives a terminal spinner, a server could forward events to a
//! log or a socket. The trait is `Send + Sync` because engine stages run on
//! a blocking worker thread, not the caller's task.
//!
//! # Example
//!
//! ```rust
//! use md2pdf::{ConversionConfig, ConversionProgressCallback, Phase};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     stages: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, phase: Phase, elapsed_ms: u64) {
//!         self.stages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{phase} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { stages: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::error::Phase;

/// Called by the conversion pipeline at stage boundaries.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages run strictly one after another, but not
/// necessarily on the same thread.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the request validated and before any stage runs.
    fn on_conversion_start(&self) {}

    fn on_stage_start(&self, phase: Phase) {
        let _ = phase;
    }

    /// # Arguments
    /// * `phase`      — the stage that finished
    /// * `elapsed_ms` — wall-clock time the stage took
    fn on_stage_complete(&self, phase: Phase, elapsed_ms: u64) {
        let _ = (phase, elapsed_ms);
    }

    /// Called once with the absolute path of the written PDF.
    fn on_conversion_complete(&self, path: &Path) {
        let _ = path;
    }

    /// Called once when a stage fails; no further events follow.
    fn on_conversion_error(&self, phase: Phase, error: &str) {
        let _ = (phase, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for RecordingCallback {
        fn on_stage_start(&self, phase: Phase) {
            self.events.lock().unwrap().push(format!("start:{phase}"));
        }

        fn on_stage_complete(&self, phase: Phase, _elapsed_ms: u64) {
            self.events.lock().unwrap().push(format!("done:{phase}"));
        }

        fn on_conversion_error(&self, phase: Phase, error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error:{phase}:{error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start();
        cb.on_stage_start(Phase::Transform);
        cb.on_stage_complete(Phase::Transform, 3);
        cb.on_conversion_error(Phase::Load, "timeout");
        cb.on_conversion_complete(Path::new("/tmp/out.pdf"));
    }

    #[test]
    fn recording_callback_sees_events_in_order() {
        let cb = RecordingCallback::default();
        cb.on_stage_start(Phase::Transform);
        cb.on_stage_complete(Phase::Transform, 1);
        cb.on_stage_start(Phase::Stabilize);
        cb.on_conversion_error(Phase::Stabilize, "bad diagram");

        let events = cb.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "start:transform",
                "done:transform",
                "start:stabilize",
                "error:stabilize:bad diagram"
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Phase::Export);
    }
}
