//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as a request moves through the pipeline: one start/complete pair per
//! conversion, one event per stage, and per-chunk events during speech
//! synthesis.
//!
//! # Example
//!
//! ```rust
//! use braillebridge::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ChunkCounter {
//!     done: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for ChunkCounter {
//!     fn on_chunk_complete(&self, index: usize, total: usize, audio_len: usize) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("chunk {} ({}/{}) → {} bytes", index, n, total, audio_len);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(ChunkCounter { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::model::ArtifactKind;
use std::fmt;
use std::sync::Arc;

/// Pipeline stage reported through [`ConversionProgressCallback::on_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Extract,
    Translate,
    Synthesize,
    Store,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetch => "fetching source",
            Stage::Extract => "extracting text",
            Stage::Translate => "translating to Braille",
            Stage::Synthesize => "synthesizing speech",
            Stage::Store => "storing artifact",
        };
        f.write_str(s)
    }
}

/// Called by the pipeline as a conversion progresses.
///
/// Implementations must be `Send + Sync`: chunk events fire from concurrent
/// tasks. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once when a conversion request starts.
    fn on_conversion_start(&self, document_id: &str, kind: ArtifactKind) {
        let _ = (document_id, kind);
    }

    /// Called when the request enters a new stage.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called just before a chunk is sent to the speech provider.
    ///
    /// `index` is 0-based; `total` is the number of chunks.
    fn on_chunk_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a chunk's audio has been received.
    fn on_chunk_complete(&self, index: usize, total: usize, audio_len: usize) {
        let _ = (index, total, audio_len);
    }

    /// Called when a chunk fails. The conversion fails with it.
    fn on_chunk_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after the artifact is linked to its document.
    fn on_conversion_complete(&self, document_id: &str, kind: ArtifactKind) {
        let _ = (document_id, kind);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        chunk_starts: AtomicUsize,
        chunk_completes: AtomicUsize,
        chunk_errors: AtomicUsize,
        stages: Mutex<Vec<Stage>>,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_chunk_start(&self, _index: usize, _total: usize) {
            self.chunk_starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_complete(&self, _index: usize, _total: usize, _audio_len: usize) {
            self.chunk_completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_error(&self, _index: usize, _total: usize, _error: &str) {
            self.chunk_errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start("doc", ArtifactKind::Speech);
        cb.on_stage(Stage::Fetch);
        cb.on_chunk_start(0, 2);
        cb.on_chunk_complete(0, 2, 4096);
        cb.on_chunk_error(1, 2, "HTTP 500");
        cb.on_conversion_complete("doc", ArtifactKind::Speech);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_stage(Stage::Extract);
        tracker.on_stage(Stage::Synthesize);
        tracker.on_chunk_start(0, 2);
        tracker.on_chunk_complete(0, 2, 100);
        tracker.on_chunk_start(1, 2);
        tracker.on_chunk_error(1, 2, "timeout");

        assert_eq!(tracker.chunk_starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.chunk_completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.chunk_errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Extract, Stage::Synthesize]
        );
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Translate.to_string(), "translating to Braille");
    }
}
