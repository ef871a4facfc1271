//! whisper-stream - a concurrent streaming front-end for whisper.cpp
//!
//! This crate wraps the whisper.cpp inference engine (via `whisper-rs`) with a
//! streaming orchestration layer so a live audio producer can push samples
//! continuously while receiving incremental results. It provides:
//!
//! - A synchronous [`WhisperModel`] for one-shot transcription
//! - A [`StreamingModel`] that accumulates audio, schedules background
//!   inference, and classifies results as partial or final
//! - Duration-bounded epoch flushing with monotonic chunk ids
//! - A bounded result queue with a dedicated callback delivery thread
//! - A process-wide log hook bridging native whisper.cpp/ggml logging
//!
//! # Example
//!
//! ```no_run
//! use whisper_stream::{StreamingConfig, StreamingModel};
//!
//! fn main() -> whisper_stream::Result<()> {
//!     let mut model = StreamingModel::new(
//!         "models/ggml-base.en.bin",
//!         false,
//!         StreamingConfig::default(),
//!     );
//!
//!     model.start(|record| {
//!         let marker = if record.is_partial { "partial" } else { "final" };
//!         println!("[chunk {} {}] {}", record.chunk_id, marker, record.text());
//!     })?;
//!
//!     // A live capture loop would call this repeatedly.
//!     let audio = vec![0.0f32; 16_000];
//!     model.queue_audio(&audio)?;
//!
//!     // Flushes any remaining audio and joins both background threads.
//!     model.stop()?;
//!     Ok(())
//! }
//! ```
//!
//! # Audio contract
//!
//! All entry points take mono `f32` samples in `[-1, 1]` at 16 kHz.
//! Resampling and downmixing are the caller's responsibility.

pub mod accumulator;
pub mod dispatcher;
pub mod engine;
pub mod logging;
pub mod model;
pub mod scheduler;
pub mod streaming;

pub use accumulator::ChunkId;
pub use dispatcher::ResultRecord;
pub use engine::{Segment, SpeechEngine, Token, WhisperEngine, WHISPER_SAMPLE_RATE};
pub use logging::{clear_log_callback, set_log_callback, LogHookForwarder, LogLevel};
pub use model::{load_model, WhisperModel};
pub use scheduler::FailurePolicy;
pub use streaming::{StreamingConfig, StreamingModel};

use std::path::PathBuf;
use thiserror::Error;

/// Log target for this crate's own records on the `log` facade.
pub(crate) const LOG_TARGET: &str = "whisper_stream";

/// Errors that can occur in the whisper-stream system.
#[derive(Error, Debug)]
pub enum Error {
    /// Model file missing/corrupt, or the requested accelerator is
    /// unavailable. No partial handle is ever returned.
    #[error("failed to load model {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// An inference pass failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The submitted samples violate the audio contract.
    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    /// An operation was called in a state that does not permit it.
    #[error("invalid lifecycle operation: {0}")]
    Lifecycle(&'static str),
}

/// Result type alias for whisper-stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "whisper-stream");
    }

    #[test]
    fn test_error_display() {
        let err = Error::Load {
            path: PathBuf::from("/missing/model.bin"),
            reason: "model file not found".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/missing/model.bin"));
        assert!(msg.contains("model file not found"));

        let err = Error::Lifecycle("queue_audio requires a running instance");
        assert!(err.to_string().contains("running instance"));
    }
}
