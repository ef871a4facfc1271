//! Synchronous one-shot transcription API.

use std::path::Path;

use crate::engine::{Segment, SpeechEngine, WhisperEngine};
use crate::Result;

/// Load a ggml whisper model for synchronous transcription.
pub fn load_model(path: impl AsRef<Path>, use_accelerator: bool) -> Result<WhisperModel> {
    Ok(WhisperModel {
        engine: WhisperEngine::load(path.as_ref(), use_accelerator)?,
    })
}

/// A synchronous model. `transcribe` takes `&mut self` because one handle
/// cannot run concurrent inference calls; independent instances are fully
/// isolated from each other.
#[derive(Debug)]
pub struct WhisperModel {
    engine: WhisperEngine,
}

impl WhisperModel {
    /// Transcribe a complete buffer of mono 16 kHz samples. An empty buffer
    /// returns an empty segment list, never an error.
    pub fn transcribe(&mut self, samples: &[f32]) -> Result<Vec<Segment>> {
        self.engine.transcribe(samples)
    }

    /// Transcribe and join the segment texts with single spaces.
    pub fn transcribe_text(&mut self, samples: &[f32]) -> Result<String> {
        let segments = self.transcribe(samples)?;
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(text)
    }
}
