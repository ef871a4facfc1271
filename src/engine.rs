//! whisper.cpp engine adapter via the whisper-rs crate.

use std::path::Path;

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::logging::{self, LogLevel};
use crate::{Error, Result, LOG_TARGET};

/// Sample rate the engine expects. All audio handed to this crate must
/// already be mono f32 at this rate.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// One decoded token with whisper's centisecond timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub id: i32,
    /// Token probability as reported by the decoder.
    pub probability: f32,
    pub start: i64,
    pub end: i64,
    pub text: String,
}

/// One contiguous transcribed span. `start`/`end` are whisper timestamps in
/// centiseconds from the beginning of the submitted buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: i64,
    pub end: i64,
    pub text: String,
    pub tokens: Vec<Token>,
}

impl Segment {
    pub fn start_secs(&self) -> f32 {
        self.start as f32 / 100.0
    }

    pub fn end_secs(&self) -> f32 {
        self.end as f32 / 100.0
    }
}

/// Seam between the streaming scheduler and the inference engine.
///
/// `transcribe` takes `&mut self`: one handle never runs concurrent
/// inference calls, and the compiler enforces it. Empty input returns an
/// empty segment list, never an error.
pub trait SpeechEngine: Send {
    fn transcribe(&mut self, samples: &[f32]) -> Result<Vec<Segment>>;
}

/// Exclusively owned whisper.cpp model handle. Freed on drop.
pub struct WhisperEngine {
    ctx: WhisperContext,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine").finish_non_exhaustive()
    }
}

impl WhisperEngine {
    /// Load a ggml model from `path`. `use_accelerator` requests the GPU
    /// backend compiled into whisper.cpp; loading fails if the model file is
    /// missing or corrupt, or the accelerator cannot be initialized.
    pub fn load(path: &Path, use_accelerator: bool) -> Result<Self> {
        logging::install_native_hooks();

        let path_str = path.to_str().ok_or_else(|| Error::Load {
            path: path.to_path_buf(),
            reason: "non-UTF-8 model path".into(),
        })?;
        if !path.is_file() {
            return Err(Error::Load {
                path: path.to_path_buf(),
                reason: "model file not found".into(),
            });
        }

        let mut params = WhisperContextParameters::default();
        params.use_gpu(use_accelerator);

        let ctx = WhisperContext::new_with_params(path_str, params).map_err(|e| Error::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        log::info!(
            target: LOG_TARGET,
            "loaded whisper model from {} (accelerator: {})",
            path.display(),
            use_accelerator
        );
        logging::emit(
            LogLevel::Info,
            &format!("loaded model {}", path.display()),
        );

        Ok(Self { ctx })
    }
}

impl SpeechEngine for WhisperEngine {
    fn transcribe(&mut self, samples: &[f32]) -> Result<Vec<Segment>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        validate_samples(samples)?;

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| Error::Inference(format!("failed to create state: {}", e)))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(4);
        params.set_translate(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_token_timestamps(true);

        state
            .full(params, samples)
            .map_err(|e| Error::Inference(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| Error::Inference(e.to_string()))?;

        let mut segments = Vec::with_capacity(n_segments as usize);
        for i in 0..n_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| Error::Inference(e.to_string()))?;
            let start = state
                .full_get_segment_t0(i)
                .map_err(|e| Error::Inference(e.to_string()))?;
            let end = state
                .full_get_segment_t1(i)
                .map_err(|e| Error::Inference(e.to_string()))?;

            let n_tokens = state
                .full_n_tokens(i)
                .map_err(|e| Error::Inference(e.to_string()))?;
            let mut tokens = Vec::with_capacity(n_tokens as usize);
            for j in 0..n_tokens {
                let data = state
                    .full_get_token_data(i, j)
                    .map_err(|e| Error::Inference(e.to_string()))?;
                let token_text = self
                    .ctx
                    .token_to_str(data.id)
                    .map_err(|e| Error::Inference(e.to_string()))?
                    .to_string();
                tokens.push(Token {
                    id: data.id,
                    probability: data.p,
                    start: data.t0,
                    end: data.t1,
                    text: token_text,
                });
            }

            segments.push(Segment {
                start,
                end,
                text,
                tokens,
            });
        }

        Ok(segments)
    }
}

/// Reject samples that violate the audio contract. Sample width and channel
/// count are already fixed by the `&[f32]` mono API; the remaining runtime
/// hazard is non-finite values, which whisper.cpp does not tolerate.
pub(crate) fn validate_samples(samples: &[f32]) -> Result<()> {
    if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
        return Err(Error::InvalidAudio(format!(
            "non-finite sample at index {}",
            pos
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_normal_audio() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0, -1.0];
        assert!(validate_samples(&samples).is_ok());
    }

    #[test]
    fn test_validate_accepts_empty_audio() {
        assert!(validate_samples(&[]).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_samples() {
        let samples = vec![0.0f32, f32::NAN, 0.1];
        let err = validate_samples(&samples).unwrap_err();
        assert!(matches!(err, Error::InvalidAudio(_)));
        assert!(err.to_string().contains("index 1"));

        let samples = vec![f32::INFINITY];
        assert!(validate_samples(&samples).is_err());
    }

    #[test]
    fn test_segment_timestamp_conversion() {
        let segment = Segment {
            start: 150,
            end: 300,
            text: "hello".into(),
            tokens: Vec::new(),
        };
        assert!((segment.start_secs() - 1.5).abs() < 1e-6);
        assert!((segment.end_secs() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_load_missing_model_fails() {
        let err = WhisperEngine::load(Path::new("/nonexistent/ggml-model.bin"), false).unwrap_err();
        match err {
            Error::Load { path, reason } => {
                assert_eq!(path, Path::new("/nonexistent/ggml-model.bin"));
                assert!(reason.contains("not found"));
            }
            other => panic!("expected Load error, got {:?}", other),
        }
    }
}
