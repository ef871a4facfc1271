//! Shared test support: a scripted engine with predictable outputs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use whisper_stream::{Error, Segment, SpeechEngine};

/// Mock engine for scheduler tests. Reports what it heard so tests can
/// assert which buffer a pass covered, counts calls, and can be scripted to
/// fail a number of upcoming passes.
pub struct MockEngine {
    processing_delay: Duration,
    call_count: Arc<AtomicUsize>,
    failures_remaining: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            processing_delay: Duration::from_millis(5),
            call_count: Arc::new(AtomicUsize::new(0)),
            failures_remaining: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle onto the call counter, usable after the engine moves into a
    /// streaming instance.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.call_count.clone()
    }

    /// Make the next `n` transcription passes fail.
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Expected transcript for a pass over `n` samples.
    pub fn transcript_for(n: usize) -> String {
        format!("heard {} samples", n)
    }
}

impl SpeechEngine for MockEngine {
    fn transcribe(&mut self, samples: &[f32]) -> whisper_stream::Result<Vec<Segment>> {
        std::thread::sleep(self.processing_delay);
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.failures_remaining.load(Ordering::SeqCst) > 0 {
            self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Inference("mock transcription failure".into()));
        }

        if samples.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![Segment {
            start: 0,
            // 16 kHz samples, centisecond timestamps.
            end: (samples.len() / 160) as i64,
            text: Self::transcript_for(samples.len()),
            tokens: Vec::new(),
        }])
    }
}
