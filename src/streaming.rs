//! Streaming model lifecycle: start/stop state machine gluing the
//! accumulator, scheduler worker, and result dispatcher together.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::accumulator::ChunkId;
use crate::dispatcher::{Dispatcher, ResultRecord};
use crate::engine::{self, SpeechEngine, WhisperEngine, WHISPER_SAMPLE_RATE};
use crate::scheduler::{self, FailurePolicy, Shared, State, WorkerConfig};
use crate::{Error, Result, LOG_TARGET};

/// Configuration for a streaming instance. Defaults mirror the synchronous
/// engine's expectations: 16 kHz audio, ten-second epochs, 100 ms polling.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Epoch duration threshold. Once the accumulated buffer reaches this
    /// length the next pass is final and the buffer is drained.
    pub max_duration_secs: f32,
    pub sample_rate: u32,
    /// Upper bound on how long the worker sleeps between passes when no new
    /// audio arrives.
    pub poll_interval: Duration,
    /// Bounded depth of the result queue between worker and dispatcher.
    pub queue_capacity: usize,
    /// Policy for a mid-epoch inference failure.
    pub failure_policy: FailurePolicy,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 10.0,
            sample_rate: WHISPER_SAMPLE_RATE,
            poll_interval: Duration::from_millis(100),
            queue_capacity: 32,
            failure_policy: FailurePolicy::default(),
        }
    }
}

enum EngineSource {
    /// Load a whisper model on `start()`.
    Whisper {
        model_path: PathBuf,
        use_accelerator: bool,
    },
    /// Use a caller-supplied engine (tests, alternative backends).
    Prepared(Box<dyn SpeechEngine>),
    /// Consumed by `start()`.
    Taken,
}

/// A model instance with a streaming front-end.
///
/// Construction performs no I/O; the engine loads on [`start`]. One producer
/// thread feeds [`queue_audio`] while the worker thread runs inference and
/// the dispatcher thread delivers results. `queue_audio` is internally
/// synchronized, but interleaving of concurrent producers across epoch
/// boundaries is unspecified; use a single producer.
///
/// [`start`]: StreamingModel::start
/// [`queue_audio`]: StreamingModel::queue_audio
pub struct StreamingModel {
    config: StreamingConfig,
    source: EngineSource,
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
    dispatcher: Option<Dispatcher>,
}

impl StreamingModel {
    /// Create an instance that loads the ggml model at `model_path` when
    /// started.
    pub fn new(
        model_path: impl Into<PathBuf>,
        use_accelerator: bool,
        config: StreamingConfig,
    ) -> Self {
        let shared = Arc::new(Shared::new(config.sample_rate));
        Self {
            config,
            source: EngineSource::Whisper {
                model_path: model_path.into(),
                use_accelerator,
            },
            shared,
            worker: None,
            dispatcher: None,
        }
    }

    /// Create an instance around an already constructed engine.
    pub fn with_engine(engine: Box<dyn SpeechEngine>, config: StreamingConfig) -> Self {
        let shared = Arc::new(Shared::new(config.sample_rate));
        Self {
            config,
            source: EngineSource::Prepared(engine),
            shared,
            worker: None,
            dispatcher: None,
        }
    }

    /// Start streaming: loads the engine if needed, then spawns the worker
    /// and dispatcher threads. Results reach `callback` on the dispatcher
    /// thread. Fails with a lifecycle error on a non-idle instance and with
    /// a load error if the model cannot be initialized (the instance stays
    /// idle in that case).
    pub fn start<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn(ResultRecord) + Send + 'static,
    {
        {
            let inner = self
                .shared
                .inner
                .lock()
                .map_err(|_| Error::Lifecycle("streaming state poisoned"))?;
            if inner.state != State::Idle {
                return Err(Error::Lifecycle("start requires an idle instance"));
            }
        }

        let engine = match std::mem::replace(&mut self.source, EngineSource::Taken) {
            EngineSource::Whisper {
                model_path,
                use_accelerator,
            } => match WhisperEngine::load(&model_path, use_accelerator) {
                Ok(engine) => Box::new(engine) as Box<dyn SpeechEngine>,
                Err(err) => {
                    // Leave the instance idle and retryable.
                    self.source = EngineSource::Whisper {
                        model_path,
                        use_accelerator,
                    };
                    return Err(err);
                }
            },
            EngineSource::Prepared(engine) => engine,
            EngineSource::Taken => {
                return Err(Error::Lifecycle("start requires an idle instance"))
            }
        };

        let (tx, dispatcher) = Dispatcher::spawn(self.config.queue_capacity, Box::new(callback));
        self.dispatcher = Some(dispatcher);

        let worker_config = WorkerConfig {
            max_samples: (self.config.max_duration_secs * self.config.sample_rate as f32) as usize,
            poll_interval: self.config.poll_interval,
            failure_policy: self.config.failure_policy,
        };

        {
            let mut inner = self
                .shared
                .inner
                .lock()
                .map_err(|_| Error::Lifecycle("streaming state poisoned"))?;
            inner.state = State::Running;
        }

        let shared = self.shared.clone();
        self.worker = Some(thread::spawn(move || {
            scheduler::run(engine, &shared, worker_config, tx);
        }));

        log::info!(
            target: LOG_TARGET,
            "streaming started (max epoch {:.1}s, queue depth {})",
            self.config.max_duration_secs,
            self.config.queue_capacity
        );
        Ok(())
    }

    /// Submit audio for the current epoch and return its chunk id. Holds the
    /// accumulator lock only long enough to append; never blocks on
    /// inference. An empty slice is valid and produces no result on its own.
    pub fn queue_audio(&self, samples: &[f32]) -> Result<ChunkId> {
        engine::validate_samples(samples)?;

        let id = {
            let mut inner = self
                .shared
                .inner
                .lock()
                .map_err(|_| Error::Lifecycle("streaming state poisoned"))?;
            if inner.state != State::Running {
                return Err(Error::Lifecycle("queue_audio requires a running instance"));
            }
            let id = inner.audio.append(samples);
            log::trace!(
                target: LOG_TARGET,
                "queued {} samples (epoch {} at {:.2}s)",
                samples.len(),
                id,
                inner.audio.duration_secs()
            );
            id
        };
        self.shared.wake.notify_one();
        Ok(id)
    }

    /// Stop streaming. Signals the worker to flush any remaining audio as a
    /// final result, then joins the worker and the dispatcher. When this
    /// returns, every queued result has been delivered and no further
    /// callback will fire.
    pub fn stop(&mut self) -> Result<()> {
        {
            let mut inner = self
                .shared
                .inner
                .lock()
                .map_err(|_| Error::Lifecycle("streaming state poisoned"))?;
            if inner.state != State::Running {
                return Err(Error::Lifecycle("stop requires a running instance"));
            }
            inner.state = State::Draining;
        }
        self.shared.wake.notify_one();

        // The worker drops its sender on exit, letting the dispatcher drain
        // the queue and finish.
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.join();
        }

        if let Ok(mut inner) = self.shared.inner.lock() {
            inner.state = State::Stopped;
        }
        log::info!(target: LOG_TARGET, "streaming stopped");
        Ok(())
    }
}

impl Drop for StreamingModel {
    fn drop(&mut self) {
        // Best-effort shutdown for abandoned instances; errors mean the
        // instance was never started or already stopped.
        let _ = self.stop();
    }
}
