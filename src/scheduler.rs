//! Streaming scheduler: the background worker that decides when to run
//! inference, tags results partial/final, and advances epochs.
//!
//! The worker wakes on new audio (condvar notification from the producer) or
//! a bounded poll interval. Below the duration threshold it transcribes the
//! entire epoch buffer and emits a partial record; at or above it, the pass
//! is final, the buffer is drained, and the next epoch opens. Stopping moves
//! the instance to `Draining`, which triggers one last flush over any
//! remaining audio before the worker exits.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::accumulator::{Accumulator, Pass};
use crate::dispatcher::ResultRecord;
use crate::engine::SpeechEngine;
use crate::logging::{self, LogLevel};
use crate::LOG_TARGET;

/// Lifecycle states of a streaming instance. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// What to do when an inference pass fails mid-stream. The worker never
/// terminates on an inference failure either way; the failure is reported
/// through the log hook and the `log` facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Drop the epoch's result and move on.
    #[default]
    Skip,
    /// Emit a final record with no segments so every completed epoch is
    /// still closed by exactly one final.
    EmitEmpty,
}

pub(crate) struct Inner {
    pub(crate) state: State,
    pub(crate) audio: Accumulator,
}

/// State shared between the producer, the worker, and `stop()`.
pub(crate) struct Shared {
    pub(crate) inner: Mutex<Inner>,
    pub(crate) wake: Condvar,
}

impl Shared {
    pub(crate) fn new(sample_rate: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Idle,
                audio: Accumulator::new(sample_rate),
            }),
            wake: Condvar::new(),
        }
    }
}

pub(crate) struct WorkerConfig {
    pub(crate) max_samples: usize,
    pub(crate) poll_interval: Duration,
    pub(crate) failure_policy: FailurePolicy,
}

/// Worker loop. Runs on a dedicated OS thread; owns the engine exclusively
/// for its lifetime. Exits when the instance drains or the dispatcher goes
/// away, dropping `tx` so the dispatcher can finish.
pub(crate) fn run(
    mut engine: Box<dyn SpeechEngine>,
    shared: &Shared,
    config: WorkerConfig,
    tx: mpsc::Sender<ResultRecord>,
) {
    log::debug!(target: LOG_TARGET, "scheduler worker started");

    while let Some(pass) = next_pass(shared, &config) {
        let Pass {
            chunk_id,
            samples,
            is_final,
        } = pass;

        match engine.transcribe(&samples) {
            Ok(segments) => {
                let record = ResultRecord {
                    chunk_id,
                    segments,
                    is_partial: !is_final,
                };
                // Silent partials carry no information; finals always close
                // the epoch.
                if !is_final && record.text().is_empty() {
                    continue;
                }
                if tx.blocking_send(record).is_err() {
                    break;
                }
            }
            Err(err) => {
                let message = format!("inference failed for chunk {}: {}", chunk_id, err);
                log::error!(target: LOG_TARGET, "{}", message);
                logging::emit(LogLevel::Error, &message);

                if is_final && config.failure_policy == FailurePolicy::EmitEmpty {
                    let record = ResultRecord {
                        chunk_id,
                        segments: Vec::new(),
                        is_partial: false,
                    };
                    if tx.blocking_send(record).is_err() {
                        break;
                    }
                }
            }
        }
    }

    log::debug!(target: LOG_TARGET, "scheduler worker finished");
}

/// Block until there is work or the instance is shutting down. Returns
/// `None` when the worker should exit.
fn next_pass(shared: &Shared, config: &WorkerConfig) -> Option<Pass> {
    let mut guard = match shared.inner.lock() {
        Ok(guard) => guard,
        Err(_) => return None,
    };
    loop {
        match guard.state {
            State::Running => {
                if let Some(pass) = guard.audio.take_pass(config.max_samples) {
                    return Some(pass);
                }
                guard = match shared.wake.wait_timeout(guard, config.poll_interval) {
                    Ok((guard, _timeout)) => guard,
                    Err(_) => return None,
                };
            }
            // One last flush over whatever is left, then exit on the next
            // iteration once the buffer is empty.
            State::Draining => {
                if guard.audio.is_empty() {
                    return None;
                }
                return guard.audio.take_remaining();
            }
            State::Idle | State::Stopped => return None,
        }
    }
}
