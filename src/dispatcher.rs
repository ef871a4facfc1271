//! Result delivery, decoupled from the inference worker.
//!
//! The worker pushes records into a bounded channel and a dedicated thread
//! pops them and invokes the user callback. The bound enforces backpressure:
//! a slow callback blocks the worker's send instead of growing memory
//! without limit. Delivery is FIFO and matches production order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use tokio::sync::mpsc;

use crate::accumulator::ChunkId;
use crate::engine::Segment;
use crate::LOG_TARGET;

/// One transcription result for an epoch. Every epoch produces zero or more
/// partial records followed by at most one final record.
#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub chunk_id: ChunkId,
    pub segments: Vec<Segment>,
    pub is_partial: bool,
}

impl ResultRecord {
    /// Concatenated, trimmed text of all segments.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for segment in &self.segments {
            text.push_str(&segment.text);
        }
        text.trim().to_string()
    }
}

/// User callback receiving results on the dispatcher thread.
pub(crate) type ResultCallback = Box<dyn Fn(ResultRecord) + Send + 'static>;

pub(crate) struct Dispatcher {
    handle: thread::JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn the delivery thread. The returned sender is handed to the
    /// scheduler worker; dropping it lets the thread drain and exit.
    pub(crate) fn spawn(
        capacity: usize,
        callback: ResultCallback,
    ) -> (mpsc::Sender<ResultRecord>, Self) {
        let (tx, mut rx) = mpsc::channel::<ResultRecord>(capacity);

        let handle = thread::spawn(move || {
            while let Some(record) = rx.blocking_recv() {
                if catch_unwind(AssertUnwindSafe(|| callback(record))).is_err() {
                    log::error!(
                        target: LOG_TARGET,
                        "result callback panicked; continuing delivery"
                    );
                }
            }
            log::debug!(target: LOG_TARGET, "dispatcher thread finished");
        });

        (tx, Self { handle })
    }

    /// Block until the queue is drained and the thread has exited. Call only
    /// after the sender has been dropped.
    pub(crate) fn join(self) {
        let _ = self.handle.join();
    }
}
