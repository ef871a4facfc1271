//! Epoch audio accumulation and chunk id allocation.
//!
//! One accumulation-to-flush window is an "epoch". The accumulator owns the
//! growing sample buffer for the current epoch and hands out one monotonic
//! chunk id per epoch; the id is allocated on the first append after the
//! previous epoch was drained.

/// Identifies one accumulation epoch. Strictly increasing for the life of a
/// streaming instance.
pub type ChunkId = u64;

/// Work extracted for one scheduler pass.
#[derive(Debug)]
pub(crate) struct Pass {
    pub(crate) chunk_id: ChunkId,
    pub(crate) samples: Vec<f32>,
    pub(crate) is_final: bool,
}

pub(crate) struct Accumulator {
    samples: Vec<f32>,
    sample_rate: u32,
    /// Id of the open epoch, `None` between a drain and the next append.
    epoch: Option<ChunkId>,
    next_id: ChunkId,
    /// Set when samples arrived since the last pass, so idle poll wakeups do
    /// not re-emit identical partials.
    dirty: bool,
}

impl Accumulator {
    pub(crate) fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            epoch: None,
            next_id: 0,
            dirty: false,
        }
    }

    /// Append samples to the current epoch, opening a new epoch if none is
    /// active. Returns the epoch's chunk id.
    pub(crate) fn append(&mut self, new: &[f32]) -> ChunkId {
        let id = match self.epoch {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.epoch = Some(id);
                id
            }
        };
        if !new.is_empty() {
            self.samples.extend_from_slice(new);
            self.dirty = true;
        }
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub(crate) fn duration_secs(&self) -> f32 {
        self.len() as f32 / self.sample_rate as f32
    }

    /// Extract work for one scheduler pass, or `None` if nothing new arrived.
    ///
    /// Below `max_samples` the full epoch buffer is cloned and kept (partial
    /// passes always recompute from epoch start); at or above it the buffer
    /// is drained and the epoch closed.
    pub(crate) fn take_pass(&mut self, max_samples: usize) -> Option<Pass> {
        if !self.dirty || self.samples.is_empty() {
            return None;
        }
        let chunk_id = self.epoch?;
        self.dirty = false;

        if self.samples.len() >= max_samples {
            self.epoch = None;
            Some(Pass {
                chunk_id,
                samples: std::mem::take(&mut self.samples),
                is_final: true,
            })
        } else {
            Some(Pass {
                chunk_id,
                samples: self.samples.clone(),
                is_final: false,
            })
        }
    }

    /// Drain whatever is left for the shutdown flush. Returns `None` when the
    /// buffer is empty.
    pub(crate) fn take_remaining(&mut self) -> Option<Pass> {
        if self.samples.is_empty() {
            return None;
        }
        let chunk_id = self.epoch.take()?;
        self.dirty = false;
        Some(Pass {
            chunk_id,
            samples: std::mem::take(&mut self.samples),
            is_final: true,
        })
    }
}
