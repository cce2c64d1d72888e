use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::ai::Experience;

/// How a batch is drawn from the replay buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    /// Distinct indices drawn uniformly without replacement.
    #[default]
    Uniform,
    /// A random window of consecutive experiences, in insertion order.
    Contiguous,
}

/// Fixed-capacity ring buffer for storing training experiences.
pub struct ReplayBuffer {
    buffer: Vec<Experience>,
    capacity: usize,
    position: usize,
    rng: StdRng,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self::from_rng(capacity, StdRng::from_os_rng())
    }

    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::from_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn from_rng(capacity: usize, rng: StdRng) -> Self {
        assert!(capacity > 0, "replay capacity must be > 0");
        ReplayBuffer {
            buffer: Vec::with_capacity(capacity.min(4096)),
            capacity,
            position: 0,
            rng,
        }
    }

    /// Add an experience to the buffer. Overwrites oldest when full.
    pub fn push(&mut self, experience: Experience) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(experience);
        } else {
            self.buffer[self.position] = experience;
        }
        self.position = (self.position + 1) % self.capacity;
    }

    /// Experience at chronological index `i` (0 = oldest).
    pub fn get(&self, i: usize) -> Option<&Experience> {
        if i >= self.buffer.len() {
            return None;
        }
        if self.buffer.len() < self.capacity {
            self.buffer.get(i)
        } else {
            self.buffer.get((self.position + i) % self.capacity)
        }
    }

    /// Sample a batch of experiences. `batch_size` is clamped to the number
    /// of stored experiences.
    pub fn sample(&mut self, batch_size: usize, mode: SampleMode) -> Vec<Experience> {
        let mut out = Vec::new();
        self.sample_into(batch_size, mode, &mut out);
        out
    }

    /// Sample a batch into a pre-allocated Vec. Clears `out` first.
    pub fn sample_into(&mut self, batch_size: usize, mode: SampleMode, out: &mut Vec<Experience>) {
        out.clear();
        let len = self.len();
        let batch_size = batch_size.min(len);
        if batch_size == 0 {
            return;
        }
        match mode {
            SampleMode::Uniform => {
                let indices = index::sample(&mut self.rng, len, batch_size);
                out.extend(indices.iter().filter_map(|i| self.get(i).cloned()));
            }
            SampleMode::Contiguous => {
                let start = self.rng.random_range(0..=len - batch_size);
                out.extend((start..start + batch_size).filter_map(|i| self.get(i).cloned()));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every stored experience.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.position = 0;
    }
}
