use std::collections::VecDeque;

/// Result of a single episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeResult {
    pub reward: f32,
    pub length: usize,
}

/// Training metrics tracker with rolling window computations.
pub struct TrainingMetrics {
    episode_results: VecDeque<EpisodeResult>,
    update_losses: VecDeque<f32>,
    capacity: usize,
    average_window: usize,
    total_episodes: usize, // lifetime count, never capped
    best_average_reward: Option<f32>,
}

impl TrainingMetrics {
    pub fn with_capacity(capacity: usize, average_window: usize) -> Self {
        TrainingMetrics {
            episode_results: VecDeque::with_capacity(capacity),
            update_losses: VecDeque::with_capacity(capacity),
            capacity: capacity.max(average_window),
            average_window,
            total_episodes: 0,
            best_average_reward: None,
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(100, 10)
    }

    pub fn record_episode(&mut self, result: EpisodeResult) {
        self.total_episodes += 1;
        self.episode_results.push_back(result);
        if self.episode_results.len() > self.capacity {
            self.episode_results.pop_front();
        }

        let avg = self.moving_average_reward();
        let best = self.best_average_reward.get_or_insert(avg);
        if avg > *best {
            *best = avg;
        }
    }

    pub fn record_update(&mut self, loss: f32) {
        self.update_losses.push_back(loss);
        if self.update_losses.len() > self.capacity {
            self.update_losses.pop_front();
        }
    }

    /// Average episode reward over the last N episodes.
    pub fn average_reward(&self, last_n: usize) -> f32 {
        let n = self.episode_results.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = self
            .episode_results
            .iter()
            .rev()
            .take(n)
            .map(|r| r.reward)
            .sum();
        sum / n as f32
    }

    /// Average reward over the configured moving-average window.
    pub fn moving_average_reward(&self) -> f32 {
        self.average_reward(self.average_window)
    }

    /// Highest moving-average reward seen so far (0 before the first episode).
    pub fn best_average_reward(&self) -> f32 {
        self.best_average_reward.unwrap_or(0.0)
    }

    pub fn last_reward(&self) -> Option<f32> {
        self.episode_results.back().map(|r| r.reward)
    }

    /// Average loss over the last N updates.
    pub fn average_loss(&self, last_n: usize) -> f32 {
        let n = self.update_losses.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = self.update_losses.iter().rev().take(n).sum();
        sum / n as f32
    }

    /// Average episode length over the last N episodes.
    pub fn average_length(&self, last_n: usize) -> f32 {
        let n = self.episode_results.len().min(last_n);
        if n == 0 {
            return 0.0;
        }
        let total: usize = self
            .episode_results
            .iter()
            .rev()
            .take(n)
            .map(|r| r.length)
            .sum();
        total as f32 / n as f32
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-episode timing tracker for profiling the training loop.
pub struct TimingMetrics {
    episode_micros: VecDeque<u32>, // per-episode simulation µs
    update_micros: VecDeque<u32>,  // per-update µs
    capacity: usize,
    window_start: std::time::Instant,
    window_count: usize,
    window_overhead_micros: u128, // eval/checkpoint time excluded from throughput
}

impl TimingMetrics {
    pub fn with_capacity(capacity: usize) -> Self {
        TimingMetrics {
            episode_micros: VecDeque::with_capacity(capacity),
            update_micros: VecDeque::with_capacity(capacity),
            capacity,
            window_start: std::time::Instant::now(),
            window_count: 0,
            window_overhead_micros: 0,
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn record_episode_time(&mut self, d: std::time::Duration) {
        self.episode_micros.push_back(d.as_micros() as u32);
        if self.episode_micros.len() > self.capacity {
            self.episode_micros.pop_front();
        }
        self.window_count += 1;
    }

    pub fn record_update_time(&mut self, d: std::time::Duration) {
        self.update_micros.push_back(d.as_micros() as u32);
        if self.update_micros.len() > self.capacity {
            self.update_micros.pop_front();
        }
    }

    /// Record time spent in eval or checkpoint saving so it is excluded from
    /// the throughput window.
    pub fn record_overhead(&mut self, d: std::time::Duration) {
        self.window_overhead_micros += d.as_micros();
    }

    /// Mean of the last `last_n` episode times in milliseconds.
    pub fn avg_episode_ms(&self, last_n: usize) -> f32 {
        mean_ms(&self.episode_micros, last_n)
    }

    /// Mean of the last `last_n` update times in milliseconds.
    pub fn avg_update_ms(&self, last_n: usize) -> f32 {
        mean_ms(&self.update_micros, last_n)
    }

    /// Episodes per second since the last `reset_window` call, excluding time
    /// spent in eval/checkpoint overhead.
    pub fn episodes_per_sec(&self) -> f32 {
        let total_micros = self.window_start.elapsed().as_micros();
        let net_micros = total_micros.saturating_sub(self.window_overhead_micros);
        if net_micros == 0 {
            return 0.0;
        }
        self.window_count as f32 / (net_micros as f32 / 1_000_000.0)
    }

    /// Reset the throughput window (call after each log interval).
    pub fn reset_window(&mut self) {
        self.window_start = std::time::Instant::now();
        self.window_count = 0;
        self.window_overhead_micros = 0;
    }
}

impl Default for TimingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn mean_ms(samples: &VecDeque<u32>, last_n: usize) -> f32 {
    let n = samples.len().min(last_n);
    if n == 0 {
        return 0.0;
    }
    let mean = samples.iter().rev().take(n).map(|&v| v as f64).sum::<f64>() / n as f64;
    (mean / 1000.0) as f32
}
