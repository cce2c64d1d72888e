use serde::{Deserialize, Serialize};

use crate::training::replay_buffer::SampleMode;

/// Metrics snapshot at checkpoint time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetrics {
    pub episode_reward: f32,
    pub average_reward: f32,
    pub current_loss: f32,
    pub learn_steps: usize,
}

/// Hyperparameters recorded in checkpoint metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlHyperparameters {
    pub learning_rate: f64,
    pub gamma: f32,
    pub alpha: f32,
    pub batch_size: usize,
    pub replay_capacity: usize,
    pub learn_start: usize,
    pub target_update_interval: usize,
    #[serde(default)]
    pub sample_mode: SampleMode,
    pub hidden_sizes: [usize; 2],
}

/// Top-level checkpoint metadata written to metadata.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub episode: usize,
    pub timestamp: u64,
    pub algorithm: String,
    pub metrics: CheckpointMetrics,
    pub hyperparameters: SqlHyperparameters,
}

/// SQL training state written to training_state.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlTrainingState {
    pub learn_steps: usize,
    pub episode_count: usize,
    pub learning_rate: f64,
    pub gamma: f32,
    pub alpha: f32,
    pub batch_size: usize,
    pub replay_capacity: usize,
    pub learn_start: usize,
    pub target_update_interval: usize,
    #[serde(default)]
    pub sample_mode: SampleMode,
    pub hidden_sizes: [usize; 2],
}
