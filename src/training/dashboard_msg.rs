use std::path::PathBuf;

use crate::env::CartPoleState;

/// Periodic metrics snapshot sent from training thread to dashboard.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub episode: usize,
    pub total_episodes: usize,
    pub episode_reward: f32,
    pub average_reward: f32,
    pub best_average_reward: f32,
    pub loss: f32,
    pub episode_length: usize,
    pub learn_steps: usize,
    pub algorithm: String,
    pub episodes_per_sec: f32,
    pub avg_episode_ms: f32,
    pub avg_update_ms: f32,
}

/// Live cart-pole state sent during training episodes.
#[derive(Debug, Clone)]
pub struct LiveFrame {
    pub state: CartPoleState,
    pub step: usize,
}

/// Updates sent from training thread to UI.
#[derive(Debug, Clone)]
pub enum TrainingUpdate {
    Metrics(MetricsSnapshot),
    LiveFrame(LiveFrame),
    EvalResult {
        episode: usize,
        mean_reward: f32,
    },
    CheckpointSaved {
        episode: usize,
        path: PathBuf,
    },
    Finished,
    /// Training stopped with an error.
    Failed(String),
}

/// Commands sent from UI to training thread.
#[derive(Debug, Clone)]
pub enum TrainingCommand {
    SaveCheckpoint,
}
