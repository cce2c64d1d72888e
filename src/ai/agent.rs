use std::path::Path;

use crate::checkpoint::{CheckpointMetadata, CheckpointMetrics};
use crate::env::Observation;
use crate::error::TrainingError;

/// A single environment transition stored for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub state: Observation,
    pub next_state: Observation,
    pub action: usize,
    pub reward: f32,
    /// Terminal transition: the target does not bootstrap from `next_state`.
    pub done: bool,
}

/// Metrics returned from a gradient update.
#[derive(Debug, Clone, Default)]
pub struct UpdateMetrics {
    pub loss: f32,
    /// Learn step at which this update ran (1-based).
    pub learn_step: usize,
    /// Mean target-network soft value of the sampled next states.
    pub soft_value: f32,
}

/// Universal interface for all agents acting in an environment.
pub trait Agent {
    /// Select an action given the current observation.
    /// When `training` is true, the agent may explore; otherwise it exploits.
    fn select_action(&mut self, observation: &Observation, training: bool) -> usize;

    /// Return the agent's display name.
    fn name(&self) -> &str;

    /// Feed one transition to the agent. Returns metrics when a gradient
    /// update was performed.
    fn update(&mut self, _experience: Experience) -> Result<Option<UpdateMetrics>, TrainingError> {
        Ok(None)
    }
}

/// Extension trait for agents that support the full training lifecycle.
pub trait TrainableAgent: Agent {
    /// Algorithm name for logging/dashboard ("SQL").
    fn algorithm_name(&self) -> &str;
    /// Completed training episodes (for resume offset).
    fn episode_count(&self) -> usize;
    /// Gradient updates performed so far.
    fn step_count(&self) -> usize;
    /// Mark the end of a training episode.
    fn finish_episode(&mut self);
    /// Whether the replay buffer has filled enough for updates to run.
    fn is_learning(&self) -> bool;
    /// Save network weights to a directory.
    fn save_weights_to_dir(&self, dir: &Path) -> Result<(), Box<dyn std::error::Error>>;
    /// Load network weights from a directory.
    fn load_weights_from_dir(&mut self, dir: &Path) -> Result<(), Box<dyn std::error::Error>>;
    /// Serialize training state to JSON.
    fn training_state_json(&self) -> Result<String, serde_json::Error>;
    /// Restore training state from JSON.
    fn restore_training_state_json(&mut self, json: &str) -> Result<(), Box<dyn std::error::Error>>;
    /// Build checkpoint metadata for this agent's algorithm.
    fn build_checkpoint_metadata(
        &self,
        metrics: &CheckpointMetrics,
        episode: usize,
        timestamp: u64,
    ) -> CheckpointMetadata;
}
