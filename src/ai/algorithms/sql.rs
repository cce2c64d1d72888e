use std::error::Error;
use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::DefaultRecorder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::ai::agent::{Agent, Experience, TrainableAgent, UpdateMetrics};
use crate::ai::networks::{soft_value, SoftQNetwork, SoftQNetworkConfig};
use crate::ai::state_encoding::{
    encode_action_mask, encode_column, encode_observation, encode_observations_batch,
};
use crate::checkpoint::{CheckpointMetadata, CheckpointMetrics, SqlHyperparameters, SqlTrainingState};
use crate::env::{Observation, ACTION_COUNT, OBSERVATION_SIZE};
use crate::error::{CheckpointError, TrainingError};
use crate::training::replay_buffer::{ReplayBuffer, SampleMode};

type InferBackend = NdArray<f32>;
type TrainBackend = Autodiff<InferBackend>;

/// Soft Q-Learning hyperparameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    pub learning_rate: f64,
    pub gamma: f32,
    /// Boltzmann temperature.
    pub alpha: f32,
    pub batch_size: usize,
    pub replay_capacity: usize,
    /// Updates start once the replay buffer holds more than this many transitions.
    pub learn_start: usize,
    /// Copy online weights into the target network every N learn steps.
    pub target_update_interval: usize,
    pub sample_mode: SampleMode,
    pub hidden_sizes: [usize; 2],
}

impl Default for SqlConfig {
    fn default() -> Self {
        SqlConfig {
            learning_rate: 1e-4,
            gamma: 0.99,
            alpha: 4.0,
            batch_size: 16,
            replay_capacity: 50_000,
            learn_start: 128,
            target_update_interval: 4,
            sample_mode: SampleMode::Uniform,
            hidden_sizes: [64, 256],
        }
    }
}

impl SqlConfig {
    fn network_config(&self) -> SoftQNetworkConfig {
        SoftQNetworkConfig {
            input_size: OBSERVATION_SIZE,
            hidden_sizes: self.hidden_sizes,
            output_size: ACTION_COUNT,
        }
    }
}

/// Soft Q-Learning agent with online + target networks, replay buffer, and
/// Adam optimizer. Acts with a Boltzmann policy over the online soft Q-values.
pub struct SoftQAgent {
    online_network: SoftQNetwork<TrainBackend>,
    target_network: SoftQNetwork<InferBackend>,
    optimizer: burn::optim::adaptor::OptimizerAdaptor<burn::optim::Adam, SoftQNetwork<TrainBackend>, TrainBackend>,
    replay_buffer: ReplayBuffer,
    config: SqlConfig,
    device: <TrainBackend as Backend>::Device,
    learn_steps: usize,
    episode_count: usize,
    rng: StdRng,
}

impl SoftQAgent {
    pub fn new(config: SqlConfig) -> Self {
        let replay_buffer = ReplayBuffer::new(config.replay_capacity);
        Self::build(config, replay_buffer, StdRng::from_os_rng())
    }

    /// Agent whose action sampling and replay sampling are reproducible.
    pub fn with_seed(config: SqlConfig, seed: u64) -> Self {
        let replay_buffer = ReplayBuffer::with_seed(config.replay_capacity, seed.wrapping_add(1));
        Self::build(config, replay_buffer, StdRng::seed_from_u64(seed))
    }

    fn build(config: SqlConfig, replay_buffer: ReplayBuffer, rng: StdRng) -> Self {
        let device = Default::default();
        let online_network: SoftQNetwork<TrainBackend> = config.network_config().init(&device);
        let target_network = online_network.valid();
        let optimizer = AdamConfig::new().init();

        SoftQAgent {
            online_network,
            target_network,
            optimizer,
            replay_buffer,
            config,
            device,
            learn_steps: 0,
            episode_count: 0,
            rng,
        }
    }

    pub fn config(&self) -> &SqlConfig {
        &self.config
    }

    pub fn replay_len(&self) -> usize {
        self.replay_buffer.len()
    }

    pub fn learn_steps(&self) -> usize {
        self.learn_steps
    }

    /// Soft Q-values of the online network for one observation.
    pub fn q_values(&self, observation: &Observation) -> Result<Vec<f32>, TrainingError> {
        let input = encode_observation::<InferBackend>(observation, &self.device);
        let q = self.online_network.valid().forward(input);
        tensor_to_vec(q)
    }

    /// Soft Q-values of the target network for one observation.
    pub fn target_q_values(&self, observation: &Observation) -> Result<Vec<f32>, TrainingError> {
        let input = encode_observation::<InferBackend>(observation, &self.device);
        tensor_to_vec(self.target_network.forward(input))
    }

    /// Boltzmann policy `pi(a|s) = exp((Q(s,a) - V(s)) / alpha)`.
    pub fn action_probabilities(&self, observation: &Observation) -> Result<Vec<f32>, TrainingError> {
        let q = self.q_values(observation)?;
        Ok(boltzmann_probabilities(&q, self.config.alpha))
    }

    /// Copy the online parameters into the target network.
    pub fn sync_target(&mut self) {
        self.target_network = self.online_network.valid();
        debug!(learn_step = self.learn_steps, "target network synced");
    }

    fn pick_action(&mut self, observation: &Observation, training: bool) -> Result<usize, TrainingError> {
        if training {
            let probs = self.action_probabilities(observation)?;
            Ok(sample_categorical(&probs, &mut self.rng))
        } else {
            Ok(argmax(&self.q_values(observation)?))
        }
    }

    /// Perform one gradient update step from the replay buffer.
    fn train_step(&mut self) -> Result<UpdateMetrics, TrainingError> {
        let batch = self
            .replay_buffer
            .sample(self.config.batch_size, self.config.sample_mode);
        let batch_size = batch.len();

        let states: Vec<Observation> = batch.iter().map(|e| e.state).collect();
        let next_states: Vec<Observation> = batch.iter().map(|e| e.next_state).collect();
        let actions: Vec<usize> = batch.iter().map(|e| e.action).collect();
        let rewards: Vec<f32> = batch.iter().map(|e| e.reward).collect();
        let not_done: Vec<f32> = batch
            .iter()
            .map(|e| if e.done { 0.0 } else { 1.0 })
            .collect();

        // Targets from the target network (inference backend, no grad):
        // y = r + (1 - done) * gamma * V_target(s')
        let next_q = self
            .target_network
            .forward(encode_observations_batch::<InferBackend>(&next_states, &self.device));
        let next_v = soft_value(next_q, self.config.alpha);
        let targets = encode_column::<InferBackend>(&rewards, &self.device)
            + encode_column::<InferBackend>(&not_done, &self.device)
                .mul(next_v.clone())
                .mul_scalar(self.config.gamma);
        let mean_next_v = tensor_to_vec(next_v.mean())?[0];
        let targets = Tensor::<TrainBackend, 2>::from_inner(targets);

        // Q(s, a) = sum(Q(s, .) * one_hot(a), dim=1) -> [B, 1]
        let q_all = self
            .online_network
            .forward(encode_observations_batch::<TrainBackend>(&states, &self.device));
        let mask = encode_action_mask::<TrainBackend>(&actions, ACTION_COUNT, &self.device);
        let q_taken = (q_all * mask).sum_dim(1);

        let diff = q_taken - targets;
        let loss = (diff.clone() * diff).mean();
        let loss_val = tensor_to_vec(loss.clone())?[0];
        if !loss_val.is_finite() {
            warn!(learn_step = self.learn_steps, loss = loss_val, "non-finite loss");
        }

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.online_network);
        self.online_network =
            self.optimizer
                .step(self.config.learning_rate, self.online_network.clone(), grads);

        debug!(learn_step = self.learn_steps, batch_size, loss = loss_val, "update");

        Ok(UpdateMetrics {
            loss: loss_val,
            learn_step: self.learn_steps,
            soft_value: mean_next_v,
        })
    }

    /// Save network weights to a directory.
    pub fn save_to_dir(&self, dir: &Path) -> Result<(), Box<dyn Error>> {
        let recorder = DefaultRecorder::default();
        self.online_network
            .clone()
            .valid()
            .save_file(dir.join("online_network"), &recorder)?;
        self.target_network
            .clone()
            .save_file(dir.join("target_network"), &recorder)?;
        Ok(())
    }

    /// Load network weights from a directory.
    pub fn load_from_dir(&mut self, dir: &Path) -> Result<(), CheckpointError> {
        let recorder = DefaultRecorder::default();
        let net_config = self.config.network_config();

        let online: SoftQNetwork<TrainBackend> = net_config
            .init(&self.device)
            .load_file(dir.join("online_network"), &recorder, &self.device)
            .map_err(|e| CheckpointError::ModelLoad(format!("online network: {e}")))?;
        self.online_network = online;

        let target: SoftQNetwork<InferBackend> = net_config
            .init(&self.device)
            .load_file(dir.join("target_network"), &recorder, &self.device)
            .map_err(|e| CheckpointError::ModelLoad(format!("target network: {e}")))?;
        self.target_network = target;
        Ok(())
    }

    /// Export current training state for checkpointing.
    pub fn training_state(&self) -> SqlTrainingState {
        SqlTrainingState {
            learn_steps: self.learn_steps,
            episode_count: self.episode_count,
            learning_rate: self.config.learning_rate,
            gamma: self.config.gamma,
            alpha: self.config.alpha,
            batch_size: self.config.batch_size,
            replay_capacity: self.config.replay_capacity,
            learn_start: self.config.learn_start,
            target_update_interval: self.config.target_update_interval,
            sample_mode: self.config.sample_mode,
            hidden_sizes: self.config.hidden_sizes,
        }
    }

    /// Restore training state from a checkpoint. Only the counters and the
    /// network shape are taken from `state`; the hyperparameters this agent
    /// was built with stay in force. The replay buffer is not persisted and
    /// refills from new episodes.
    pub fn restore_training_state(&mut self, state: &SqlTrainingState) {
        self.learn_steps = state.learn_steps;
        self.episode_count = state.episode_count;

        let stored = SqlConfig {
            learning_rate: state.learning_rate,
            gamma: state.gamma,
            alpha: state.alpha,
            batch_size: state.batch_size,
            replay_capacity: state.replay_capacity,
            learn_start: state.learn_start,
            target_update_interval: state.target_update_interval,
            sample_mode: state.sample_mode,
            hidden_sizes: state.hidden_sizes,
        };
        for field in differing_hyperparameters(&stored, &self.config) {
            warn!(field, "checkpoint hyperparameter differs from current config, keeping current");
        }

        if state.hidden_sizes != self.config.hidden_sizes {
            warn!(
                stored = ?state.hidden_sizes,
                current = ?self.config.hidden_sizes,
                "rebuilding networks with the checkpoint's hidden sizes"
            );
            self.config.hidden_sizes = state.hidden_sizes;
            self.online_network = self.config.network_config().init(&self.device);
            self.target_network = self.online_network.valid();
            self.optimizer = AdamConfig::new().init();
        }
    }
}

/// Names of the hyperparameters that differ between two configs, network
/// shape excluded.
fn differing_hyperparameters(a: &SqlConfig, b: &SqlConfig) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if a.learning_rate != b.learning_rate {
        fields.push("learning_rate");
    }
    if a.gamma != b.gamma {
        fields.push("gamma");
    }
    if a.alpha != b.alpha {
        fields.push("alpha");
    }
    if a.batch_size != b.batch_size {
        fields.push("batch_size");
    }
    if a.replay_capacity != b.replay_capacity {
        fields.push("replay_capacity");
    }
    if a.learn_start != b.learn_start {
        fields.push("learn_start");
    }
    if a.target_update_interval != b.target_update_interval {
        fields.push("target_update_interval");
    }
    if a.sample_mode != b.sample_mode {
        fields.push("sample_mode");
    }
    fields
}

impl Agent for SoftQAgent {
    fn select_action(&mut self, observation: &Observation, training: bool) -> usize {
        match self.pick_action(observation, training) {
            Ok(action) => action,
            Err(e) => {
                warn!(error = %e, "q-value extraction failed, acting uniformly");
                self.rng.random_range(0..ACTION_COUNT)
            }
        }
    }

    fn name(&self) -> &str {
        "SoftQ"
    }

    fn update(&mut self, experience: Experience) -> Result<Option<UpdateMetrics>, TrainingError> {
        self.replay_buffer.push(experience);
        if self.replay_buffer.len() <= self.config.learn_start {
            return Ok(None);
        }
        if self.learn_steps == 0 {
            info!(replay_len = self.replay_buffer.len(), "Beginning to learn...");
        }

        self.learn_steps += 1;
        if self.learn_steps % self.config.target_update_interval == 0 {
            self.sync_target();
        }
        self.train_step().map(Some)
    }
}

impl TrainableAgent for SoftQAgent {
    fn algorithm_name(&self) -> &str {
        "SQL"
    }

    fn episode_count(&self) -> usize {
        self.episode_count
    }

    fn step_count(&self) -> usize {
        self.learn_steps
    }

    fn finish_episode(&mut self) {
        self.episode_count += 1;
    }

    fn is_learning(&self) -> bool {
        self.replay_buffer.len() > self.config.learn_start
    }

    fn save_weights_to_dir(&self, dir: &Path) -> Result<(), Box<dyn Error>> {
        self.save_to_dir(dir)
    }

    fn load_weights_from_dir(&mut self, dir: &Path) -> Result<(), Box<dyn Error>> {
        Ok(self.load_from_dir(dir)?)
    }

    fn training_state_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.training_state())
    }

    fn restore_training_state_json(&mut self, json: &str) -> Result<(), Box<dyn Error>> {
        let state: SqlTrainingState = serde_json::from_str(json)?;
        self.restore_training_state(&state);
        Ok(())
    }

    fn build_checkpoint_metadata(
        &self,
        metrics: &CheckpointMetrics,
        episode: usize,
        timestamp: u64,
    ) -> CheckpointMetadata {
        CheckpointMetadata {
            episode,
            timestamp,
            algorithm: "SQL".to_string(),
            metrics: metrics.clone(),
            hyperparameters: SqlHyperparameters {
                learning_rate: self.config.learning_rate,
                gamma: self.config.gamma,
                alpha: self.config.alpha,
                batch_size: self.config.batch_size,
                replay_capacity: self.config.replay_capacity,
                learn_start: self.config.learn_start,
                target_update_interval: self.config.target_update_interval,
                sample_mode: self.config.sample_mode,
                hidden_sizes: self.config.hidden_sizes,
            },
        }
    }
}

fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>, TrainingError> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| TrainingError::TensorData(format!("{e:?}")))
}

/// Boltzmann distribution over soft Q-values at temperature `alpha`.
pub fn boltzmann_probabilities(q_values: &[f32], alpha: f32) -> Vec<f32> {
    let max_q = q_values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut probs: Vec<f32> = q_values
        .iter()
        .map(|&q| ((q - max_q) / alpha).exp())
        .collect();
    let sum: f32 = probs.iter().sum();
    for p in &mut probs {
        *p /= sum;
    }
    probs
}

/// Sample an action from a categorical distribution defined by probs.
fn sample_categorical(probs: &[f32], rng: &mut StdRng) -> usize {
    let r: f32 = rng.random_range(0.0..1.0);
    let mut cumulative = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumulative += p;
        if r < cumulative {
            return i;
        }
    }
    // Rounding left r above the final cumulative sum
    probs
        .iter()
        .rposition(|&p| p > 0.0)
        .unwrap_or(0)
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}
