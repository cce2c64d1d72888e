use std::collections::VecDeque;

use crate::env::CartPoleState;
use crate::training::dashboard_msg::{LiveFrame, MetricsSnapshot};

const MAX_HISTORY: usize = 1000;

/// Status of the training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStatus {
    Running,
    Paused,
    Finished,
    Failed,
}

/// Dashboard state holding history buffers and current values.
pub struct DashboardState {
    // History buffers: (episode, value)
    pub reward_history: VecDeque<(f64, f64)>,
    pub average_reward_history: VecDeque<(f64, f64)>,
    pub loss_history: VecDeque<(f64, f64)>,
    pub eval_history: VecDeque<(f64, f64)>,
    pub episode_length_history: VecDeque<u64>,

    // Current values
    pub algorithm: String,
    pub episode: usize,
    pub total_episodes: usize,
    pub episode_reward: f32,
    pub average_reward: f32,
    pub best_average_reward: f32,
    pub loss: f32,
    pub learn_steps: usize,
    pub episodes_per_sec: f32,
    pub avg_episode_ms: f32,
    pub avg_update_ms: f32,

    // Live cart-pole
    pub live_state: Option<CartPoleState>,
    pub live_step: usize,
    pub x_threshold: f64,

    // Status
    pub status: TrainingStatus,
    pub last_checkpoint: Option<String>,
    pub last_eval_reward: Option<f32>,
    pub failure: Option<String>,
}

impl DashboardState {
    pub fn new(total_episodes: usize, x_threshold: f64) -> Self {
        DashboardState {
            reward_history: VecDeque::new(),
            average_reward_history: VecDeque::new(),
            loss_history: VecDeque::new(),
            eval_history: VecDeque::new(),
            episode_length_history: VecDeque::new(),

            algorithm: String::new(),
            episode: 0,
            total_episodes,
            episode_reward: 0.0,
            average_reward: 0.0,
            best_average_reward: 0.0,
            loss: 0.0,
            learn_steps: 0,
            episodes_per_sec: 0.0,
            avg_episode_ms: 0.0,
            avg_update_ms: 0.0,

            live_state: None,
            live_step: 0,
            x_threshold,

            status: TrainingStatus::Running,
            last_checkpoint: None,
            last_eval_reward: None,
            failure: None,
        }
    }

    /// Apply a metrics snapshot from the training thread.
    pub fn apply_metrics(&mut self, snap: &MetricsSnapshot) {
        self.algorithm = snap.algorithm.clone();
        self.episode = snap.episode;
        self.total_episodes = snap.total_episodes;
        self.episode_reward = snap.episode_reward;
        self.average_reward = snap.average_reward;
        self.best_average_reward = snap.best_average_reward;
        self.loss = snap.loss;
        self.learn_steps = snap.learn_steps;
        self.episodes_per_sec = snap.episodes_per_sec;
        self.avg_episode_ms = snap.avg_episode_ms;
        self.avg_update_ms = snap.avg_update_ms;

        let ep = snap.episode as f64;
        push_capped(&mut self.reward_history, (ep, snap.episode_reward as f64));
        push_capped(
            &mut self.average_reward_history,
            (ep, snap.average_reward as f64),
        );
        // No loss is reported until learning starts
        if snap.learn_steps > 0 {
            push_capped(&mut self.loss_history, (ep, snap.loss as f64));
        }
        push_capped(&mut self.episode_length_history, snap.episode_length as u64);
    }

    pub fn apply_live_frame(&mut self, frame: &LiveFrame) {
        self.live_state = Some(frame.state);
        self.live_step = frame.step;
    }

    pub fn apply_eval(&mut self, episode: usize, mean_reward: f32) {
        self.last_eval_reward = Some(mean_reward);
        push_capped(&mut self.eval_history, (episode as f64, mean_reward as f64));
    }

    pub fn apply_failure(&mut self, message: String) {
        self.status = TrainingStatus::Failed;
        self.failure = Some(message);
    }

    /// Whether the training thread has stopped, successfully or not.
    pub fn is_done(&self) -> bool {
        matches!(self.status, TrainingStatus::Finished | TrainingStatus::Failed)
    }

    /// Progress ratio [0.0, 1.0].
    pub fn progress(&self) -> f64 {
        if self.total_episodes == 0 {
            return 0.0;
        }
        self.episode as f64 / self.total_episodes as f64
    }

    /// Largest reward seen in any chart series, for the y axis.
    pub fn max_reward(&self) -> f64 {
        self.reward_history
            .iter()
            .chain(self.eval_history.iter())
            .map(|&(_, r)| r)
            .fold(0.0, f64::max)
    }
}

fn push_capped<T>(buf: &mut VecDeque<T>, value: T) {
    buf.push_back(value);
    if buf.len() > MAX_HISTORY {
        buf.pop_front();
    }
}
