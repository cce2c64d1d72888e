use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::ai::TrainableAgent;
use crate::checkpoint::{CheckpointManager, CheckpointManagerConfig, CheckpointMetrics};
use crate::env::{CartPole, CartPoleConfig};
use crate::error::TrainingError;
use crate::training::dashboard_msg::{MetricsSnapshot, TrainingCommand, TrainingUpdate};
use crate::training::episode::{
    episode_seed, evaluate, run_training_episode, run_training_episode_live, EvalStats,
};
use crate::training::metrics::{TimingMetrics, TrainingMetrics};
use crate::training::scalar_log::{
    ScalarSink, EPISODE_REWARD_TAG, EVAL_REWARD_TAG, LOSS_TAG, SOFT_VALUE_TAG,
};

/// Trainer configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub num_episodes: usize,
    pub max_steps_per_episode: usize,
    pub log_interval: usize,
    pub checkpoint_interval: usize,
    pub eval_interval: usize,
    pub eval_episodes: usize,
    pub moving_average_window: usize,
    /// Send a live cart-pole frame to the dashboard every N steps.
    pub live_update_interval: usize,
    pub checkpoint_dir: PathBuf,
    pub log_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            num_episodes: 500,
            max_steps_per_episode: 200,
            log_interval: 10,
            checkpoint_interval: 10,
            eval_interval: 50,
            eval_episodes: 5,
            moving_average_window: 10,
            live_update_interval: 5,
            checkpoint_dir: PathBuf::from("checkpoints"),
            log_dir: PathBuf::from("logs/sql"),
            seed: None,
        }
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    /// Episodes played in this run.
    pub episodes: usize,
    pub learn_steps: usize,
    /// `(episode, reward)` recorded at every checkpoint episode.
    pub reward_history: Vec<(usize, f32)>,
    pub final_average_reward: f32,
    pub best_average_reward: f32,
}

/// Channels and flags connecting the training loop to the dashboard.
struct DashboardLink<'a> {
    tx: &'a mpsc::Sender<TrainingUpdate>,
    cmd_rx: &'a mpsc::Receiver<TrainingCommand>,
    pause: &'a AtomicBool,
    quit: &'a AtomicBool,
}

/// Episode loop for Soft Q-Learning on CartPole.
pub struct Trainer {
    config: TrainerConfig,
    env_config: CartPoleConfig,
    checkpoint_manager: CheckpointManager,
}

impl Trainer {
    pub fn new(config: TrainerConfig, env_config: CartPoleConfig) -> Self {
        Self::with_checkpoint_config(config, env_config, CheckpointManagerConfig::default())
    }

    /// Trainer whose checkpoint retention follows `checkpoint_config`. The
    /// directory always comes from `config.checkpoint_dir`.
    pub fn with_checkpoint_config(
        config: TrainerConfig,
        env_config: CartPoleConfig,
        checkpoint_config: CheckpointManagerConfig,
    ) -> Self {
        let checkpoint_manager = CheckpointManager::new(CheckpointManagerConfig {
            checkpoint_dir: config.checkpoint_dir.clone(),
            ..checkpoint_config
        });
        Trainer {
            config,
            env_config,
            checkpoint_manager,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run the full training loop.
    pub fn train<A: TrainableAgent>(
        &self,
        agent: &mut A,
        sink: &mut dyn ScalarSink,
    ) -> Result<TrainingSummary, TrainingError> {
        self.run(agent, sink, None)
    }

    /// Run the training loop while streaming updates to the dashboard.
    /// Ends with `TrainingUpdate::Finished`, or `TrainingUpdate::Failed` when
    /// the loop returns an error.
    pub fn train_with_dashboard<A: TrainableAgent>(
        &self,
        agent: &mut A,
        sink: &mut dyn ScalarSink,
        tx: mpsc::Sender<TrainingUpdate>,
        cmd_rx: mpsc::Receiver<TrainingCommand>,
        pause: Arc<AtomicBool>,
        quit: Arc<AtomicBool>,
    ) -> Result<TrainingSummary, TrainingError> {
        let link = DashboardLink {
            tx: &tx,
            cmd_rx: &cmd_rx,
            pause: &pause,
            quit: &quit,
        };
        let result = self.run(agent, sink, Some(link));
        let last = match &result {
            Ok(_) => TrainingUpdate::Finished,
            Err(e) => TrainingUpdate::Failed(e.to_string()),
        };
        let _ = tx.send(last);
        result
    }

    fn run<A: TrainableAgent>(
        &self,
        agent: &mut A,
        sink: &mut dyn ScalarSink,
        link: Option<DashboardLink<'_>>,
    ) -> Result<TrainingSummary, TrainingError> {
        let window = self.config.moving_average_window.max(1);
        let mut metrics = TrainingMetrics::with_capacity(window.max(100), window);
        let mut timing = TimingMetrics::new();
        let mut summary = TrainingSummary::default();
        let mut env = match self.config.seed {
            Some(seed) => CartPole::with_seed(self.env_config, seed),
            None => CartPole::new(self.env_config),
        };

        let start_episode = agent.episode_count();
        let end_episode = start_episode + self.config.num_episodes;

        info!(
            algorithm = agent.algorithm_name(),
            episodes = self.config.num_episodes,
            start_episode,
            "starting training"
        );

        for episode in start_episode..end_episode {
            if let Some(link) = &link {
                if !self.wait_while_paused(link) {
                    info!(episode, "training stopped from dashboard");
                    break;
                }
                // Manual saves carry the last episode this run completed
                if episode > start_episode {
                    self.handle_commands(agent, &metrics, link, episode - 1);
                }
            }

            let episode_start = Instant::now();
            let trace = match &link {
                Some(link) => run_training_episode_live(
                    agent,
                    &mut env,
                    self.config.max_steps_per_episode,
                    link.tx,
                    self.config.live_update_interval,
                )?,
                None => {
                    run_training_episode(agent, &mut env, self.config.max_steps_per_episode)?
                }
            };
            timing.record_episode_time(episode_start.elapsed());
            if !trace.updates.is_empty() {
                timing.record_update_time(trace.update_time / trace.updates.len() as u32);
            }

            for update in &trace.updates {
                let step = update.learn_step as u64;
                metrics.record_update(update.loss);
                self.log_scalar(sink, LOSS_TAG, update.loss, step);
                self.log_scalar(sink, SOFT_VALUE_TAG, update.soft_value, step);
            }
            agent.finish_episode();
            metrics.record_episode(trace.result);
            summary.episodes += 1;
            self.log_scalar(sink, EPISODE_REWARD_TAG, trace.result.reward, episode as u64);

            debug!(
                episode,
                reward = trace.result.reward,
                length = trace.result.length,
                updates = trace.updates.len(),
                "episode finished"
            );

            if let Some(link) = &link {
                let _ = link.tx.send(TrainingUpdate::Metrics(MetricsSnapshot {
                    episode: episode + 1,
                    total_episodes: end_episode,
                    episode_reward: trace.result.reward,
                    average_reward: metrics.moving_average_reward(),
                    best_average_reward: metrics.best_average_reward(),
                    loss: metrics.average_loss(100),
                    episode_length: trace.result.length,
                    learn_steps: agent.step_count(),
                    algorithm: agent.algorithm_name().to_string(),
                    episodes_per_sec: timing.episodes_per_sec(),
                    avg_episode_ms: timing.avg_episode_ms(100),
                    avg_update_ms: timing.avg_update_ms(100),
                }));
            }

            if episode % self.config.checkpoint_interval == 0 {
                let overhead_start = Instant::now();
                if let Some(path) = self.save_checkpoint(agent, &metrics, episode) {
                    if let Some(link) = &link {
                        let _ = link
                            .tx
                            .send(TrainingUpdate::CheckpointSaved { episode, path });
                    }
                }
                timing.record_overhead(overhead_start.elapsed());

                info!(
                    "Ep {}\treward: {:.1}\tmoving average: {:.2}",
                    episode,
                    trace.result.reward,
                    metrics.moving_average_reward()
                );
                summary.reward_history.push((episode, trace.result.reward));
            } else if episode % self.config.log_interval == 0 {
                info!(
                    episode,
                    average_reward = metrics.moving_average_reward(),
                    loss = metrics.average_loss(100),
                    learn_steps = agent.step_count(),
                    episodes_per_sec = timing.episodes_per_sec(),
                    "progress"
                );
            }
            if episode % self.config.log_interval == 0 {
                timing.reset_window();
            }

            if episode != 0 && episode % self.config.eval_interval == 0 {
                let overhead_start = Instant::now();
                let stats = self.evaluate(agent, episode)?;
                timing.record_overhead(overhead_start.elapsed());

                self.log_scalar(sink, EVAL_REWARD_TAG, stats.mean, episode as u64);
                info!(
                    episode,
                    mean = stats.mean,
                    min = stats.min,
                    max = stats.max,
                    "greedy evaluation ({} episodes)",
                    stats.episodes
                );
                if let Some(link) = &link {
                    let _ = link.tx.send(TrainingUpdate::EvalResult {
                        episode,
                        mean_reward: stats.mean,
                    });
                }
            }
        }

        if let Err(e) = sink.flush() {
            warn!(error = %e, "failed to flush scalar log");
        }

        summary.learn_steps = agent.step_count();
        summary.final_average_reward = metrics.moving_average_reward();
        summary.best_average_reward = metrics.best_average_reward();

        info!(
            episodes = summary.episodes,
            learn_steps = summary.learn_steps,
            final_average_reward = summary.final_average_reward,
            best_average_reward = summary.best_average_reward,
            "training complete"
        );
        Ok(summary)
    }

    /// Greedy evaluation on a separate environment instance.
    pub fn evaluate<A: TrainableAgent>(
        &self,
        agent: &mut A,
        episode: usize,
    ) -> Result<EvalStats, TrainingError> {
        let mut eval_env = match self.config.seed {
            Some(seed) => CartPole::with_seed(self.env_config, episode_seed(seed, episode)),
            None => CartPole::new(self.env_config),
        };
        evaluate(
            agent,
            &mut eval_env,
            self.config.eval_episodes,
            self.config.max_steps_per_episode,
        )
    }

    /// Save a checkpoint. Failures are logged and do not stop training.
    fn save_checkpoint<A: TrainableAgent>(
        &self,
        agent: &A,
        metrics: &TrainingMetrics,
        episode: usize,
    ) -> Option<PathBuf> {
        let ckpt_metrics = CheckpointMetrics {
            episode_reward: metrics.last_reward().unwrap_or(0.0),
            average_reward: metrics.moving_average_reward(),
            current_loss: metrics.average_loss(100),
            learn_steps: agent.step_count(),
        };
        match self
            .checkpoint_manager
            .save_agent_checkpoint(agent, &ckpt_metrics, episode)
        {
            Ok(path) => {
                debug!(episode, path = %path.display(), "checkpoint saved");
                Some(path)
            }
            Err(e) => {
                warn!(episode, error = %e, "checkpoint failed");
                None
            }
        }
    }

    /// Block while paused. Returns false once quit has been requested.
    fn wait_while_paused(&self, link: &DashboardLink<'_>) -> bool {
        while link.pause.load(Ordering::Relaxed) && !link.quit.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(100));
        }
        !link.quit.load(Ordering::Relaxed)
    }

    fn handle_commands<A: TrainableAgent>(
        &self,
        agent: &A,
        metrics: &TrainingMetrics,
        link: &DashboardLink<'_>,
        episode: usize,
    ) {
        while let Ok(cmd) = link.cmd_rx.try_recv() {
            match cmd {
                TrainingCommand::SaveCheckpoint => {
                    if let Some(path) = self.save_checkpoint(agent, metrics, episode) {
                        info!(episode, path = %path.display(), "manual checkpoint saved");
                        let _ = link
                            .tx
                            .send(TrainingUpdate::CheckpointSaved { episode, path });
                    }
                }
            }
        }
    }

    fn log_scalar(&self, sink: &mut dyn ScalarSink, tag: &str, value: f32, step: u64) {
        if let Err(e) = sink.add_scalar(tag, value as f64, step) {
            warn!(tag, step, error = %e, "failed to write scalar");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{Agent, SoftQAgent, SqlConfig};
    use crate::checkpoint::CheckpointMetadata;
    use crate::env::{Observation, ACTION_COUNT};
    use std::io;
    use std::path::Path;

    #[derive(Default)]
    struct RecordingSink {
        records: Vec<(String, f64, u64)>,
    }

    impl RecordingSink {
        fn count(&self, tag: &str) -> usize {
            self.records.iter().filter(|(t, _, _)| t == tag).count()
        }
    }

    impl ScalarSink for RecordingSink {
        fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> io::Result<()> {
            self.records.push((tag.to_string(), value, step));
            Ok(())
        }
    }

    fn small_agent(seed: u64) -> SoftQAgent {
        SoftQAgent::with_seed(
            SqlConfig {
                batch_size: 4,
                learn_start: 8,
                replay_capacity: 256,
                hidden_sizes: [16, 16],
                ..Default::default()
            },
            seed,
        )
    }

    fn test_config(dir: &std::path::Path, num_episodes: usize) -> TrainerConfig {
        TrainerConfig {
            num_episodes,
            max_steps_per_episode: 50,
            log_interval: 5,
            checkpoint_interval: 5,
            eval_interval: 6,
            eval_episodes: 2,
            moving_average_window: 3,
            live_update_interval: 10,
            checkpoint_dir: dir.join("checkpoints"),
            log_dir: dir.join("logs"),
            seed: Some(7),
        }
    }

    fn keep_all() -> CheckpointManagerConfig {
        CheckpointManagerConfig {
            keep_last_n: 100,
            keep_best_n: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = TrainerConfig::default();
        assert_eq!(config.num_episodes, 500);
        assert_eq!(config.max_steps_per_episode, 200);
        assert_eq!(config.checkpoint_interval, 10);
        assert_eq!(config.log_dir, PathBuf::from("logs/sql"));
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_train_checkpoints_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::with_checkpoint_config(
            test_config(dir.path(), 12),
            CartPoleConfig::default(),
            keep_all(),
        );
        let mut agent = small_agent(1);
        let mut sink = RecordingSink::default();

        let summary = trainer.train(&mut agent, &mut sink).unwrap();

        assert_eq!(summary.episodes, 12);
        assert_eq!(agent.episode_count(), 12);
        let history_episodes: Vec<usize> =
            summary.reward_history.iter().map(|(ep, _)| *ep).collect();
        assert_eq!(history_episodes, vec![0, 5, 10]);
        assert!(summary.reward_history.iter().all(|(_, r)| *r >= 1.0));
        assert!(summary.learn_steps > 0, "12 episodes should exceed learn_start");
        assert!(summary.best_average_reward >= summary.final_average_reward);

        assert_eq!(sink.count(EPISODE_REWARD_TAG), 12);
        assert_eq!(sink.count(LOSS_TAG), summary.learn_steps);
        assert_eq!(sink.count(SOFT_VALUE_TAG), summary.learn_steps);
        assert_eq!(sink.count(EVAL_REWARD_TAG), 1);

        let manager = CheckpointManager::new(CheckpointManagerConfig {
            checkpoint_dir: dir.path().join("checkpoints"),
            ..keep_all()
        });
        let episodes: Vec<usize> = manager
            .list_checkpoints()
            .unwrap()
            .iter()
            .map(|(_, m)| m.episode)
            .collect();
        assert_eq!(episodes, vec![0, 5, 10]);
    }

    #[test]
    fn test_resume_continues_episode_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), 12);
        let trainer =
            Trainer::with_checkpoint_config(config.clone(), CartPoleConfig::default(), keep_all());
        let mut agent = small_agent(2);
        trainer.train(&mut agent, &mut RecordingSink::default()).unwrap();

        let manager = CheckpointManager::new(CheckpointManagerConfig {
            checkpoint_dir: config.checkpoint_dir.clone(),
            ..keep_all()
        });
        let data = manager.load_agent_latest().unwrap();
        assert_eq!(data.metadata.episode, 10);

        let mut resumed = small_agent(3);
        resumed
            .restore_training_state_json(&data.training_state_json)
            .unwrap();
        resumed.load_weights_from_dir(&data.path).unwrap();
        assert_eq!(resumed.episode_count(), 11);

        let trainer = Trainer::with_checkpoint_config(
            TrainerConfig {
                num_episodes: 5,
                ..config
            },
            CartPoleConfig::default(),
            keep_all(),
        );
        let mut sink = RecordingSink::default();
        let summary = trainer.train(&mut resumed, &mut sink).unwrap();
        assert_eq!(summary.episodes, 5);
        let history_episodes: Vec<usize> =
            summary.reward_history.iter().map(|(ep, _)| *ep).collect();
        assert_eq!(history_episodes, vec![15]);
        let steps: Vec<u64> = sink
            .records
            .iter()
            .filter(|(t, _, _)| t == EPISODE_REWARD_TAG)
            .map(|(_, _, s)| *s)
            .collect();
        assert_eq!(steps, vec![11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_dashboard_receives_updates() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::with_checkpoint_config(
            test_config(dir.path(), 6),
            CartPoleConfig::default(),
            keep_all(),
        );
        let mut agent = small_agent(4);
        let (tx, rx) = mpsc::channel();
        let (_cmd_tx, cmd_rx) = mpsc::channel();
        let pause = Arc::new(AtomicBool::new(false));
        let quit = Arc::new(AtomicBool::new(false));

        let summary = trainer
            .train_with_dashboard(
                &mut agent,
                &mut RecordingSink::default(),
                tx,
                cmd_rx,
                pause,
                quit,
            )
            .unwrap();
        assert_eq!(summary.episodes, 6);

        let updates: Vec<TrainingUpdate> = rx.try_iter().collect();
        let metrics = updates
            .iter()
            .filter(|u| matches!(u, TrainingUpdate::Metrics(_)))
            .count();
        let frames = updates
            .iter()
            .filter(|u| matches!(u, TrainingUpdate::LiveFrame(_)))
            .count();
        let saved = updates
            .iter()
            .filter(|u| matches!(u, TrainingUpdate::CheckpointSaved { .. }))
            .count();
        assert_eq!(metrics, 6);
        assert!(frames >= 6);
        assert_eq!(saved, 2); // episodes 0 and 5
        // eval_interval is 6, so episode 6 would be the first evaluation
        assert!(!updates
            .iter()
            .any(|u| matches!(u, TrainingUpdate::EvalResult { .. })));
        assert!(matches!(updates.last(), Some(TrainingUpdate::Finished)));
    }

    #[test]
    fn test_quit_flag_stops_training() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::new(test_config(dir.path(), 50), CartPoleConfig::default());
        let mut agent = small_agent(5);
        let (tx, rx) = mpsc::channel();
        let (_cmd_tx, cmd_rx) = mpsc::channel();
        let quit = Arc::new(AtomicBool::new(true));

        let summary = trainer
            .train_with_dashboard(
                &mut agent,
                &mut RecordingSink::default(),
                tx,
                cmd_rx,
                Arc::new(AtomicBool::new(false)),
                quit,
            )
            .unwrap();
        assert_eq!(summary.episodes, 0);
        let updates: Vec<TrainingUpdate> = rx.try_iter().collect();
        assert_eq!(updates.len(), 1);
        assert!(matches!(updates[0], TrainingUpdate::Finished));
    }

    #[test]
    fn test_save_checkpoint_command_labels_last_completed_episode() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig {
            checkpoint_interval: 1000,
            ..test_config(dir.path(), 2)
        };
        let trainer =
            Trainer::with_checkpoint_config(config.clone(), CartPoleConfig::default(), keep_all());
        let mut agent = small_agent(6);
        for _ in 0..3 {
            agent.finish_episode();
        }
        let (tx, rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        cmd_tx.send(TrainingCommand::SaveCheckpoint).unwrap();

        trainer
            .train_with_dashboard(
                &mut agent,
                &mut RecordingSink::default(),
                tx,
                cmd_rx,
                Arc::new(AtomicBool::new(false)),
                Arc::new(AtomicBool::new(false)),
            )
            .unwrap();

        let saved: Vec<usize> = rx
            .try_iter()
            .filter_map(|u| match u {
                TrainingUpdate::CheckpointSaved { episode, .. } => Some(episode),
                _ => None,
            })
            .collect();
        // Episodes 3 and 4 run; the save waits for episode 3 to finish
        assert_eq!(saved, vec![3]);

        let manager = CheckpointManager::new(CheckpointManagerConfig {
            checkpoint_dir: config.checkpoint_dir,
            ..keep_all()
        });
        let data = manager.load_agent_latest().unwrap();
        assert_eq!(data.metadata.episode, 3);
        assert!(data.metadata.metrics.episode_reward >= 1.0);
    }

    /// Always picks an action the environment does not have.
    struct BrokenAgent;

    impl Agent for BrokenAgent {
        fn select_action(&mut self, _observation: &Observation, _training: bool) -> usize {
            ACTION_COUNT
        }

        fn name(&self) -> &str {
            "Broken"
        }
    }

    impl TrainableAgent for BrokenAgent {
        fn algorithm_name(&self) -> &str {
            "Broken"
        }
        fn episode_count(&self) -> usize {
            0
        }
        fn step_count(&self) -> usize {
            0
        }
        fn finish_episode(&mut self) {}
        fn is_learning(&self) -> bool {
            false
        }
        fn save_weights_to_dir(&self, _dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
        fn load_weights_from_dir(&mut self, _dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
        fn training_state_json(&self) -> Result<String, serde_json::Error> {
            Ok("{}".to_string())
        }
        fn restore_training_state_json(&mut self, _json: &str) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
        fn build_checkpoint_metadata(
            &self,
            _metrics: &CheckpointMetrics,
            _episode: usize,
            _timestamp: u64,
        ) -> CheckpointMetadata {
            unreachable!("no episode completes")
        }
    }

    #[test]
    fn test_dashboard_is_told_when_training_fails() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::new(test_config(dir.path(), 3), CartPoleConfig::default());
        let (tx, rx) = mpsc::channel();
        let (_cmd_tx, cmd_rx) = mpsc::channel();

        let err = trainer
            .train_with_dashboard(
                &mut BrokenAgent,
                &mut RecordingSink::default(),
                tx,
                cmd_rx,
                Arc::new(AtomicBool::new(false)),
                Arc::new(AtomicBool::new(false)),
            )
            .unwrap_err();
        assert!(matches!(err, TrainingError::IllegalAction { .. }));

        let updates: Vec<TrainingUpdate> = rx.try_iter().collect();
        assert!(!updates.iter().any(|u| matches!(u, TrainingUpdate::Finished)));
        match updates.last() {
            Some(TrainingUpdate::Failed(message)) => assert_eq!(message, &err.to_string()),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
