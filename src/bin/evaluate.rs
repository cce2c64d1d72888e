#![recursion_limit = "256"]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use soft_q_cartpole::ai::{Agent, RandomAgent, SoftQAgent, TrainableAgent};
use soft_q_cartpole::checkpoint::{CheckpointManager, CheckpointManagerConfig};
use soft_q_cartpole::config::AppConfig;
use soft_q_cartpole::env::{CartPole, Observation};
use soft_q_cartpole::logging;
use soft_q_cartpole::training::episode::{evaluate, EvalStats};

/// Evaluate a trained Soft Q-Learning checkpoint on CartPole.
#[derive(Parser)]
#[command(name = "evaluate", about = "Evaluate a trained CartPole agent")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Checkpoint directory to load (defaults to the latest checkpoint)
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Number of evaluation episodes
    #[arg(long, default_value_t = 20)]
    episodes: usize,

    /// Step limit per episode (defaults to the environment time limit)
    #[arg(long)]
    max_steps: Option<usize>,

    /// Sample from the Boltzmann policy instead of acting greedily
    #[arg(long)]
    stochastic: bool,

    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    logging::init_console_logging();
    let cli = Cli::parse();

    let app_config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    let manager = CheckpointManager::new(CheckpointManagerConfig {
        checkpoint_dir: app_config.training.checkpoint_dir.clone(),
        ..app_config.checkpoint.clone()
    });
    let data = match &cli.checkpoint {
        Some(dir) => manager.load_agent_checkpoint(dir),
        None => manager.load_agent_latest(),
    }
    .context("loading checkpoint")?;

    let mut agent = SoftQAgent::new(app_config.sql.clone());
    agent
        .restore_training_state_json(&data.training_state_json)
        .map_err(|e| anyhow::anyhow!("restoring training state: {e}"))?;
    agent
        .load_from_dir(&data.path)
        .context("loading checkpoint weights")?;
    info!(
        path = %data.path.display(),
        episode = data.metadata.episode,
        average_reward = data.metadata.metrics.average_reward,
        "loaded checkpoint"
    );

    let max_steps = cli.max_steps.unwrap_or(app_config.env.max_episode_steps);
    let new_env = || match cli.seed {
        Some(seed) => CartPole::with_seed(app_config.env, seed),
        None => CartPole::new(app_config.env),
    };

    let trained = if cli.stochastic {
        let mut policy = BoltzmannPolicy(&mut agent);
        evaluate(&mut policy, &mut new_env(), cli.episodes, max_steps)?
    } else {
        evaluate(&mut agent, &mut new_env(), cli.episodes, max_steps)?
    };
    let baseline = {
        let mut random = match cli.seed {
            Some(seed) => RandomAgent::with_seed(seed),
            None => RandomAgent::new(),
        };
        evaluate(&mut random, &mut new_env(), cli.episodes, max_steps)?
    };

    report("SQL", &trained);
    report("Random", &baseline);
    Ok(())
}

/// Acts with the training-time Boltzmann policy and never learns.
struct BoltzmannPolicy<'a>(&'a mut SoftQAgent);

impl Agent for BoltzmannPolicy<'_> {
    fn select_action(&mut self, observation: &Observation, _training: bool) -> usize {
        self.0.select_action(observation, true)
    }

    fn name(&self) -> &str {
        "SoftQ (stochastic)"
    }
}

fn report(name: &str, stats: &EvalStats) {
    info!(
        agent = name,
        episodes = stats.episodes,
        mean = stats.mean,
        min = stats.min,
        max = stats.max,
        "evaluation"
    );
}
