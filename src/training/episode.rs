use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::ai::{Agent, Experience, UpdateMetrics};
use crate::env::{CartPole, Environment};
use crate::error::TrainingError;
use crate::training::dashboard_msg::{LiveFrame, TrainingUpdate};
use crate::training::metrics::EpisodeResult;

/// Result of playing a single training episode.
#[derive(Debug, Clone)]
pub struct EpisodeTrace {
    pub result: EpisodeResult,
    /// Metrics of every gradient update performed during the episode.
    pub updates: Vec<UpdateMetrics>,
    /// Wall time spent inside `Agent::update`.
    pub update_time: Duration,
    /// The pole fell or the cart left the track (as opposed to running out of steps).
    pub terminated: bool,
}

/// Summary of a batch of greedy evaluation episodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalStats {
    pub episodes: usize,
    pub mean: f32,
    pub min: f32,
    pub max: f32,
}

/// Play one training episode of at most `max_steps` steps.
pub fn run_training_episode<E: Environment>(
    agent: &mut dyn Agent,
    env: &mut E,
    max_steps: usize,
) -> Result<EpisodeTrace, TrainingError> {
    run_episode_with(agent, env, max_steps, |_, _| {})
}

/// Play one training episode, sending the cart-pole state every
/// `live_update_interval` steps and once more at the end.
pub fn run_training_episode_live(
    agent: &mut dyn Agent,
    env: &mut CartPole,
    max_steps: usize,
    tx: &mpsc::Sender<TrainingUpdate>,
    live_update_interval: usize,
) -> Result<EpisodeTrace, TrainingError> {
    let interval = live_update_interval.max(1);
    let trace = run_episode_with(agent, env, max_steps, |env, step| {
        if step % interval == 0 {
            let _ = tx.send(TrainingUpdate::LiveFrame(LiveFrame {
                state: env.state(),
                step,
            }));
        }
    })?;

    // Send final state
    let _ = tx.send(TrainingUpdate::LiveFrame(LiveFrame {
        state: env.state(),
        step: trace.result.length,
    }));
    Ok(trace)
}

fn run_episode_with<E, F>(
    agent: &mut dyn Agent,
    env: &mut E,
    max_steps: usize,
    mut on_step: F,
) -> Result<EpisodeTrace, TrainingError>
where
    E: Environment,
    F: FnMut(&E, usize),
{
    let action_count = env.action_count();
    let mut observation = env.reset();
    let mut total_reward = 0.0;
    let mut length = 0;
    let mut terminated = false;
    let mut updates = Vec::new();
    let mut update_time = Duration::ZERO;

    for step in 1..=max_steps {
        let action = agent.select_action(&observation, true);
        if action >= action_count {
            return Err(TrainingError::IllegalAction {
                action,
                action_count,
            });
        }
        let outcome = env.step(action)?;
        total_reward += outcome.reward;
        length = step;

        let update_start = Instant::now();
        let update = agent.update(Experience {
            state: observation,
            next_state: outcome.observation,
            action,
            reward: outcome.reward,
            // Truncation still bootstraps from next_state.
            done: outcome.terminated,
        })?;
        update_time += update_start.elapsed();
        if let Some(m) = update {
            updates.push(m);
        }

        on_step(env, step);

        if outcome.is_finished() {
            terminated = outcome.terminated;
            break;
        }
        observation = outcome.observation;
    }

    Ok(EpisodeTrace {
        result: EpisodeResult {
            reward: total_reward,
            length,
        },
        updates,
        update_time,
        terminated,
    })
}

/// Play one greedy episode without learning. Returns the total reward.
pub fn run_eval_episode<E: Environment>(
    agent: &mut dyn Agent,
    env: &mut E,
    max_steps: usize,
) -> Result<f32, TrainingError> {
    let mut observation = env.reset();
    let mut total_reward = 0.0;

    for _ in 0..max_steps {
        let action = agent.select_action(&observation, false);
        let outcome = env.step(action)?;
        total_reward += outcome.reward;
        if outcome.is_finished() {
            break;
        }
        observation = outcome.observation;
    }

    Ok(total_reward)
}

/// Evaluate the agent greedily over `episodes` episodes.
pub fn evaluate<E: Environment>(
    agent: &mut dyn Agent,
    env: &mut E,
    episodes: usize,
    max_steps: usize,
) -> Result<EvalStats, TrainingError> {
    if episodes == 0 {
        return Ok(EvalStats {
            episodes: 0,
            mean: 0.0,
            min: 0.0,
            max: 0.0,
        });
    }

    let mut total = 0.0;
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for _ in 0..episodes {
        let reward = run_eval_episode(agent, env, max_steps)?;
        total += reward;
        min = min.min(reward);
        max = max.max(reward);
    }

    Ok(EvalStats {
        episodes,
        mean: total / episodes as f32,
        min,
        max,
    })
}

/// Derive a deterministic seed for a given episode index.
pub fn episode_seed(base_seed: u64, episode_index: usize) -> u64 {
    // FNV-1a-style mixing
    let mut hash = base_seed ^ 0x517cc1b727220a95;
    let index = episode_index as u64;
    hash = hash.wrapping_mul(0x100000001b3);
    hash ^= index;
    hash = hash.wrapping_mul(0x100000001b3);
    hash ^= index >> 32;
    hash
}
