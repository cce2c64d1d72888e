//! Simulated control environments: the CartPole pole-balancing task and the
//! `Environment` trait the training loop drives.

mod cartpole;

pub use cartpole::{CartPole, CartPoleConfig, CartPoleState, Push};

use crate::error::EnvError;

/// Number of observation features exposed by CartPole.
pub const OBSERVATION_SIZE: usize = 4;

/// Number of discrete actions (push left, push right).
pub const ACTION_COUNT: usize = 2;

/// `[cart_position, cart_velocity, pole_angle, pole_angular_velocity]`.
pub type Observation = [f32; OBSERVATION_SIZE];

/// Result of a single environment transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f32,
    /// The episode reached a terminal state; no further reward follows.
    pub terminated: bool,
    /// The episode was cut off by the time limit.
    pub truncated: bool,
}

impl StepOutcome {
    /// True when the episode is over for either reason.
    pub fn is_finished(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Episodic environment with a discrete action set.
pub trait Environment {
    /// Start a new episode and return the first observation.
    fn reset(&mut self) -> Observation;

    /// Apply `action` and advance the simulation by one step.
    fn step(&mut self, action: usize) -> Result<StepOutcome, EnvError>;

    fn action_count(&self) -> usize;
}
