use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Environment, Observation, StepOutcome, ACTION_COUNT};
use crate::error::EnvError;

/// Physical constants and episode limits for [`CartPole`].
///
/// Defaults match the Gym `CartPole-v1` task.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CartPoleConfig {
    /// Downward acceleration of gravity (m/s^2)
    pub gravity: f64,
    /// Mass of the cart (kg)
    pub mass_cart: f64,
    /// Mass of the pole (kg)
    pub mass_pole: f64,
    /// Half the length of the pole (m)
    pub half_pole_length: f64,
    /// Magnitude of the force applied by an action (N)
    pub force_mag: f64,
    /// Integration time step (s)
    pub tau: f64,
    /// Cart position beyond which the episode terminates (m)
    pub x_threshold: f64,
    /// Pole angle beyond which the episode terminates (degrees)
    pub theta_threshold_degrees: f64,
    /// Time limit; reaching it truncates the episode
    pub max_episode_steps: usize,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        CartPoleConfig {
            gravity: 9.8,
            mass_cart: 1.0,
            mass_pole: 0.1,
            half_pole_length: 0.5,
            force_mag: 10.0,
            tau: 0.02,
            x_threshold: 2.4,
            theta_threshold_degrees: 12.0,
            max_episode_steps: 500,
        }
    }
}

impl CartPoleConfig {
    pub fn theta_threshold_radians(&self) -> f64 {
        self.theta_threshold_degrees.to_radians()
    }
}

/// Direction of the force applied to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Left,
    Right,
}

impl Push {
    pub fn from_action(action: usize) -> Option<Push> {
        match action {
            0 => Some(Push::Left),
            1 => Some(Push::Right),
            _ => None,
        }
    }
}

/// Physical state of the cart and pole.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CartPoleState {
    /// Cart position from the track midpoint (m)
    pub x: f64,
    /// Cart velocity (m/s)
    pub x_dot: f64,
    /// Pole angle from vertical (radians)
    pub theta: f64,
    /// Pole angular velocity (radians/s)
    pub theta_dot: f64,
}

impl CartPoleState {
    pub fn observation(&self) -> Observation {
        [
            self.x as f32,
            self.x_dot as f32,
            self.theta as f32,
            self.theta_dot as f32,
        ]
    }
}

/// Cart-pole balancing task.
///
/// A pole is hinged on top of a cart that moves along a frictionless track.
/// Each step the agent pushes the cart left or right and receives a reward of
/// 1.0. The episode terminates when the pole falls past the angle threshold or
/// the cart leaves the track, and is truncated at `max_episode_steps`.
pub struct CartPole {
    config: CartPoleConfig,
    state: CartPoleState,
    elapsed_steps: usize,
    needs_reset: bool,
    started: bool,
    rng: StdRng,
}

impl CartPole {
    pub fn new(config: CartPoleConfig) -> Self {
        Self::from_rng(config, StdRng::from_os_rng())
    }

    pub fn with_seed(config: CartPoleConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(config: CartPoleConfig, rng: StdRng) -> Self {
        CartPole {
            config,
            state: CartPoleState::default(),
            elapsed_steps: 0,
            needs_reset: true,
            started: false,
            rng,
        }
    }

    pub fn config(&self) -> &CartPoleConfig {
        &self.config
    }

    pub fn state(&self) -> CartPoleState {
        self.state
    }

    pub fn elapsed_steps(&self) -> usize {
        self.elapsed_steps
    }

    /// Overwrite the physical state (used for scripted scenarios and tests).
    pub fn set_state(&mut self, state: CartPoleState) {
        self.state = state;
        self.elapsed_steps = 0;
        self.needs_reset = false;
        self.started = true;
    }

    /// Euler integration of the cart-pole equations of motion.
    fn integrate(&self, force: f64) -> CartPoleState {
        let c = &self.config;
        let s = &self.state;
        let total_mass = c.mass_cart + c.mass_pole;
        let pole_mass_length = c.mass_pole * c.half_pole_length;

        let (sin_theta, cos_theta) = s.theta.sin_cos();
        let temp = (force + pole_mass_length * s.theta_dot * s.theta_dot * sin_theta) / total_mass;
        let theta_acc = (c.gravity * sin_theta - cos_theta * temp)
            / (c.half_pole_length
                * (4.0 / 3.0 - c.mass_pole * cos_theta * cos_theta / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        CartPoleState {
            x: s.x + c.tau * s.x_dot,
            x_dot: s.x_dot + c.tau * x_acc,
            theta: s.theta + c.tau * s.theta_dot,
            theta_dot: s.theta_dot + c.tau * theta_acc,
        }
    }

    fn is_out_of_bounds(&self, state: &CartPoleState) -> bool {
        let theta_threshold = self.config.theta_threshold_radians();
        state.x < -self.config.x_threshold
            || state.x > self.config.x_threshold
            || state.theta < -theta_threshold
            || state.theta > theta_threshold
    }
}

impl Environment for CartPole {
    fn reset(&mut self) -> Observation {
        let mut sample = || self.rng.random_range(-0.05f64..0.05);
        self.state = CartPoleState {
            x: sample(),
            x_dot: sample(),
            theta: sample(),
            theta_dot: sample(),
        };
        self.elapsed_steps = 0;
        self.needs_reset = false;
        self.started = true;
        self.state.observation()
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome, EnvError> {
        if !self.started {
            return Err(EnvError::NotReset);
        }
        if self.needs_reset {
            return Err(EnvError::EpisodeFinished);
        }
        let push = Push::from_action(action).ok_or(EnvError::InvalidAction {
            action,
            action_count: ACTION_COUNT,
        })?;
        let force = match push {
            Push::Left => -self.config.force_mag,
            Push::Right => self.config.force_mag,
        };

        self.state = self.integrate(force);
        self.elapsed_steps += 1;

        let terminated = self.is_out_of_bounds(&self.state);
        let truncated = !terminated && self.elapsed_steps >= self.config.max_episode_steps;
        self.needs_reset = terminated || truncated;

        Ok(StepOutcome {
            observation: self.state.observation(),
            reward: 1.0,
            terminated,
            truncated,
        })
    }

    fn action_count(&self) -> usize {
        ACTION_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_samples_small_state() {
        let mut env = CartPole::with_seed(CartPoleConfig::default(), 7);
        for _ in 0..20 {
            let obs = env.reset();
            for v in obs {
                assert!(v.abs() <= 0.05, "component {} out of range", v);
            }
        }
    }

    #[test]
    fn test_seeded_resets_are_reproducible() {
        let mut a = CartPole::with_seed(CartPoleConfig::default(), 42);
        let mut b = CartPole::with_seed(CartPoleConfig::default(), 42);
        assert_eq!(a.reset(), b.reset());
        assert_eq!(a.step(1).unwrap(), b.step(1).unwrap());
    }

    #[test]
    fn test_step_before_reset_errors() {
        let mut env = CartPole::new(CartPoleConfig::default());
        assert_eq!(env.step(0), Err(EnvError::NotReset));
    }

    #[test]
    fn test_invalid_action() {
        let mut env = CartPole::new(CartPoleConfig::default());
        env.reset();
        assert_eq!(
            env.step(2),
            Err(EnvError::InvalidAction {
                action: 2,
                action_count: 2
            })
        );
    }

    #[test]
    fn test_push_right_accelerates_cart_right() {
        let mut env = CartPole::new(CartPoleConfig::default());
        env.set_state(CartPoleState::default());
        let outcome = env.step(1).unwrap();
        // Euler: position lags velocity by one step
        assert_eq!(outcome.observation[0], 0.0);
        assert!(outcome.observation[1] > 0.0);
        // Pole tips the opposite way
        assert!(outcome.observation[3] < 0.0);
        assert_eq!(outcome.reward, 1.0);
        assert!(!outcome.terminated);
    }

    #[test]
    fn test_balanced_state_single_step_matches_reference() {
        let mut env = CartPole::new(CartPoleConfig::default());
        env.set_state(CartPoleState::default());
        let outcome = env.step(1).unwrap();
        // temp = 10 / 1.1; theta_acc = -temp / (0.5 * (4/3 - 0.1/1.1))
        let temp = 10.0 / 1.1;
        let theta_acc = -temp / (0.5 * (4.0 / 3.0 - 0.1 / 1.1));
        let x_acc = temp - 0.05 * theta_acc / 1.1;
        assert!((outcome.observation[1] as f64 - 0.02 * x_acc).abs() < 1e-6);
        assert!((outcome.observation[3] as f64 - 0.02 * theta_acc).abs() < 1e-6);
    }

    #[test]
    fn test_terminates_when_pole_falls() {
        let mut env = CartPole::new(CartPoleConfig::default());
        env.set_state(CartPoleState {
            theta: 0.2,
            theta_dot: 1.0,
            ..Default::default()
        });
        let outcome = env.step(0).unwrap();
        assert!(outcome.terminated);
        assert!(!outcome.truncated);
        assert_eq!(env.step(0), Err(EnvError::EpisodeFinished));
    }

    #[test]
    fn test_terminates_when_cart_leaves_track() {
        let mut env = CartPole::new(CartPoleConfig::default());
        env.set_state(CartPoleState {
            x: 2.39,
            x_dot: 5.0,
            ..Default::default()
        });
        assert!(env.step(1).unwrap().terminated);
    }

    #[test]
    fn test_truncates_at_time_limit() {
        let config = CartPoleConfig {
            max_episode_steps: 3,
            ..Default::default()
        };
        let mut env = CartPole::new(config);
        env.set_state(CartPoleState::default());
        let mut last = None;
        for i in 0..3 {
            // Alternate pushes to stay upright
            last = Some(env.step(i % 2).unwrap());
        }
        let last = last.unwrap();
        assert!(last.truncated);
        assert!(!last.terminated);
        assert!(last.is_finished());

        env.reset();
        assert_eq!(env.elapsed_steps(), 0);
        assert!(env.step(0).is_ok());
    }

    #[test]
    fn test_always_pushing_one_way_ends_episode() {
        let mut env = CartPole::with_seed(CartPoleConfig::default(), 3);
        env.reset();
        let mut steps = 0;
        loop {
            steps += 1;
            if env.step(1).unwrap().is_finished() {
                break;
            }
        }
        assert!(steps < 100, "constant push should topple the pole quickly");
    }
}
