use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use super::agent::Agent;
use crate::env::{Observation, ACTION_COUNT};

/// An agent that pushes left or right uniformly at random.
pub struct RandomAgent {
    rng: StdRng,
}

impl RandomAgent {
    pub fn new() -> Self {
        RandomAgent {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        RandomAgent {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent for RandomAgent {
    fn select_action(&mut self, _observation: &Observation, _training: bool) -> usize {
        self.rng.random_range(0..ACTION_COUNT)
    }

    fn name(&self) -> &str {
        "Random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{CartPole, CartPoleConfig, Environment};

    #[test]
    fn test_random_agent_selects_valid_action() {
        let mut agent = RandomAgent::new();
        let obs = [0.0; 4];
        for _ in 0..100 {
            assert!(agent.select_action(&obs, false) < ACTION_COUNT);
        }
    }

    #[test]
    fn test_random_agent_plays_full_episode() {
        let mut agent = RandomAgent::with_seed(4);
        let mut env = CartPole::with_seed(CartPoleConfig::default(), 4);
        let mut obs = env.reset();
        let mut steps = 0;
        loop {
            let action = agent.select_action(&obs, true);
            let outcome = env.step(action).unwrap();
            steps += 1;
            if outcome.is_finished() {
                break;
            }
            obs = outcome.observation;
        }
        assert!(steps > 0 && steps <= 500);
    }

    #[test]
    fn test_random_agent_name() {
        let agent = RandomAgent::new();
        assert_eq!(agent.name(), "Random");
    }
}
