mod sql;

pub use sql::{boltzmann_probabilities, SoftQAgent, SqlConfig};
