mod agent;
pub mod algorithms;
pub mod networks;
mod random;
pub mod state_encoding;

pub use agent::{Agent, Experience, TrainableAgent, UpdateMetrics};
pub use algorithms::{SoftQAgent, SqlConfig};
pub use networks::{soft_value, SoftQNetwork, SoftQNetworkConfig};
pub use random::RandomAgent;
