mod soft_q_network;

pub use soft_q_network::{soft_value, SoftQNetwork, SoftQNetworkConfig};
