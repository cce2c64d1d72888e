mod manager;
mod metadata;

pub use manager::{AgentCheckpointData, CheckpointManager, CheckpointManagerConfig};
pub use metadata::{CheckpointMetadata, CheckpointMetrics, SqlHyperparameters, SqlTrainingState};
