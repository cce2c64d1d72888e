use std::path::PathBuf;

/// Errors raised by the simulated environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    #[error("invalid action {action} (expected 0..{action_count})")]
    InvalidAction { action: usize, action_count: usize },

    #[error("episode has finished; call reset() before stepping again")]
    EpisodeFinished,

    #[error("environment stepped before the first reset()")]
    NotReset,
}

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint directory not found: {0}")]
    DirNotFound(PathBuf),

    #[error("no 'latest' symlink found in {0}")]
    NoLatestSymlink(PathBuf),

    #[error("failed to read metadata from {path}: {source}")]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse metadata from {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to save model: {0}")]
    ModelSave(String),

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during training.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("environment error: {0}")]
    Env(#[from] EnvError),

    #[error("agent selected action {action} but the environment has {action_count} actions")]
    IllegalAction { action: usize, action_count: usize },

    #[error("failed to read tensor data: {0}")]
    TensorData(String),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_error_display() {
        let err = CheckpointError::NoLatestSymlink(PathBuf::from("checkpoints"));
        assert_eq!(
            err.to_string(),
            "no 'latest' symlink found in checkpoints"
        );
    }

    #[test]
    fn test_env_error_display() {
        let err = EnvError::InvalidAction {
            action: 5,
            action_count: 2,
        };
        assert_eq!(err.to_string(), "invalid action 5 (expected 0..2)");
    }

    #[test]
    fn test_training_error_wraps_env_error() {
        let err: TrainingError = EnvError::EpisodeFinished.into();
        assert_eq!(
            err.to_string(),
            "environment error: episode has finished; call reset() before stepping again"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("sql.alpha must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "config validation error: sql.alpha must be > 0"
        );
    }
}
