use std::path::Path;

use tracing::warn;

use crate::ai::SqlConfig;
use crate::checkpoint::CheckpointManagerConfig;
use crate::env::CartPoleConfig;
use crate::error::ConfigError;
use crate::training::trainer::TrainerConfig;

/// Top-level application configuration, loadable from TOML.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sql: SqlConfig,
    pub env: CartPoleConfig,
    pub training: TrainerConfig,
    pub checkpoint: CheckpointManagerConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sql = &self.sql;
        if !(sql.learning_rate > 0.0) {
            return Err(invalid("sql.learning_rate must be > 0"));
        }
        if !(0.0..=1.0).contains(&sql.gamma) {
            return Err(invalid("sql.gamma must be in [0, 1]"));
        }
        if !(sql.alpha > 0.0) {
            return Err(invalid("sql.alpha must be > 0"));
        }
        if sql.batch_size == 0 {
            return Err(invalid("sql.batch_size must be > 0"));
        }
        if sql.replay_capacity < sql.batch_size {
            return Err(invalid("sql.replay_capacity must be >= sql.batch_size"));
        }
        if sql.replay_capacity <= sql.learn_start {
            return Err(invalid("sql.replay_capacity must be > sql.learn_start"));
        }
        if sql.target_update_interval == 0 {
            return Err(invalid("sql.target_update_interval must be > 0"));
        }
        if sql.hidden_sizes.iter().any(|&h| h == 0) {
            return Err(invalid("sql.hidden_sizes must all be > 0"));
        }

        let env = &self.env;
        let physical = [
            ("env.gravity", env.gravity),
            ("env.mass_cart", env.mass_cart),
            ("env.mass_pole", env.mass_pole),
            ("env.half_pole_length", env.half_pole_length),
            ("env.force_mag", env.force_mag),
            ("env.tau", env.tau),
            ("env.x_threshold", env.x_threshold),
            ("env.theta_threshold_degrees", env.theta_threshold_degrees),
        ];
        for (name, value) in physical {
            if !(value > 0.0) {
                return Err(ConfigError::Validation(format!("{name} must be > 0")));
            }
        }
        if env.max_episode_steps == 0 {
            return Err(invalid("env.max_episode_steps must be > 0"));
        }

        let training = &self.training;
        let intervals = [
            ("training.num_episodes", training.num_episodes),
            ("training.max_steps_per_episode", training.max_steps_per_episode),
            ("training.log_interval", training.log_interval),
            ("training.checkpoint_interval", training.checkpoint_interval),
            ("training.eval_interval", training.eval_interval),
            ("training.moving_average_window", training.moving_average_window),
            ("training.live_update_interval", training.live_update_interval),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be > 0")));
            }
        }

        if self.checkpoint.keep_last_n == 0 {
            return Err(invalid("checkpoint.keep_last_n must be > 0"));
        }

        Ok(())
    }

    /// Generate a TOML string with all default values (useful for creating
    /// example config files).
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&AppConfig::default())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Validation(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::replay_buffer::SampleMode;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().expect("default config should be valid");
    }

    #[test]
    fn test_defaults_match_reference_run() {
        let config = AppConfig::default();
        assert!((config.sql.learning_rate - 1e-4).abs() < 1e-12);
        assert!((config.sql.gamma - 0.99).abs() < 1e-6);
        assert!((config.sql.alpha - 4.0).abs() < 1e-6);
        assert_eq!(config.sql.batch_size, 16);
        assert_eq!(config.sql.replay_capacity, 50_000);
        assert_eq!(config.sql.learn_start, 128);
        assert_eq!(config.sql.target_update_interval, 4);
        assert_eq!(config.training.num_episodes, 500);
        assert_eq!(config.training.max_steps_per_episode, 200);
        assert_eq!(config.training.checkpoint_interval, 10);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[sql]
alpha = 2.0
sample_mode = "contiguous"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!((config.sql.alpha - 2.0).abs() < 1e-6);
        assert_eq!(config.sql.sample_mode, SampleMode::Contiguous);
        // Other fields should be defaults
        assert!((config.sql.gamma - 0.99).abs() < 1e-6);
        assert_eq!(config.training.num_episodes, 500);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        let default = AppConfig::default();
        assert!((config.sql.learning_rate - default.sql.learning_rate).abs() < 1e-12);
        assert_eq!(config.training.num_episodes, default.training.num_episodes);
        assert_eq!(config.env.max_episode_steps, default.env.max_episode_steps);
    }

    #[test]
    fn test_validation_rejects_zero_episodes() {
        let mut config = AppConfig::default();
        config.training.num_episodes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_positive_lr() {
        let mut config = AppConfig::default();
        config.sql.learning_rate = 0.0;
        assert!(config.validate().is_err());
        config.sql.learning_rate = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_keeping_no_recent_checkpoints() {
        let mut config = AppConfig::default();
        config.checkpoint.keep_last_n = 0;
        config.checkpoint.keep_best_n = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "config validation error: checkpoint.keep_last_n must be > 0"
        );

        config.checkpoint.keep_last_n = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_invalid_gamma() {
        let mut config = AppConfig::default();
        config.sql.gamma = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_alpha() {
        let mut config = AppConfig::default();
        config.sql.alpha = 0.0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "config validation error: sql.alpha must be > 0");
    }

    #[test]
    fn test_validation_rejects_replay_capacity_lt_batch() {
        let mut config = AppConfig::default();
        config.sql.replay_capacity = 10;
        config.sql.batch_size = 64;
        config.sql.learn_start = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_capacity_not_above_learn_start() {
        let mut config = AppConfig::default();
        config.sql.replay_capacity = 128;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_target_interval() {
        let mut config = AppConfig::default();
        config.sql.target_update_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_hidden_size() {
        let mut config = AppConfig::default();
        config.sql.hidden_sizes = [64, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_negative_tau() {
        let mut config = AppConfig::default();
        config.env.tau = -0.02;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("env.tau"));
    }

    #[test]
    fn test_validation_rejects_zero_intervals() {
        let mut config = AppConfig::default();
        config.training.checkpoint_interval = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.training.live_update_interval = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.training.moving_average_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AppConfig::load_or_default(Path::new("nonexistent_config.toml")).unwrap();
        assert_eq!(config.training.num_episodes, 500);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
[training]
num_episodes = 50
seed = 3

[env]
force_mag = 5.0
"#
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.training.num_episodes, 50);
        assert_eq!(config.training.seed, Some(3));
        assert!((config.env.force_mag - 5.0).abs() < 1e-9);
        // Others are defaults
        assert!((config.sql.learning_rate - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[sql]\ngamma = 2.0\n").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Validation(_))
        ));

        std::fs::write(&path, "[sql\n").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_default_toml_roundtrips() {
        let toml_str = AppConfig::default_toml().unwrap();
        let config: AppConfig = toml::from_str(&toml_str).unwrap();
        config.validate().expect("roundtripped config should be valid");
    }
}
