// Required external crates for configuration management and serialization
use serde::Deserialize;
use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};

use crate::seq2seq::GenerationOptions;

/// Dimensions and seed of the toy encoder/decoder
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Shared source/target vocabulary size
    pub vocab_size: usize,
    /// Token embedding width
    pub embed_dim: usize,
    /// GRU hidden width, also the attention scoring width
    pub num_hiddens: usize,
    /// Number of stacked GRU layers
    pub num_layers: usize,
    /// Seed for parameter initialization
    pub seed: u64,
}

/// Configuration for greedy generation
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Source length after padding, and maximum number of generated tokens
    pub num_steps: usize,
    /// Beginning-of-sequence token id
    pub bos: usize,
    /// End-of-sequence token id
    pub eos: usize,
    /// Padding token id
    pub pad: usize,
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Optional log directory; logs go to stderr when unset
    pub file: Option<PathBuf>,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Model-related settings
    pub model: ModelConfig,
    /// Generation-related settings
    pub generation: GenerationConfig,
    /// Logging-related settings
    pub logging: LoggingConfig,
}

/// Implementation for loading and parsing configuration
impl Settings {
    /// Loads settings from `./config` in the current directory.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::current_dir()
            .map_err(|e| ConfigError::Message(
                format!("Failed to get current directory: {}", e)
            ))?
            .join("config");

        Self::from_dir(&config_dir)
    }

    /// Creates a new Settings instance by loading config from multiple sources
    /// in the following order of precedence (highest to lowest):
    /// 1. Environment variables prefixed with SEQATTN__ (e.g. SEQATTN__MODEL__SEED)
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml) if present
    /// 4. Built-in defaults
    pub fn from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let settings = Self::builder(config_dir)?
            .add_source(Environment::with_prefix("SEQATTN").prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;

        // Validate settings after loading
        settings.validate()?;

        Ok(settings)
    }

    /// File-only layering, without the environment
    fn builder(
        config_dir: &Path,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let default_config = config_dir.join("default.toml");
        let local_config = config_dir.join("local.toml");

        Ok(Config::builder()
            .set_default("model.vocab_size", 32_i64)?
            .set_default("model.embed_dim", 32_i64)?
            .set_default("model.num_hiddens", 32_i64)?
            .set_default("model.num_layers", 2_i64)?
            .set_default("model.seed", 0_i64)?
            .set_default("generation.num_steps", 10_i64)?
            .set_default("generation.bos", 1_i64)?
            .set_default("generation.eos", 2_i64)?
            .set_default("generation.pad", 0_i64)?
            .set_default("logging.level", "info")?
            .add_source(File::from(default_config).required(false))
            .add_source(File::from(local_config).required(false)))
    }

    /// Generation options for the library
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            num_steps: self.generation.num_steps,
            bos: self.generation.bos,
            eos: self.generation.eos,
            pad: self.generation.pad,
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        let dims = [
            ("vocab_size", self.model.vocab_size),
            ("embed_dim", self.model.embed_dim),
            ("num_hiddens", self.model.num_hiddens),
            ("num_layers", self.model.num_layers),
            ("num_steps", self.generation.num_steps),
        ];
        for (name, value) in dims {
            if value == 0 {
                return Err(ConfigError::Message(
                    format!("{} must be greater than 0", name)
                ));
            }
        }

        // Special tokens must exist in the vocabulary
        let specials = [
            ("bos", self.generation.bos),
            ("eos", self.generation.eos),
            ("pad", self.generation.pad),
        ];
        for (name, token) in specials {
            if token >= self.model.vocab_size {
                return Err(ConfigError::Message(
                    format!("{} token {} is outside the vocabulary of size {}",
                        name, token, self.model.vocab_size)
                ));
            }
        }

        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(
                format!("Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level)
            )),
        }?;

        // Create log directory if configured and doesn't exist
        if let Some(log_dir) = &self.logging.file {
            if !log_dir.exists() {
                std::fs::create_dir_all(log_dir).map_err(|e| {
                    ConfigError::Message(format!(
                        "Failed to create log directory at {}: {}",
                        log_dir.display(), e
                    ))
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("seqattn-config-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn load(dir: &Path) -> Result<Settings, ConfigError> {
        let settings = Settings::builder(dir)?.build()?.try_deserialize::<Settings>()?;
        settings.validate()?;
        Ok(settings)
    }

    #[test]
    fn test_builtin_defaults_without_files() {
        let dir = scratch_dir("defaults");
        let settings = load(&dir).unwrap();

        assert_eq!(settings.model.vocab_size, 32);
        assert_eq!(settings.model.num_layers, 2);
        assert_eq!(settings.generation.num_steps, 10);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.logging.file.is_none());
    }

    #[test]
    fn test_local_overrides_default() {
        let dir = scratch_dir("layering");
        fs::write(dir.join("default.toml"), "[model]\nseed = 7\nembed_dim = 12\n").unwrap();
        fs::write(dir.join("local.toml"), "[model]\nseed = 99\n").unwrap();

        let settings = load(&dir).unwrap();
        assert_eq!(settings.model.seed, 99);
        assert_eq!(settings.model.embed_dim, 12);
    }

    #[test]
    fn test_environment_overrides_files() {
        let dir = scratch_dir("environment");
        fs::write(dir.join("local.toml"), "[model]\nseed = 5\n\n[generation]\nnum_steps = 4\n").unwrap();

        // No other test loads through the environment layer
        std::env::set_var("SEQATTN__MODEL__SEED", "77");
        std::env::set_var("SEQATTN__GENERATION__NUM_STEPS", "12");
        let settings = Settings::from_dir(&dir);
        std::env::remove_var("SEQATTN__MODEL__SEED");
        std::env::remove_var("SEQATTN__GENERATION__NUM_STEPS");

        let settings = settings.unwrap();
        assert_eq!(settings.model.seed, 77);
        assert_eq!(settings.generation.num_steps, 12);
        assert_eq!(settings.model.vocab_size, 32);
    }

    #[test]
    fn test_special_token_outside_vocab_rejected() {
        let dir = scratch_dir("specials");
        fs::write(dir.join("default.toml"), "[model]\nvocab_size = 4\n\n[generation]\neos = 4\n").unwrap();

        let err = load(&dir).unwrap_err();
        assert!(err.to_string().contains("eos token 4"));
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let dir = scratch_dir("level");
        fs::write(dir.join("default.toml"), "[logging]\nlevel = \"loud\"\n").unwrap();

        let err = load(&dir).unwrap_err();
        assert!(err.to_string().contains("Invalid logging level"));
    }

    #[test]
    fn test_generation_options() {
        let dir = scratch_dir("options");
        let settings = load(&dir).unwrap();
        let options = settings.generation_options();

        assert_eq!(options.num_steps, 10);
        assert_eq!(options.bos, 1);
        assert_eq!(options.eos, 2);
        assert_eq!(options.pad, 0);
    }
}
