use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::Config;

/// Project config file, read from the working directory
pub const PROJECT_CONFIG_FILE: &str = "fmax.yaml";

/// Optional local overrides, not meant to be committed
pub const LOCAL_CONFIG_FILE: &str = ".fmax/local.yaml";

/// Prefix of environment overrides; `__` separates nesting levels
pub const ENV_PREFIX: &str = "FMAX_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid frequency range: low_freq ({0}) must be positive and below high_freq ({1})")]
    InvalidFrequencyRange(f64, f64),

    #[error("Invalid resolution: {0}. Must be positive")]
    InvalidResolution(f64),

    #[error("Invalid max_non_improvements: {0}. Must be at least 1")]
    InvalidMaxNonImprovements(u32),

    #[error("Invalid nthreads: {0}. Must be at least 1")]
    InvalidNthreads(usize),

    #[error("Invalid max_cpus: {0}. Must be at least 1")]
    InvalidMaxCpus(usize),

    #[error("Invalid job_timeout_secs: {0}. Must be at least 1")]
    InvalidJobTimeout(u64),

    #[error("Run root directory cannot be empty")]
    EmptyRootDir,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. fmax.yaml (project config)
    /// 3. .fmax/local.yaml (local overrides, optional)
    /// 4. Environment variables (FMAX_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Self::layered(None)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration with an explicit file in place of the project and
    /// local files. Environment variables still apply on top.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let config: Config = Self::layered(Some(path))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn layered(explicit: Option<&Path>) -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = match explicit {
            Some(path) => figment.merge(Yaml::file(path)),
            None => figment
                .merge(Yaml::file(PROJECT_CONFIG_FILE))
                .merge(Yaml::file(LOCAL_CONFIG_FILE)),
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let search = &config.search;
        if !(search.low_freq > 0.0 && search.low_freq < search.high_freq) {
            return Err(ConfigError::InvalidFrequencyRange(
                search.low_freq,
                search.high_freq,
            ));
        }
        if search.resolution <= 0.0 || !search.resolution.is_finite() {
            return Err(ConfigError::InvalidResolution(search.resolution));
        }
        if search.max_non_improvements == 0 {
            return Err(ConfigError::InvalidMaxNonImprovements(
                search.max_non_improvements,
            ));
        }
        if search.policy.min_samples_per_batch < 2 {
            return Err(ConfigError::ValidationFailed(format!(
                "search.policy.min_samples_per_batch must be at least 2, got {}",
                search.policy.min_samples_per_batch
            )));
        }
        if search.policy.stagnation_shrink_base <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "search.policy.stagnation_shrink_base must be positive".to_string(),
            ));
        }

        if config.pool.nthreads == 0 {
            return Err(ConfigError::InvalidNthreads(config.pool.nthreads));
        }
        if config.pool.max_cpus == 0 {
            return Err(ConfigError::InvalidMaxCpus(config.pool.max_cpus));
        }
        if config.pool.job_timeout_secs == 0 {
            return Err(ConfigError::InvalidJobTimeout(config.pool.job_timeout_secs));
        }

        if config.runs.root_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRootDir);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!((config.search.low_freq - 10.0).abs() < f64::EPSILON);
        assert!((config.search.high_freq - 500.0).abs() < f64::EPSILON);
        assert_eq!(config.runs.root_dir, PathBuf::from("fmax_run"));
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_validate_inverted_range() {
        let mut config = Config::default();
        config.search.low_freq = 600.0;

        let result = ConfigLoader::validate(&config);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidFrequencyRange(_, _)
        ));
    }

    #[test]
    fn test_validate_zero_low_freq() {
        let mut config = Config::default();
        config.search.low_freq = 0.0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidFrequencyRange(_, _)
        ));
    }

    #[test]
    fn test_validate_zero_resolution() {
        let mut config = Config::default();
        config.search.resolution = 0.0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidResolution(_)
        ));
    }

    #[test]
    fn test_validate_zero_nthreads() {
        let mut config = Config::default();
        config.pool.nthreads = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidNthreads(0)
        ));
    }

    #[test]
    fn test_validate_zero_stagnation_limit() {
        let mut config = Config::default();
        config.search.max_non_improvements = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxNonImprovements(0)
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "loud"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogFormat(format) => assert_eq!(format, "xml"),
            other => panic!("Expected InvalidLogFormat error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file_merges_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "search:\n  high_freq: 800\npool:\n  nthreads: 8\nruns:\n  root_dir: /tmp/fmax-runs"
        )
        .unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert!((config.search.high_freq - 800.0).abs() < f64::EPSILON);
        assert!((config.search.low_freq - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.pool.nthreads, 8);
        assert_eq!(config.runs.root_dir, PathBuf::from("/tmp/fmax-runs"));
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "search:\n  low_freq: 900\n  high_freq: 100").unwrap();
        file.flush().unwrap();

        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid frequency range"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ConfigLoader::load_from_file("/nonexistent/fmax.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "pool:\n  nthreads: 8\nlogging:\n  level: info").unwrap();
        file.flush().unwrap();

        temp_env::with_vars(
            [
                ("FMAX_POOL__NTHREADS", Some("2")),
                ("FMAX_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.pool.nthreads, 2, "Env should win over file");
                assert_eq!(config.logging.level, "debug");
            },
        );
    }

    #[test]
    fn test_hierarchical_merging() {
        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "search:\n  resolution: 0.5\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(
            override_file,
            "search:\n  resolution: 0.25\nlogging:\n  level: debug"
        )
        .unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert!((config.search.resolution - 0.25).abs() < f64::EPSILON);
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }
}
