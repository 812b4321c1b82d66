use std::path::Path;

use config::Config;
use config::ConfigError;
use config::File;
use serde::Deserialize;
use tb_bucket::BucketConfig;
use tracing::Level;

#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfigFile {
    pub name: String,
    pub workers: usize,
    pub jobs: u64,
    pub bucket: BucketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ThrottleConfigFile {
    fn default() -> Self {
        Self { name: "throttle".to_string(), workers: 4, jobs: 200, bucket: BucketConfig::default(), logging: LoggingConfig::default() }
    }
}

/// `[logging]` table: stdout always, rolling file only when `log_dir` is set
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: Option<String>,
    pub file_name: String,
}

impl LoggingConfig {
    /// Default level, overridden by RUST_LOG; unknown names fall back to INFO
    pub fn level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), log_dir: None, file_name: "tb_throttle".to_string() }
    }
}

pub fn load_throttle_config<P: AsRef<Path>>(path: P) -> Result<ThrottleConfigFile, ConfigError> {
    let config = Config::builder().add_source(File::from(path.as_ref())).build()?;

    config.try_deserialize()
}

/// Load throttle config with fallback to default
pub fn load_throttle_config_or_default(path: &str) -> ThrottleConfigFile {
    match load_throttle_config(path) {
        Ok(config) => {
            tracing::info!("Loaded throttle config from {path}");
            config
        }
        Err(err) => {
            tracing::warn!("Failed to load throttle config from {}: {}. Using defaults.", path, err);
            ThrottleConfigFile::default()
        }
    }
}
