//! Configuration for chk-fetch.

use serde::{Deserialize, Serialize};

use crate::keys::{ALGO_AES_PCFB_256_SHA256, BLOCK_SIZE};

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Key handling configuration.
    #[serde(default)]
    pub keys: KeyConfig,

    /// Post-processing worker configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Key handling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Crypto algorithm used when minting keys without an explicit one.
    #[serde(default = "default_algorithm")]
    pub default_algorithm: u8,
}

/// Post-processing worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name given to worker threads.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Read buffer size for the copy/filter step, in bytes.
    #[serde(default = "default_copy_buffer_size")]
    pub copy_buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            keys: KeyConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            default_algorithm: default_algorithm(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
            copy_buffer_size: default_copy_buffer_size(),
        }
    }
}

impl PipelineConfig {
    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero copy buffer or an empty thread name.
    pub fn validate(&self) -> crate::Result<()> {
        if self.worker.copy_buffer_size == 0 {
            return Err(crate::Error::Config(
                "worker.copy_buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.worker.thread_name.trim().is_empty() {
            return Err(crate::Error::Config(
                "worker.thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_algorithm() -> u8 {
    ALGO_AES_PCFB_256_SHA256
}

fn default_thread_name() -> String {
    "chk-postprocess".to_string()
}

const fn default_copy_buffer_size() -> usize {
    BLOCK_SIZE
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.keys.default_algorithm, ALGO_AES_PCFB_256_SHA256);
        assert_eq!(config.worker.thread_name, "chk-postprocess");
        assert_eq!(config.worker.copy_buffer_size, 32 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            log_level = "debug"

            [worker]
            copy_buffer_size = 4096
            "#,
        )
        .expect("parse");

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.worker.copy_buffer_size, 4096);
        assert_eq!(config.worker.thread_name, "chk-postprocess");
        assert_eq!(config.keys, KeyConfig::default());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("pipeline.toml");

        let mut config = PipelineConfig::default();
        config.keys.default_algorithm = 3;
        config.worker.thread_name = "pp".to_string();
        config.to_file(&path).expect("write");

        let loaded = PipelineConfig::from_file(&path).expect("read");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[worker]\ncopy_buffer_size = 0\n").expect("write");

        let err = PipelineConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("copy_buffer_size"));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().expect("create temp dir");
        let err = PipelineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
