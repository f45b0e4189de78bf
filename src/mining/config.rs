//! Miner configuration
//!
//! Loaded from JSON; every field has a default so a partial file is enough.

use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::algo1627::{Algo1627Backend, CpuBackend, RayonBackend};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which implementation runs the parallel hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParallelBackend {
    Cpu,
    #[default]
    Rayon,
}

impl ParallelBackend {
    pub fn backend(&self) -> Arc<dyn Algo1627Backend> {
        match self {
            ParallelBackend::Cpu => Arc::new(CpuBackend),
            ParallelBackend::Rayon => Arc::new(RayonBackend),
        }
    }
}

impl std::str::FromStr for ParallelBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(ParallelBackend::Cpu),
            "rayon" => Ok(ParallelBackend::Rayon),
            other => Err(ConfigError::Invalid(format!("unknown backend '{}'", other))),
        }
    }
}

/// Mining loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Work packs fetched ahead of the search
    pub work_queue_len: usize,
    /// Milliseconds between work queue refills
    pub refill_interval_ms: u64,
    /// Local search budget per work pack
    pub header_timeout_ms: u64,
    /// Nonces tried per work pack before giving up
    pub max_attempts_per_work_pack: u64,
    pub parallel_backend: ParallelBackend,
    /// Stop after this many work packs; run until shutdown when unset
    pub max_work_packs: Option<u64>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            work_queue_len: 4,
            refill_interval_ms: 1000,
            header_timeout_ms: 30_000,
            max_attempts_per_work_pack: 1_000_000,
            parallel_backend: ParallelBackend::default(),
            max_work_packs: None,
        }
    }
}

impl MinerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = fs::File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.work_queue_len == 0 {
            return Err(ConfigError::Invalid("work_queue_len must be > 0".into()));
        }
        if self.refill_interval_ms == 0 {
            return Err(ConfigError::Invalid("refill_interval_ms must be > 0".into()));
        }
        if self.header_timeout_ms == 0 {
            return Err(ConfigError::Invalid("header_timeout_ms must be > 0".into()));
        }
        if self.max_attempts_per_work_pack == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts_per_work_pack must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = MinerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.work_queue_len, 4);
        assert_eq!(config.parallel_backend, ParallelBackend::Rayon);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            MinerConfig::from_json_str(r#"{"parallel_backend": "cpu", "max_work_packs": 3}"#)
                .unwrap();
        assert_eq!(config.parallel_backend, ParallelBackend::Cpu);
        assert_eq!(config.max_work_packs, Some(3));
        assert_eq!(config.refill_interval_ms, 1000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            MinerConfig::from_json_str(r#"{"work_queue_len": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MinerConfig::from_json_str(r#"{"header_timeout_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MinerConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_load_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("miner.json");
        let config = MinerConfig {
            work_queue_len: 2,
            max_work_packs: Some(10),
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        assert_eq!(MinerConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MinerConfig::load_from_file(&temp_dir.path().join("absent.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("CPU".parse::<ParallelBackend>().unwrap(), ParallelBackend::Cpu);
        assert_eq!("rayon".parse::<ParallelBackend>().unwrap().backend().name(), "rayon");
        assert!("gpu".parse::<ParallelBackend>().is_err());
    }
}
