use crate::core::duplicate::DepletionPolicy;
use crate::core::key::{DEFAULT_KEY_PRECISION, MAX_KEY_PRECISION};
use crate::core::similarity::DEFAULT_SIMILARITY_THRESHOLD;
use crate::core::thumbnail::DEFAULT_THUMBNAIL_SIZE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    pub thumbnail_size: u32,
    pub key_precision: u8,
    pub similarity_threshold: f64,
    pub confirm_with_similarity: bool,
    pub depletion: DepletionPolicy,
    pub threads: Option<usize>,
    pub extensions: Vec<String>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            key_precision: DEFAULT_KEY_PRECISION,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            confirm_with_similarity: false,
            depletion: DepletionPolicy::default(),
            threads: None,
            extensions: ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl CleanerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the user config if one exists, defaults otherwise.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cleanrs").join("config.json"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail_size == 0 {
            return Err(invalid("thumbnail_size", "must be greater than zero"));
        }
        if !(1..=MAX_KEY_PRECISION).contains(&self.key_precision) {
            return Err(invalid(
                "key_precision",
                &format!("must be between 1 and {}", MAX_KEY_PRECISION),
            ));
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(invalid("similarity_threshold", "must be within [-1, 1]"));
        }
        if self.threads == Some(0) {
            return Err(invalid("threads", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CleanerConfig::default();
        assert_eq!(config.thumbnail_size, 200);
        assert_eq!(config.key_precision, 3);
        assert_eq!(config.similarity_threshold, 0.9);
        assert_eq!(config.depletion, DepletionPolicy::BelowPair);
        assert!(config.validate().is_ok());
        assert!(config.thread_count() >= 1);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "key_precision": 2, "depletion": "empty" }"#).unwrap();

        let config = CleanerConfig::load(&path).unwrap();
        assert_eq!(config.key_precision, 2);
        assert_eq!(config.depletion, DepletionPolicy::Empty);
        assert_eq!(config.thumbnail_size, 200);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "similarity_threshold": 1.5 }"#).unwrap();

        let err = CleanerConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "similarity_threshold"));

        let config = CleanerConfig {
            key_precision: 0,
            ..CleanerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            CleanerConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
