//! Context configuration management.
//!
//! This module bundles the normalizer and trajectory buffer configuration into
//! one serializable struct, so an experiment's preprocessing can be reproduced
//! from a single file.
//!
//! # Features
//!
//! - **Unified Configuration**: Normalizer + buffer + optional metadata
//! - **Serialization**: Save/load configurations to TOML or JSON
//! - **Validation**: Every load is validated before it is returned
//!
//! # Example
//!
//! ```no_run
//! use trajectory_features::config::{ContextConfig, ExperimentMetadata};
//!
//! let config = ContextConfig::default()
//!     .with_metadata(ExperimentMetadata::new("interaction-baseline"));
//!
//! config.save_toml("experiment_config.toml")?;
//! let loaded = ContextConfig::load_toml("experiment_config.toml")?;
//! assert_eq!(loaded.buffer, config.buffer);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::path::Path;

pub use crate::preprocessing::NormalizerConfig;
pub use crate::sequence_builder::{BufferConfig, QueryMode};

/// Unified context configuration.
///
/// `feature_normalizer` and `buffer` describe the same per-agent state
/// vectors, so their feature dimensions must agree. `reward_normalizer` works
/// on scalars and is independent.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ContextConfig {
    /// Per-step state vector normalization
    pub feature_normalizer: NormalizerConfig,

    /// Reward normalization (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_normalizer: Option<NormalizerConfig>,

    /// Trajectory buffer configuration
    pub buffer: BufferConfig,

    /// Experiment metadata (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExperimentMetadata>,
}

/// Experiment metadata for tracking and reproducibility.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExperimentMetadata {
    /// Experiment name
    pub name: String,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Version or git commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Custom tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ExperimentMetadata {
    /// Metadata with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            created_at: None,
            version: None,
            tags: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Stamp the creation time (RFC3339, UTC).
    pub fn stamped_now(mut self) -> Self {
        self.created_at = Some(chrono::Utc::now().to_rfc3339());
        self
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        let buffer = BufferConfig::default();
        Self {
            feature_normalizer: NormalizerConfig::new(vec![buffer.feature_dim()]),
            reward_normalizer: None,
            buffer,
            metadata: None,
        }
    }
}

impl ContextConfig {
    /// Create a new context configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set feature normalizer configuration.
    pub fn with_feature_normalizer(mut self, config: NormalizerConfig) -> Self {
        self.feature_normalizer = config;
        self
    }

    /// Enable reward normalization with the given configuration.
    pub fn with_reward_normalizer(mut self, config: NormalizerConfig) -> Self {
        self.reward_normalizer = Some(config);
        self
    }

    /// Set trajectory buffer configuration.
    pub fn with_buffer(mut self, config: BufferConfig) -> Self {
        self.buffer = config;
        self
    }

    /// Set experiment metadata.
    pub fn with_metadata(mut self, metadata: ExperimentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Validate the configuration.
    ///
    /// Returns Ok(()) if valid, Err(msg) otherwise.
    pub fn validate(&self) -> Result<(), String> {
        self.feature_normalizer.validate()?;
        self.buffer.validate()?;

        if let Some(reward) = &self.reward_normalizer {
            reward.validate()?;
        }

        let feature_dim = self.buffer.feature_dim();
        if self.feature_normalizer.shape != [feature_dim] {
            return Err(format!(
                "Feature normalizer shape {:?} doesn't match buffer feature dimension {}",
                self.feature_normalizer.shape, feature_dim
            ));
        }

        Ok(())
    }

    /// Save configuration to TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Load configuration from TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: ContextConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)?;
        Ok(())
    }

    /// Load configuration from JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: ContextConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_context_config_default() {
        let config = ContextConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.feature_normalizer.shape, vec![4]);
    }

    #[test]
    fn test_save_load_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("context.toml");

        let config = ContextConfig::default()
            .with_buffer(
                BufferConfig::new((1, 20, 4))
                    .with_hist_length(8)
                    .with_query_mode(QueryMode::HistoryOnly)
                    .with_max_history(64),
            )
            .with_reward_normalizer(NormalizerConfig::reward(0.99))
            .with_metadata(ExperimentMetadata {
                name: "test_experiment".to_string(),
                description: Some("Test configuration".to_string()),
                created_at: None,
                version: Some("0.1.0".to_string()),
                tags: Some(vec!["test".to_string()]),
            });

        config.save_toml(&path).unwrap();
        let loaded = ContextConfig::load_toml(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.buffer.query_mode, QueryMode::HistoryOnly);
        assert_eq!(loaded.reward_normalizer.unwrap().gamma, Some(0.99));
    }

    #[test]
    fn test_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("context.json");

        let config = ContextConfig::default();
        config.save_json(&path).unwrap();
        let loaded = ContextConfig::load_json(&path).unwrap();

        assert_eq!(loaded, config);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"full_future\""));
    }

    #[test]
    fn test_feature_dimension_must_agree() {
        let config = ContextConfig::default()
            .with_feature_normalizer(NormalizerConfig::new(vec![3]));
        let err = config.validate().unwrap_err();
        assert!(err.contains("feature dimension"));
    }

    #[test]
    fn test_invalid_file_rejected_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");

        let mut config = ContextConfig::default();
        config.buffer.hist_length = 0;
        config.save_json(&path).unwrap();

        assert!(ContextConfig::load_json(&path).is_err());
    }

    #[test]
    fn test_metadata_stamp() {
        let meta = ExperimentMetadata::new("run")
            .with_description("gap-filled context")
            .stamped_now();
        let stamp = meta.created_at.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }
}
