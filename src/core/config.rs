/// Generator configuration — length defaults and sampling knobs, loaded from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::sampler::{SamplerOptions, Sampling, DEFAULT_MAX_RESTARTS, DEFAULT_POOL_SCALE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for generating text from a trained chain.
///
/// Every field is optional in the RON source:
///
/// ```text
/// (
///     min_sentence_length: 3,
///     max_sentence_length: 12,
///     sampling: Quantized,
///     seed: Some(7),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Token count for plain `generate` calls.
    pub length: usize,
    pub min_sentence_length: usize,
    /// Inclusive.
    pub max_sentence_length: usize,
    pub sampling: Sampling,
    pub pool_scale: u32,
    pub max_restarts: u32,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            length: 8,
            min_sentence_length: 5,
            max_sentence_length: 10,
            sampling: Sampling::Exact,
            pool_scale: DEFAULT_POOL_SCALE,
            max_restarts: DEFAULT_MAX_RESTARTS,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Load and validate a config from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<GeneratorConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse and validate a config from a RON string.
    pub fn parse_ron(input: &str) -> Result<GeneratorConfig, ConfigError> {
        let config: GeneratorConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.length == 0 {
            return Err(ConfigError::Invalid("length must be at least 1".to_string()));
        }
        if self.min_sentence_length == 0 {
            return Err(ConfigError::Invalid(
                "min_sentence_length must be at least 1".to_string(),
            ));
        }
        if self.min_sentence_length > self.max_sentence_length {
            return Err(ConfigError::Invalid(format!(
                "min_sentence_length ({}) exceeds max_sentence_length ({})",
                self.min_sentence_length, self.max_sentence_length
            )));
        }
        if self.pool_scale == 0 {
            return Err(ConfigError::Invalid("pool_scale must be at least 1".to_string()));
        }
        if self.max_restarts == 0 {
            return Err(ConfigError::Invalid(
                "max_restarts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sampler_options(&self) -> SamplerOptions {
        SamplerOptions {
            sampling: self.sampling,
            pool_scale: self.pool_scale,
            max_restarts: self.max_restarts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = GeneratorConfig::parse_ron("()").unwrap();
        assert_eq!(config, GeneratorConfig::default());
        assert_eq!(config.sampler_options(), SamplerOptions::default());
    }

    #[test]
    fn parse_partial_config() {
        let config = GeneratorConfig::parse_ron(
            "(min_sentence_length: 3, max_sentence_length: 12, sampling: Quantized, seed: Some(7))",
        )
        .unwrap();
        assert_eq!(config.min_sentence_length, 3);
        assert_eq!(config.max_sentence_length, 12);
        assert_eq!(config.sampling, Sampling::Quantized);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.length, 8);
        assert_eq!(config.sampler_options().sampling, Sampling::Quantized);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        for input in [
            "(min_sentence_length: 0)",
            "(min_sentence_length: 6, max_sentence_length: 5)",
            "(length: 0)",
            "(pool_scale: 0)",
            "(max_restarts: 0)",
        ] {
            assert!(
                matches!(GeneratorConfig::parse_ron(input), Err(ConfigError::Invalid(_))),
                "accepted {}",
                input
            );
        }
    }

    #[test]
    fn malformed_ron_is_an_error() {
        assert!(matches!(
            GeneratorConfig::parse_ron("(sampling: Sometimes)"),
            Err(ConfigError::Ron(_))
        ));
    }
}
