use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::framer::DEFAULT_MAX_RECORD_SIZE;

fn max_record_size_default() -> usize { DEFAULT_MAX_RECORD_SIZE }

/// Decoder settings, loaded from a YAML file. Every field has a default
/// so a partial (or empty `{}`) file is fine.
///
/// The config is a plain value owned by the caller; each stream builds
/// its own framer from it. There is deliberately no process-global
/// config instance here.
#[derive(Deserialize, Serialize, Clone)]
pub struct DecoderConfig {
    /// Upper bound on the framer's accumulation buffer. Clamped by the
    /// framer to its documented bounds.
    #[serde(default = "max_record_size_default")]
    pub max_record_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            max_record_size: max_record_size_default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read the config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse the config file: {0}")]
    Parse(#[from] serde_yml::Error),
}

impl DecoderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: DecoderConfig = serde_yml::from_str(&contents)?;
        debug!("Loaded decoder config, max_record_size={}", config.max_record_size);
        Ok(config)
    }
}
