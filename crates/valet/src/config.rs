//! Lot configuration from the environment.
//!
//! - `VALET_CAPACITY`: number of slots (default 10, must be at least 1)
//! - `VALET_STATE_FILE`: snapshot path; unset keeps state in memory only

use std::num::NonZeroUsize;
use std::path::PathBuf;

pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number of at least 1, got '{value}'")]
    InvalidCapacity { name: &'static str, value: String },
    #[error("{name} must be a port number, got '{value}'")]
    InvalidPort { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotConfig {
    pub capacity: NonZeroUsize,
    pub state_file: Option<PathBuf>,
}

impl Default for LotConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            state_file: None,
        }
    }
}

impl LotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("VALET_CAPACITY") {
            config.capacity = parse_capacity("VALET_CAPACITY", &raw)?;
        }
        config.state_file = lookup("VALET_STATE_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        Ok(config)
    }
}

pub fn parse_capacity(name: &'static str, raw: &str) -> Result<NonZeroUsize, ConfigError> {
    raw.trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| ConfigError::InvalidCapacity {
            name,
            value: raw.to_string(),
        })
}

pub fn parse_port(name: &'static str, raw: &str) -> Result<u16, ConfigError> {
    raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort {
        name,
        value: raw.to_string(),
    })
}
