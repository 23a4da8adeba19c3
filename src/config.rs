use std::env;
use std::fmt;
use std::str::FromStr;

use invcache_matrix::InvertOptions;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const LOCK_STRATEGY_ENV: &str = "INVCACHE_LOCK_STRATEGY";
pub const TOLERANCE_ENV: &str = "INVCACHE_TOLERANCE";

/// How `cache_solve` holds the slot lock around the inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockStrategy {
    /// Invert outside the lock, then store only if the slot's matrix was not
    /// replaced in the meantime.
    #[default]
    Optimistic,
    /// Hold the slot lock for the whole get-or-compute sequence.
    UnderLock,
}

impl fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Optimistic => "optimistic",
            Self::UnderLock => "under-lock",
        })
    }
}

impl FromStr for LockStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "under-lock" | "under_lock" | "underlock" => Ok(Self::UnderLock),
            other => Err(ConfigError::InvalidValue {
                key: LOCK_STRATEGY_ENV,
                value: other.to_string(),
                reason: "expected `optimistic` or `under-lock`".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub lock_strategy: LockStrategy,
    pub invert: InvertOptions,
}

impl CacheConfig {
    /// Defaults overridden by `INVCACHE_LOCK_STRATEGY` and `INVCACHE_TOLERANCE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    pub(crate) fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(strategy) = lookup(LOCK_STRATEGY_ENV) {
            self.lock_strategy = strategy.parse()?;
        }
        if let Some(raw) = lookup(TOLERANCE_ENV) {
            self.invert.tolerance = parse_tolerance(&raw)?;
        }
        Ok(self)
    }

    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()
    }

    #[cfg(feature = "toml-config")]
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        check_tolerance(self.invert.tolerance, &self.invert.tolerance.to_string())?;
        Ok(self)
    }
}

fn parse_tolerance(raw: &str) -> Result<f64, ConfigError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|err| ConfigError::InvalidValue {
            key: TOLERANCE_ENV,
            value: raw.to_string(),
            reason: err.to_string(),
        })?;
    check_tolerance(value, raw)?;
    Ok(value)
}

fn check_tolerance(value: f64, raw: &str) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: TOLERANCE_ENV,
            value: raw.to_string(),
            reason: "tolerance must be a finite, non-negative number".into(),
        })
    }
}
