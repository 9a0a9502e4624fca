//! Combat config (TOML).
//!
//! ```toml
//! seed = 42
//! effect_duration_secs = 0.5
//!
//! [weapon]
//! fire_rate = 0.15
//! max_range = 100.0
//! damage = 25.0
//!
//! [impact_pool]
//! initial_size = 20
//! max_size = 50
//! expandable = true
//! ```
//!
//! Отсутствующие поля берутся из `Default`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combat::WeaponConfig;
use crate::pool::PoolConfig;
use crate::timer::secs_to_duration;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("pool initial_size {initial} exceeds max_size {max}")]
    PoolBounds { initial: u32, max: u32 },

    #[error("weapon {field} must be finite and non-negative, got {value}")]
    InvalidWeapon { field: &'static str, value: f32 },

    #[error("effect_duration_secs must be finite and non-negative, got {0}")]
    InvalidEffectDuration(f32),
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Seed для DeterministicRng (spread)
    pub seed: u64,
    pub weapon: WeaponConfig,
    pub impact_pool: PoolConfig,
    /// Через сколько impact VFX возвращается в пул
    pub effect_duration_secs: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            weapon: WeaponConfig::default(),
            impact_pool: PoolConfig::new(20, 50, true),
            effect_duration_secs: 0.5,
        }
    }
}

impl CombatConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weapon.validate()?;
        self.impact_pool.validate()?;
        if secs_to_duration(self.effect_duration_secs).is_none() {
            return Err(ConfigError::InvalidEffectDuration(self.effect_duration_secs));
        }
        Ok(())
    }

    pub fn effect_duration(&self) -> Duration {
        secs_to_duration(self.effect_duration_secs).unwrap_or(Duration::ZERO)
    }
}
