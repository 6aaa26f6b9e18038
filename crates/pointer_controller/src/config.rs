//! Controller configuration
//!
//! Timing and capacity knobs, loadable from TOML. Every field has a default,
//! so an empty file (or no file at all) gives the stock behavior:
//!
//! ```toml
//! [fade]
//! pointer_ms = 500
//! spot_ms = 200
//!
//! [inactivity]
//! normal_ms = 15000
//! short_ms = 3000
//!
//! [spots]
//! max_spots = 12
//! max_recycled_sprites = 12
//! scale = 1.0
//! ```

use std::fs;
use std::path::Path;

use pointer_platform::{millis_to_nanos, Nanos};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::inactivity::InactivityTimeout;
use crate::spots::{MAX_RECYCLED_SPRITES, MAX_SPOTS, SPOT_SCALE};

/// Top-level controller configuration
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub fade: FadeConfig,
    #[serde(default)]
    pub inactivity: InactivityConfig,
    #[serde(default)]
    pub spots: SpotConfig,
}

/// Fade durations
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FadeConfig {
    /// Time for the pointer to fade completely in or out
    #[serde(default = "default_pointer_fade_ms")]
    pub pointer_ms: u64,
    /// Time for a lifted spot to fade out completely
    #[serde(default = "default_spot_fade_ms")]
    pub spot_ms: u64,
}

fn default_pointer_fade_ms() -> u64 {
    500
}

fn default_spot_fade_ms() -> u64 {
    200
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            pointer_ms: default_pointer_fade_ms(),
            spot_ms: default_spot_fade_ms(),
        }
    }
}

/// Delays before an idle pointer starts fading
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct InactivityConfig {
    #[serde(default = "default_normal_ms")]
    pub normal_ms: u64,
    #[serde(default = "default_short_ms")]
    pub short_ms: u64,
}

fn default_normal_ms() -> u64 {
    15_000
}

fn default_short_ms() -> u64 {
    3_000
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            normal_ms: default_normal_ms(),
            short_ms: default_short_ms(),
        }
    }
}

/// Spot capacity and appearance
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SpotConfig {
    /// Live spots allowed per display
    #[serde(default = "default_max_spots")]
    pub max_spots: usize,
    /// Released spot sprites kept for reuse
    #[serde(default = "default_max_recycled_sprites")]
    pub max_recycled_sprites: usize,
    /// Uniform scale applied to every spot sprite
    #[serde(default = "default_spot_scale")]
    pub scale: f32,
}

fn default_max_spots() -> usize {
    MAX_SPOTS
}

fn default_max_recycled_sprites() -> usize {
    MAX_RECYCLED_SPRITES
}

fn default_spot_scale() -> f32 {
    SPOT_SCALE
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self {
            max_spots: default_max_spots(),
            max_recycled_sprites: default_max_recycled_sprites(),
            scale: default_spot_scale(),
        }
    }
}

impl ControllerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ControllerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fade.pointer_ms == 0 {
            return Err(ConfigError::Invalid("fade.pointer_ms must be > 0".into()));
        }
        if self.fade.spot_ms == 0 {
            return Err(ConfigError::Invalid("fade.spot_ms must be > 0".into()));
        }
        if self.inactivity.normal_ms == 0 || self.inactivity.short_ms == 0 {
            return Err(ConfigError::Invalid(
                "inactivity timeouts must be > 0".into(),
            ));
        }
        if self.spots.max_spots == 0 {
            return Err(ConfigError::Invalid("spots.max_spots must be >= 1".into()));
        }
        if !(self.spots.scale.is_finite() && self.spots.scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "spots.scale must be a positive number, got {}",
                self.spots.scale
            )));
        }
        Ok(())
    }

    pub fn pointer_fade_duration(&self) -> Nanos {
        millis_to_nanos(self.fade.pointer_ms)
    }

    pub fn spot_fade_duration(&self) -> Nanos {
        millis_to_nanos(self.fade.spot_ms)
    }

    /// Delay for the given inactivity preset
    pub fn inactivity_delay(&self, timeout: InactivityTimeout) -> Nanos {
        match timeout {
            InactivityTimeout::Normal => millis_to_nanos(self.inactivity.normal_ms),
            InactivityTimeout::Short => millis_to_nanos(self.inactivity.short_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointer_platform::NANOS_PER_MILLI;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = ControllerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.pointer_fade_duration(), 500 * NANOS_PER_MILLI);
        assert_eq!(config.spot_fade_duration(), 200 * NANOS_PER_MILLI);
        assert_eq!(
            config.inactivity_delay(InactivityTimeout::Short),
            3_000 * NANOS_PER_MILLI
        );
        assert_eq!(config.spots.max_spots, MAX_SPOTS);
    }

    #[test]
    fn test_partial_sections() {
        let config = ControllerConfig::from_toml_str(
            r#"
            [fade]
            spot_ms = 50

            [spots]
            max_spots = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.fade.pointer_ms, 500);
        assert_eq!(config.fade.spot_ms, 50);
        assert_eq!(config.spots.max_spots, 4);
        assert_eq!(config.spots.max_recycled_sprites, MAX_RECYCLED_SPRITES);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = ControllerConfig::from_toml_str("[spots]\nmax_spots = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = ControllerConfig::from_toml_str("[fade\npointer_ms = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_roundtrip_keeps_values() {
        let mut config = ControllerConfig::default();
        config.inactivity.short_ms = 1_234;
        let text = config.to_toml().unwrap();
        assert_eq!(ControllerConfig::from_toml_str(&text).unwrap(), config);
    }
}
