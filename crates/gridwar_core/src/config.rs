//! Simulation tuning.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```ron
//! SimulationConfig(
//!     large_load_threshold: 12,
//!     identify_requires_ownership: true,
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::components::{Decorated, ImageTag};
use crate::error::{GameError, Result};
use crate::math::{percent, Vec2Fixed};

/// Largest accepted `tile_size`, in pixels.
pub const MAX_TILE_SIZE: i32 = 4096;

/// Tunables read by the command stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Pixel size of one tile.
    pub tile_size: i32,
    /// Harvest yields above this get the large overlay.
    pub large_load_threshold: i32,
    /// Whether IDENTIFY by unit id checks ownership.
    pub identify_requires_ownership: bool,
    /// Overlay scale, in percent of the sprite.
    pub decoration_scale_percent: u32,
    /// Overlay pixel offset `(x, y)`.
    pub decoration_offset: (i32, i32),
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tile_size: 32,
            large_load_threshold: 10,
            identify_requires_ownership: false,
            decoration_scale_percent: 30,
            decoration_offset: (10, -10),
        }
    }
}

impl SimulationConfig {
    /// Parse a config from RON text.
    ///
    /// `source` names where the text came from and is only used in errors.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the text is not a valid config
    /// or `tile_size` is outside `1..=MAX_TILE_SIZE`.
    pub fn from_ron(source: &str, text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: source.to_string(),
            message: e.to_string(),
        })?;
        if !(1..=MAX_TILE_SIZE).contains(&config.tile_size) {
            return Err(GameError::DataParseError {
                path: source.to_string(),
                message: format!(
                    "tile_size {} is outside 1..={MAX_TILE_SIZE}",
                    config.tile_size
                ),
            });
        }
        Ok(config)
    }

    /// The overlay a carrier gets after harvesting `load`.
    #[must_use]
    pub fn harvest_overlay(&self, load: i32) -> Decorated {
        let image = if load > self.large_load_threshold {
            ImageTag::LargeResource
        } else {
            ImageTag::SmallResource
        };
        let (x, y) = self.decoration_offset;
        Decorated {
            image,
            scale: percent(self.decoration_scale_percent),
            offset: Vec2Fixed::from_ints(x, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.tile_size, 32);
        assert_eq!(config.large_load_threshold, 10);
        assert!(!config.identify_requires_ownership);
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config =
            SimulationConfig::from_ron("inline", "(identify_requires_ownership: true)").unwrap();
        assert!(config.identify_requires_ownership);
        assert_eq!(config.tile_size, 32);
        assert_eq!(config.decoration_offset, (10, -10));
    }

    #[test]
    fn test_bad_ron_reports_source() {
        let err = SimulationConfig::from_ron("sim.ron", "(tile_size: \"big\")").unwrap_err();
        match err {
            GameError::DataParseError { path, .. } => assert_eq!(path, "sim.ron"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tile_size_out_of_range_is_rejected() {
        for text in ["(tile_size: 0)", "(tile_size: -32)", "(tile_size: 2147483647)"] {
            assert!(
                matches!(
                    SimulationConfig::from_ron("sim.ron", text),
                    Err(GameError::DataParseError { .. })
                ),
                "{text}"
            );
        }
        assert!(SimulationConfig::from_ron("sim.ron", "(tile_size: 4096)").is_ok());
    }

    #[test]
    fn test_overlay_threshold_is_exclusive() {
        let config = SimulationConfig::default();
        assert_eq!(config.harvest_overlay(10).image, ImageTag::SmallResource);
        assert_eq!(config.harvest_overlay(11).image, ImageTag::LargeResource);

        let overlay = config.harvest_overlay(5);
        assert_eq!(overlay.scale, Fixed::from_num(30) / Fixed::from_num(100));
        assert_eq!(overlay.offset, Vec2Fixed::from_ints(10, -10));
    }
}
