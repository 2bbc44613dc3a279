//! Aggregated application configuration.
//!
//! Every section has a `Default` and `#[serde(default)]`, so a config file
//! only needs the fields it changes:
//!
//! ```
//! use isoworld_engine::config::AppConfig;
//!
//! let config = AppConfig::from_json_str(r#"{ "world": { "viewDistance": 3 } }"#).unwrap();
//! assert_eq!(config.world.view_distance, 3);
//! assert_eq!(config.render.tile_width, 64.0);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::render::renderer::RenderConfig;
use crate::state_manager::InteractionConfig;
use crate::world_manager::{WorldConfig, MAX_CHUNK_RADIUS};
use crate::EngineError;

/// Configuration of every subsystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub world: WorldConfig,
    pub render: RenderConfig,
    pub interaction: InteractionConfig,
}

impl AppConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        let config: AppConfig = serde_json::from_str(text).map_err(|e| EngineError::ConfigParse {
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.engine.validate()?;
        let render = &self.render;
        if !(render.tile_width > 0.0 && render.tile_height > 0.0 && render.tile_depth > 0.0) {
            return Err(EngineError::InvalidConfig {
                reason: "tile dimensions must be positive".to_owned(),
            });
        }
        if self.interaction.history_capacity == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "history capacity must be at least 1".to_owned(),
            });
        }
        let radii = [self.world.view_distance, self.world.initial_radius];
        if radii.iter().any(|r| !(0..=MAX_CHUNK_RADIUS).contains(r)) {
            return Err(EngineError::InvalidConfig {
                reason: format!(
                    "chunk radii must be within 0..={MAX_CHUNK_RADIUS}, got view {} and initial {}",
                    self.world.view_distance, self.world.initial_radius
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn zero_history_capacity_is_rejected() {
        let err = AppConfig::from_json_str(r#"{ "interaction": { "historyCapacity": 0 } }"#);
        assert!(matches!(err, Err(EngineError::InvalidConfig { .. })));
    }

    #[test]
    fn zero_tile_width_is_rejected() {
        let err = AppConfig::from_json_str(r#"{ "render": { "tileWidth": 0 } }"#);
        assert!(matches!(err, Err(EngineError::InvalidConfig { .. })));
    }

    #[test]
    fn oversized_chunk_radius_is_rejected() {
        let err = AppConfig::from_json_str(r#"{ "world": { "viewDistance": 1000000 } }"#);
        assert!(matches!(err, Err(EngineError::InvalidConfig { .. })));
        let err = AppConfig::from_json_str(r#"{ "world": { "initialRadius": -1 } }"#);
        assert!(matches!(err, Err(EngineError::InvalidConfig { .. })));
        assert!(AppConfig::from_json_str(r#"{ "world": { "viewDistance": 64 } }"#).is_ok());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = AppConfig::from_json_str("{ engine: ");
        assert!(matches!(err, Err(EngineError::ConfigParse { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AppConfig::load("/definitely/not/here/isoworld.json");
        assert!(matches!(err, Err(EngineError::ConfigIo { .. })));
    }
}
