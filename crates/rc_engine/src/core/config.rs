//! # Engine Configuration
//!
//! Serializable configuration for the engine context, loadable from TOML or
//! RON files through the [`Config`] trait.
//!
//! ## Configuration Categories
//!
//! - **Logging**: default `env_logger` filter
//! - **Resources**: resource groups and their search directories
//! - **Scene**: render order policy and culling
//! - **Render**: screen size, clear color, default texture

use crate::core::error::{EngineError, ErrorCode};
use crate::scene::RenderOrder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Write)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error while reading
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error while writing
    #[error("Write error: {0}")]
    Write(std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl From<ConfigError> for EngineError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        let code = match &error {
            ConfigError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            ConfigError::Io(_) => ErrorCode::Io,
            ConfigError::Write(_) => ErrorCode::CannotWriteToFile,
            ConfigError::Parse(_) | ConfigError::Serialize(_) => ErrorCode::Parse,
            ConfigError::UnsupportedFormat(_) => ErrorCode::InvalidParams,
        };
        EngineError::new(code, error.to_string()).with_source(error)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `env_logger` filter string, e.g. `"info"` or `"rc_engine=debug"`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// Resource group configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Resource group name → directories searched in order
    pub groups: BTreeMap<String, Vec<PathBuf>>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert("General".to_string(), vec![PathBuf::from("media")]);
        Self { groups }
    }
}

/// Scene configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Sort policy for the main pass
    pub render_order: RenderOrder,

    /// Enable frustum culling of scene nodes and sub-entities
    pub enable_culling: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            render_order: RenderOrder::StateChange,
            enable_culling: true,
        }
    }
}

/// Render device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Back buffer width in pixels
    pub width: u32,
    /// Back buffer height in pixels
    pub height: u32,
    /// Clear color of the screen frame buffer
    pub clear_color: [f32; 4],
    /// RGBA8 color of the fallback texture bound for missing material maps
    pub default_texture_color: [u8; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            clear_color: [0.1, 0.1, 0.15, 1.0],
            default_texture_color: [255, 255, 255, 255],
        }
    }
}

/// Top level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Logging settings
    pub logging: LoggingConfig,
    /// Resource groups
    pub resources: ResourceConfig,
    /// Scene settings
    pub scene: SceneConfig,
    /// Render settings
    pub render: RenderConfig,
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_partial_config_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [scene]
            render_order = "FrontToBack"

            [render]
            width = 640
            "#,
        )
        .unwrap();

        assert_eq!(config.scene.render_order, RenderOrder::FrontToBack);
        assert!(config.scene.enable_culling);
        assert_eq!(config.render.width, 640);
        assert_eq!(config.render.height, 720);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_ron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.ron");
        let path = path.to_str().unwrap();

        let mut config = EngineConfig::default();
        config.logging.level = "rc_engine=trace".to_string();
        config.resources.groups.insert("Models".to_string(), vec![PathBuf::from("media/models")]);
        config.save_to_file(path).unwrap();

        let loaded = EngineConfig::load_from_file(path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unsupported_extension_is_invalid_params() {
        let error: EngineError = EngineConfig::load_from_file("Cargo.lock.json")
            .map(|_| ())
            .unwrap_err()
            .into();
        // The file does not exist, so reading fails before the extension check
        assert_eq!(error.code(), ErrorCode::FileNotFound);

        let error: EngineError = ConfigError::UnsupportedFormat("a.json".into()).into();
        assert_eq!(error.code(), ErrorCode::InvalidParams);
    }
}
