//! # Synchronization Configuration
//!
//! Every tunable of the mirror lives here, grouped by subsystem. The whole
//! tree is serializable so a host plug-in can ship it next to its binary as
//! TOML or RON.
//!
//! ## Configuration Categories
//!
//! - **Mesh**: triangle winding policy
//! - **Lights**: defaults for attributes the host does not expose
//! - **Materials**: upstream texture search bounds
//! - **Cameras**: whether cameras are mirrored at all
//! - **Logging**: default log filter

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// Order in which a triangle's corners are emitted into the index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindingOrder {
    /// Emit corners in host order (host and renderer agree on front faces)
    #[default]
    Preserve,
    /// Swap the last two corners of every triangle
    Reverse,
}

impl WindingOrder {
    /// Corner emission order for one triangle
    pub fn corner_order(self) -> [usize; 3] {
        match self {
            WindingOrder::Preserve => [0, 1, 2],
            WindingOrder::Reverse => [0, 2, 1],
        }
    }
}

/// # Mesh Configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Triangle winding applied while indexing
    pub winding: WindingOrder,
}

/// # Light Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Influence radius given to lights, in scene units
    pub default_radius: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self { default_radius: 20.0 }
    }
}

/// # Material Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Maximum number of graph hops searched upstream of a shader plug
    pub max_upstream_depth: usize,
    /// Host node type that carries a texture path
    pub texture_node_type: String,
    /// Plug on the texture node holding the path
    pub texture_path_plug: String,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            max_upstream_depth: 32,
            texture_node_type: "file".to_string(),
            texture_path_plug: "fileTextureName".to_string(),
        }
    }
}

/// # Camera Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Mirror host cameras into renderer camera nodes
    pub enabled: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// # Logging Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter handed to `env_logger` when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl LoggingConfig {
    /// Install `env_logger` with `level` as the default filter
    pub fn init(&self) {
        crate::foundation::logging::init_with_level(&self.level);
    }
}

/// # Complete Synchronization Configuration
///
/// Top-level configuration handed to the `SceneCoordinator`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Mesh indexing
    pub mesh: MeshConfig,
    /// Light extraction
    pub lights: LightConfig,
    /// Material resolution
    pub materials: MaterialConfig,
    /// Camera mirroring
    pub cameras: CameraConfig,
    /// Logging defaults
    pub logging: LoggingConfig,
}

impl SyncConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the winding policy
    pub fn with_winding(mut self, winding: WindingOrder) -> Self {
        self.mesh.winding = winding;
        self
    }

    /// Set the default light radius
    pub fn with_default_light_radius(mut self, radius: f32) -> Self {
        self.lights.default_radius = radius;
        self
    }

    /// Enable or disable camera mirroring
    pub fn with_cameras(mut self, enabled: bool) -> Self {
        self.cameras.enabled = enabled;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.lights.default_radius > 0.0) {
            return Err(ConfigError::Invalid {
                field: "lights.default_radius",
                reason: format!("must be positive, got {}", self.lights.default_radius),
            });
        }
        if self.materials.max_upstream_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "materials.max_upstream_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.materials.texture_node_type.is_empty() {
            return Err(ConfigError::Invalid {
                field: "materials.texture_node_type",
                reason: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Config for SyncConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lights.default_radius, 20.0);
        assert_eq!(config.mesh.winding, WindingOrder::Preserve);
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        let config = SyncConfig::new().with_default_light_radius(0.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "lights.default_radius", .. })
        ));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            [mesh]
            winding = "Reverse"

            [lights]
            default_radius = 5.0
            "#,
        )
        .unwrap();

        assert_eq!(config.mesh.winding, WindingOrder::Reverse);
        assert_eq!(config.lights.default_radius, 5.0);
        assert_eq!(config.materials.max_upstream_depth, 32);
        assert!(config.cameras.enabled);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = SyncConfig::new().with_cameras(false);
        let text = ron::ser::to_string_pretty(&config, Default::default()).unwrap();
        let loaded = SyncConfig::from_ron_str(&text).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_reverse_winding_swaps_last_corners() {
        assert_eq!(WindingOrder::Reverse.corner_order(), [0, 2, 1]);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = SyncConfig::load_from_file("mirror.json").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_) | ConfigError::Io(_)));
    }

    #[test]
    fn test_logging_init_is_repeatable() {
        let logging = LoggingConfig { level: "debug".to_string() };
        logging.init();
        logging.init();
        log::debug!("logger installed");
    }
}
