//! Supported shading models and where each reads its channels from

use crate::materials::params::{Channel, ParamValue};

/// Shading model of a host surface shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderModel {
    /// Diffuse-only shader
    Lambert,
    /// Blinn-style specular shader
    Phong,
    /// Arnold physically based standard surface
    ArnoldStandardSurface,
    /// Any other node type
    Unsupported,
}

/// Shape of a channel's constant value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// One float
    Scalar,
    /// Three floats
    Color,
}

/// Where a channel's value comes from for a given model
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelSource {
    /// Read from a plug on the shader; a texture may feed the plug
    Plug {
        /// Plug name on the shader node
        plug: &'static str,
        /// Shape of the constant value
        shape: ValueShape,
    },
    /// Roughness derived from a Phong cosine power plug
    CosinePower {
        /// Plug holding the cosine power
        plug: &'static str,
    },
    /// The model has no such input
    Fixed(ParamValue),
}

impl ShaderModel {
    /// Classify a host node type name
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "lambert" => ShaderModel::Lambert,
            "phong" => ShaderModel::Phong,
            "aiStandardSurface" => ShaderModel::ArnoldStandardSurface,
            _ => ShaderModel::Unsupported,
        }
    }

    /// Whether materials can be built for this model
    pub fn is_supported(self) -> bool {
        self != ShaderModel::Unsupported
    }

    /// Source of `channel` under this model, `None` for unsupported models
    pub fn source(self, channel: Channel) -> Option<ChannelSource> {
        use ChannelSource::{CosinePower, Fixed, Plug};
        use ValueShape::{Color, Scalar};

        let source = match (self, channel) {
            (ShaderModel::Unsupported, _) => return None,

            (ShaderModel::ArnoldStandardSurface, Channel::Albedo) => {
                Plug { plug: "baseColor", shape: Color }
            }
            (ShaderModel::ArnoldStandardSurface, Channel::Roughness) => {
                Plug { plug: "specularRoughness", shape: Scalar }
            }
            (ShaderModel::ArnoldStandardSurface, Channel::Metalness) => {
                Plug { plug: "metalness", shape: Scalar }
            }
            (ShaderModel::ArnoldStandardSurface, Channel::Emission) => {
                Plug { plug: "emission", shape: Scalar }
            }
            (ShaderModel::ArnoldStandardSurface, Channel::EmissionColor) => {
                Plug { plug: "emissionColor", shape: Color }
            }

            (_, Channel::Albedo) => Plug { plug: "color", shape: Color },
            (ShaderModel::Phong, Channel::Roughness) => CosinePower { plug: "cosinePower" },
            (_, Channel::Roughness) => Fixed(ParamValue::Scalar(1.0)),
            (_, Channel::Metalness) => Fixed(ParamValue::Scalar(0.0)),
            (_, Channel::Emission) => Fixed(ParamValue::Scalar(1.0)),
            (_, Channel::EmissionColor) => Plug { plug: "incandescence", shape: Color },

            (_, Channel::Normal) => Plug { plug: "normalCamera", shape: Color },
        };
        Some(source)
    }
}

/// Roughness equivalent of a Phong cosine power
///
/// Inverts the Blinn-Phong to Beckmann mapping `n = 2 / r^2 - 2`.
pub fn roughness_from_cosine_power(cosine_power: f32) -> f32 {
    (2.0 / (cosine_power.max(0.0) + 2.0)).sqrt()
}
