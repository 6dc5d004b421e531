//! Normalized shader parameters
//!
//! Whatever shading model the host uses, the renderer sees one parameter set:
//! six channels, each either a constant or a texture path. A texture-bound
//! channel carries no constant, so the renderer cannot read a stale value.

use crate::render::TextureHandle;

/// Parameter channels of the normalized material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Base color
    Albedo,
    /// Microfacet roughness
    Roughness,
    /// Metalness
    Metalness,
    /// Emission strength
    Emission,
    /// Emission color
    EmissionColor,
    /// Normal or bump input
    Normal,
}

impl Channel {
    /// All channels in storage order
    pub const ALL: [Channel; 6] = [
        Channel::Albedo,
        Channel::Roughness,
        Channel::Metalness,
        Channel::Emission,
        Channel::EmissionColor,
        Channel::Normal,
    ];

    /// Position of the channel in `ALL`
    pub fn slot(self) -> usize {
        match self {
            Channel::Albedo => 0,
            Channel::Roughness => 1,
            Channel::Metalness => 2,
            Channel::Emission => 3,
            Channel::EmissionColor => 4,
            Channel::Normal => 5,
        }
    }
}

/// Constant value of a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    /// Single scalar
    Scalar(f32),
    /// Color or vector
    Color([f32; 3]),
}

/// Binding of one channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValue {
    /// Value read from the shader node itself
    Constant(ParamValue),
    /// Path of the nearest upstream texture
    Texture(String),
}

impl ChannelValue {
    /// Texture path if the channel is texture-bound
    pub fn texture_path(&self) -> Option<&str> {
        match self {
            ChannelValue::Texture(path) => Some(path.as_str()),
            ChannelValue::Constant(_) => None,
        }
    }

    /// Constant if the channel is not texture-bound
    pub fn constant(&self) -> Option<ParamValue> {
        match self {
            ChannelValue::Constant(value) => Some(*value),
            ChannelValue::Texture(_) => None,
        }
    }
}

/// One value per channel
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedShaderParams {
    channels: [ChannelValue; 6],
}

impl Default for NormalizedShaderParams {
    fn default() -> Self {
        Self {
            channels: [
                ChannelValue::Constant(ParamValue::Color([0.8, 0.8, 0.8])),
                ChannelValue::Constant(ParamValue::Scalar(0.5)),
                ChannelValue::Constant(ParamValue::Scalar(0.0)),
                ChannelValue::Constant(ParamValue::Scalar(0.0)),
                ChannelValue::Constant(ParamValue::Color([0.0, 0.0, 0.0])),
                ChannelValue::Constant(ParamValue::Color([0.0, 0.0, 1.0])),
            ],
        }
    }
}

impl NormalizedShaderParams {
    /// Binding of a channel
    pub fn get(&self, channel: Channel) -> &ChannelValue {
        &self.channels[channel.slot()]
    }

    /// Replace the binding of a channel
    pub fn set(&mut self, channel: Channel, value: ChannelValue) {
        self.channels[channel.slot()] = value;
    }

    /// Builder form of `set`
    pub fn with(mut self, channel: Channel, value: ChannelValue) -> Self {
        self.set(channel, value);
        self
    }

    /// Channels paired with their bindings
    pub fn iter(&self) -> impl Iterator<Item = (Channel, &ChannelValue)> {
        Channel::ALL.iter().copied().zip(self.channels.iter())
    }

    /// Texture-bound channels and their paths
    pub fn texture_bindings(&self) -> impl Iterator<Item = (Channel, &str)> {
        self.iter()
            .filter_map(|(channel, value)| value.texture_path().map(|path| (channel, path)))
    }

    /// Albedo binding
    pub fn albedo(&self) -> &ChannelValue {
        self.get(Channel::Albedo)
    }

    /// Roughness binding
    pub fn roughness(&self) -> &ChannelValue {
        self.get(Channel::Roughness)
    }

    /// Metalness binding
    pub fn metalness(&self) -> &ChannelValue {
        self.get(Channel::Metalness)
    }
}

/// Texture handles bound to material channels
///
/// Parallel to the texture-bound channels of a `NormalizedShaderParams`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialTextures {
    slots: [Option<TextureHandle>; 6],
}

impl MaterialTextures {
    /// Create new empty material textures
    pub fn new() -> Self {
        Self::default()
    }

    /// Texture bound to a channel
    pub fn get(&self, channel: Channel) -> Option<TextureHandle> {
        self.slots[channel.slot()]
    }

    /// Bind or clear a channel's texture
    pub fn set(&mut self, channel: Channel, texture: Option<TextureHandle>) {
        self.slots[channel.slot()] = texture;
    }

    /// Builder form of `set`
    pub fn with(mut self, channel: Channel, texture: TextureHandle) -> Self {
        self.set(channel, Some(texture));
        self
    }

    /// Check if any textures are bound
    pub fn has_any_textures(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    /// Per-channel texture usage flags for a uniform block
    pub fn get_texture_flags(&self) -> [u32; 6] {
        self.slots.map(|slot| u32::from(slot.is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_slots_match_all_order() {
        for (i, channel) in Channel::ALL.iter().enumerate() {
            assert_eq!(channel.slot(), i);
        }
    }

    #[test]
    fn test_texture_binding_excludes_constant() {
        let params = NormalizedShaderParams::default()
            .with(Channel::Albedo, ChannelValue::Texture("wood.png".into()));

        assert_eq!(params.albedo().texture_path(), Some("wood.png"));
        assert_eq!(params.albedo().constant(), None);
        assert_eq!(
            params.texture_bindings().collect::<Vec<_>>(),
            vec![(Channel::Albedo, "wood.png")]
        );
    }

    #[test]
    fn test_material_textures_flags() {
        let textures = MaterialTextures::new()
            .with(Channel::Albedo, TextureHandle(1))
            .with(Channel::Normal, TextureHandle(2));

        assert!(textures.has_any_textures());
        assert_eq!(textures.get(Channel::Normal), Some(TextureHandle(2)));
        assert_eq!(textures.get_texture_flags(), [1, 0, 0, 0, 0, 1]);
    }
}
