//! # Materials
//!
//! Turns host surface shaders into renderer materials.
//!
//! ## Organization
//!
//! - **Params**: the normalized channel set every material is expressed in
//! - **Shader model**: which host shader types are understood, and where
//!   each channel comes from
//! - **Upstream**: breadth-first search for file textures feeding a plug
//! - **Texture cache**: one renderer texture per path, reference counted
//! - **Resolver**: shading group to material bookkeeping

pub mod params;
pub mod shader_model;
pub mod upstream;
pub mod texture_cache;
pub mod resolver;

pub use params::{
    Channel,
    ParamValue,
    ChannelValue,
    NormalizedShaderParams,
    MaterialTextures,
};
pub use shader_model::{ShaderModel, ChannelSource, ValueShape};
pub use upstream::find_upstream_texture;
pub use texture_cache::TextureCache;
pub use resolver::{MaterialResolver, MaterialRecord};
