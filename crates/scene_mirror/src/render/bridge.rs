//! Renderer abstraction trait
//!
//! This module defines the trait a renderer implements to receive the
//! mirrored scene. The mirror only ever talks to `dyn RenderBridge`.

use crate::foundation::math::Mat4;
use crate::materials::{MaterialTextures, NormalizedShaderParams};
use crate::mesh::IndexedMesh;
use crate::render::{
    CameraDesc, LightDesc, MaterialHandle, NodeHandle, RenderResult, TextureHandle,
};

/// Sink for the synchronized scene
///
/// Handles returned from the `create_*` calls stay valid until the matching
/// destroy call. The mirror waits for GPU idle before every destroy or
/// release.
pub trait RenderBridge {
    /// Upload a mesh and place it at `world`
    fn create_mesh_node(&mut self, mesh: &IndexedMesh, world: &Mat4) -> RenderResult<NodeHandle>;

    /// Replace the vertex and index data of an existing mesh node
    fn update_mesh_node(&mut self, node: NodeHandle, mesh: &IndexedMesh) -> RenderResult<()>;

    /// Create a light node
    fn create_light_node(&mut self, light: &LightDesc, world: &Mat4) -> RenderResult<NodeHandle>;

    /// Replace the parameters of an existing light node
    fn update_light_node(&mut self, node: NodeHandle, light: &LightDesc) -> RenderResult<()>;

    /// Create a perspective camera node
    fn create_camera_node(&mut self, camera: &CameraDesc, world: &Mat4) -> RenderResult<NodeHandle>;

    /// Replace the parameters of an existing camera node
    fn update_camera_node(&mut self, node: NodeHandle, camera: &CameraDesc) -> RenderResult<()>;

    /// Set the world matrix of any node
    fn set_node_transform(&mut self, node: NodeHandle, world: &Mat4) -> RenderResult<()>;

    /// Destroy a node and everything it owns
    fn destroy_node(&mut self, node: NodeHandle) -> RenderResult<()>;

    /// Create a material from normalized parameters
    fn create_material(
        &mut self,
        params: &NormalizedShaderParams,
        textures: &MaterialTextures,
    ) -> RenderResult<MaterialHandle>;

    /// Update a material in place; nodes bound to it keep the binding
    fn update_material(
        &mut self,
        material: MaterialHandle,
        params: &NormalizedShaderParams,
        textures: &MaterialTextures,
    ) -> RenderResult<()>;

    /// Destroy a material; no node may still be bound to it
    fn destroy_material(&mut self, material: MaterialHandle) -> RenderResult<()>;

    /// Bind a material to a mesh node, or unbind with `None`
    fn set_node_material(
        &mut self,
        node: NodeHandle,
        material: Option<MaterialHandle>,
    ) -> RenderResult<()>;

    /// Load a texture from a host path
    fn request_texture(&mut self, path: &str) -> RenderResult<TextureHandle>;

    /// Free a texture
    fn release_texture(&mut self, texture: TextureHandle) -> RenderResult<()>;

    /// Block until the GPU has finished all submitted work
    fn wait_for_gpu_idle(&mut self);
}
