//! # Renderer Interface
//!
//! The mirror pushes everything it extracts from the host through the
//! [`RenderBridge`] trait: GPU-ready meshes, normalized lights and cameras,
//! materials and textures. The renderer hands back opaque handles; the mirror
//! stores them and never looks inside.
//!
//! ## Resource Lifetime
//!
//! The GPU may still be reading a resource when the mirror decides to drop
//! it. Every destructive call (`destroy_node`, `destroy_material`,
//! `release_texture`) is therefore preceded by `wait_for_gpu_idle` on the
//! mirror side. Renderers are free to make that wait a no-op.
//!
//! ## Backends
//!
//! - [`headless::HeadlessRenderer`]: in-memory renderer that records every
//!   call, used by tests and by hosts that only need the synchronized state

pub mod bridge;
pub mod headless;

use thiserror::Error;

use crate::host::LightType;

pub use bridge::RenderBridge;
pub use headless::HeadlessRenderer;

/// Handle to a renderable scene node (mesh, light or camera)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// Handle to a material resource stored in the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);

/// Handle to a texture resource stored in the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Renderer-side light description
///
/// Color is premultiplied by intensity; the renderer never sees the raw
/// host intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightDesc {
    /// Light category
    pub light_type: LightType,
    /// Linear color scaled by intensity
    pub color: [f32; 3],
    /// Influence radius in scene units
    pub radius: f32,
    /// Half-angle in radians where spot falloff begins
    pub inner_cone: f32,
    /// Half-angle in radians where spot falloff ends
    pub outer_cone: f32,
}

/// Renderer-side perspective camera description
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraDesc {
    /// Vertical field of view in radians
    pub vertical_fov: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

/// Errors reported by a renderer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A handle did not name a live resource
    ///
    /// Either the handle was never issued or the resource was already
    /// destroyed.
    #[error("Invalid {kind} handle: {raw}")]
    InvalidHandle {
        /// Resource category
        kind: &'static str,
        /// Raw handle value
        raw: u64,
    },

    /// Resource creation or management failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A texture file could not be loaded
    #[error("Texture load failed for '{path}'")]
    TextureLoadFailed {
        /// Path as given by the host
        path: String,
    },

    /// A resource was destroyed while other resources still referenced it
    #[error("{kind} {raw} is still in use by {users} node(s)")]
    ResourceInUse {
        /// Resource category
        kind: &'static str,
        /// Raw handle value
        raw: u64,
        /// Number of referencing nodes
        users: usize,
    },

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
