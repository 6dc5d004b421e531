//! Math utilities and types
//!
//! Provides the matrix and vector aliases used for mirrored transforms.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Accumulate a chain of local matrices ordered root first.
///
/// The result is `chain[0] * chain[1] * ... * chain[n - 1]`, so the leaf
/// matrix is applied to points first. An empty chain yields identity.
pub fn compose_root_to_leaf<'a, I>(chain: I) -> Mat4
where
    I: IntoIterator<Item = &'a Mat4>,
{
    chain
        .into_iter()
        .fold(Mat4::identity(), |world, local| world * local)
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }
}
