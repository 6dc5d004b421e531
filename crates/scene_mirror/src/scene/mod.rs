//! Scene synchronization
//!
//! Keeps the renderer's scene in step with the host's. Bridges the host
//! scene graph (authoritative) with the renderer (mirror).
//!
//! ## Architecture
//!
//! ```text
//! Host scene graph
//!      ↓  notifications
//! Scene Coordinator ── Material Resolver
//!      ↓
//! Object Trackers (mesh, light, camera) ── Hierarchy Watch
//!      ↓
//! Renderer
//! ```
//!
//! The coordinator:
//! - Routes host notifications to the tracker or resolver that owns the object
//! - Binds each mesh to the material of its shading group
//! - Listens on every ancestor of a tracked object, shared between siblings
//! - Propagates hierarchy transform changes to every tracked descendant
//! - Owns the callback registry, so teardown cancels every listener

pub mod coordinator;
pub mod hierarchy;
pub mod kinds;
pub mod tracker;
pub mod transform;

#[cfg(test)]
mod tests;

pub use coordinator::{SceneCoordinator, SyncStats};
pub use hierarchy::HierarchyWatch;
pub use kinds::{CameraKind, LightKind, MeshKind};
pub use tracker::{ObjectTracker, TrackedEntry, TrackedKind};
pub use transform::{world_transform, DirtyQueue};
