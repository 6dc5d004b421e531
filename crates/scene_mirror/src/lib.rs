//! # Scene Mirror
//!
//! Keeps a renderer-facing mirror of a live host scene graph. Meshes,
//! lights, cameras and the materials bound to them are extracted from the
//! host, normalized and pushed into a renderer through [`render::RenderBridge`];
//! host change notifications keep the mirror current until shutdown.
//!
//! ## Features
//!
//! - **Mesh Indexing**: per-corner index tuples deduplicated into one
//!   interleaved vertex buffer plus triangle indices
//! - **Object Tracking**: one generic tracker per category owning renderer
//!   nodes and the host subscriptions that keep them in sync
//! - **Material Resolution**: Lambert, Phong and Arnold Standard Surface
//!   shaders normalized to PBR parameters, textures shared by path
//! - **Transform Propagation**: parent moves reach every mirrored descendant
//! - **Headless Backend**: an in-memory host and renderer for tests and tools
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_mirror::host::memory::MemoryHost;
//! use scene_mirror::prelude::*;
//!
//! let mut host = MemoryHost::new();
//! let xform = host.add_transform(None);
//! host.add_mesh(xform, MeshGeometry::unit_quad());
//!
//! let mut renderer = HeadlessRenderer::new();
//! let mut coordinator = SceneCoordinator::new(SyncConfig::default())?;
//! let stats = coordinator.initial_scan(&mut host, &mut renderer)?;
//! assert_eq!(stats.meshes, 1);
//!
//! // Later, from the host's idle loop
//! coordinator.dispatch_pending(&mut host, &mut renderer);
//!
//! coordinator.shutdown(&mut host, &mut renderer);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

#[macro_use]
pub mod foundation;

pub mod config;
pub mod core;

pub mod host;
pub mod mesh;
pub mod callbacks;
pub mod materials;
pub mod render;
pub mod scene;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        callbacks::CallbackRegistry,
        core::{Config, SyncConfig, SyncError, SyncResult, WindingOrder},
        foundation::math::{Mat4, Vec3},
        host::{ExternalHandle, HostEvent, HostEventKind, HostScene, ListenerHost, ObjectKind},
        materials::{Channel, ChannelValue, MaterialResolver, NormalizedShaderParams},
        mesh::{IndexedMesh, MeshGeometry, MeshIndexer, Vertex},
        render::{HeadlessRenderer, MaterialHandle, NodeHandle, RenderBridge},
        scene::{SceneCoordinator, SyncStats},
    };
}
