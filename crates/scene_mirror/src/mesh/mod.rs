//! Mesh data and indexing
//!
//! The host hands over polygon meshes as per-corner index tuples into four
//! parallel attribute arrays. The renderer wants one interleaved vertex per
//! unique corner plus a triangle index list. [`MeshIndexer`] bridges the two.

pub mod raw;
pub mod vertex;
pub mod indexer;

pub use raw::{CornerTuple, RawMeshFace, MeshGeometry};
pub use vertex::{Vertex, IndexedMesh};
pub use indexer::{MeshIndexer, IndexStats, FaceError, corner_hash};
