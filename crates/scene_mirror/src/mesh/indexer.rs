//! Corner deduplication
//!
//! Every triangle corner is hashed from its four attribute indices. A table
//! maps each hash to the vertices already emitted under it; a corner reuses a
//! vertex only when the hash matches *and* the synthesized attributes are
//! bitwise identical, so a hash collision can never merge two different
//! vertices.
//!
//! Faces are validated as a whole before any of their corners are emitted. A
//! face with a failed triangulation or out-of-range indices is skipped and
//! logged; the rest of the mesh still comes through.

use std::collections::HashMap;

use thiserror::Error;

use super::raw::{CornerTuple, MeshGeometry, RawMeshFace};
use super::vertex::{IndexedMesh, Vertex};
use crate::core::config::WindingOrder;

/// Multiplier applied to the position index
pub const POSITION_PRIME: u64 = 73_856_093;
/// Multiplier applied to the normal index
pub const NORMAL_PRIME: u64 = 19_349_663;
/// Multiplier applied to the uv index
pub const UV_PRIME: u64 = 83_492_791;
/// Multiplier applied to the tangent index
pub const TANGENT_PRIME: u64 = 50_331_653;
/// Largest prime below 2^32
pub const HASH_MODULUS: u64 = 4_294_967_291;

const DEFAULT_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];
const DEFAULT_UV: [f32; 2] = [0.0, 0.0];
const DEFAULT_TANGENT: [f32; 3] = [0.0, 0.0, 0.0];

/// Combined hash of a corner's four index channels.
///
/// Each channel has its own multiplier so permuted tuples such as
/// `(1, 2, 0, 0)` and `(2, 1, 0, 0)` hash differently. The sum cannot
/// overflow: four `u32 * ~2^27` products stay below `2^61`.
pub fn corner_hash(corner: &CornerTuple) -> u64 {
    let sum = u64::from(corner.position) * POSITION_PRIME
        + u64::from(corner.normal) * NORMAL_PRIME
        + u64::from(corner.uv) * UV_PRIME
        + u64::from(corner.tangent) * TANGENT_PRIME;
    sum % HASH_MODULUS
}

/// Reasons a face is skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaceError {
    /// The host could not triangulate the polygon
    #[error("face has no triangulation ({corners} corners)")]
    NoTriangulation {
        /// Corner count of the polygon
        corners: usize,
    },
    /// A triangle refers to a corner the face does not have
    #[error("triangle refers to corner {corner} but face has {count}")]
    CornerOutOfRange {
        /// Local corner position
        corner: u32,
        /// Corners in the face
        count: usize,
    },
    /// A corner indexes past the end of an attribute array
    #[error("{channel} index {index} out of range (len {len})")]
    AttributeOutOfRange {
        /// Attribute channel name
        channel: &'static str,
        /// Offending index
        index: u32,
        /// Array length
        len: usize,
    },
}

/// Counters collected while indexing one mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    /// Triangle corners emitted
    pub corners: usize,
    /// Faces skipped as malformed
    pub skipped_faces: usize,
    /// Hash hits whose attributes differed
    pub collisions: usize,
}

/// Converts host meshes into deduplicated vertex/index buffers
#[derive(Debug, Clone, Copy)]
pub struct MeshIndexer {
    winding: WindingOrder,
    hasher: fn(&CornerTuple) -> u64,
}

impl Default for MeshIndexer {
    fn default() -> Self {
        Self::new(WindingOrder::default())
    }
}

impl MeshIndexer {
    /// Create an indexer with the given winding policy
    pub fn new(winding: WindingOrder) -> Self {
        Self {
            winding,
            hasher: corner_hash,
        }
    }

    /// Replace the corner hash function
    pub fn with_hasher(mut self, hasher: fn(&CornerTuple) -> u64) -> Self {
        self.hasher = hasher;
        self
    }

    /// Winding policy in use
    pub fn winding(&self) -> WindingOrder {
        self.winding
    }

    /// Index a mesh, discarding statistics
    pub fn index(&self, geometry: &MeshGeometry) -> IndexedMesh {
        self.index_with_stats(geometry).0
    }

    /// Index a mesh and report what happened along the way
    pub fn index_with_stats(&self, geometry: &MeshGeometry) -> (IndexedMesh, IndexStats) {
        let corner_budget = geometry.triangle_corner_count();
        let mut mesh = IndexedMesh::new(Vec::new(), Vec::with_capacity(corner_budget));
        let mut table: HashMap<u64, Vec<u32>> = HashMap::with_capacity(corner_budget);
        let mut stats = IndexStats::default();
        let order = self.winding.corner_order();

        for (face_index, face) in geometry.faces.iter().enumerate() {
            let triangles = match resolve_face(geometry, face) {
                Ok(triangles) => triangles,
                Err(err) => {
                    log::warn!("Skipping face {}: {}", face_index, err);
                    stats.skipped_faces += 1;
                    continue;
                }
            };

            for triangle in &triangles {
                for &slot in &order {
                    let (corner, vertex) = &triangle[slot];
                    let index = self.emit(&mut mesh, &mut table, &mut stats, corner, vertex);
                    mesh.indices.push(index);
                    stats.corners += 1;
                }
            }
        }

        log::debug!(
            "Indexed mesh: {} corners -> {} vertices ({} faces skipped, {} hash collisions)",
            stats.corners,
            mesh.vertices.len(),
            stats.skipped_faces,
            stats.collisions
        );

        (mesh, stats)
    }

    fn emit(
        &self,
        mesh: &mut IndexedMesh,
        table: &mut HashMap<u64, Vec<u32>>,
        stats: &mut IndexStats,
        corner: &CornerTuple,
        vertex: &Vertex,
    ) -> u32 {
        let bucket = table.entry((self.hasher)(corner)).or_default();

        if let Some(&existing) = bucket
            .iter()
            .find(|&&candidate| mesh.vertices[candidate as usize].same_attributes(vertex))
        {
            return existing;
        }

        if !bucket.is_empty() {
            stats.collisions += 1;
        }

        let index = mesh.vertices.len() as u32;
        mesh.vertices.push(*vertex);
        bucket.push(index);
        index
    }
}

/// Validate a face and synthesize the vertex of every triangle corner
fn resolve_face(
    geometry: &MeshGeometry,
    face: &RawMeshFace,
) -> Result<Vec<[(CornerTuple, Vertex); 3]>, FaceError> {
    if face.triangles.is_empty() {
        return Err(FaceError::NoTriangulation {
            corners: face.corners.len(),
        });
    }

    let mut resolved = Vec::with_capacity(face.triangles.len());
    for triangle in &face.triangles {
        let mut out = [(CornerTuple::uniform(0), Vertex::default()); 3];
        for (slot, &local) in triangle.iter().enumerate() {
            let corner = face
                .corners
                .get(local as usize)
                .copied()
                .ok_or(FaceError::CornerOutOfRange {
                    corner: local,
                    count: face.corners.len(),
                })?;
            out[slot] = (corner, synthesize_vertex(geometry, &corner)?);
        }
        resolved.push(out);
    }
    Ok(resolved)
}

fn synthesize_vertex(geometry: &MeshGeometry, corner: &CornerTuple) -> Result<Vertex, FaceError> {
    Ok(Vertex {
        position: required(&geometry.positions, corner.position, "position")?,
        normal: optional(&geometry.normals, corner.normal, "normal", DEFAULT_NORMAL)?,
        tex_coord: optional(&geometry.uvs, corner.uv, "uv", DEFAULT_UV)?,
        tangent: optional(&geometry.tangents, corner.tangent, "tangent", DEFAULT_TANGENT)?,
        bitangent: optional(&geometry.bitangents, corner.tangent, "bitangent", DEFAULT_TANGENT)?,
    })
}

fn required<T: Copy>(values: &[T], index: u32, channel: &'static str) -> Result<T, FaceError> {
    values
        .get(index as usize)
        .copied()
        .ok_or(FaceError::AttributeOutOfRange {
            channel,
            index,
            len: values.len(),
        })
}

/// Empty arrays mean the channel is absent and the default is used
fn optional<T: Copy>(
    values: &[T],
    index: u32,
    channel: &'static str,
    default: T,
) -> Result<T, FaceError> {
    if values.is_empty() {
        Ok(default)
    } else {
        required(values, index, channel)
    }
}
