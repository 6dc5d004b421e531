//! Renderer-facing vertex and indexed mesh types

use bytemuck::{Pod, Zeroable};

/// Interleaved vertex handed to the renderer.
///
/// `#[repr(C)]` with only `f32` fields keeps the layout stable for buffer
/// uploads; `Pod` lets meshes be viewed as raw bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Position in object space
    pub position: [f32; 3],

    /// Normal vector
    pub normal: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],

    /// Tangent vector for normal mapping
    pub tangent: [f32; 3],

    /// Bitangent vector for normal mapping
    pub bitangent: [f32; 3],
}

impl Vertex {
    /// Create a vertex without tangent frame
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
            ..Self::default()
        }
    }

    /// Bitwise attribute equality.
    ///
    /// Unlike `==` this treats `-0.0` and `0.0` as different and a NaN as
    /// equal to itself, which is what deduplication needs.
    pub fn same_attributes(&self, other: &Vertex) -> bool {
        bytemuck::bytes_of(self) == bytemuck::bytes_of(other)
    }
}

/// Deduplicated vertex buffer plus triangle list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexedMesh {
    /// Unique vertices
    pub vertices: Vec<Vertex>,

    /// Three indices per triangle into `vertices`
    pub indices: Vec<u32>,
}

impl IndexedMesh {
    /// Create a new indexed mesh
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// No triangles to draw
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex buffer as raw bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index buffer as raw bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Every index addresses an existing vertex and the list holds whole triangles
    pub fn is_well_formed(&self) -> bool {
        self.indices.len() % 3 == 0
            && self
                .indices
                .iter()
                .all(|&index| (index as usize) < self.vertices.len())
    }
}
