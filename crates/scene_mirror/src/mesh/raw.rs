//! Raw host-side mesh representation

/// Indices of one polygon corner into the four attribute arrays.
///
/// The tangent index addresses both the tangent and bitangent arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CornerTuple {
    /// Index into `MeshGeometry::positions`
    pub position: u32,
    /// Index into `MeshGeometry::normals`
    pub normal: u32,
    /// Index into `MeshGeometry::uvs`
    pub uv: u32,
    /// Index into `MeshGeometry::tangents` and `MeshGeometry::bitangents`
    pub tangent: u32,
}

impl CornerTuple {
    /// Create a corner tuple
    pub fn new(position: u32, normal: u32, uv: u32, tangent: u32) -> Self {
        Self { position, normal, uv, tangent }
    }

    /// Corner whose four channels share one index
    pub fn uniform(index: u32) -> Self {
        Self::new(index, index, index, index)
    }
}

/// One host polygon with the host's triangulation of it.
///
/// `triangles` refers to positions in `corners`, not to attribute arrays. An
/// empty triangle list means the host failed to triangulate the polygon.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMeshFace {
    /// Polygon corners in host order
    pub corners: Vec<CornerTuple>,
    /// Triangles as triples of local corner positions
    pub triangles: Vec<[u32; 3]>,
}

impl RawMeshFace {
    /// Single triangle face
    pub fn triangle(corners: [CornerTuple; 3]) -> Self {
        Self {
            corners: corners.to_vec(),
            triangles: vec![[0, 1, 2]],
        }
    }

    /// Convex polygon triangulated as a fan around its first corner
    pub fn fan(corners: Vec<CornerTuple>) -> Self {
        let triangles = (1..corners.len().saturating_sub(1))
            .map(|i| [0, i as u32, i as u32 + 1])
            .collect();
        Self { corners, triangles }
    }

    /// Polygon whose triangulation query failed
    pub fn untriangulated(corners: Vec<CornerTuple>) -> Self {
        Self { corners, triangles: Vec::new() }
    }

    /// Number of triangle corners this face contributes
    pub fn triangle_corner_count(&self) -> usize {
        self.triangles.len() * 3
    }
}

/// Attribute arrays and faces of one host mesh.
///
/// Optional channels may be left empty; the indexer then substitutes
/// defaults instead of reading them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshGeometry {
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Normals
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates
    pub uvs: Vec<[f32; 2]>,
    /// Tangents
    pub tangents: Vec<[f32; 3]>,
    /// Bitangents, parallel to `tangents`
    pub bitangents: Vec<[f32; 3]>,
    /// Polygons
    pub faces: Vec<RawMeshFace>,
}

impl MeshGeometry {
    /// Total triangle corners over all faces
    pub fn triangle_corner_count(&self) -> usize {
        self.faces.iter().map(RawMeshFace::triangle_corner_count).sum()
    }

    /// Unit quad in the XY plane split into two triangles sharing a diagonal
    pub fn unit_quad() -> Self {
        Self {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            tangents: vec![[1.0, 0.0, 0.0]],
            bitangents: vec![[0.0, 1.0, 0.0]],
            faces: vec![RawMeshFace::fan(vec![
                CornerTuple::new(0, 0, 0, 0),
                CornerTuple::new(1, 0, 1, 0),
                CornerTuple::new(2, 0, 2, 0),
                CornerTuple::new(3, 0, 3, 0),
            ])],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_triangulation() {
        let face = RawMeshFace::fan((0..5).map(CornerTuple::uniform).collect());
        assert_eq!(face.triangles, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
    }

    #[test]
    fn test_degenerate_fan_has_no_triangles() {
        let face = RawMeshFace::fan(vec![CornerTuple::uniform(0), CornerTuple::uniform(1)]);
        assert!(face.triangles.is_empty());
    }

    #[test]
    fn test_unit_quad_corner_count() {
        assert_eq!(MeshGeometry::unit_quad().triangle_corner_count(), 6);
    }
}
