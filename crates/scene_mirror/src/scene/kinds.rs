//! Mesh, light and camera tracking
//!
//! The three [`TrackedKind`] implementations the coordinator instantiates
//! [`ObjectTracker`](crate::scene::ObjectTracker) with.

use crate::core::{LightConfig, MeshConfig, SyncError, SyncResult};
use crate::foundation::math::Mat4;
use crate::host::{ExternalHandle, HostScene, LightAttributes, LightType, ObjectKind};
use crate::mesh::{IndexedMesh, MeshIndexer};
use crate::render::{CameraDesc, LightDesc, NodeHandle, RenderBridge, RenderResult};
use crate::scene::tracker::TrackedKind;

fn expect_kind(
    host: &dyn HostScene,
    handle: ExternalHandle,
    expected: ObjectKind,
) -> SyncResult<()> {
    match host.object_kind(handle) {
        Some(kind) if kind == expected => Ok(()),
        other => Err(SyncError::Skipped(format!(
            "{:?} is {:?}, not {:?}",
            handle, other, expected
        ))),
    }
}

/// Polygon meshes, indexed for the GPU
#[derive(Debug, Clone, Default)]
pub struct MeshKind {
    indexer: MeshIndexer,
}

impl MeshKind {
    /// Create with the configured winding
    pub fn new(config: &MeshConfig) -> Self {
        Self { indexer: MeshIndexer::new(config.winding) }
    }

    /// Indexer used for every extraction
    pub fn indexer(&self) -> &MeshIndexer {
        &self.indexer
    }
}

impl TrackedKind for MeshKind {
    type Data = IndexedMesh;
    const OBJECT_KIND: ObjectKind = ObjectKind::Mesh;
    const LABEL: &'static str = "mesh";

    fn accepts(&self, host: &dyn HostScene, handle: ExternalHandle) -> SyncResult<()> {
        expect_kind(host, handle, Self::OBJECT_KIND)?;
        if host.is_intermediate(handle) {
            return Err(SyncError::Skipped(format!("mesh {:?} is intermediate", handle)));
        }
        Ok(())
    }

    fn extract(&self, host: &dyn HostScene, handle: ExternalHandle) -> SyncResult<IndexedMesh> {
        let geometry = host.mesh_geometry(handle)?;
        let (mesh, stats) = self.indexer.index_with_stats(&geometry);
        log::trace!(
            "Mesh {:?}: {} corners -> {} vertices, {} faces skipped",
            handle,
            stats.corners,
            mesh.vertices.len(),
            stats.skipped_faces
        );
        Ok(mesh)
    }

    fn create_node(
        &self,
        renderer: &mut dyn RenderBridge,
        data: &IndexedMesh,
        world: &Mat4,
    ) -> RenderResult<NodeHandle> {
        renderer.create_mesh_node(data, world)
    }

    fn update_node(
        &self,
        renderer: &mut dyn RenderBridge,
        node: NodeHandle,
        data: &IndexedMesh,
    ) -> RenderResult<()> {
        renderer.update_mesh_node(node, data)
    }
}

/// Point, spot and directional lights
#[derive(Debug, Clone, PartialEq)]
pub struct LightKind {
    default_radius: f32,
}

impl LightKind {
    /// Create with the configured defaults
    pub fn new(config: &LightConfig) -> Self {
        Self { default_radius: config.default_radius }
    }

    /// Convert host light attributes to the renderer's description
    ///
    /// Color is premultiplied by intensity. Spot cones are half-angles: the
    /// inner cone is where the penumbra starts, the outer where light ends.
    pub fn normalize(&self, attributes: &LightAttributes) -> LightDesc {
        let color = attributes.color.map(|channel| channel * attributes.intensity);
        let (inner_cone, outer_cone) = match attributes.light_type {
            LightType::Spot => {
                let half = attributes.cone_angle * 0.5;
                let edge = half + attributes.penumbra_angle;
                (half.min(edge).max(0.0), half.max(edge))
            }
            LightType::Point | LightType::Directional => (0.0, 0.0),
        };
        LightDesc {
            light_type: attributes.light_type,
            color,
            radius: self.default_radius,
            inner_cone,
            outer_cone,
        }
    }
}

impl Default for LightKind {
    fn default() -> Self {
        Self::new(&LightConfig::default())
    }
}

impl TrackedKind for LightKind {
    type Data = LightDesc;
    const OBJECT_KIND: ObjectKind = ObjectKind::Light;
    const LABEL: &'static str = "light";

    fn accepts(&self, host: &dyn HostScene, handle: ExternalHandle) -> SyncResult<()> {
        expect_kind(host, handle, Self::OBJECT_KIND)
    }

    fn extract(&self, host: &dyn HostScene, handle: ExternalHandle) -> SyncResult<LightDesc> {
        Ok(self.normalize(&host.light_attributes(handle)?))
    }

    fn create_node(
        &self,
        renderer: &mut dyn RenderBridge,
        data: &LightDesc,
        world: &Mat4,
    ) -> RenderResult<NodeHandle> {
        renderer.create_light_node(data, world)
    }

    fn update_node(
        &self,
        renderer: &mut dyn RenderBridge,
        node: NodeHandle,
        data: &LightDesc,
    ) -> RenderResult<()> {
        renderer.update_light_node(node, data)
    }
}

/// Perspective cameras
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraKind;

impl TrackedKind for CameraKind {
    type Data = CameraDesc;
    const OBJECT_KIND: ObjectKind = ObjectKind::Camera;
    const LABEL: &'static str = "camera";

    fn accepts(&self, host: &dyn HostScene, handle: ExternalHandle) -> SyncResult<()> {
        expect_kind(host, handle, Self::OBJECT_KIND)?;
        if host.is_orthographic(handle) {
            return Err(SyncError::Unsupported(format!(
                "camera {:?} is orthographic",
                handle
            )));
        }
        Ok(())
    }

    fn extract(&self, host: &dyn HostScene, handle: ExternalHandle) -> SyncResult<CameraDesc> {
        let camera = host.camera_attributes(handle)?;
        Ok(CameraDesc {
            vertical_fov: camera.vertical_fov,
            near: camera.near_clip,
            far: camera.far_clip,
        })
    }

    fn create_node(
        &self,
        renderer: &mut dyn RenderBridge,
        data: &CameraDesc,
        world: &Mat4,
    ) -> RenderResult<NodeHandle> {
        renderer.create_camera_node(data, world)
    }

    fn update_node(
        &self,
        renderer: &mut dyn RenderBridge,
        node: NodeHandle,
        data: &CameraDesc,
    ) -> RenderResult<()> {
        renderer.update_camera_node(node, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::utils::deg_to_rad;
    use crate::host::memory::MemoryHost;
    use crate::host::CameraAttributes;
    use crate::mesh::MeshGeometry;
    use approx::assert_relative_eq;

    fn point(color: [f32; 3], intensity: f32) -> LightAttributes {
        LightAttributes {
            light_type: LightType::Point,
            color,
            intensity,
            cone_angle: 0.0,
            penumbra_angle: 0.0,
        }
    }

    #[test]
    fn test_point_light_premultiplied() {
        let desc = LightKind::default().normalize(&point([1.0, 1.0, 1.0], 2.0));
        assert_eq!(desc.color, [2.0, 2.0, 2.0]);
        assert_eq!(desc.radius, 20.0);
        assert_eq!(desc.light_type, LightType::Point);
    }

    #[test]
    fn test_spot_cone_half_angles() {
        let attributes = LightAttributes {
            light_type: LightType::Spot,
            color: [1.0, 0.5, 0.0],
            intensity: 1.0,
            cone_angle: deg_to_rad(40.0),
            penumbra_angle: deg_to_rad(10.0),
        };
        let desc = LightKind::default().normalize(&attributes);
        assert_relative_eq!(desc.inner_cone, deg_to_rad(20.0), epsilon = 1e-6);
        assert_relative_eq!(desc.outer_cone, deg_to_rad(30.0), epsilon = 1e-6);

        let inward = LightAttributes { penumbra_angle: deg_to_rad(-5.0), ..attributes };
        let desc = LightKind::default().normalize(&inward);
        assert_relative_eq!(desc.inner_cone, deg_to_rad(15.0), epsilon = 1e-6);
        assert_relative_eq!(desc.outer_cone, deg_to_rad(20.0), epsilon = 1e-6);
    }

    #[test]
    fn test_configured_radius() {
        let kind = LightKind::new(&LightConfig { default_radius: 5.0 });
        assert_eq!(kind.normalize(&point([1.0; 3], 1.0)).radius, 5.0);
    }

    #[test]
    fn test_intermediate_mesh_skipped() {
        let mut host = MemoryHost::new();
        let xform = host.add_transform(None);
        let mesh = host.add_intermediate_mesh(xform, MeshGeometry::unit_quad());
        assert!(matches!(
            MeshKind::default().accepts(&host, mesh),
            Err(SyncError::Skipped(_))
        ));
    }

    #[test]
    fn test_orthographic_camera_unsupported() {
        let mut host = MemoryHost::new();
        let xform = host.add_transform(None);
        let attributes = CameraAttributes { vertical_fov: 0.8, near_clip: 0.1, far_clip: 100.0 };
        let ortho = host.add_camera(xform, attributes.clone(), true);
        let persp = host.add_camera(xform, attributes, false);

        assert!(matches!(
            CameraKind.accepts(&host, ortho),
            Err(SyncError::Unsupported(_))
        ));
        assert!(CameraKind.accepts(&host, persp).is_ok());
        assert_eq!(
            CameraKind.extract(&host, persp).unwrap(),
            CameraDesc { vertical_fov: 0.8, near: 0.1, far: 100.0 }
        );
    }

    #[test]
    fn test_wrong_category_rejected() {
        let mut host = MemoryHost::new();
        let xform = host.add_transform(None);
        assert!(LightKind::default().accepts(&host, xform).is_err());
    }
}
