//! Headless renderer
//!
//! Keeps every resource in generational slot maps and logs each call, so the
//! synchronized state can be inspected without a GPU. Stale handles are
//! rejected the way a real backend's validation layer would reject them.
//!
//! The renderer also checks the idle-wait discipline: a destructive call
//! that was not preceded by `wait_for_gpu_idle` (with no other work in
//! between) is counted as unfenced.

use std::collections::HashSet;

use crate::foundation::collections::{key_to_raw, raw_to_key, HandleMap};
use crate::foundation::math::Mat4;
use crate::materials::{MaterialTextures, NormalizedShaderParams};
use crate::mesh::IndexedMesh;
use crate::render::{
    CameraDesc, LightDesc, MaterialHandle, NodeHandle, RenderBridge, RenderError, RenderResult,
    TextureHandle,
};

/// What a headless node holds
#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    /// Indexed mesh data
    Mesh(IndexedMesh),
    /// Light parameters
    Light(LightDesc),
    /// Camera parameters
    Camera(CameraDesc),
}

/// A node as stored by the headless renderer
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessNode {
    /// Node contents
    pub payload: NodePayload,
    /// Current world matrix
    pub world: Mat4,
    /// Bound material (mesh nodes only)
    pub material: Option<MaterialHandle>,
}

/// A material as stored by the headless renderer
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessMaterial {
    /// Last parameters uploaded
    pub params: NormalizedShaderParams,
    /// Last texture bindings uploaded
    pub textures: MaterialTextures,
}

/// One recorded renderer call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOp {
    /// Node created
    CreateNode(NodeHandle),
    /// Node payload replaced
    UpdateNode(NodeHandle),
    /// Node world matrix set
    SetTransform(NodeHandle),
    /// Node destroyed
    DestroyNode(NodeHandle),
    /// Material created
    CreateMaterial(MaterialHandle),
    /// Material updated in place
    UpdateMaterial(MaterialHandle),
    /// Material destroyed
    DestroyMaterial(MaterialHandle),
    /// Material bound to or unbound from a node
    BindMaterial(NodeHandle, Option<MaterialHandle>),
    /// Texture loaded
    RequestTexture(TextureHandle),
    /// Texture freed
    ReleaseTexture(TextureHandle),
    /// GPU idle wait
    WaitIdle,
}

impl RenderOp {
    fn is_destructive(self) -> bool {
        matches!(
            self,
            RenderOp::DestroyNode(_) | RenderOp::DestroyMaterial(_) | RenderOp::ReleaseTexture(_)
        )
    }
}

/// In-memory renderer
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    nodes: HandleMap<HeadlessNode>,
    materials: HandleMap<HeadlessMaterial>,
    textures: HandleMap<String>,
    ops: Vec<RenderOp>,
    idle_waits: usize,
    fenced: bool,
    unfenced_destroys: usize,
    failing_textures: HashSet<String>,
}

impl HeadlessRenderer {
    /// Create an empty renderer
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future `request_texture` for `path` fail
    pub fn fail_texture(&mut self, path: impl Into<String>) {
        self.failing_textures.insert(path.into());
    }

    /// Live node count
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Live material count
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Live texture count
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Look up a live node
    pub fn node(&self, node: NodeHandle) -> Option<&HeadlessNode> {
        self.nodes.get(raw_to_key(node.0))
    }

    /// Look up a live material
    pub fn material(&self, material: MaterialHandle) -> Option<&HeadlessMaterial> {
        self.materials.get(raw_to_key(material.0))
    }

    /// Path a live texture was loaded from
    pub fn texture_path(&self, texture: TextureHandle) -> Option<&str> {
        self.textures.get(raw_to_key(texture.0)).map(String::as_str)
    }

    /// All live mesh nodes
    pub fn mesh_nodes(&self) -> Vec<NodeHandle> {
        self.nodes_matching(|payload| matches!(payload, NodePayload::Mesh(_)))
    }

    /// All live light nodes
    pub fn light_nodes(&self) -> Vec<NodeHandle> {
        self.nodes_matching(|payload| matches!(payload, NodePayload::Light(_)))
    }

    /// All live camera nodes
    pub fn camera_nodes(&self) -> Vec<NodeHandle> {
        self.nodes_matching(|payload| matches!(payload, NodePayload::Camera(_)))
    }

    /// Every call recorded since creation or the last `clear_ops`
    pub fn ops(&self) -> &[RenderOp] {
        &self.ops
    }

    /// Forget the recorded calls
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Number of GPU idle waits issued
    pub fn idle_waits(&self) -> usize {
        self.idle_waits
    }

    /// Whether every destructive call so far followed an idle wait
    pub fn destroys_are_fenced(&self) -> bool {
        self.unfenced_destroys == 0
    }

    fn nodes_matching(&self, predicate: impl Fn(&NodePayload) -> bool) -> Vec<NodeHandle> {
        self.nodes
            .iter()
            .filter(|(_, node)| predicate(&node.payload))
            .map(|(key, _)| NodeHandle(key_to_raw(key)))
            .collect()
    }

    fn record(&mut self, op: RenderOp) {
        if op.is_destructive() {
            if !self.fenced {
                log::warn!("{:?} issued without a preceding GPU idle wait", op);
                self.unfenced_destroys += 1;
            }
        } else {
            self.fenced = matches!(op, RenderOp::WaitIdle);
        }
        self.ops.push(op);
    }

    fn node_mut(&mut self, node: NodeHandle) -> RenderResult<&mut HeadlessNode> {
        self.nodes
            .get_mut(raw_to_key(node.0))
            .ok_or(RenderError::InvalidHandle { kind: "node", raw: node.0 })
    }

    fn check_textures(&self, textures: &MaterialTextures) -> RenderResult<()> {
        for slot in crate::materials::Channel::ALL {
            if let Some(texture) = textures.get(slot) {
                if !self.textures.contains_key(raw_to_key(texture.0)) {
                    return Err(RenderError::InvalidHandle { kind: "texture", raw: texture.0 });
                }
            }
        }
        Ok(())
    }

    fn insert_node(&mut self, payload: NodePayload, world: &Mat4) -> NodeHandle {
        let key = self.nodes.insert(HeadlessNode {
            payload,
            world: *world,
            material: None,
        });
        let handle = NodeHandle(key_to_raw(key));
        self.record(RenderOp::CreateNode(handle));
        handle
    }

    fn replace_payload(&mut self, node: NodeHandle, payload: NodePayload) -> RenderResult<()> {
        let stored = self.node_mut(node)?;
        if std::mem::discriminant(&stored.payload) != std::mem::discriminant(&payload) {
            return Err(RenderError::BackendError(format!(
                "node {} cannot change category",
                node.0
            )));
        }
        stored.payload = payload;
        self.record(RenderOp::UpdateNode(node));
        Ok(())
    }
}

impl RenderBridge for HeadlessRenderer {
    fn create_mesh_node(&mut self, mesh: &IndexedMesh, world: &Mat4) -> RenderResult<NodeHandle> {
        if !mesh.is_well_formed() {
            return Err(RenderError::ResourceCreationFailed(
                "mesh indices reference missing vertices".to_string(),
            ));
        }
        Ok(self.insert_node(NodePayload::Mesh(mesh.clone()), world))
    }

    fn update_mesh_node(&mut self, node: NodeHandle, mesh: &IndexedMesh) -> RenderResult<()> {
        if !mesh.is_well_formed() {
            return Err(RenderError::ResourceCreationFailed(
                "mesh indices reference missing vertices".to_string(),
            ));
        }
        self.replace_payload(node, NodePayload::Mesh(mesh.clone()))
    }

    fn create_light_node(&mut self, light: &LightDesc, world: &Mat4) -> RenderResult<NodeHandle> {
        Ok(self.insert_node(NodePayload::Light(*light), world))
    }

    fn update_light_node(&mut self, node: NodeHandle, light: &LightDesc) -> RenderResult<()> {
        self.replace_payload(node, NodePayload::Light(*light))
    }

    fn create_camera_node(
        &mut self,
        camera: &CameraDesc,
        world: &Mat4,
    ) -> RenderResult<NodeHandle> {
        Ok(self.insert_node(NodePayload::Camera(*camera), world))
    }

    fn update_camera_node(&mut self, node: NodeHandle, camera: &CameraDesc) -> RenderResult<()> {
        self.replace_payload(node, NodePayload::Camera(*camera))
    }

    fn set_node_transform(&mut self, node: NodeHandle, world: &Mat4) -> RenderResult<()> {
        self.node_mut(node)?.world = *world;
        self.record(RenderOp::SetTransform(node));
        Ok(())
    }

    fn destroy_node(&mut self, node: NodeHandle) -> RenderResult<()> {
        self.nodes
            .remove(raw_to_key(node.0))
            .ok_or(RenderError::InvalidHandle { kind: "node", raw: node.0 })?;
        self.record(RenderOp::DestroyNode(node));
        Ok(())
    }

    fn create_material(
        &mut self,
        params: &NormalizedShaderParams,
        textures: &MaterialTextures,
    ) -> RenderResult<MaterialHandle> {
        self.check_textures(textures)?;
        let key = self.materials.insert(HeadlessMaterial {
            params: params.clone(),
            textures: *textures,
        });
        let handle = MaterialHandle(key_to_raw(key));
        self.record(RenderOp::CreateMaterial(handle));
        Ok(handle)
    }

    fn update_material(
        &mut self,
        material: MaterialHandle,
        params: &NormalizedShaderParams,
        textures: &MaterialTextures,
    ) -> RenderResult<()> {
        self.check_textures(textures)?;
        let stored = self
            .materials
            .get_mut(raw_to_key(material.0))
            .ok_or(RenderError::InvalidHandle { kind: "material", raw: material.0 })?;
        stored.params = params.clone();
        stored.textures = *textures;
        self.record(RenderOp::UpdateMaterial(material));
        Ok(())
    }

    fn destroy_material(&mut self, material: MaterialHandle) -> RenderResult<()> {
        let users = self
            .nodes
            .values()
            .filter(|node| node.material == Some(material))
            .count();
        if users > 0 {
            return Err(RenderError::ResourceInUse { kind: "material", raw: material.0, users });
        }
        self.materials
            .remove(raw_to_key(material.0))
            .ok_or(RenderError::InvalidHandle { kind: "material", raw: material.0 })?;
        self.record(RenderOp::DestroyMaterial(material));
        Ok(())
    }

    fn set_node_material(
        &mut self,
        node: NodeHandle,
        material: Option<MaterialHandle>,
    ) -> RenderResult<()> {
        if let Some(handle) = material {
            if !self.materials.contains_key(raw_to_key(handle.0)) {
                return Err(RenderError::InvalidHandle { kind: "material", raw: handle.0 });
            }
        }
        let stored = self.node_mut(node)?;
        if !matches!(stored.payload, NodePayload::Mesh(_)) {
            return Err(RenderError::BackendError(format!(
                "node {} is not a mesh and cannot take a material",
                node.0
            )));
        }
        stored.material = material;
        self.record(RenderOp::BindMaterial(node, material));
        Ok(())
    }

    fn request_texture(&mut self, path: &str) -> RenderResult<TextureHandle> {
        if self.failing_textures.contains(path) {
            return Err(RenderError::TextureLoadFailed { path: path.to_string() });
        }
        let key = self.textures.insert(path.to_string());
        let handle = TextureHandle(key_to_raw(key));
        self.record(RenderOp::RequestTexture(handle));
        Ok(handle)
    }

    fn release_texture(&mut self, texture: TextureHandle) -> RenderResult<()> {
        self.textures
            .remove(raw_to_key(texture.0))
            .ok_or(RenderError::InvalidHandle { kind: "texture", raw: texture.0 })?;
        self.record(RenderOp::ReleaseTexture(texture));
        Ok(())
    }

    fn wait_for_gpu_idle(&mut self) {
        self.idle_waits += 1;
        self.record(RenderOp::WaitIdle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::Channel;
    use crate::mesh::Vertex;

    fn triangle() -> IndexedMesh {
        let v = Vertex::default();
        IndexedMesh::new(vec![v, v, v], vec![0, 1, 2])
    }

    #[test]
    fn test_stale_node_handle_rejected() {
        let mut renderer = HeadlessRenderer::new();
        let node = renderer.create_mesh_node(&triangle(), &Mat4::identity()).unwrap();
        renderer.wait_for_gpu_idle();
        renderer.destroy_node(node).unwrap();

        assert!(matches!(
            renderer.set_node_transform(node, &Mat4::identity()),
            Err(RenderError::InvalidHandle { kind: "node", .. })
        ));
    }

    #[test]
    fn test_unfenced_destroy_detected() {
        let mut renderer = HeadlessRenderer::new();
        let node = renderer.create_mesh_node(&triangle(), &Mat4::identity()).unwrap();
        renderer.wait_for_gpu_idle();
        renderer.set_node_transform(node, &Mat4::identity()).unwrap();
        renderer.destroy_node(node).unwrap();

        assert!(!renderer.destroys_are_fenced());
    }

    #[test]
    fn test_consecutive_destroys_share_one_fence() {
        let mut renderer = HeadlessRenderer::new();
        let a = renderer.create_mesh_node(&triangle(), &Mat4::identity()).unwrap();
        let b = renderer.create_mesh_node(&triangle(), &Mat4::identity()).unwrap();
        renderer.wait_for_gpu_idle();
        renderer.destroy_node(a).unwrap();
        renderer.destroy_node(b).unwrap();

        assert!(renderer.destroys_are_fenced());
        assert_eq!(renderer.idle_waits(), 1);
    }

    #[test]
    fn test_bound_material_cannot_be_destroyed() {
        let mut renderer = HeadlessRenderer::new();
        let node = renderer.create_mesh_node(&triangle(), &Mat4::identity()).unwrap();
        let material = renderer
            .create_material(&NormalizedShaderParams::default(), &MaterialTextures::new())
            .unwrap();
        renderer.set_node_material(node, Some(material)).unwrap();
        renderer.wait_for_gpu_idle();

        assert!(matches!(
            renderer.destroy_material(material),
            Err(RenderError::ResourceInUse { users: 1, .. })
        ));
    }

    #[test]
    fn test_material_rejects_released_texture() {
        let mut renderer = HeadlessRenderer::new();
        let texture = renderer.request_texture("wood.png").unwrap();
        renderer.wait_for_gpu_idle();
        renderer.release_texture(texture).unwrap();

        let textures = MaterialTextures::new().with(Channel::Albedo, texture);
        assert!(renderer
            .create_material(&NormalizedShaderParams::default(), &textures)
            .is_err());
    }

    #[test]
    fn test_failing_texture() {
        let mut renderer = HeadlessRenderer::new();
        renderer.fail_texture("missing.png");
        assert_eq!(
            renderer.request_texture("missing.png"),
            Err(RenderError::TextureLoadFailed { path: "missing.png".to_string() })
        );
        assert_eq!(renderer.texture_count(), 0);
    }
}
