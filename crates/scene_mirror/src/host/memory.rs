//! In-memory host scene
//!
//! A small scene graph with the same notification model as a real host:
//! mutations queue [`HostEvent`]s for every matching listener, and the
//! events are delivered later through `poll_event`. Cancelling a listener
//! drops its queued events, so nothing fires through a dead subscription.
//!
//! Objects can be created "not ready" to imitate hosts that announce an
//! object before its attributes can be read.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::foundation::math::Mat4;
use crate::host::{
    CameraAttributes, ChangeFlags, ExternalHandle, HostError, HostEvent, HostEventKind,
    HostScene, LightAttributes, LightType, ListenerHost, ListenerKind, ObjectKind, PlugValue,
    SubscriptionId,
};
use crate::mesh::MeshGeometry;

/// Plug on a shading group that takes the surface shader
pub const SURFACE_SHADER_PLUG: &str = "surfaceShader";

#[derive(Debug, Clone)]
struct Incoming {
    plug: String,
    source: ExternalHandle,
}

#[derive(Debug, Clone)]
struct HostObject {
    type_name: String,
    kind: Option<ObjectKind>,
    parent: Option<ExternalHandle>,
    children: Vec<ExternalHandle>,
    local: Mat4,
    ready: bool,
    intermediate: bool,
    orthographic: bool,
    geometry: Option<MeshGeometry>,
    light: Option<LightAttributes>,
    camera: Option<CameraAttributes>,
    plugs: HashMap<String, PlugValue>,
    incoming: Vec<Incoming>,
    members: Vec<ExternalHandle>,
}

impl HostObject {
    fn new(type_name: &str, kind: Option<ObjectKind>, ready: bool) -> Self {
        Self {
            type_name: type_name.to_string(),
            kind,
            parent: None,
            children: Vec::new(),
            local: Mat4::identity(),
            ready,
            intermediate: false,
            orthographic: false,
            geometry: None,
            light: None,
            camera: None,
            plugs: HashMap::new(),
            incoming: Vec::new(),
            members: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Listener {
    target: Option<ExternalHandle>,
    kind: ListenerKind,
}

/// Scene graph held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryHost {
    objects: HashMap<ExternalHandle, HostObject>,
    listeners: BTreeMap<SubscriptionId, Listener>,
    queue: VecDeque<HostEvent>,
    cancel_log: Vec<SubscriptionId>,
    refused: Vec<ExternalHandle>,
    next_handle: u64,
    next_subscription: u64,
    defer_ready: bool,
}

impl MemoryHost {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Create subsequent objects in the not-ready state
    pub fn set_defer_ready(&mut self, defer: bool) {
        self.defer_ready = defer;
    }

    /// Make an object queryable and fire its ready listeners
    pub fn mark_ready(&mut self, handle: ExternalHandle) {
        let Some(object) = self.objects.get_mut(&handle) else {
            return;
        };
        if object.ready {
            return;
        }
        object.ready = true;
        self.emit_targeted(handle, ListenerKind::Ready, HostEventKind::Ready { handle });
    }

    /// Refuse every future listener registration targeting `handle`
    pub fn refuse_listeners_for(&mut self, handle: ExternalHandle) {
        self.refused.push(handle);
    }

    /// Hierarchy transform node
    pub fn add_transform(&mut self, parent: Option<ExternalHandle>) -> ExternalHandle {
        self.insert(HostObject::new("transform", None, true), parent)
    }

    /// Mesh shape under a transform
    pub fn add_mesh(&mut self, parent: ExternalHandle, geometry: MeshGeometry) -> ExternalHandle {
        let mut object = HostObject::new("mesh", Some(ObjectKind::Mesh), !self.defer_ready);
        object.geometry = Some(geometry);
        self.insert(object, Some(parent))
    }

    /// Construction-history mesh that never renders
    pub fn add_intermediate_mesh(
        &mut self,
        parent: ExternalHandle,
        geometry: MeshGeometry,
    ) -> ExternalHandle {
        let mut object = HostObject::new("mesh", Some(ObjectKind::Mesh), !self.defer_ready);
        object.geometry = Some(geometry);
        object.intermediate = true;
        self.insert(object, Some(parent))
    }

    /// Light shape under a transform
    pub fn add_light(&mut self, parent: ExternalHandle, light: LightAttributes) -> ExternalHandle {
        let type_name = match light.light_type {
            LightType::Point => "pointLight",
            LightType::Spot => "spotLight",
            LightType::Directional => "directionalLight",
        };
        let mut object = HostObject::new(type_name, Some(ObjectKind::Light), !self.defer_ready);
        object.light = Some(light);
        self.insert(object, Some(parent))
    }

    /// Camera shape under a transform
    pub fn add_camera(
        &mut self,
        parent: ExternalHandle,
        camera: CameraAttributes,
        orthographic: bool,
    ) -> ExternalHandle {
        let mut object = HostObject::new("camera", Some(ObjectKind::Camera), !self.defer_ready);
        object.camera = Some(camera);
        object.orthographic = orthographic;
        self.insert(object, Some(parent))
    }

    /// Dependency node of any type, outside the hierarchy
    pub fn add_node(&mut self, type_name: &str) -> ExternalHandle {
        self.insert(HostObject::new(type_name, None, true), None)
    }

    /// Surface shader node of the given type
    pub fn add_shader(&mut self, type_name: &str) -> ExternalHandle {
        self.add_node(type_name)
    }

    /// File texture node reading `path`
    pub fn add_file_texture(&mut self, path: &str) -> ExternalHandle {
        let handle = self.add_node("file");
        if let Some(object) = self.objects.get_mut(&handle) {
            object
                .plugs
                .insert("fileTextureName".to_string(), PlugValue::Text(path.to_string()));
        }
        handle
    }

    /// Empty shading group
    pub fn add_shading_group(&mut self) -> ExternalHandle {
        self.insert(
            HostObject::new("shadingEngine", Some(ObjectKind::ShadingGroup), true),
            None,
        )
    }

    /// Connect `source` into plug `plug` of `destination`
    ///
    /// A plug takes one input; an existing connection is broken first.
    pub fn connect(&mut self, source: ExternalHandle, destination: ExternalHandle, plug: &str) {
        let previous = self.objects.get(&destination).and_then(|object| {
            object
                .incoming
                .iter()
                .find(|incoming| incoming.plug == plug)
                .map(|incoming| incoming.source)
        });
        if let Some(previous) = previous {
            self.disconnect(previous, destination, plug);
        }
        let Some(object) = self.objects.get_mut(&destination) else {
            return;
        };
        object.incoming.push(Incoming { plug: plug.to_string(), source });
        self.emit_connection(source, destination, true);
    }

    /// Break the connection from `source` into `plug` of `destination`
    pub fn disconnect(&mut self, source: ExternalHandle, destination: ExternalHandle, plug: &str) {
        let Some(object) = self.objects.get_mut(&destination) else {
            return;
        };
        let before = object.incoming.len();
        object
            .incoming
            .retain(|incoming| !(incoming.source == source && incoming.plug == plug));
        if object.incoming.len() != before {
            self.emit_connection(source, destination, false);
        }
    }

    /// Make `mesh` a member of `group`
    pub fn assign(&mut self, mesh: ExternalHandle, group: ExternalHandle) {
        let Some(object) = self.objects.get_mut(&group) else {
            return;
        };
        if !object.members.contains(&mesh) {
            object.members.push(mesh);
            self.emit_connection(mesh, group, true);
        }
    }

    /// Remove `mesh` from `group`
    pub fn unassign(&mut self, mesh: ExternalHandle, group: ExternalHandle) {
        let Some(object) = self.objects.get_mut(&group) else {
            return;
        };
        let before = object.members.len();
        object.members.retain(|&member| member != mesh);
        if object.members.len() != before {
            self.emit_connection(mesh, group, false);
        }
    }

    /// Set a plug value
    pub fn set_plug(&mut self, handle: ExternalHandle, plug: &str, value: PlugValue) {
        if let Some(object) = self.objects.get_mut(&handle) {
            object.plugs.insert(plug.to_string(), value);
            self.emit_changed(handle, ChangeFlags::PARAMETERS);
        }
    }

    /// Set the local matrix of a hierarchy node
    pub fn set_local_transform(&mut self, handle: ExternalHandle, local: Mat4) {
        if let Some(object) = self.objects.get_mut(&handle) {
            object.local = local;
            self.emit_changed(handle, ChangeFlags::TRANSFORM);
        }
    }

    /// Move an object under `new_parent`, or to the root
    ///
    /// The local matrix is kept, so the world matrix changes.
    pub fn reparent(&mut self, handle: ExternalHandle, new_parent: Option<ExternalHandle>) {
        let Some(old_parent) = self.objects.get(&handle).map(|object| object.parent) else {
            return;
        };
        if let Some(parent) = old_parent.and_then(|parent| self.objects.get_mut(&parent)) {
            parent.children.retain(|&child| child != handle);
        }
        let new_parent = new_parent.filter(|parent| self.objects.contains_key(parent));
        if let Some(parent) = new_parent.and_then(|parent| self.objects.get_mut(&parent)) {
            parent.children.push(handle);
        }
        if let Some(object) = self.objects.get_mut(&handle) {
            object.parent = new_parent;
        }
        self.emit_changed(handle, ChangeFlags::TRANSFORM | ChangeFlags::HIERARCHY);
    }

    /// Replace mesh geometry
    pub fn set_mesh_geometry(&mut self, handle: ExternalHandle, geometry: MeshGeometry) {
        if let Some(object) = self.objects.get_mut(&handle) {
            object.geometry = Some(geometry);
            self.emit_changed(handle, ChangeFlags::GEOMETRY);
        }
    }

    /// Replace light parameters
    pub fn set_light_attributes(&mut self, handle: ExternalHandle, light: LightAttributes) {
        if let Some(object) = self.objects.get_mut(&handle) {
            object.light = Some(light);
            self.emit_changed(handle, ChangeFlags::PARAMETERS);
        }
    }

    /// Replace camera parameters
    pub fn set_camera_attributes(&mut self, handle: ExternalHandle, camera: CameraAttributes) {
        if let Some(object) = self.objects.get_mut(&handle) {
            object.camera = Some(camera);
            self.emit_changed(handle, ChangeFlags::PARAMETERS);
        }
    }

    /// Delete an object and, for hierarchy nodes, all its descendants
    pub fn remove(&mut self, handle: ExternalHandle) {
        let Some(object) = self.objects.get(&handle) else {
            return;
        };
        for child in object.children.clone() {
            self.remove(child);
        }
        self.emit_scene_wide(ListenerKind::ObjectRemoved, HostEventKind::ObjectRemoved { handle });

        let Some(object) = self.objects.remove(&handle) else {
            return;
        };
        if let Some(parent) = object.parent.and_then(|parent| self.objects.get_mut(&parent)) {
            parent.children.retain(|&child| child != handle);
        }
        for other in self.objects.values_mut() {
            other.incoming.retain(|incoming| incoming.source != handle);
            other.members.retain(|&member| member != handle);
        }
    }

    /// Events not yet delivered
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Every cancelled subscription, in cancellation order
    pub fn cancel_log(&self) -> &[SubscriptionId] {
        &self.cancel_log
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of live listeners targeting `handle`
    pub fn listeners_on(&self, handle: ExternalHandle) -> usize {
        self.listeners
            .values()
            .filter(|listener| listener.target == Some(handle))
            .count()
    }

    /// Ids of live `kind` listeners targeting `target`, oldest first
    pub fn listener_ids(
        &self,
        kind: ListenerKind,
        target: Option<ExternalHandle>,
    ) -> Vec<SubscriptionId> {
        self.listeners
            .iter()
            .filter(|(_, listener)| listener.kind == kind && listener.target == target)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Queue an arbitrary event, as a misbehaving host might
    pub fn inject_event(&mut self, event: HostEvent) {
        self.queue.push_back(event);
    }

    fn insert(&mut self, mut object: HostObject, parent: Option<ExternalHandle>) -> ExternalHandle {
        self.next_handle += 1;
        let handle = ExternalHandle(self.next_handle);
        if let Some(parent_object) = parent.and_then(|parent| self.objects.get_mut(&parent)) {
            parent_object.children.push(handle);
            object.parent = parent;
        }
        self.objects.insert(handle, object);
        self.emit_scene_wide(ListenerKind::ObjectAdded, HostEventKind::ObjectAdded { handle });
        handle
    }

    fn emit_scene_wide(&mut self, kind: ListenerKind, event: HostEventKind) {
        let subscriptions: Vec<SubscriptionId> = self
            .listeners
            .iter()
            .filter(|(_, listener)| listener.kind == kind)
            .map(|(&id, _)| id)
            .collect();
        for subscription in subscriptions {
            self.queue.push_back(HostEvent { subscription, kind: event.clone() });
        }
    }

    fn emit_targeted(&mut self, target: ExternalHandle, kind: ListenerKind, event: HostEventKind) {
        let subscriptions: Vec<SubscriptionId> = self
            .listeners
            .iter()
            .filter(|(_, listener)| listener.kind == kind && listener.target == Some(target))
            .map(|(&id, _)| id)
            .collect();
        for subscription in subscriptions {
            self.queue.push_back(HostEvent { subscription, kind: event.clone() });
        }
    }

    fn emit_changed(&mut self, handle: ExternalHandle, changes: ChangeFlags) {
        self.emit_targeted(
            handle,
            ListenerKind::AttributeChanged,
            HostEventKind::AttributeChanged { handle, changes },
        );
    }

    fn emit_connection(&mut self, source: ExternalHandle, destination: ExternalHandle, made: bool) {
        self.emit_scene_wide(
            ListenerKind::ConnectionChanged,
            HostEventKind::Connection { source, destination, made },
        );
    }

    fn object(&self, handle: ExternalHandle) -> Result<&HostObject, HostError> {
        self.objects.get(&handle).ok_or(HostError::MissingObject(handle))
    }

    fn ready_object(&self, handle: ExternalHandle) -> Result<&HostObject, HostError> {
        let object = self.object(handle)?;
        if object.ready {
            Ok(object)
        } else {
            Err(HostError::NotReady(handle))
        }
    }

    fn missing(handle: ExternalHandle, name: &str) -> HostError {
        HostError::MissingAttribute { handle, name: name.to_string() }
    }
}

impl ListenerHost for MemoryHost {
    fn register_listener(
        &mut self,
        target: Option<ExternalHandle>,
        kind: ListenerKind,
    ) -> Result<SubscriptionId, HostError> {
        match target {
            None if !kind.is_scene_wide() => return Err(HostError::ListenerRefused(None)),
            Some(handle) if kind.is_scene_wide() => {
                return Err(HostError::ListenerRefused(Some(handle)))
            }
            Some(handle)
                if !self.objects.contains_key(&handle) || self.refused.contains(&handle) =>
            {
                return Err(HostError::ListenerRefused(Some(handle)))
            }
            _ => {}
        }

        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.insert(id, Listener { target, kind });

        if let (ListenerKind::Ready, Some(handle)) = (kind, target) {
            if self.objects.get(&handle).is_some_and(|object| object.ready) {
                self.queue.push_back(HostEvent {
                    subscription: id,
                    kind: HostEventKind::Ready { handle },
                });
            }
        }
        Ok(id)
    }

    fn cancel_listener(&mut self, id: SubscriptionId) {
        if self.listeners.remove(&id).is_some() {
            self.queue.retain(|event| event.subscription != id);
            self.cancel_log.push(id);
        }
    }
}

impl HostScene for MemoryHost {
    fn enumerate(&self, kind: ObjectKind) -> Vec<ExternalHandle> {
        let mut handles: Vec<ExternalHandle> = self
            .objects
            .iter()
            .filter(|(_, object)| object.kind == Some(kind))
            .map(|(&handle, _)| handle)
            .collect();
        handles.sort();
        handles
    }

    fn object_kind(&self, handle: ExternalHandle) -> Option<ObjectKind> {
        self.objects.get(&handle).and_then(|object| object.kind)
    }

    fn type_name(&self, handle: ExternalHandle) -> Option<String> {
        self.objects.get(&handle).map(|object| object.type_name.clone())
    }

    fn is_intermediate(&self, handle: ExternalHandle) -> bool {
        self.objects.get(&handle).is_some_and(|object| object.intermediate)
    }

    fn is_orthographic(&self, handle: ExternalHandle) -> bool {
        self.objects.get(&handle).is_some_and(|object| object.orthographic)
    }

    fn local_transform(&self, handle: ExternalHandle) -> Result<Mat4, HostError> {
        Ok(self.ready_object(handle)?.local)
    }

    fn parent(&self, handle: ExternalHandle) -> Option<ExternalHandle> {
        self.objects.get(&handle).and_then(|object| object.parent)
    }

    fn children(&self, handle: ExternalHandle) -> Vec<ExternalHandle> {
        self.objects
            .get(&handle)
            .map(|object| object.children.clone())
            .unwrap_or_default()
    }

    fn mesh_geometry(&self, handle: ExternalHandle) -> Result<MeshGeometry, HostError> {
        self.ready_object(handle)?
            .geometry
            .clone()
            .ok_or_else(|| Self::missing(handle, "geometry"))
    }

    fn light_attributes(&self, handle: ExternalHandle) -> Result<LightAttributes, HostError> {
        self.ready_object(handle)?
            .light
            .clone()
            .ok_or_else(|| Self::missing(handle, "light"))
    }

    fn camera_attributes(&self, handle: ExternalHandle) -> Result<CameraAttributes, HostError> {
        self.ready_object(handle)?
            .camera
            .clone()
            .ok_or_else(|| Self::missing(handle, "camera"))
    }

    fn plug_value(&self, handle: ExternalHandle, plug: &str) -> Result<PlugValue, HostError> {
        self.ready_object(handle)?
            .plugs
            .get(plug)
            .cloned()
            .ok_or_else(|| Self::missing(handle, plug))
    }

    fn plug_sources(&self, handle: ExternalHandle, plug: &str) -> Vec<ExternalHandle> {
        self.objects
            .get(&handle)
            .map(|object| {
                object
                    .incoming
                    .iter()
                    .filter(|incoming| incoming.plug == plug)
                    .map(|incoming| incoming.source)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn input_nodes(&self, handle: ExternalHandle) -> Vec<ExternalHandle> {
        let mut sources = Vec::new();
        if let Some(object) = self.objects.get(&handle) {
            for incoming in &object.incoming {
                if !sources.contains(&incoming.source) {
                    sources.push(incoming.source);
                }
            }
        }
        sources
    }

    fn surface_shader(&self, group: ExternalHandle) -> Option<ExternalHandle> {
        self.plug_sources(group, SURFACE_SHADER_PLUG).first().copied()
    }

    fn shading_groups_of(&self, mesh: ExternalHandle) -> Vec<ExternalHandle> {
        let mut groups: Vec<ExternalHandle> = self
            .objects
            .iter()
            .filter(|(_, object)| object.members.contains(&mesh))
            .map(|(&handle, _)| handle)
            .collect();
        groups.sort();
        groups
    }

    fn shading_group_members(&self, group: ExternalHandle) -> Vec<ExternalHandle> {
        self.objects
            .get(&group)
            .map(|object| object.members.clone())
            .unwrap_or_default()
    }

    fn poll_event(&mut self) -> Option<HostEvent> {
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_fires_on_registration_when_queryable() {
        let mut host = MemoryHost::new();
        let xform = host.add_transform(None);
        let mesh = host.add_mesh(xform, MeshGeometry::unit_quad());

        let id = host.register_listener(Some(mesh), ListenerKind::Ready).unwrap();
        assert_eq!(
            host.poll_event(),
            Some(HostEvent { subscription: id, kind: HostEventKind::Ready { handle: mesh } })
        );
    }

    #[test]
    fn test_deferred_ready() {
        let mut host = MemoryHost::new();
        host.set_defer_ready(true);
        let xform = host.add_transform(None);
        let mesh = host.add_mesh(xform, MeshGeometry::unit_quad());

        assert_eq!(host.mesh_geometry(mesh), Err(HostError::NotReady(mesh)));
        let id = host.register_listener(Some(mesh), ListenerKind::Ready).unwrap();
        assert_eq!(host.pending_events(), 0);

        host.mark_ready(mesh);
        assert_eq!(host.poll_event().map(|event| event.subscription), Some(id));
        assert!(host.mesh_geometry(mesh).is_ok());
    }

    #[test]
    fn test_cancel_purges_queued_events() {
        let mut host = MemoryHost::new();
        let xform = host.add_transform(None);
        let id = host.register_listener(Some(xform), ListenerKind::AttributeChanged).unwrap();
        host.set_local_transform(xform, Mat4::new_scaling(2.0));
        assert_eq!(host.pending_events(), 1);

        host.cancel_listener(id);
        assert_eq!(host.pending_events(), 0);
        assert_eq!(host.cancel_log(), &[id]);
    }

    #[test]
    fn test_scene_wide_listener_rejects_target() {
        let mut host = MemoryHost::new();
        let xform = host.add_transform(None);
        assert!(host.register_listener(Some(xform), ListenerKind::ObjectAdded).is_err());
        assert!(host.register_listener(None, ListenerKind::AttributeChanged).is_err());
    }

    #[test]
    fn test_remove_takes_descendants_and_connections() {
        let mut host = MemoryHost::new();
        let root = host.add_transform(None);
        let mesh = host.add_mesh(root, MeshGeometry::unit_quad());
        let group = host.add_shading_group();
        host.assign(mesh, group);
        let removed = host.register_listener(None, ListenerKind::ObjectRemoved).unwrap();

        host.remove(root);

        let mut removed_handles = Vec::new();
        while let Some(event) = host.poll_event() {
            assert_eq!(event.subscription, removed);
            if let HostEventKind::ObjectRemoved { handle } = event.kind {
                removed_handles.push(handle);
            }
        }
        assert_eq!(removed_handles, vec![mesh, root]);
        assert!(host.shading_group_members(group).is_empty());
    }

    #[test]
    fn test_connect_replaces_existing_input() {
        let mut host = MemoryHost::new();
        let group = host.add_shading_group();
        let first = host.add_shader("lambert");
        let second = host.add_shader("phong");

        host.connect(first, group, SURFACE_SHADER_PLUG);
        host.connect(second, group, SURFACE_SHADER_PLUG);

        assert_eq!(host.surface_shader(group), Some(second));
        assert_eq!(host.input_nodes(group), vec![second]);
    }
}
