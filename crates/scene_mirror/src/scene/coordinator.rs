//! # Scene Coordinator
//!
//! Owns every piece of mirror state (callback registry, trackers, ancestor
//! watches, material resolver, mesh bindings, transform dirty queue) and
//! routes host notifications to them.
//!
//! ## Lifecycle
//!
//! 1. `initial_scan` registers the scene-wide listeners and mirrors what
//!    already exists.
//! 2. `handle_event` (or `dispatch_pending` for hosts that queue events)
//!    applies each notification, then flushes transform changes.
//! 3. `shutdown` tears the mirror down and cancels every listener.
//!
//! Collections are never mutated while iterated; handlers copy the handles
//! they need first.

use std::collections::HashMap;

use crate::callbacks::CallbackRegistry;
use crate::core::{ConfigError, SyncConfig, SyncContext, SyncResult};
use crate::host::{
    ChangeFlags, ExternalHandle, HostEvent, HostEventKind, HostScene, ListenerKind, ObjectKind,
    SubscriptionId,
};
use crate::materials::MaterialResolver;
use crate::render::{MaterialHandle, RenderBridge};
use crate::scene::hierarchy::HierarchyWatch;
use crate::scene::kinds::{CameraKind, LightKind, MeshKind};
use crate::scene::tracker::{ObjectTracker, TrackedKind};
use crate::scene::transform::DirtyQueue;

/// Snapshot of what the mirror currently holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Tracked meshes
    pub meshes: usize,
    /// Tracked lights
    pub lights: usize,
    /// Tracked cameras
    pub cameras: usize,
    /// Material records
    pub materials: usize,
    /// Distinct textures loaded
    pub textures: usize,
    /// Host subscriptions held
    pub subscriptions: usize,
}

/// Material currently bound to a mesh node, and the group it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MeshBinding {
    group: ExternalHandle,
    material: MaterialHandle,
}

/// Everything except the registry and configuration
///
/// Kept apart so handlers can borrow it mutably next to a `SyncContext`.
#[derive(Debug)]
struct MirrorState {
    meshes: ObjectTracker<MeshKind>,
    lights: ObjectTracker<LightKind>,
    cameras: ObjectTracker<CameraKind>,
    hierarchy: HierarchyWatch,
    materials: MaterialResolver,
    bindings: HashMap<ExternalHandle, MeshBinding>,
    dirty: DirtyQueue,
    scene_listeners: Vec<SubscriptionId>,
}

/// Owner of the synchronized scene
#[derive(Debug)]
pub struct SceneCoordinator {
    config: SyncConfig,
    callbacks: CallbackRegistry,
    state: MirrorState,
}

macro_rules! sync_context {
    ($self:ident, $host:expr, $renderer:expr) => {
        SyncContext {
            host: $host,
            renderer: $renderer,
            callbacks: &mut $self.callbacks,
            config: &$self.config,
        }
    };
}

impl SceneCoordinator {
    /// Create a coordinator; the configuration is validated first
    pub fn new(config: SyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = MirrorState {
            meshes: ObjectTracker::new(MeshKind::new(&config.mesh)),
            lights: ObjectTracker::new(LightKind::new(&config.lights)),
            cameras: ObjectTracker::new(CameraKind),
            hierarchy: HierarchyWatch::new(),
            materials: MaterialResolver::new(),
            bindings: HashMap::new(),
            dirty: DirtyQueue::new(),
            scene_listeners: Vec::new(),
        };
        Ok(Self {
            config,
            callbacks: CallbackRegistry::new(),
            state,
        })
    }

    /// Register scene-wide listeners and mirror everything the host has now
    ///
    /// Existing objects are added directly, without waiting for a ready
    /// notification. Fails only when the scene-wide listeners cannot be
    /// registered.
    pub fn initial_scan(
        &mut self,
        host: &mut dyn HostScene,
        renderer: &mut dyn RenderBridge,
    ) -> SyncResult<SyncStats> {
        let mut ctx = sync_context!(self, host, renderer);
        self.state.initial_scan(&mut ctx)?;
        let stats = self.stats();
        log::info!(
            "Initial scan: {} meshes, {} lights, {} cameras, {} materials, {} textures",
            stats.meshes,
            stats.lights,
            stats.cameras,
            stats.materials,
            stats.textures
        );
        Ok(stats)
    }

    /// Apply one host notification
    pub fn handle_event(
        &mut self,
        host: &mut dyn HostScene,
        renderer: &mut dyn RenderBridge,
        event: HostEvent,
    ) {
        let mut ctx = sync_context!(self, host, renderer);
        self.state.handle_event(&mut ctx, event);
    }

    /// Drain and apply every notification the host has queued
    ///
    /// Returns the number of notifications processed.
    pub fn dispatch_pending(
        &mut self,
        host: &mut dyn HostScene,
        renderer: &mut dyn RenderBridge,
    ) -> usize {
        let mut processed = 0;
        while let Some(event) = host.poll_event() {
            self.handle_event(&mut *host, &mut *renderer, event);
            processed += 1;
        }
        processed
    }

    /// Remove everything from the renderer and cancel every host listener
    ///
    /// The coordinator can scan again afterwards.
    pub fn shutdown(&mut self, host: &mut dyn HostScene, renderer: &mut dyn RenderBridge) {
        let before = self.stats();
        let mut ctx = sync_context!(self, host, renderer);
        self.state.shutdown(&mut ctx);
        log::info!(
            "Shut down mirror of {} meshes, {} lights, {} cameras, {} materials",
            before.meshes,
            before.lights,
            before.cameras,
            before.materials
        );
    }

    /// Current counts
    pub fn stats(&self) -> SyncStats {
        SyncStats {
            meshes: self.state.meshes.len(),
            lights: self.state.lights.len(),
            cameras: self.state.cameras.len(),
            materials: self.state.materials.len(),
            textures: self.state.materials.texture_count(),
            subscriptions: self.callbacks.len(),
        }
    }

    /// Ancestor watches of every tracked object
    pub fn hierarchy(&self) -> &HierarchyWatch {
        &self.state.hierarchy
    }

    /// Mesh tracker
    pub fn meshes(&self) -> &ObjectTracker<MeshKind> {
        &self.state.meshes
    }

    /// Light tracker
    pub fn lights(&self) -> &ObjectTracker<LightKind> {
        &self.state.lights
    }

    /// Camera tracker
    pub fn cameras(&self) -> &ObjectTracker<CameraKind> {
        &self.state.cameras
    }

    /// Material resolver
    pub fn materials(&self) -> &MaterialResolver {
        &self.state.materials
    }

    /// Callback registry
    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Active configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Material bound to a tracked mesh
    pub fn mesh_material(&self, mesh: ExternalHandle) -> Option<MaterialHandle> {
        self.state.bindings.get(&mesh).map(|binding| binding.material)
    }
}

impl MirrorState {
    fn initial_scan(&mut self, ctx: &mut SyncContext<'_>) -> SyncResult<()> {
        if self.scene_listeners.is_empty() {
            for kind in [
                ListenerKind::ObjectAdded,
                ListenerKind::ObjectRemoved,
                ListenerKind::ConnectionChanged,
            ] {
                let id = ctx.callbacks.subscribe(&mut *ctx.host, None, kind)?;
                self.scene_listeners.push(id);
            }
        } else {
            log::warn!("Initial scan repeated; scene-wide listeners already registered");
        }

        for mesh in ctx.host.enumerate(ObjectKind::Mesh) {
            // A re-added mesh gets a fresh, unbound node
            self.bindings.remove(&mesh);
            if let Err(e) = track(&mut self.meshes, &mut self.hierarchy, ctx, mesh, None) {
                e.log("scan mesh");
            }
        }
        for light in ctx.host.enumerate(ObjectKind::Light) {
            if let Err(e) = track(&mut self.lights, &mut self.hierarchy, ctx, light, None) {
                e.log("scan light");
            }
        }
        if ctx.config.cameras.enabled {
            for camera in ctx.host.enumerate(ObjectKind::Camera) {
                let added = track(&mut self.cameras, &mut self.hierarchy, ctx, camera, None);
                if let Err(e) = added {
                    e.log("scan camera");
                }
            }
        }
        for group in ctx.host.enumerate(ObjectKind::ShadingGroup) {
            if let Err(e) = self.materials.resolve_shading_group(ctx, group) {
                e.log("scan shading group");
            }
        }
        for mesh in self.meshes.handles() {
            self.rebind_mesh(ctx, mesh);
        }
        Ok(())
    }

    fn handle_event(&mut self, ctx: &mut SyncContext<'_>, event: HostEvent) {
        if !ctx.callbacks.contains(event.subscription) {
            crate::invariant_violation!(
                "event {:?} arrived through unregistered subscription {:?}",
                event.kind,
                event.subscription
            );
            return;
        }

        match event.kind {
            HostEventKind::ObjectAdded { handle } => self.on_object_added(ctx, handle),
            HostEventKind::ObjectRemoved { handle } => self.on_object_removed(ctx, handle),
            HostEventKind::Connection { source, destination, made } => {
                self.on_connection(ctx, source, destination, made)
            }
            HostEventKind::Ready { handle } => self.on_ready(ctx, handle, event.subscription),
            HostEventKind::AttributeChanged { handle, changes } => {
                self.on_attribute_changed(ctx, handle, changes)
            }
        }
        self.flush_transforms(ctx);
    }

    fn on_object_added(&mut self, ctx: &mut SyncContext<'_>, handle: ExternalHandle) {
        let result = match ctx.host.object_kind(handle) {
            Some(ObjectKind::Mesh) => self.meshes.subscribe(ctx, handle),
            Some(ObjectKind::Light) => self.lights.subscribe(ctx, handle),
            Some(ObjectKind::Camera) if ctx.config.cameras.enabled => {
                self.cameras.subscribe(ctx, handle)
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            e.log("object added");
        }
    }

    fn on_ready(
        &mut self,
        ctx: &mut SyncContext<'_>,
        handle: ExternalHandle,
        subscription: SubscriptionId,
    ) {
        let ready = Some(subscription);
        let result = if self.meshes.is_pending(handle) {
            self.bindings.remove(&handle);
            let added = track(&mut self.meshes, &mut self.hierarchy, ctx, handle, ready);
            if added.is_ok() {
                self.rebind_mesh(ctx, handle);
            }
            added
        } else if self.lights.is_pending(handle) {
            track(&mut self.lights, &mut self.hierarchy, ctx, handle, ready)
        } else if self.cameras.is_pending(handle) {
            track(&mut self.cameras, &mut self.hierarchy, ctx, handle, ready)
        } else {
            crate::invariant_violation!(
                "ready for {:?} through {:?} but nothing is pending",
                handle,
                subscription
            );
            ctx.callbacks.unregister(&mut *ctx.host, subscription);
            Ok(())
        };
        if let Err(e) = result {
            e.log("object ready");
        }
    }

    fn on_object_removed(&mut self, ctx: &mut SyncContext<'_>, handle: ExternalHandle) {
        if self.meshes.contains(handle) || self.meshes.is_pending(handle) {
            self.meshes.remove(ctx, handle);
            self.hierarchy.unwatch(ctx, handle);
            self.bindings.remove(&handle);
        } else if self.lights.contains(handle) || self.lights.is_pending(handle) {
            self.lights.remove(ctx, handle);
            self.hierarchy.unwatch(ctx, handle);
        } else if self.cameras.contains(handle) || self.cameras.is_pending(handle) {
            self.cameras.remove(ctx, handle);
            self.hierarchy.unwatch(ctx, handle);
        } else if self.materials.tracks_group(handle) {
            self.detach_group(ctx, handle);
        } else if self.materials.tracks_shader(handle) {
            for group in self.materials.groups_of_shader(handle) {
                self.detach_group(ctx, group);
            }
        } else {
            log::trace!("Removal of unmirrored object {:?}", handle);
        }
    }

    fn on_connection(
        &mut self,
        ctx: &mut SyncContext<'_>,
        source: ExternalHandle,
        destination: ExternalHandle,
        made: bool,
    ) {
        match ctx.host.object_kind(destination) {
            Some(ObjectKind::ShadingGroup) => {
                if ctx.host.object_kind(source) == Some(ObjectKind::Mesh) {
                    log::debug!(
                        "Mesh {:?} {} group {:?}",
                        source,
                        if made { "joined" } else { "left" },
                        destination
                    );
                    self.rebind_mesh(ctx, source);
                } else {
                    self.refresh_group(ctx, destination);
                }
            }
            _ if self.materials.tracks_shader(destination) => {
                if let Err(e) = self.materials.on_shader_changed(ctx, destination) {
                    e.log("shader connection");
                }
            }
            _ => {}
        }
    }

    fn on_attribute_changed(
        &mut self,
        ctx: &mut SyncContext<'_>,
        handle: ExternalHandle,
        changes: ChangeFlags,
    ) {
        if changes.contains(ChangeFlags::HIERARCHY) {
            for object in self.hierarchy.dependents(handle) {
                if let Err(e) = self.hierarchy.watch(ctx, object) {
                    e.log("re-parent");
                }
            }
        }
        if changes.intersects(ChangeFlags::TRANSFORM | ChangeFlags::HIERARCHY) {
            self.dirty.mark(handle);
        }
        if !changes.intersects(ChangeFlags::GEOMETRY | ChangeFlags::PARAMETERS) {
            return;
        }

        let result = if self.meshes.contains(handle) {
            self.meshes.update(ctx, handle)
        } else if self.lights.contains(handle) {
            self.lights.update(ctx, handle)
        } else if self.cameras.contains(handle) {
            self.cameras.update(ctx, handle)
        } else if self.materials.tracks_shader(handle) {
            self.materials.on_shader_changed(ctx, handle)
        } else {
            Ok(())
        };
        if let Err(e) = result {
            e.log("attribute change");
        }
    }

    /// Reconcile a group with the shader currently connected to it
    fn refresh_group(&mut self, ctx: &mut SyncContext<'_>, group: ExternalHandle) {
        let current = self.materials.shader_of(group);
        let connected = ctx.host.surface_shader(group);
        if current.is_some() && current != connected {
            log::debug!("Group {:?} re-pointed from {:?} to {:?}", group, current, connected);
            self.detach_group(ctx, group);
        }
        if connected.is_some() && !self.materials.tracks_group(group) {
            if let Err(e) = self.materials.resolve_shading_group(ctx, group) {
                e.log("shading group");
            }
        }
        for mesh in ctx.host.shading_group_members(group) {
            self.rebind_mesh(ctx, mesh);
        }
    }

    /// Detach a group, destroying its material when it was the last user
    fn detach_group(&mut self, ctx: &mut SyncContext<'_>, group: ExternalHandle) {
        if let Some(record) = self.materials.detach_shading_group(group) {
            let users: Vec<ExternalHandle> = self
                .bindings
                .iter()
                .filter(|(_, binding)| binding.material == record.material)
                .map(|(&mesh, _)| mesh)
                .collect();
            for mesh in users {
                self.bind(ctx, mesh, None);
            }
            if let Err(e) = self.materials.destroy_record(ctx, record) {
                e.log("destroy material");
            }
        }

        let members: Vec<ExternalHandle> = self
            .bindings
            .iter()
            .filter(|(_, binding)| binding.group == group)
            .map(|(&mesh, _)| mesh)
            .collect();
        for mesh in members {
            self.rebind_mesh(ctx, mesh);
        }
    }

    /// Bind a tracked mesh to the material of its single shading group
    fn rebind_mesh(&mut self, ctx: &mut SyncContext<'_>, mesh: ExternalHandle) {
        if !self.meshes.contains(mesh) {
            return;
        }
        let groups = ctx.host.shading_groups_of(mesh);
        let target = match groups.as_slice() {
            [] => None,
            [group] => {
                let material = match self.materials.material_of_group(*group) {
                    Some(material) => Some(material),
                    None => match self.materials.resolve_shading_group(ctx, *group) {
                        Ok(material) => Some(material),
                        Err(e) => {
                            e.log("shading group");
                            None
                        }
                    },
                };
                material.map(|material| MeshBinding { group: *group, material })
            }
            many => {
                log::warn!(
                    "Mesh {:?} is in {} shading groups; per-face materials are not mirrored",
                    mesh,
                    many.len()
                );
                None
            }
        };
        self.bind(ctx, mesh, target);
    }

    fn bind(
        &mut self,
        ctx: &mut SyncContext<'_>,
        mesh: ExternalHandle,
        target: Option<MeshBinding>,
    ) {
        let current = self.bindings.get(&mesh).copied();
        if current == target {
            return;
        }
        let Some(node) = self.meshes.node(mesh) else {
            self.bindings.remove(&mesh);
            return;
        };

        let material = target.map(|binding| binding.material);
        if current.map(|binding| binding.material) != material {
            if let Err(e) = ctx.renderer.set_node_material(node, material) {
                log::warn!("Binding {:?} to mesh {:?} failed: {}", material, mesh, e);
                return;
            }
        }
        match target {
            Some(binding) => {
                self.bindings.insert(mesh, binding);
            }
            None => {
                self.bindings.remove(&mesh);
            }
        }
    }

    fn flush_transforms(&mut self, ctx: &mut SyncContext<'_>) {
        if self.dirty.is_empty() {
            return;
        }
        let meshes = &self.meshes;
        let lights = &self.lights;
        let cameras = &self.cameras;
        let updated = self.dirty.propagate(&*ctx.host, &mut *ctx.renderer, |handle| {
            meshes
                .node(handle)
                .or_else(|| lights.node(handle))
                .or_else(|| cameras.node(handle))
        });
        log::trace!("Transform flush updated {} nodes", updated);
    }

    fn shutdown(&mut self, ctx: &mut SyncContext<'_>) {
        self.meshes.clear(ctx);
        self.lights.clear(ctx);
        self.cameras.clear(ctx);
        self.hierarchy.clear(ctx);
        self.bindings.clear();

        for group in self.materials.groups() {
            if let Some(record) = self.materials.detach_shading_group(group) {
                if let Err(e) = self.materials.destroy_record(ctx, record) {
                    e.log("shutdown material");
                }
            }
        }
        self.materials.release_all_textures(&mut *ctx.renderer);
        self.dirty = DirtyQueue::new();
        self.scene_listeners.clear();
        ctx.callbacks.reset_all(&mut *ctx.host);
    }
}

/// Add through `tracker` (directly, or for the ready notification
/// `ready`), then watch the new object's ancestors
///
/// Nothing stays tracked or watched for `handle` on failure.
fn track<K: TrackedKind>(
    tracker: &mut ObjectTracker<K>,
    hierarchy: &mut HierarchyWatch,
    ctx: &mut SyncContext<'_>,
    handle: ExternalHandle,
    ready: Option<SubscriptionId>,
) -> SyncResult<()> {
    let added = match ready {
        Some(subscription) => tracker.on_ready(ctx, handle, subscription),
        None => tracker.add(ctx, handle),
    };
    let result = added.and_then(|_| hierarchy.watch(ctx, handle));
    if result.is_err() {
        hierarchy.unwatch(ctx, handle);
        if tracker.contains(handle) {
            tracker.remove(ctx, handle);
        }
    }
    result
}
