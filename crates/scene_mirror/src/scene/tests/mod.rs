//! Scene synchronization tests
//!
//! End-to-end runs of the coordinator against `MemoryHost` and
//! `HeadlessRenderer`, plus tracker-level lifecycle checks.

mod scenarios;

use crate::core::SyncConfig;
use crate::host::memory::{MemoryHost, SURFACE_SHADER_PLUG};
use crate::host::{ExternalHandle, LightAttributes, LightType};
use crate::mesh::MeshGeometry;
use crate::render::HeadlessRenderer;
use crate::scene::{SceneCoordinator, SyncStats};

/// Host, renderer and coordinator wired together
pub(super) struct Harness {
    pub host: MemoryHost,
    pub renderer: HeadlessRenderer,
    pub coordinator: SceneCoordinator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            host: MemoryHost::new(),
            renderer: HeadlessRenderer::new(),
            coordinator: SceneCoordinator::new(config).unwrap(),
        }
    }

    /// Initial scan, then drain whatever the scan itself queued
    pub fn scan(&mut self) -> SyncStats {
        let stats = self
            .coordinator
            .initial_scan(&mut self.host, &mut self.renderer)
            .unwrap();
        self.pump();
        stats
    }

    pub fn pump(&mut self) -> usize {
        self.coordinator
            .dispatch_pending(&mut self.host, &mut self.renderer)
    }

    pub fn shutdown(&mut self) {
        self.coordinator.shutdown(&mut self.host, &mut self.renderer);
    }

    /// Transform with one unit quad below it
    pub fn quad(&mut self) -> (ExternalHandle, ExternalHandle) {
        let xform = self.host.add_transform(None);
        let mesh = self.host.add_mesh(xform, MeshGeometry::unit_quad());
        (xform, mesh)
    }

    /// Shader of `type_name` connected to a fresh shading group
    pub fn shaded_group(&mut self, type_name: &str) -> (ExternalHandle, ExternalHandle) {
        let shader = self.host.add_shader(type_name);
        let group = self.host.add_shading_group();
        self.host.connect(shader, group, SURFACE_SHADER_PLUG);
        (shader, group)
    }
}

pub(super) fn point_light(color: [f32; 3], intensity: f32) -> LightAttributes {
    LightAttributes {
        light_type: LightType::Point,
        color,
        intensity,
        cone_angle: 0.0,
        penumbra_angle: 0.0,
    }
}
