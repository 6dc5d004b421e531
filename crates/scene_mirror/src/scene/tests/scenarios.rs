//! Reference scenarios run through a full initial scan

use super::{point_light, Harness};
use crate::host::PlugValue;
use crate::materials::{Channel, ChannelValue, ParamValue};
use crate::render::headless::NodePayload;

#[test]
fn test_quad_becomes_four_vertices_six_indices() {
    let mut h = Harness::new();
    let (_, mesh) = h.quad();

    let stats = h.scan();

    assert_eq!(stats.meshes, 1);
    let node = h.coordinator.meshes().node(mesh).unwrap();
    match &h.renderer.node(node).unwrap().payload {
        NodePayload::Mesh(indexed) => {
            assert_eq!(indexed.vertices.len(), 4);
            assert_eq!(indexed.indices.len(), 6);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_arnold_base_color_texture_only() {
    let mut h = Harness::new();
    let (_, mesh) = h.quad();
    let (shader, group) = h.shaded_group("aiStandardSurface");
    let file = h.host.add_file_texture("textures/checker.png");
    h.host.connect(file, shader, "baseColor");
    h.host.set_plug(shader, "specularRoughness", PlugValue::Float(0.2));
    h.host.set_plug(shader, "metalness", PlugValue::Float(1.0));
    h.host.assign(mesh, group);

    h.scan();

    let record = h.coordinator.materials().record(shader).unwrap();
    assert_eq!(
        record.params.albedo(),
        &ChannelValue::Texture("textures/checker.png".to_string())
    );
    assert_eq!(record.params.albedo().constant(), None);
    assert_eq!(record.params.roughness(), &ChannelValue::Constant(ParamValue::Scalar(0.2)));
    assert_eq!(record.params.metalness(), &ChannelValue::Constant(ParamValue::Scalar(1.0)));

    let material = h.renderer.material(record.material).unwrap();
    let texture = material.textures.get(Channel::Albedo).unwrap();
    assert_eq!(h.renderer.texture_path(texture), Some("textures/checker.png"));
    assert_eq!(h.coordinator.mesh_material(mesh), Some(record.material));
}

#[test]
fn test_point_light_premultiplied_with_default_radius() {
    let mut h = Harness::new();
    let xform = h.host.add_transform(None);
    let light = h.host.add_light(xform, point_light([1.0, 1.0, 1.0], 2.0));

    let stats = h.scan();

    assert_eq!(stats.lights, 1);
    let node = h.coordinator.lights().node(light).unwrap();
    match &h.renderer.node(node).unwrap().payload {
        NodePayload::Light(desc) => {
            assert_eq!(desc.color, [2.0, 2.0, 2.0]);
            assert_eq!(desc.radius, 20.0);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_two_groups_on_one_shader() {
    let mut h = Harness::new();
    let (shader, first) = h.shaded_group("lambert");
    let second = h.host.add_shading_group();
    h.host.connect(shader, second, crate::host::memory::SURFACE_SHADER_PLUG);

    let stats = h.scan();

    assert_eq!(stats.materials, 1);
    assert_eq!(h.coordinator.materials().groups_of_shader(shader), vec![first, second]);
    assert_eq!(h.host.listeners_on(shader), 1);
    // Three scene-wide listeners plus the shader's
    assert_eq!(stats.subscriptions, 4);
    assert_eq!(h.renderer.material_count(), 1);
}

#[test]
fn test_scan_skips_intermediate_and_orthographic() {
    use crate::host::CameraAttributes;
    use crate::mesh::MeshGeometry;

    let mut h = Harness::new();
    let xform = h.host.add_transform(None);
    h.host.add_mesh(xform, MeshGeometry::unit_quad());
    h.host.add_intermediate_mesh(xform, MeshGeometry::unit_quad());
    let camera = CameraAttributes { vertical_fov: 0.9, near_clip: 0.1, far_clip: 500.0 };
    h.host.add_camera(xform, camera.clone(), false);
    h.host.add_camera(xform, camera, true);

    let stats = h.scan();

    assert_eq!(stats.meshes, 1);
    assert_eq!(stats.cameras, 1);
    assert_eq!(h.renderer.mesh_nodes().len(), 1);
    assert_eq!(h.renderer.camera_nodes().len(), 1);
}

#[test]
fn test_cameras_can_be_disabled() {
    use crate::core::SyncConfig;
    use crate::host::CameraAttributes;

    let mut h = Harness::with_config(SyncConfig::new().with_cameras(false));
    let xform = h.host.add_transform(None);
    h.host.add_camera(
        xform,
        CameraAttributes { vertical_fov: 0.9, near_clip: 0.1, far_clip: 500.0 },
        false,
    );

    assert_eq!(h.scan().cameras, 0);
    assert!(h.renderer.camera_nodes().is_empty());
}

#[test]
fn test_shutdown_releases_everything() {
    let mut h = Harness::new();
    let (_, mesh) = h.quad();
    let (shader, group) = h.shaded_group("aiStandardSurface");
    let file = h.host.add_file_texture("albedo.png");
    h.host.connect(file, shader, "baseColor");
    h.host.assign(mesh, group);
    let xform = h.host.add_transform(None);
    h.host.add_light(xform, point_light([1.0, 0.9, 0.8], 1.5));
    h.scan();

    h.shutdown();

    assert_eq!(h.coordinator.stats(), Default::default());
    assert_eq!(h.renderer.node_count(), 0);
    assert_eq!(h.renderer.material_count(), 0);
    assert_eq!(h.renderer.texture_count(), 0);
    assert_eq!(h.host.listener_count(), 0);
    assert!(h.renderer.destroys_are_fenced());

    // A second shutdown finds nothing left to cancel
    let cancelled = h.host.cancel_log().len();
    h.shutdown();
    assert_eq!(h.host.cancel_log().len(), cancelled);
}

#[test]
fn test_scan_again_after_shutdown() {
    let mut h = Harness::new();
    h.quad();
    h.scan();
    h.shutdown();

    let stats = h.scan();

    assert_eq!(stats.meshes, 1);
    assert_eq!(h.renderer.mesh_nodes().len(), 1);
}
