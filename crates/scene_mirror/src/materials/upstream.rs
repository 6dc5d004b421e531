//! Upstream texture search
//!
//! A shader plug is often fed through a chain of utility nodes (color
//! correction, bump, layered textures) before a file texture. The search
//! walks that chain breadth-first so the nearest texture wins.

use std::collections::{HashSet, VecDeque};

use crate::core::MaterialConfig;
use crate::host::{ExternalHandle, HostScene};

/// Path of the nearest file texture feeding `plug` of `shader`
///
/// Starts from the nodes connected directly into the plug and follows every
/// input of each visited node, up to `config.max_upstream_depth` hops. Each
/// node is visited once, so cyclic graphs terminate.
pub fn find_upstream_texture(
    host: &dyn HostScene,
    shader: ExternalHandle,
    plug: &str,
    config: &MaterialConfig,
) -> Option<String> {
    let mut visited: HashSet<ExternalHandle> = HashSet::new();
    visited.insert(shader);
    let mut queue: VecDeque<(ExternalHandle, usize)> = host
        .plug_sources(shader, plug)
        .into_iter()
        .filter(|source| visited.insert(*source))
        .map(|source| (source, 1))
        .collect();

    while let Some((node, depth)) = queue.pop_front() {
        if host.type_name(node).as_deref() == Some(config.texture_node_type.as_str()) {
            match host.plug_value(node, &config.texture_path_plug) {
                Ok(value) => match value.as_text() {
                    Some(path) if !path.is_empty() => return Some(path.to_string()),
                    _ => log::debug!("Texture node {:?} has no path, searching on", node),
                },
                Err(e) => log::warn!("Cannot read texture path of {:?}: {}", node, e),
            }
        }

        if depth >= config.max_upstream_depth {
            continue;
        }
        for input in host.input_nodes(node) {
            if visited.insert(input) {
                queue.push_back((input, depth + 1));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;

    #[test]
    fn test_direct_texture() {
        let mut host = MemoryHost::new();
        let shader = host.add_shader("aiStandardSurface");
        let file = host.add_file_texture("wood.png");
        host.connect(file, shader, "baseColor");

        let config = MaterialConfig::default();
        assert_eq!(
            find_upstream_texture(&host, shader, "baseColor", &config),
            Some("wood.png".to_string())
        );
        assert_eq!(find_upstream_texture(&host, shader, "metalness", &config), None);
    }

    #[test]
    fn test_nearest_texture_wins() {
        let mut host = MemoryHost::new();
        let shader = host.add_shader("lambert");
        let blend = host.add_node("blendColors");
        let near = host.add_file_texture("near.png");
        let correct = host.add_node("colorCorrect");
        let far = host.add_file_texture("far.png");
        host.connect(blend, shader, "color");
        host.connect(correct, blend, "color1");
        host.connect(near, blend, "color2");
        host.connect(far, correct, "inColor");

        let config = MaterialConfig::default();
        assert_eq!(
            find_upstream_texture(&host, shader, "color", &config),
            Some("near.png".to_string())
        );
    }

    #[test]
    fn test_depth_bound() {
        let mut host = MemoryHost::new();
        let shader = host.add_shader("lambert");
        let first = host.add_node("colorCorrect");
        let second = host.add_node("colorCorrect");
        let file = host.add_file_texture("deep.png");
        host.connect(first, shader, "color");
        host.connect(second, first, "inColor");
        host.connect(file, second, "inColor");

        let shallow = MaterialConfig { max_upstream_depth: 2, ..MaterialConfig::default() };
        assert_eq!(find_upstream_texture(&host, shader, "color", &shallow), None);

        let deep = MaterialConfig { max_upstream_depth: 3, ..MaterialConfig::default() };
        assert_eq!(
            find_upstream_texture(&host, shader, "color", &deep),
            Some("deep.png".to_string())
        );
    }

    #[test]
    fn test_cycle_terminates() {
        let mut host = MemoryHost::new();
        let shader = host.add_shader("lambert");
        let a = host.add_node("colorCorrect");
        let b = host.add_node("colorCorrect");
        host.connect(a, shader, "color");
        host.connect(b, a, "inColor");
        host.connect(a, b, "inColor");

        assert_eq!(
            find_upstream_texture(&host, shader, "color", &MaterialConfig::default()),
            None
        );
    }
}
