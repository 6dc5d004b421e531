//! World transforms and change propagation
//!
//! A world matrix is the product of local matrices from the hierarchy root
//! down to the object. When a hierarchy node moves, every tracked object
//! below it moves too; [`DirtyQueue`] walks the subtree breadth-first after
//! the triggering event, reusing each parent's world matrix for all of its
//! children.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::foundation::math::{compose_root_to_leaf, Mat4};
use crate::host::{ExternalHandle, HostError, HostScene};
use crate::render::{NodeHandle, RenderBridge};

/// Ancestors of `handle`, root first, ending with `handle` itself
pub fn parent_chain(host: &dyn HostScene, handle: ExternalHandle) -> Vec<ExternalHandle> {
    let mut chain = vec![handle];
    let mut seen: HashSet<ExternalHandle> = HashSet::from([handle]);
    let mut current = handle;
    while let Some(parent) = host.parent(current) {
        if !seen.insert(parent) {
            log::warn!("Hierarchy cycle above {:?} at {:?}", handle, parent);
            break;
        }
        chain.push(parent);
        current = parent;
    }
    chain.reverse();
    chain
}

/// World matrix of `handle`
pub fn world_transform(host: &dyn HostScene, handle: ExternalHandle) -> Result<Mat4, HostError> {
    let locals = parent_chain(host, handle)
        .into_iter()
        .map(|node| host.local_transform(node))
        .collect::<Result<Vec<Mat4>, HostError>>()?;
    Ok(compose_root_to_leaf(&locals))
}

/// Hierarchy nodes whose world matrix changed, waiting to be pushed down
#[derive(Debug, Default)]
pub struct DirtyQueue {
    queue: VecDeque<ExternalHandle>,
    queued: HashSet<ExternalHandle>,
}

impl DirtyQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `handle` and everything below it
    pub fn mark(&mut self, handle: ExternalHandle) {
        if self.queued.insert(handle) {
            self.queue.push_back(handle);
        }
    }

    /// Nothing scheduled
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Push fresh world matrices to every tracked node below the marked ones
    ///
    /// `lookup` maps a host handle to its renderer node when it is tracked.
    /// Each hierarchy node is visited once. Returns the number of nodes
    /// updated.
    pub fn propagate<F>(
        &mut self,
        host: &dyn HostScene,
        renderer: &mut dyn RenderBridge,
        lookup: F,
    ) -> usize
    where
        F: Fn(ExternalHandle) -> Option<NodeHandle>,
    {
        let mut worlds: HashMap<ExternalHandle, Mat4> = HashMap::new();
        let mut visited: HashSet<ExternalHandle> = HashSet::new();
        let mut updated = 0;

        while let Some(handle) = self.queue.pop_front() {
            self.queued.remove(&handle);
            if !visited.insert(handle) {
                continue;
            }

            let world = match Self::world_of(host, handle, &worlds) {
                Ok(world) => world,
                Err(e) => {
                    log::warn!("Cannot propagate transform of {:?}: {}", handle, e);
                    continue;
                }
            };
            worlds.insert(handle, world);

            if let Some(node) = lookup(handle) {
                match renderer.set_node_transform(node, &world) {
                    Ok(()) => updated += 1,
                    Err(e) => log::warn!("Transform update of {:?} failed: {}", handle, e),
                }
            }

            for child in host.children(handle) {
                if !visited.contains(&child) {
                    self.mark(child);
                }
            }
        }
        updated
    }

    fn world_of(
        host: &dyn HostScene,
        handle: ExternalHandle,
        worlds: &HashMap<ExternalHandle, Mat4>,
    ) -> Result<Mat4, HostError> {
        match host.parent(handle).and_then(|parent| worlds.get(&parent)) {
            Some(parent_world) => Ok(parent_world * host.local_transform(handle)?),
            None => world_transform(host, handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::host::memory::MemoryHost;
    use crate::mesh::{IndexedMesh, MeshGeometry};
    use crate::render::HeadlessRenderer;
    use approx::assert_relative_eq;

    #[test]
    fn test_world_is_root_to_leaf_product() {
        let mut host = MemoryHost::new();
        let root = host.add_transform(None);
        let child = host.add_transform(Some(root));
        let mesh = host.add_mesh(child, MeshGeometry::unit_quad());
        let translate = Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0));
        let scale = Mat4::new_scaling(2.0);
        host.set_local_transform(root, scale);
        host.set_local_transform(child, translate);

        let world = world_transform(&host, mesh).unwrap();

        assert_relative_eq!(world, scale * translate);
        assert_eq!(parent_chain(&host, mesh), vec![root, child, mesh]);
    }

    #[test]
    fn test_propagation_reaches_siblings_and_grandchildren() {
        let mut host = MemoryHost::new();
        let mut renderer = HeadlessRenderer::new();
        let root = host.add_transform(None);
        let a = host.add_mesh(root, MeshGeometry::unit_quad());
        let b = host.add_mesh(root, MeshGeometry::unit_quad());
        let group = host.add_transform(Some(root));
        let c = host.add_mesh(group, MeshGeometry::unit_quad());

        let mut nodes = HashMap::new();
        for handle in [a, b, c] {
            let node = renderer
                .create_mesh_node(&IndexedMesh::default(), &Mat4::identity())
                .unwrap();
            nodes.insert(handle, node);
        }

        let moved = Mat4::new_translation(&Vec3::new(0.0, 5.0, 0.0));
        host.set_local_transform(root, moved);
        let mut queue = DirtyQueue::new();
        queue.mark(root);
        let updated = queue.propagate(&host, &mut renderer, |h| nodes.get(&h).copied());

        assert_eq!(updated, 3);
        assert!(queue.is_empty());
        for handle in [a, b, c] {
            assert_relative_eq!(renderer.node(nodes[&handle]).unwrap().world, moved);
        }
    }

    #[test]
    fn test_mark_deduplicates() {
        let mut queue = DirtyQueue::new();
        queue.mark(ExternalHandle(1));
        queue.mark(ExternalHandle(1));
        assert_eq!(queue.queue.len(), 1);
    }
}
