//! Generic object tracker
//!
//! One tracker per mirrored object category. Each host handle moves through
//! `Unseen -> PendingReady -> Tracked -> Removed`; the tracker owns the
//! renderer node of every tracked handle and the change listener on the
//! handle itself. Ancestors are watched separately, by
//! [`HierarchyWatch`](crate::scene::hierarchy::HierarchyWatch). What differs
//! between meshes, lights and cameras is captured by [`TrackedKind`].

use std::collections::HashMap;

use crate::core::{SyncContext, SyncError, SyncResult};
use crate::foundation::math::Mat4;
use crate::host::{ExternalHandle, HostScene, ListenerKind, ObjectKind, SubscriptionId};
use crate::render::{NodeHandle, RenderBridge, RenderResult};
use crate::scene::transform::world_transform;

/// Category-specific half of a tracker
pub trait TrackedKind {
    /// Renderer-ready data extracted from the host
    type Data;

    /// Host category this kind tracks
    const OBJECT_KIND: ObjectKind;

    /// Name used in log lines
    const LABEL: &'static str;

    /// Reject objects of the right category that must not be mirrored
    fn accepts(&self, host: &dyn HostScene, handle: ExternalHandle) -> SyncResult<()>;

    /// Read the object from the host
    fn extract(&self, host: &dyn HostScene, handle: ExternalHandle) -> SyncResult<Self::Data>;

    /// Create the renderer node
    fn create_node(
        &self,
        renderer: &mut dyn RenderBridge,
        data: &Self::Data,
        world: &Mat4,
    ) -> RenderResult<NodeHandle>;

    /// Replace the contents of an existing renderer node
    fn update_node(
        &self,
        renderer: &mut dyn RenderBridge,
        node: NodeHandle,
        data: &Self::Data,
    ) -> RenderResult<()>;
}

/// A tracked host object
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntry {
    /// Host object
    pub handle: ExternalHandle,
    /// Renderer node mirroring it
    pub node: NodeHandle,
    /// Persistent change subscription on the object itself
    pub subscription: SubscriptionId,
}

/// Tracker for one object category
#[derive(Debug)]
pub struct ObjectTracker<K: TrackedKind> {
    kind: K,
    entries: HashMap<ExternalHandle, TrackedEntry>,
    pending: HashMap<ExternalHandle, SubscriptionId>,
}

impl<K: TrackedKind> ObjectTracker<K> {
    /// Create an empty tracker
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Category-specific half
    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Wait for a newly created object to become queryable
    ///
    /// Registers a one-shot ready listener; `on_ready` performs the add.
    pub fn subscribe(
        &mut self,
        ctx: &mut SyncContext<'_>,
        handle: ExternalHandle,
    ) -> SyncResult<()> {
        if self.pending.contains_key(&handle) {
            log::debug!("{} {:?} already waiting for ready", K::LABEL, handle);
            return Ok(());
        }
        let id = ctx
            .callbacks
            .subscribe(&mut *ctx.host, Some(handle), ListenerKind::Ready)?;
        self.pending.insert(handle, id);
        log::debug!("{} {:?} pending ready", K::LABEL, handle);
        Ok(())
    }

    /// Ready listener fired: drop it and add the object
    pub fn on_ready(
        &mut self,
        ctx: &mut SyncContext<'_>,
        handle: ExternalHandle,
        subscription: SubscriptionId,
    ) -> SyncResult<NodeHandle> {
        match self.pending.get(&handle) {
            Some(&pending) if pending == subscription => {}
            other => {
                crate::invariant_violation!(
                    "ready for {} {:?} through {:?}, expected {:?}",
                    K::LABEL,
                    handle,
                    subscription,
                    other
                );
                return Err(SyncError::Skipped(format!("stale ready for {:?}", handle)));
            }
        }
        self.add(ctx, handle)
    }

    /// Mirror `handle` into the renderer
    ///
    /// An object that is already tracked is re-added: its node is destroyed
    /// behind a GPU idle wait and built again from current host data.
    pub fn add(
        &mut self,
        ctx: &mut SyncContext<'_>,
        handle: ExternalHandle,
    ) -> SyncResult<NodeHandle> {
        if let Some(pending) = self.pending.remove(&handle) {
            ctx.callbacks.unregister(&mut *ctx.host, pending);
        }
        if let Some(stale) = self.entries.remove(&handle) {
            log::debug!("Re-adding {} {:?}", K::LABEL, handle);
            Self::retire(ctx, stale);
        }

        self.kind.accepts(&*ctx.host, handle)?;
        let data = self.kind.extract(&*ctx.host, handle)?;
        let world = world_transform(&*ctx.host, handle)?;
        let node = self.kind.create_node(&mut *ctx.renderer, &data, &world)?;

        let subscription = match ctx.callbacks.subscribe(
            &mut *ctx.host,
            Some(handle),
            ListenerKind::AttributeChanged,
        ) {
            Ok(id) => id,
            Err(e) => {
                ctx.renderer.wait_for_gpu_idle();
                if let Err(destroy_error) = ctx.renderer.destroy_node(node) {
                    log::warn!("Failed to destroy node {:?}: {}", node, destroy_error);
                }
                return Err(e.into());
            }
        };

        self.entries.insert(handle, TrackedEntry { handle, node, subscription });
        log::debug!("Tracking {} {:?} as {:?}", K::LABEL, handle, node);
        Ok(node)
    }

    /// Re-extract a tracked object and update its node in place
    pub fn update(&mut self, ctx: &mut SyncContext<'_>, handle: ExternalHandle) -> SyncResult<()> {
        let Some(node) = self.node(handle) else {
            log::warn!("Update of untracked {} {:?} ignored", K::LABEL, handle);
            return Ok(());
        };
        let data = self.kind.extract(&*ctx.host, handle)?;
        self.kind.update_node(&mut *ctx.renderer, node, &data)?;
        log::trace!("Updated {} {:?}", K::LABEL, handle);
        Ok(())
    }

    /// Stop mirroring `handle`
    ///
    /// Returns `false`, after logging, when the handle is neither tracked nor
    /// pending.
    pub fn remove(&mut self, ctx: &mut SyncContext<'_>, handle: ExternalHandle) -> bool {
        if let Some(pending) = self.pending.remove(&handle) {
            ctx.callbacks.unregister(&mut *ctx.host, pending);
            log::debug!("Dropped pending {} {:?}", K::LABEL, handle);
            return true;
        }
        match self.entries.remove(&handle) {
            Some(entry) => {
                Self::retire(ctx, entry);
                log::debug!("Stopped tracking {} {:?}", K::LABEL, handle);
                true
            }
            None => {
                log::warn!("Remove of untracked {} {:?} ignored", K::LABEL, handle);
                false
            }
        }
    }

    /// Remove every tracked and pending object
    pub fn clear(&mut self, ctx: &mut SyncContext<'_>) {
        let handles: Vec<ExternalHandle> = self
            .pending
            .keys()
            .chain(self.entries.keys())
            .copied()
            .collect();
        for handle in handles {
            self.remove(ctx, handle);
        }
    }

    /// Renderer node of a tracked object
    pub fn node(&self, handle: ExternalHandle) -> Option<NodeHandle> {
        self.entries.get(&handle).map(|entry| entry.node)
    }

    /// Entry of a tracked object
    pub fn entry(&self, handle: ExternalHandle) -> Option<&TrackedEntry> {
        self.entries.get(&handle)
    }

    /// Whether `handle` is tracked
    pub fn contains(&self, handle: ExternalHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Whether `handle` waits for its ready notification
    pub fn is_pending(&self, handle: ExternalHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    /// All tracked handles, copied
    pub fn handles(&self) -> Vec<ExternalHandle> {
        self.entries.keys().copied().collect()
    }

    /// Number of tracked objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn retire(ctx: &mut SyncContext<'_>, entry: TrackedEntry) {
        ctx.callbacks.unregister(&mut *ctx.host, entry.subscription);
        ctx.renderer.wait_for_gpu_idle();
        if let Err(e) = ctx.renderer.destroy_node(entry.node) {
            crate::invariant_violation!(
                "destroying node {:?} of {} {:?} failed: {}",
                entry.node,
                K::LABEL,
                entry.handle,
                e
            );
        }
    }
}
