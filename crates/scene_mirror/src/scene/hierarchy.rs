//! Ancestor watches
//!
//! A tracked object's world matrix depends on every node above it, so each
//! ancestor needs a change listener. Siblings share ancestors; one listener
//! per ancestor is held here and counted by the number of tracked objects
//! below it. When an object is re-parented its chain is recomputed with
//! [`HierarchyWatch::watch`] and listeners on abandoned ancestors are dropped.

use std::collections::HashMap;

use crate::core::{SyncContext, SyncResult};
use crate::host::{ExternalHandle, ListenerKind, SubscriptionId};
use crate::scene::transform::parent_chain;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Watch {
    subscription: SubscriptionId,
    users: usize,
}

/// Shared change listeners on the ancestors of tracked objects
#[derive(Debug, Default)]
pub struct HierarchyWatch {
    watches: HashMap<ExternalHandle, Watch>,
    ancestors: HashMap<ExternalHandle, Vec<ExternalHandle>>,
}

impl HierarchyWatch {
    /// Create an empty watch set
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen on every current ancestor of `object`
    ///
    /// Replaces whatever chain `object` was watched through before. On
    /// failure nothing is held for `object`.
    pub fn watch(&mut self, ctx: &mut SyncContext<'_>, object: ExternalHandle) -> SyncResult<()> {
        self.unwatch(ctx, object);

        let mut chain = parent_chain(&*ctx.host, object);
        chain.pop();

        for (taken, &ancestor) in chain.iter().enumerate() {
            if let Err(e) = self.acquire(ctx, ancestor) {
                for &held in &chain[..taken] {
                    self.release(ctx, held);
                }
                return Err(e);
            }
        }
        log::trace!("Watching {} ancestors of {:?}", chain.len(), object);
        self.ancestors.insert(object, chain);
        Ok(())
    }

    /// Drop the ancestor listeners held for `object`
    ///
    /// Returns `false` when `object` was not watched.
    pub fn unwatch(&mut self, ctx: &mut SyncContext<'_>, object: ExternalHandle) -> bool {
        let Some(chain) = self.ancestors.remove(&object) else {
            return false;
        };
        for ancestor in chain {
            self.release(ctx, ancestor);
        }
        true
    }

    /// Watched objects whose world matrix depends on `handle`
    ///
    /// `handle` itself is included when it is watched.
    pub fn dependents(&self, handle: ExternalHandle) -> Vec<ExternalHandle> {
        self.ancestors
            .iter()
            .filter(|&(&object, chain)| object == handle || chain.contains(&handle))
            .map(|(&object, _)| object)
            .collect()
    }

    /// Drop every listener
    pub fn clear(&mut self, ctx: &mut SyncContext<'_>) {
        for (_, watch) in self.watches.drain() {
            ctx.callbacks.unregister(&mut *ctx.host, watch.subscription);
        }
        self.ancestors.clear();
    }

    /// Whether a listener is held on `ancestor`
    pub fn is_watched(&self, ancestor: ExternalHandle) -> bool {
        self.watches.contains_key(&ancestor)
    }

    /// Number of watched objects below `ancestor`
    pub fn users(&self, ancestor: ExternalHandle) -> usize {
        self.watches.get(&ancestor).map_or(0, |watch| watch.users)
    }

    /// Number of ancestor listeners held
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// No listeners held
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    fn acquire(&mut self, ctx: &mut SyncContext<'_>, ancestor: ExternalHandle) -> SyncResult<()> {
        if let Some(watch) = self.watches.get_mut(&ancestor) {
            watch.users += 1;
            return Ok(());
        }
        let subscription = ctx.callbacks.subscribe(
            &mut *ctx.host,
            Some(ancestor),
            ListenerKind::AttributeChanged,
        )?;
        self.watches.insert(ancestor, Watch { subscription, users: 1 });
        Ok(())
    }

    fn release(&mut self, ctx: &mut SyncContext<'_>, ancestor: ExternalHandle) {
        let Some(watch) = self.watches.get_mut(&ancestor) else {
            crate::invariant_violation!("released unwatched ancestor {:?}", ancestor);
            return;
        };
        watch.users -= 1;
        if watch.users == 0 {
            let subscription = watch.subscription;
            self.watches.remove(&ancestor);
            ctx.callbacks.unregister(&mut *ctx.host, subscription);
            log::trace!("Dropped ancestor watch on {:?}", ancestor);
        }
    }
}
