//! Callback registry
//!
//! Single ledger of every host listener the mirror holds. Trackers and the
//! material resolver never cancel host listeners themselves; they hand the
//! id back here. Tearing the mirror down is then one `reset_all` call, and no
//! listener can outlive the subsystem that asked for it.
//!
//! The registry does not know what a subscription is for.

use crate::host::{ExternalHandle, HostError, ListenerHost, ListenerKind, SubscriptionId};

/// Ledger of active host subscriptions
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    active: Vec<SubscriptionId>,
}

impl CallbackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { active: Vec::new() }
    }

    /// Take ownership of a subscription the host already issued
    pub fn register(&mut self, id: SubscriptionId) {
        log::trace!("Registered subscription {:?}", id);
        self.active.push(id);
    }

    /// Ask the host for a listener and take ownership of the id
    pub fn subscribe<H>(
        &mut self,
        host: &mut H,
        target: Option<ExternalHandle>,
        kind: ListenerKind,
    ) -> Result<SubscriptionId, HostError>
    where
        H: ListenerHost + ?Sized,
    {
        let id = host.register_listener(target, kind)?;
        self.register(id);
        Ok(id)
    }

    /// Cancel and forget one subscription.
    ///
    /// Returns `false`, after logging, when the id is not held.
    pub fn unregister<H>(&mut self, host: &mut H, id: SubscriptionId) -> bool
    where
        H: ListenerHost + ?Sized,
    {
        match self.active.iter().position(|&active| active == id) {
            Some(position) => {
                self.active.swap_remove(position);
                host.cancel_listener(id);
                log::trace!("Unregistered subscription {:?}", id);
                true
            }
            None => {
                log::warn!("Unregister of unknown subscription {:?} ignored", id);
                false
            }
        }
    }

    /// Cancel every remaining subscription and empty the registry.
    ///
    /// Safe to call repeatedly; an empty registry is left untouched.
    pub fn reset_all<H>(&mut self, host: &mut H)
    where
        H: ListenerHost + ?Sized,
    {
        if self.active.is_empty() {
            return;
        }
        let drained: Vec<SubscriptionId> = self.active.drain(..).collect();
        log::debug!("Cancelling {} remaining subscriptions", drained.len());
        for id in drained {
            host.cancel_listener(id);
        }
    }

    /// Whether the registry holds `id`
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.active.contains(&id)
    }

    /// Number of held subscriptions
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// No subscriptions held
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Listener host that only counts registrations and cancellations
    #[derive(Default)]
    struct CountingHost {
        next: u64,
        cancelled: HashMap<SubscriptionId, usize>,
    }

    impl ListenerHost for CountingHost {
        fn register_listener(
            &mut self,
            _target: Option<ExternalHandle>,
            _kind: ListenerKind,
        ) -> Result<SubscriptionId, HostError> {
            self.next += 1;
            Ok(SubscriptionId(self.next))
        }

        fn cancel_listener(&mut self, id: SubscriptionId) {
            *self.cancelled.entry(id).or_default() += 1;
        }
    }

    #[test]
    fn test_reset_all_cancels_each_exactly_once() {
        let mut host = CountingHost::default();
        let mut registry = CallbackRegistry::new();
        let ids: Vec<_> = (0..5)
            .map(|i| {
                registry
                    .subscribe(&mut host, Some(ExternalHandle(i)), ListenerKind::AttributeChanged)
                    .unwrap()
            })
            .collect();

        registry.reset_all(&mut host);

        assert_eq!(registry.len(), 0);
        for id in ids {
            assert_eq!(host.cancelled.get(&id), Some(&1));
        }
    }

    #[test]
    fn test_reset_all_is_idempotent() {
        let mut host = CountingHost::default();
        let mut registry = CallbackRegistry::new();
        registry.subscribe(&mut host, None, ListenerKind::ObjectAdded).unwrap();

        registry.reset_all(&mut host);
        let after_first = host.cancelled.clone();
        registry.reset_all(&mut host);

        assert!(registry.is_empty());
        assert_eq!(host.cancelled, after_first);
    }

    #[test]
    fn test_reset_on_empty_registry() {
        let mut host = CountingHost::default();
        let mut registry = CallbackRegistry::new();
        registry.reset_all(&mut host);
        assert!(registry.is_empty());
        assert!(host.cancelled.is_empty());
    }

    #[test]
    fn test_unregister_removes_one_entry() {
        let mut host = CountingHost::default();
        let mut registry = CallbackRegistry::new();
        let a = registry.subscribe(&mut host, None, ListenerKind::ObjectAdded).unwrap();
        let b = registry.subscribe(&mut host, None, ListenerKind::ObjectRemoved).unwrap();

        assert!(registry.unregister(&mut host, a));
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let mut host = CountingHost::default();
        let mut registry = CallbackRegistry::new();
        registry.register(SubscriptionId(10));

        assert!(!registry.unregister(&mut host, SubscriptionId(11)));
        assert_eq!(registry.len(), 1);
        assert!(host.cancelled.is_empty());
    }

    #[test]
    fn test_duplicate_registration_removed_one_at_a_time() {
        let mut host = CountingHost::default();
        let mut registry = CallbackRegistry::new();
        registry.register(SubscriptionId(3));
        registry.register(SubscriptionId(3));

        assert!(registry.unregister(&mut host, SubscriptionId(3)));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(SubscriptionId(3)));
    }
}
