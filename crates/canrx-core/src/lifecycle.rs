//! Per-interface registry lifetime.
//!
//! ```text
//! Unattached ──attach──▶ Attached ──detach, empty──────────────▶ (gone)
//!                           │
//!                           └──detach, receivers left──▶ Detaching ──last unregister──▶ (gone)
//! ```
//!
//! The side-table mapping interfaces to registries is published through an
//! `ArcSwap`, so dispatch looks registries up without a lock. All transitions
//! run under the engine's writer lock.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use canrx_frame::Frame;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::device::InterfaceId;
use crate::error::{RegistryError, Result};
use crate::registry::Registry;

type RegistryTable = HashMap<InterfaceId, Arc<Registry>>;

/// Where an interface is in its registry lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceState {
    /// No registry: never attached, already gone, or attach failed.
    Unattached,
    /// Registry live and accepting registrations.
    Attached,
    /// Interface detached; registry drains until its last receiver leaves.
    Detaching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DetachOutcome {
    Destroyed,
    Deferred { entries: usize },
    NotAttached,
}

pub(crate) struct Lifecycle {
    registries: ArcSwap<RegistryTable>,
    max_interfaces: usize,
}

impl Lifecycle {
    pub(crate) fn new(max_interfaces: usize) -> Self {
        Self {
            registries: ArcSwap::from_pointee(RegistryTable::new()),
            max_interfaces,
        }
    }

    pub(crate) fn get(&self, interface: InterfaceId) -> Option<Arc<Registry>> {
        self.registries.load().get(&interface).cloned()
    }

    /// Dispatch into the interface's registry, if it has one.
    pub(crate) fn dispatch(&self, interface: InterfaceId, frame: &Frame) -> u32 {
        match self.registries.load().get(&interface) {
            Some(registry) => registry.dispatch(frame),
            None => 0,
        }
    }

    pub(crate) fn state(&self, interface: InterfaceId) -> InterfaceState {
        match self.registries.load().get(&interface) {
            None => InterfaceState::Unattached,
            Some(registry) if registry.is_pending_removal() => InterfaceState::Detaching,
            Some(_) => InterfaceState::Attached,
        }
    }

    pub(crate) fn interfaces(&self) -> Vec<InterfaceId> {
        let mut ids: Vec<InterfaceId> = self.registries.load().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Create the interface's registry. Caller holds the writer lock.
    ///
    /// An interface that re-attaches while still draining gets its old
    /// registry back, receivers included.
    pub(crate) fn attach(&self, interface: InterfaceId) -> Result<()> {
        let table = self.registries.load_full();
        if let Some(existing) = table.get(&interface) {
            if existing.is_pending_removal() {
                existing.mark_pending_removal(false);
                info!(%interface, entries = existing.entries(), "interface re-attached while draining");
            } else {
                warn!(%interface, "interface attached twice");
            }
            return Ok(());
        }

        if table.len() >= self.max_interfaces {
            return Err(RegistryError::Allocation {
                limit: self.max_interfaces,
            });
        }

        let mut next = RegistryTable::clone(&table);
        next.insert(interface, Arc::new(Registry::new(Some(interface))));
        self.registries.store(Arc::new(next));
        debug!(%interface, "receive registry created");
        Ok(())
    }

    /// Destroy the interface's registry now, or mark it for destruction once
    /// it drains. Caller holds the writer lock.
    pub(crate) fn detach(&self, interface: InterfaceId) -> DetachOutcome {
        let Some(registry) = self.get(interface) else {
            return DetachOutcome::NotAttached;
        };

        if registry.is_empty() {
            self.destroy(interface);
            return DetachOutcome::Destroyed;
        }

        registry.mark_pending_removal(true);
        DetachOutcome::Deferred {
            entries: registry.entries(),
        }
    }

    /// Destroy a detached registry that just lost its last receiver. Caller
    /// holds the writer lock.
    pub(crate) fn release_if_drained(&self, interface: InterfaceId, registry: &Arc<Registry>) {
        if !registry.is_pending_removal() || !registry.is_empty() {
            return;
        }
        let current = self.get(interface);
        if current.is_some_and(|current| Arc::ptr_eq(&current, registry)) {
            self.destroy(interface);
        }
    }

    /// Remove every registry from the table. Caller holds the writer lock.
    pub(crate) fn take_all(&self) -> Vec<Arc<Registry>> {
        let table = self.registries.swap(Arc::new(RegistryTable::new()));
        table.values().cloned().collect()
    }

    /// Unpublish the registry. In-flight dispatch still holding it finishes
    /// first; the registry is freed when the last reference goes.
    fn destroy(&self, interface: InterfaceId) {
        let mut next = RegistryTable::clone(&self.registries.load());
        if next.remove(&interface).is_some() {
            self.registries.store(Arc::new(next));
            debug!(%interface, "receive registry destroyed");
        }
    }
}

#[cfg(test)]
mod tests {
    use canrx_frame::Filter;

    use super::*;
    use crate::classify::classify;
    use crate::receiver::{FrameHandler, Receiver};

    fn fill(registry: &Registry) -> Arc<dyn FrameHandler> {
        let handler: Arc<dyn FrameHandler> = Arc::new(|_: &Frame| {});
        let (bucket, normalized) = classify(Filter::all());
        registry.insert(
            bucket,
            Arc::new(Receiver::new(
                Filter::all(),
                normalized,
                bucket,
                Arc::clone(&handler),
                "test".to_string(),
            )),
        );
        handler
    }

    #[test]
    fn attach_then_detach_empty_destroys() {
        let lifecycle = Lifecycle::new(4);
        let iface = InterfaceId(1);
        assert_eq!(lifecycle.state(iface), InterfaceState::Unattached);

        lifecycle.attach(iface).unwrap();
        assert_eq!(lifecycle.state(iface), InterfaceState::Attached);

        assert_eq!(lifecycle.detach(iface), DetachOutcome::Destroyed);
        assert_eq!(lifecycle.state(iface), InterfaceState::Unattached);
    }

    #[test]
    fn detach_with_receivers_defers() {
        let lifecycle = Lifecycle::new(4);
        let iface = InterfaceId(1);
        lifecycle.attach(iface).unwrap();
        let registry = lifecycle.get(iface).unwrap();
        let handler = fill(&registry);

        assert_eq!(
            lifecycle.detach(iface),
            DetachOutcome::Deferred { entries: 1 }
        );
        assert_eq!(lifecycle.state(iface), InterfaceState::Detaching);

        let (bucket, normalized) = classify(Filter::all());
        registry.remove(bucket, normalized, &handler).unwrap();
        lifecycle.release_if_drained(iface, &registry);
        assert_eq!(lifecycle.state(iface), InterfaceState::Unattached);
    }

    #[test]
    fn reattach_revives_draining_registry() {
        let lifecycle = Lifecycle::new(4);
        let iface = InterfaceId(9);
        lifecycle.attach(iface).unwrap();
        let registry = lifecycle.get(iface).unwrap();
        fill(&registry);
        lifecycle.detach(iface);

        lifecycle.attach(iface).unwrap();
        assert_eq!(lifecycle.state(iface), InterfaceState::Attached);
        assert!(Arc::ptr_eq(&lifecycle.get(iface).unwrap(), &registry));
    }

    #[test]
    fn attach_beyond_limit_fails() {
        let lifecycle = Lifecycle::new(1);
        lifecycle.attach(InterfaceId(1)).unwrap();
        assert_eq!(
            lifecycle.attach(InterfaceId(2)),
            Err(RegistryError::Allocation { limit: 1 })
        );
        assert_eq!(lifecycle.interfaces(), vec![InterfaceId(1)]);
    }

    #[test]
    fn detach_unknown_interface() {
        let lifecycle = Lifecycle::new(1);
        assert_eq!(lifecycle.detach(InterfaceId(5)), DetachOutcome::NotAttached);
    }
}
