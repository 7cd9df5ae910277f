use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canrx_frame::{Filter, Frame};
use tracing::{debug, error, info, warn};

use crate::classify::classify;
use crate::config::EngineConfig;
use crate::device::{DeviceDirectory, DeviceKind, InterfaceId};
use crate::error::{RegistryError, Result};
use crate::lifecycle::{DetachOutcome, InterfaceState, Lifecycle};
use crate::receiver::{FrameHandler, Receiver, ReceiverHandle, ReceiverInfo};
use crate::registry::Registry;
use crate::stats::{Stats, StatsSnapshot};

/// The receive-path core: one global registry, one registry per attached
/// CAN interface, and the dispatch engine over both.
///
/// [`dispatch`](Engine::dispatch) never blocks. Registration, unregistration
/// and interface lifecycle events are serialized by one writer lock and may
/// run concurrently with dispatch from any number of threads.
pub struct Engine {
    global: Arc<Registry>,
    lifecycle: Lifecycle,
    writer: Mutex<()>,
    devices: Arc<dyn DeviceDirectory>,
    config: EngineConfig,
    stats: Stats,
}

impl Engine {
    /// Create an engine with default limits.
    pub fn new(devices: Arc<dyn DeviceDirectory>) -> Self {
        Self::with_config(devices, EngineConfig::default())
    }

    /// Create an engine with explicit limits.
    pub fn with_config(devices: Arc<dyn DeviceDirectory>, config: EngineConfig) -> Self {
        Self {
            global: Arc::new(Registry::new(None)),
            lifecycle: Lifecycle::new(config.max_interfaces),
            writer: Mutex::new(()),
            devices,
            config,
            stats: Stats::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register `handler` for frames matching `filter`.
    ///
    /// `interface = None` registers in the global registry, which sees frames
    /// from every interface. `name` labels the receiver in diagnostics.
    pub fn register(
        &self,
        interface: Option<InterfaceId>,
        filter: Filter,
        handler: Arc<dyn FrameHandler>,
        name: impl Into<String>,
    ) -> Result<ReceiverHandle> {
        let _writer = self.lock_writer();
        let registry = self.registration_target(interface)?;

        let limit = self.config.max_receivers_per_registry;
        if registry.entries() >= limit {
            return Err(RegistryError::Allocation { limit });
        }

        let (bucket, normalized) = classify(filter);
        let receiver = Arc::new(Receiver::new(
            filter,
            normalized,
            bucket,
            handler,
            name.into(),
        ));
        registry.insert(bucket, Arc::clone(&receiver));
        debug!(
            interface = ?interface,
            %filter,
            %bucket,
            entries = registry.entries(),
            "receiver registered"
        );

        Ok(ReceiverHandle {
            interface,
            receiver,
        })
    }

    /// Remove the first receiver registered with this interface, filter and
    /// handler.
    ///
    /// Returns [`RegistryError::NotFound`] when nothing matches, including
    /// when the receiver was already removed.
    pub fn unregister(
        &self,
        interface: Option<InterfaceId>,
        filter: Filter,
        handler: &Arc<dyn FrameHandler>,
    ) -> Result<()> {
        let _writer = self.lock_writer();
        let registry = self.unregistration_target(interface, filter)?;

        let (bucket, normalized) = classify(filter);
        match registry.remove(bucket, normalized, handler) {
            Some(_) => {
                self.after_removal(interface, &registry, filter);
                Ok(())
            }
            None => Err(not_found(interface, filter)),
        }
    }

    /// Remove exactly the receiver behind `handle`.
    pub fn unregister_handle(&self, handle: &ReceiverHandle) -> Result<()> {
        let _writer = self.lock_writer();
        let filter = handle.filter();
        let registry = self.unregistration_target(handle.interface, filter)?;

        match registry.remove_receiver(handle.bucket(), &handle.receiver) {
            Some(_) => {
                self.after_removal(handle.interface, &registry, filter);
                Ok(())
            }
            None => Err(not_found(handle.interface, filter)),
        }
    }

    /// Deliver a frame received on `interface` to every matching receiver,
    /// global registry first. Returns the number of receivers invoked.
    pub fn dispatch(&self, interface: InterfaceId, frame: &Frame) -> u32 {
        let matches = self.global.dispatch(frame) + self.lifecycle.dispatch(interface, frame);
        self.stats.record(matches);
        matches
    }

    /// The interface appeared. Non-CAN interfaces are ignored.
    ///
    /// On failure the interface has no registry of its own and is served by
    /// the global registry only.
    pub fn on_interface_attach(&self, interface: InterfaceId) -> Result<()> {
        if !self.devices.is_can_interface(interface) {
            debug!(%interface, "ignoring attach of non-CAN interface");
            return Ok(());
        }

        let _writer = self.lock_writer();
        match self.lifecycle.attach(interface) {
            Ok(()) => {
                info!(%interface, "interface attached");
                Ok(())
            }
            Err(err) => {
                error!(%interface, error = %err, "no receive registry for interface");
                Err(err)
            }
        }
    }

    /// The interface is going away.
    ///
    /// An empty registry is destroyed now. Otherwise it keeps serving
    /// dispatch and unregistration until the last receiver is removed.
    pub fn on_interface_detach(&self, interface: InterfaceId) {
        let _writer = self.lock_writer();
        match self.lifecycle.detach(interface) {
            DetachOutcome::Destroyed => info!(%interface, "interface detached"),
            DetachOutcome::Deferred { entries } => info!(
                %interface,
                entries,
                "interface detached, registry drains on last unregister"
            ),
            DetachOutcome::NotAttached => {
                debug!(%interface, "detach of interface without registry")
            }
        }
    }

    pub fn interface_state(&self, interface: InterfaceId) -> InterfaceState {
        self.lifecycle.state(interface)
    }

    /// Whether `interface` currently has a registry (attached or draining).
    pub fn has_registry(&self, interface: InterfaceId) -> bool {
        self.lifecycle.get(interface).is_some()
    }

    /// Interfaces that currently have a registry, in ascending order.
    pub fn interfaces(&self) -> Vec<InterfaceId> {
        self.lifecycle.interfaces()
    }

    /// Read-only view of a registry. `None` selects the global registry.
    pub fn registry(&self, interface: Option<InterfaceId>) -> Option<Arc<Registry>> {
        match interface {
            None => Some(Arc::clone(&self.global)),
            Some(id) => self.lifecycle.get(id),
        }
    }

    /// Snapshot of every receiver: global registry first, then interfaces in
    /// ascending order.
    pub fn receivers(&self) -> Vec<ReceiverInfo> {
        let mut receivers = self.global.receivers();
        for interface in self.lifecycle.interfaces() {
            if let Some(registry) = self.lifecycle.get(interface) {
                receivers.extend(registry.receivers());
            }
        }
        receivers
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Tear the engine down, destroying every registry.
    pub fn shutdown(self) {
        let _writer = self.lock_writer();
        for registry in self.lifecycle.take_all() {
            if !registry.is_empty() {
                warn!(
                    interface = ?registry.interface(),
                    entries = registry.entries(),
                    "destroying registry with receivers still registered"
                );
            }
        }
        if !self.global.is_empty() {
            warn!(
                entries = self.global.entries(),
                "destroying global registry with receivers still registered"
            );
        }
        debug!("engine shut down");
    }

    fn registration_target(&self, interface: Option<InterfaceId>) -> Result<Arc<Registry>> {
        let Some(id) = interface else {
            return Ok(Arc::clone(&self.global));
        };

        match self.devices.kind(id) {
            None => return Err(RegistryError::NoDevice(id)),
            Some(DeviceKind::Other) => return Err(RegistryError::DeviceType(id)),
            Some(DeviceKind::Can) => {}
        }

        match self.lifecycle.get(id) {
            Some(registry) if !registry.is_pending_removal() => Ok(registry),
            _ => Err(RegistryError::NoDevice(id)),
        }
    }

    fn unregistration_target(
        &self,
        interface: Option<InterfaceId>,
        filter: Filter,
    ) -> Result<Arc<Registry>> {
        let Some(id) = interface else {
            return Ok(Arc::clone(&self.global));
        };

        if self.devices.kind(id) == Some(DeviceKind::Other) {
            return Err(RegistryError::DeviceType(id));
        }

        self.lifecycle
            .get(id)
            .ok_or_else(|| not_found(interface, filter))
    }

    fn after_removal(
        &self,
        interface: Option<InterfaceId>,
        registry: &Arc<Registry>,
        filter: Filter,
    ) {
        debug!(
            interface = ?interface,
            %filter,
            entries = registry.entries(),
            "receiver unregistered"
        );
        if let Some(id) = interface {
            self.lifecycle.release_if_drained(id, registry);
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("global", &self.global)
            .field("interfaces", &self.lifecycle.interfaces())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn not_found(interface: Option<InterfaceId>, filter: Filter) -> RegistryError {
    warn!(interface = ?interface, %filter, "receive list entry not found");
    RegistryError::NotFound { interface, filter }
}
