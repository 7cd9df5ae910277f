/// Capacity limits of an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Receivers one registry accepts before registration fails with
    /// [`RegistryError::Allocation`](crate::RegistryError::Allocation).
    pub max_receivers_per_registry: usize,
    /// Interfaces that get a dedicated registry. Interfaces attached beyond
    /// this limit are served by the global registry only.
    pub max_interfaces: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_receivers_per_registry: 4096,
            max_interfaces: 256,
        }
    }
}
