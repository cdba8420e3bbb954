use crate::midi::PortRef;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The set of input ports a client keeps connected to every source.
///
/// All access goes through one mutex, held for a single mutation or a
/// single snapshot and never across platform calls.
#[derive(Debug, Default)]
pub struct PortRegistry {
    ports: Mutex<HashSet<PortRef>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn ports(&self) -> MutexGuard<'_, HashSet<PortRef>> {
        self.ports.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if the port was not registered yet
    pub fn add(&self, port: PortRef) -> bool {
        self.ports().insert(port)
    }

    /// Returns `true` if the port was registered
    pub fn remove(&self, port: PortRef) -> bool {
        self.ports().remove(&port)
    }

    pub fn contains(&self, port: PortRef) -> bool {
        self.ports().contains(&port)
    }

    pub fn len(&self) -> usize {
        self.ports().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports().is_empty()
    }

    /// Copy of the current membership, in no particular order
    pub fn snapshot(&self) -> Vec<PortRef> {
        self.ports().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let registry = PortRegistry::new();
        let port = PortRef::from_raw(7);

        assert!(registry.add(port));
        assert!(!registry.add(port));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(port));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = PortRegistry::new();
        let port = PortRef::from_raw(7);

        // Removing something never added is a no-op
        assert!(!registry.remove(port));

        registry.add(port);
        assert!(registry.remove(port));
        assert!(!registry.remove(port));
        assert!(registry.is_empty());
    }
}
