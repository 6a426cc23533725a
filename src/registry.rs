use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::DeviceConnection;
use crate::transport::GattHandle;
use crate::DeviceId;

/// Known connections keyed by device identifier.
///
/// Carries no lock of its own; the bridge guards it.
pub(crate) struct DeviceRegistry<H: GattHandle> {
    connections: HashMap<DeviceId, Arc<DeviceConnection<H>>>,
}

impl<H: GattHandle> DeviceRegistry<H> {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    pub fn find(&self, id: &DeviceId) -> Option<Arc<DeviceConnection<H>>> {
        self.connections.get(id).cloned()
    }

    /// Registers a connection. An existing entry for the same device is kept and `false` is returned.
    pub fn add(&mut self, connection: Arc<DeviceConnection<H>>) -> bool {
        match self.connections.entry(connection.id.clone()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(connection);
                true
            }
        }
    }

    pub fn remove(&mut self, id: &DeviceId) -> Option<Arc<DeviceConnection<H>>> {
        self.connections.remove(id)
    }

    /// Removes every connection, e.g. when the radio goes away.
    pub fn drain(&mut self) -> Vec<Arc<DeviceConnection<H>>> {
        self.connections.drain().map(|(_, conn)| conn).collect()
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<_> = self.connections.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[allow(unused)]
    pub fn len(&self) -> usize {
        self.connections.len()
    }
}
