use std::collections::HashMap;
use std::sync::Arc;

use async_lock::Mutex;

use crate::async_util::{Excluder, Lifecycle};
use crate::error::GattStatus;
use crate::transport::{DiscoveredService, GattHandle};
use crate::{CharacteristicProperties, DeviceId, Uuid, WriteType};

/// Lifecycle of one device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// No session exists, or the session has ended
    Disconnected,
    /// The connect call was issued; the link is not up yet
    Connecting,
    /// The link is up
    Connected,
    /// The link is up and the GATT profile is known
    ServicesDiscovered,
}

#[derive(Debug, Clone)]
pub(crate) struct CharacteristicEntry {
    pub properties: CharacteristicProperties,
    pub write_type: WriteType,
    pub descriptors: Vec<Uuid>,
}

/// One remote device's session. Owns the connection handle exclusively until the session ends.
pub(crate) struct DeviceConnection<H: GattHandle> {
    pub id: DeviceId,
    pub handle: H,
    state: Mutex<ConnectionState>,
    services: Mutex<HashMap<Uuid, HashMap<Uuid, CharacteristicEntry>>>,
    pub lifecycle: Lifecycle,
    /// Serializes every operation kind on this device under `Serialization::PerDevice`.
    pub gate: Arc<Mutex<()>>,
    pub notification: Excluder<GattStatus>,
    pub read: Excluder<Vec<u8>>,
    pub write: Excluder<GattStatus>,
}

impl<H: GattHandle> DeviceConnection<H> {
    pub fn new(id: DeviceId, handle: H) -> Self {
        Self {
            id,
            handle,
            state: Mutex::new(ConnectionState::Connecting),
            services: Mutex::new(HashMap::new()),
            lifecycle: Lifecycle::new(),
            gate: Arc::new(Mutex::new(())),
            notification: Excluder::new(),
            read: Excluder::new(),
            write: Excluder::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock_blocking()
    }

    /// Whether the session is still alive. `Connecting` counts; only teardown ends a session.
    pub fn is_connected(&self) -> bool {
        !self.lifecycle.is_ended()
    }

    /// `Connecting → Connected`, running `report` before the state lock is released so nothing about this session
    /// can be reported in between. Returns `false` if the link was already reported up or the session has ended.
    pub fn mark_connected(&self, report: impl FnOnce()) -> bool {
        let mut state = self.state.lock_blocking();
        if *state != ConnectionState::Connecting || !self.is_connected() {
            return false;
        }
        *state = ConnectionState::Connected;
        report();
        true
    }

    /// Replaces the discovered GATT profile and moves to `ServicesDiscovered`, running `report` under the state
    /// lock.
    ///
    /// Only a session whose link is up accepts a profile. Returns `false` and leaves everything untouched while
    /// still `Connecting` or once the session has ended.
    pub fn mark_services_discovered(&self, services: &[DiscoveredService], report: impl FnOnce()) -> bool {
        let mut state = self.state.lock_blocking();
        let link_up = matches!(*state, ConnectionState::Connected | ConnectionState::ServicesDiscovered);
        if !link_up || !self.is_connected() {
            return false;
        }
        let tree = services
            .iter()
            .map(|service| {
                let chars = service
                    .characteristics
                    .iter()
                    .map(|c| {
                        (
                            c.uuid,
                            CharacteristicEntry {
                                properties: c.properties,
                                write_type: c.write_type,
                                descriptors: c.descriptors.clone(),
                            },
                        )
                    })
                    .collect();
                (service.uuid, chars)
            })
            .collect();
        *self.services.lock_blocking() = tree;
        *state = ConnectionState::ServicesDiscovered;
        report();
        true
    }

    pub fn characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<CharacteristicEntry> {
        self.services
            .lock_blocking()
            .get(&service)
            .and_then(|chars| chars.get(&characteristic))
            .cloned()
    }

    /// Ends the session: releases the handle and wakes every pending operation on it.
    ///
    /// Only the first call does anything; it returns `true`.
    pub fn teardown(&self) -> bool {
        {
            // ending under the state lock orders teardown after any transition that is already reporting.
            let mut state = self.state.lock_blocking();
            if !self.lifecycle.end() {
                return false;
            }
            *state = ConnectionState::Disconnected;
            self.services.lock_blocking().clear();
        }
        self.handle.disconnect();
        self.handle.close();
        true
    }
}

impl<H: GattHandle> std::fmt::Debug for DeviceConnection<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
