use tracing::{debug, error, info, warn};

use crate::btuuid::descriptors::CLIENT_CHARACTERISTIC_CONFIGURATION;
use crate::connection::DeviceConnection;
use crate::error::GattStatus;
use crate::events::{ConnectionEvent, Message};
use crate::transport::{DiscoveredService, Transport, TransportEvent};
use crate::{AvailabilityState, Bridge, DeviceId};

impl<T: Transport> Bridge<T> {
    /// Feeds one host stack callback into the bridge.
    ///
    /// Call it from the host's callback thread, in the order the callbacks arrive. It never blocks on a pending
    /// operation, so it is safe to call while callers are waiting.
    pub fn handle_event(&self, event: TransportEvent) {
        debug!("transport event {:?}", event);
        match event {
            TransportEvent::AvailabilityChanged(state) => self.on_availability_changed(state),
            TransportEvent::ScanResult(result) => self.events.publish_scan_result(result),
            TransportEvent::ScanFailed { code } => error!("scan failed with code {code}"),
            TransportEvent::ConnectionStateChanged {
                device_id,
                status,
                connected,
            } => self.on_connection_state_changed(&device_id, status, connected),
            TransportEvent::ServicesDiscovered {
                device_id,
                status,
                services,
            } => self.on_services_discovered(&device_id, status, services),
            TransportEvent::CharacteristicRead {
                device_id,
                characteristic,
                value,
                status,
                ..
            } => {
                if !status.is_success() {
                    warn!("read of {characteristic} on {device_id} completed with {status}");
                }
                self.events.publish(Message::CharacteristicValue {
                    device_id: device_id.clone(),
                    characteristic,
                    value: value.clone(),
                });
                self.with_connection(&device_id, |conn| conn.read.unlock(value));
            }
            TransportEvent::CharacteristicWrite {
                device_id,
                characteristic,
                status,
                ..
            } => {
                if !status.is_success() {
                    warn!("write of {characteristic} on {device_id} completed with {status}");
                }
                self.with_connection(&device_id, |conn| conn.write.unlock(status));
            }
            TransportEvent::CharacteristicChanged {
                device_id,
                characteristic,
                value,
                ..
            } => self.events.publish(Message::CharacteristicValue {
                device_id,
                characteristic,
                value,
            }),
            TransportEvent::DescriptorWrite {
                device_id,
                characteristic,
                descriptor,
                status,
                ..
            } => {
                if descriptor != CLIENT_CHARACTERISTIC_CONFIGURATION {
                    debug!("ignoring write completion of descriptor {descriptor} on {characteristic}");
                    return;
                }
                if !status.is_success() {
                    warn!("configuring {characteristic} on {device_id} completed with {status}");
                }
                self.with_connection(&device_id, |conn| conn.notification.unlock(status));
            }
            TransportEvent::MtuChanged { device_id, mtu, status } => {
                if !status.is_success() {
                    warn!("MTU negotiation with {device_id} completed with {status}");
                }
                self.events.publish(Message::MtuChanged { device_id, mtu });
            }
        }
    }

    fn with_connection(&self, id: &DeviceId, signal: impl FnOnce(&DeviceConnection<T::Handle>) -> bool) {
        let Some(conn) = self.registry.lock_blocking().find(id) else {
            debug!("completion for unknown device {id} dropped");
            return;
        };
        if !signal(&conn) {
            debug!("completion on {id} had no waiting operation");
        }
    }

    fn on_availability_changed(&self, state: AvailabilityState) {
        if state.drops_connections() {
            let dropped = self.registry.lock_blocking().drain();
            if !dropped.is_empty() {
                info!("radio is {:?}, dropping {} connections", state, dropped.len());
            }
            for conn in dropped {
                self.end_session(&conn);
            }
        }
        self.events.publish_availability(state);
    }

    fn on_connection_state_changed(&self, id: &DeviceId, status: GattStatus, connected: bool) {
        if connected && status.is_success() {
            let Some(conn) = self.registry.lock_blocking().find(id) else {
                warn!("link to unregistered device {id} came up");
                return;
            };
            let reported = conn.mark_connected(|| {
                info!("connected to {id}");
                self.events.connection(id, ConnectionEvent::Connected);
            });
            if !reported {
                debug!("link-up of {id} ignored in state {:?}", conn.state());
            }
            return;
        }

        if !status.is_success() {
            warn!("connection with {id} lost with {status}");
        }
        let removed = self.registry.lock_blocking().remove(id);
        match removed {
            Some(conn) => self.end_session(&conn),
            None => debug!("disconnect of {id} already handled"),
        }
    }

    fn on_services_discovered(&self, id: &DeviceId, status: GattStatus, services: Vec<DiscoveredService>) {
        if !status.is_success() {
            warn!("service discovery on {id} failed with {status}");
            return;
        }
        let Some(conn) = self.registry.lock_blocking().find(id) else {
            debug!("services discovered for unknown device {id}");
            return;
        };
        let accepted = conn.mark_services_discovered(&services, || {
            for service in &services {
                debug!("{id}: service {} with {} characteristics", service.uuid, service.characteristics.len());
                self.events.publish(Message::ServiceDiscovered {
                    device_id: id.clone(),
                    service: service.uuid,
                    characteristics: service.characteristics.iter().map(|c| c.uuid).collect(),
                });
            }
        });
        if !accepted {
            warn!("services discovered on {id} in state {:?}, dropped", conn.state());
        }
    }
}
