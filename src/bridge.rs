use std::sync::Arc;

use async_lock::{Mutex, MutexGuardArc};
use tracing::{debug, info, warn};

use crate::async_util::{EventStream, Excluder, Wake};
use crate::btuuid::descriptors::CLIENT_CHARACTERISTIC_CONFIGURATION;
use crate::config::{BridgeConfig, Serialization};
use crate::connection::{CharacteristicEntry, ConnectionState, DeviceConnection};
use crate::error::{ErrorKind, Rejection};
use crate::events::{ConnectionEvent, EventHub, Message};
use crate::registry::DeviceRegistry;
use crate::transport::{GattHandle, Transport};
use crate::{AvailabilityState, DeviceId, Error, NotificationMode, Result, ScanResult, Uuid};

type Connection<T> = DeviceConnection<<T as Transport>::Handle>;

/// Bridges a callback-driven [`Transport`] into request/response operations.
///
/// Share it behind an [`Arc`]: caller tasks issue operations while the host's callback thread feeds
/// [`Bridge::handle_event`].
pub struct Bridge<T: Transport> {
    pub(crate) transport: T,
    pub(crate) config: BridgeConfig,
    pub(crate) registry: Mutex<DeviceRegistry<T::Handle>>,
    global_gate: Arc<Mutex<()>>,
    pub(crate) events: EventHub,
}

impl<T: Transport> Bridge<T> {
    /// Creates a bridge over `transport`.
    pub fn new(transport: T, config: BridgeConfig) -> Self {
        let events = EventHub::new(config.scan_buffer);
        Bridge {
            transport,
            config,
            registry: Mutex::new(DeviceRegistry::new()),
            global_gate: Arc::new(Mutex::new(())),
            events,
        }
    }

    /// The configuration this bridge was created with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Check if the radio is powered on
    pub fn is_available(&self) -> bool {
        self.transport.availability() == AvailabilityState::PoweredOn
    }

    /// The current radio state
    pub fn availability(&self) -> AvailabilityState {
        self.transport.availability()
    }

    /// Starts scanning. Results arrive on [`Bridge::scan_results`].
    ///
    /// If `services` is not empty, only advertisers of at least one of those services are reported.
    pub fn start_scan(&self, services: &[Uuid]) -> Result<()> {
        match self.transport.start_scan(services) {
            Ok(()) => debug!("scan started ({} service filters)", services.len()),
            Err(e) => warn!("failed to start scan: {e}"),
        }
        Ok(())
    }

    /// Stops scanning.
    pub fn stop_scan(&self) -> Result<()> {
        match self.transport.stop_scan() {
            Ok(()) => debug!("scan stopped"),
            Err(e) => warn!("failed to stop scan: {e}"),
        }
        Ok(())
    }

    /// Starts connecting to `id`.
    ///
    /// Returns as soon as the connect call is issued; the outcome arrives as a [`Message::ConnectionState`]. Calling
    /// this for a device that already has a session is a successful no-op.
    pub fn connect(&self, id: &DeviceId) -> Result<()> {
        let mut registry = self.registry.lock_blocking();
        if let Some(conn) = registry.find(id) {
            debug!("connect({id}) ignored, session already {:?}", conn.state());
            return Ok(());
        }
        let handle = self.transport.connect(id).map_err(|rejection| {
            warn!("connect({id}) rejected: {rejection}");
            Error::new(
                ErrorKind::ConnectionFailed,
                Some(Box::new(rejection)),
                format!("could not connect to {id}"),
            )
        })?;
        registry.add(Arc::new(DeviceConnection::new(id.clone(), handle)));
        info!("registered connection with {id}");
        Ok(())
    }

    /// Ends the session with `id`, releasing its handle and failing every pending operation on it with
    /// [`ErrorKind::DeviceDisconnected`].
    pub fn disconnect(&self, id: &DeviceId) -> Result<()> {
        let conn = self.registry.lock_blocking().remove(id).ok_or_else(|| unknown_device(id))?;
        self.end_session(&conn);
        Ok(())
    }

    /// Starts service discovery. Each discovered service arrives as a [`Message::ServiceDiscovered`].
    pub fn discover_services(&self, id: &DeviceId) -> Result<()> {
        let conn = self.find(id)?;
        if let Err(e) = conn.handle.discover_services() {
            warn!("discover_services({id}) rejected: {e}");
        }
        Ok(())
    }

    /// Enables or disables value pushes for a characteristic and waits until the device acknowledged the
    /// configuration descriptor write.
    pub async fn configure_notification(
        &self,
        id: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        mode: NotificationMode,
    ) -> Result<()> {
        self.exchange(
            id,
            service,
            characteristic,
            |conn| &conn.notification,
            |handle, entry| {
                if mode.is_enabled() && !(entry.properties.notify || entry.properties.indicate) {
                    debug!("{characteristic} does not declare notify or indicate");
                }
                if !entry.descriptors.contains(&CLIENT_CHARACTERISTIC_CONFIGURATION) {
                    debug!("{characteristic} has no discovered configuration descriptor, writing it anyway");
                }
                // the local flag follows only a descriptor write the stack accepted
                handle.write_descriptor(
                    service,
                    characteristic,
                    CLIENT_CHARACTERISTIC_CONFIGURATION,
                    &mode.descriptor_value(),
                )?;
                handle.set_characteristic_notification(service, characteristic, mode.is_enabled())
            },
        )
        .await
        .map(|_status| ())
    }

    /// Reads a characteristic and waits for the value.
    ///
    /// The value is also published as a [`Message::CharacteristicValue`].
    pub async fn read_characteristic(&self, id: &DeviceId, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>> {
        self.exchange(
            id,
            service,
            characteristic,
            |conn| &conn.read,
            |handle, _| handle.read_characteristic(service, characteristic),
        )
        .await
    }

    /// Writes a characteristic using its configured write type and waits for the write to complete.
    pub async fn write_characteristic(
        &self,
        id: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<()> {
        self.exchange(
            id,
            service,
            characteristic,
            |conn| &conn.write,
            |handle, entry| handle.write_characteristic(service, characteristic, value, entry.write_type),
        )
        .await
        .map(|_status| ())
    }

    /// Requests an MTU. Does not wait for the negotiation: the result arrives as a [`Message::MtuChanged`].
    pub async fn request_mtu(&self, id: &DeviceId, mtu: u16) -> Result<()> {
        let _global = self.global_lock().await;
        let conn = self.find(id)?;
        if let Err(e) = conn.handle.request_mtu(mtu) {
            warn!("request_mtu({id}, {mtu}) rejected: {e}");
        }
        if conn.is_connected() {
            Ok(())
        } else {
            Err(ErrorKind::DeviceDisconnected.into())
        }
    }

    /// The lifecycle state of `id`. Devices without a session are `Disconnected`.
    pub fn connection_state(&self, id: &DeviceId) -> ConnectionState {
        self.registry
            .lock_blocking()
            .find(id)
            .map(|conn| conn.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Devices with a live session, sorted by identifier.
    pub fn connected_devices(&self) -> Vec<DeviceId> {
        self.registry.lock_blocking().ids()
    }

    /// Subscribes to radio state changes. The current state is delivered immediately. Replaces any previous
    /// subscriber.
    pub fn availability_changes(&self) -> EventStream<AvailabilityState> {
        self.events.subscribe_availability(self.transport.availability())
    }

    /// Ends the current availability subscription.
    pub fn cancel_availability_changes(&self) {
        self.events.unsubscribe_availability();
    }

    /// Subscribes to scan results. Replaces any previous subscriber.
    pub fn scan_results(&self) -> EventStream<ScanResult> {
        self.events.subscribe_scan_results()
    }

    /// Ends the current scan result subscription.
    pub fn cancel_scan_results(&self) {
        self.events.unsubscribe_scan_results();
    }

    /// Subscribes to the message feed (connection state, discovered services, characteristic values, MTU).
    /// Replaces any previous subscriber.
    pub fn messages(&self) -> EventStream<Message> {
        self.events.subscribe_messages()
    }

    pub(crate) fn find(&self, id: &DeviceId) -> Result<Arc<Connection<T>>> {
        self.registry.lock_blocking().find(id).ok_or_else(|| unknown_device(id))
    }

    /// Tears a session down and reports it. Safe to call more than once per session.
    pub(crate) fn end_session(&self, conn: &Connection<T>) {
        if conn.teardown() {
            info!("deregistered connection with {}", conn.id);
            self.events.connection(&conn.id, ConnectionEvent::Disconnected);
        }
    }

    async fn global_lock(&self) -> Option<MutexGuardArc<()>> {
        match self.config.serialization {
            Serialization::Global => Some(self.global_gate.lock_arc().await),
            _ => None,
        }
    }

    /// The shared request/response template: resolve, lock, issue, wait, re-check.
    async fn exchange<V: Send>(
        &self,
        id: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        excluder: fn(&Connection<T>) -> &Excluder<V>,
        issue: impl FnOnce(&T::Handle, &CharacteristicEntry) -> Result<(), Rejection>,
    ) -> Result<V> {
        let _global = self.global_lock().await;
        let conn = self.find(id)?;
        let entry = conn.characteristic(service, characteristic).ok_or_else(|| {
            Error::new(
                ErrorKind::UnknownCharacteristic,
                None,
                format!("Unknown characteristic: {characteristic}"),
            )
        })?;

        let _device = match self.config.serialization {
            Serialization::PerDevice => Some(conn.gate.lock_arc().await),
            _ => None,
        };
        let lock = excluder(&conn).lock().await;
        if !conn.is_connected() {
            return Err(ErrorKind::DeviceDisconnected.into());
        }

        issue(&conn.handle, &entry).map_err(|rejection| {
            warn!("{id}/{characteristic}: operation rejected: {rejection}");
            Error::from(rejection)
        })?;

        let wake = lock.wait_unlock_until(&conn.lifecycle, self.config.operation_timeout).await;
        if !conn.is_connected() {
            return Err(ErrorKind::DeviceDisconnected.into());
        }
        match wake {
            Wake::Completed(value) => Ok(value),
            Wake::TimedOut => Err(Error::new(
                ErrorKind::Timeout,
                None,
                format!("no completion from {id} for {characteristic}"),
            )),
            Wake::Ended => Err(ErrorKind::DeviceDisconnected.into()),
        }
    }
}

impl<T: Transport> std::fmt::Debug for Bridge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("devices", &self.connected_devices())
            .finish()
    }
}

fn unknown_device(id: &DeviceId) -> Error {
    Error::new(ErrorKind::UnknownDevice, None, format!("Unknown deviceId: {id}"))
}
