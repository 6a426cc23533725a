//! A thread-parking facade over [`Bridge`] for callers without an async executor.
//!
//! Each request/response operation blocks the calling thread until the operation resolves. Completion callbacks
//! must keep flowing into [`Bridge::handle_event`] from another thread, or a blocked caller only wakes up when its
//! device disconnects or the configured timeout expires.

use std::sync::Arc;

use futures_lite::future::block_on;
use futures_lite::stream;

use crate::async_util::EventStream;
use crate::transport::Transport;
use crate::{
    AvailabilityState, Bridge, BridgeConfig, ConnectionState, DeviceId, Message, NotificationMode, Result, ScanResult,
    Uuid,
};

/// Blocking counterpart of [`Bridge`]. Cheap to clone; clones share one bridge.
pub struct BlockingBridge<T: Transport> {
    inner: Arc<Bridge<T>>,
}

impl<T: Transport> Clone for BlockingBridge<T> {
    fn clone(&self) -> Self {
        BlockingBridge {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport> BlockingBridge<T> {
    /// Creates a bridge over `transport`.
    pub fn new(transport: T, config: BridgeConfig) -> Self {
        Self::from_bridge(Arc::new(Bridge::new(transport, config)))
    }

    /// Wraps an existing shared bridge, so async and blocking callers can use the same sessions.
    pub fn from_bridge(inner: Arc<Bridge<T>>) -> Self {
        BlockingBridge { inner }
    }

    /// The shared async bridge. Feed host callbacks to its [`Bridge::handle_event`].
    pub fn bridge(&self) -> &Arc<Bridge<T>> {
        &self.inner
    }

    /// See [`Bridge::is_available`].
    pub fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    /// See [`Bridge::availability`].
    pub fn availability(&self) -> AvailabilityState {
        self.inner.availability()
    }

    /// See [`Bridge::start_scan`].
    pub fn start_scan(&self, services: &[Uuid]) -> Result<()> {
        self.inner.start_scan(services)
    }

    /// See [`Bridge::stop_scan`].
    pub fn stop_scan(&self) -> Result<()> {
        self.inner.stop_scan()
    }

    /// See [`Bridge::connect`].
    pub fn connect(&self, id: &DeviceId) -> Result<()> {
        self.inner.connect(id)
    }

    /// See [`Bridge::disconnect`].
    pub fn disconnect(&self, id: &DeviceId) -> Result<()> {
        self.inner.disconnect(id)
    }

    /// See [`Bridge::discover_services`].
    pub fn discover_services(&self, id: &DeviceId) -> Result<()> {
        self.inner.discover_services(id)
    }

    /// See [`Bridge::configure_notification`]. Blocks until the device acknowledged.
    pub fn configure_notification(
        &self,
        id: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        mode: NotificationMode,
    ) -> Result<()> {
        block_on(self.inner.configure_notification(id, service, characteristic, mode))
    }

    /// See [`Bridge::read_characteristic`]. Blocks until the value arrives.
    pub fn read_characteristic(&self, id: &DeviceId, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>> {
        block_on(self.inner.read_characteristic(id, service, characteristic))
    }

    /// See [`Bridge::write_characteristic`]. Blocks until the write completed.
    pub fn write_characteristic(&self, id: &DeviceId, service: Uuid, characteristic: Uuid, value: &[u8]) -> Result<()> {
        block_on(self.inner.write_characteristic(id, service, characteristic, value))
    }

    /// See [`Bridge::request_mtu`].
    pub fn request_mtu(&self, id: &DeviceId, mtu: u16) -> Result<()> {
        block_on(self.inner.request_mtu(id, mtu))
    }

    /// See [`Bridge::connection_state`].
    pub fn connection_state(&self, id: &DeviceId) -> ConnectionState {
        self.inner.connection_state(id)
    }

    /// See [`Bridge::connected_devices`].
    pub fn connected_devices(&self) -> Vec<DeviceId> {
        self.inner.connected_devices()
    }

    /// See [`Bridge::availability_changes`]. The iterator blocks on `next` and ends when replaced or cancelled.
    pub fn availability_changes(&self) -> impl Iterator<Item = AvailabilityState> {
        blocking_iter(self.inner.availability_changes())
    }

    /// See [`Bridge::scan_results`].
    pub fn scan_results(&self) -> impl Iterator<Item = ScanResult> {
        blocking_iter(self.inner.scan_results())
    }

    /// See [`Bridge::messages`].
    pub fn messages(&self) -> impl Iterator<Item = Message> {
        blocking_iter(self.inner.messages())
    }
}

impl<T: Transport> std::fmt::Debug for BlockingBridge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BlockingBridge").field(&self.inner).finish()
    }
}

fn blocking_iter<V: Send + 'static>(events: EventStream<V>) -> impl Iterator<Item = V> {
    stream::block_on(events)
}
