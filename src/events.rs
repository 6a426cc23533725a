use tracing::debug;

use crate::async_util::{EventSlot, EventStream};
use crate::{AvailabilityState, DeviceId, ScanResult, Uuid};

/// Link transitions reported on the message feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionEvent {
    /// The link came up
    Connected,
    /// The session ended, whether requested or not
    Disconnected,
}

/// Messages on the connector feed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Message {
    /// A device connected or disconnected
    ConnectionState {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        state: ConnectionEvent,
    },
    /// One service found by discovery; a discovery yields one message per service
    ServiceDiscovered {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        service: Uuid,
        #[allow(missing_docs)]
        characteristics: Vec<Uuid>,
    },
    /// A value read on request or pushed by the device
    CharacteristicValue {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        characteristic: Uuid,
        #[allow(missing_docs)]
        value: Vec<u8>,
    },
    /// The negotiated MTU of a connection
    MtuChanged {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        mtu: u16,
    },
}

/// Stateless relay of unsolicited events to single-slot subscribers.
pub(crate) struct EventHub {
    availability: EventSlot<AvailabilityState>,
    scan_results: EventSlot<ScanResult>,
    messages: EventSlot<Message>,
}

impl EventHub {
    pub fn new(scan_buffer: usize) -> Self {
        Self {
            availability: EventSlot::unbounded(),
            scan_results: EventSlot::bounded(scan_buffer.max(1)),
            messages: EventSlot::unbounded(),
        }
    }

    /// Subscribes to availability changes; `current` is delivered first.
    pub fn subscribe_availability(&self, current: AvailabilityState) -> EventStream<AvailabilityState> {
        let stream = self.availability.subscribe();
        self.availability.send(current);
        stream
    }

    pub fn unsubscribe_availability(&self) {
        self.availability.unsubscribe();
    }

    pub fn publish_availability(&self, state: AvailabilityState) {
        if !self.availability.send(state) {
            debug!("no availability listener, dropped {:?}", state);
        }
    }

    pub fn subscribe_scan_results(&self) -> EventStream<ScanResult> {
        self.scan_results.subscribe()
    }

    pub fn unsubscribe_scan_results(&self) {
        self.scan_results.unsubscribe();
    }

    pub fn publish_scan_result(&self, result: ScanResult) {
        if !self.scan_results.send(result) {
            debug!("scan result dropped (no listener or buffer full)");
        }
    }

    pub fn subscribe_messages(&self) -> EventStream<Message> {
        self.messages.subscribe()
    }

    pub fn publish(&self, message: Message) {
        if self.messages.is_subscribed() {
            self.messages.send(message);
        } else {
            debug!("no message listener, dropped {:?}", message);
        }
    }

    pub fn connection(&self, device_id: &DeviceId, state: ConnectionEvent) {
        self.publish(Message::ConnectionState {
            device_id: device_id.clone(),
            state,
        });
    }
}
