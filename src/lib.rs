#![warn(missing_docs)]

//! gatt-bridge turns a callback-driven [Bluetooth Low Energy] GATT client stack into sequential, per-operation
//! request/response calls.
//!
//! Host radio stacks (Android's `BluetoothGatt`, CoreBluetooth delegates, vendor SDKs) expose fire-and-forget calls
//! whose outcome arrives later on a platform-owned callback thread. A caller usually wants something simpler: "write
//! this value and tell me when it either succeeded or the device went away". The [`Bridge`] sits between the two:
//!
//! - it keeps a registry of connected devices and drives each device's connection state machine from hardware
//!   callbacks,
//! - it serializes read, write and notification-configuration requests so that each device has at most one
//!   outstanding operation of a kind,
//! - it routes each completion callback to the caller that issued the matching request,
//! - it guarantees that a device disconnecting mid-operation resolves every pending caller with
//!   [`ErrorKind::DeviceDisconnected`] instead of leaving it waiting forever.
//!
//! Unsolicited events (availability changes, scan results, connection state, discovered services, characteristic
//! values, MTU changes) are relayed to single-slot subscription streams.
//!
//! [Bluetooth Low Energy]: https://www.bluetooth.com/specifications/specs/
//!
//! # Usage
//!
//! The host integration implements [`Transport`] and [`GattHandle`] on top of the platform stack and forwards every
//! platform callback to [`Bridge::handle_event`]:
//!
//! ```rust,ignore
//! let bridge = Arc::new(Bridge::new(platform_transport, BridgeConfig::default()));
//!
//! // on the platform callback thread
//! bridge.handle_event(TransportEvent::CharacteristicWrite { device_id, service, characteristic, status });
//!
//! // on a caller task
//! bridge.connect(&device_id)?;
//! bridge.discover_services(&device_id)?;
//! bridge.write_characteristic(&device_id, service, characteristic, &[0xff]).await?;
//! ```
//!
//! Callers on plain worker threads can use [`blocking::BlockingBridge`], which parks the calling thread instead of
//! returning a future.
//!
//! # Concurrency
//!
//! By default a single bridge-wide lock serializes requests: every operation fully resolves before the next one
//! starts, even against an unrelated device. [`Serialization::PerOperation`] keys the lock by (device, operation
//! kind) instead, so operations against unrelated devices proceed concurrently, and [`Serialization::PerDevice`] sits
//! in between. There is no explicit cancellation API: a pending operation resolves when its completion
//! callback arrives, when its device disconnects, or when the optional
//! [`operation_timeout`][BridgeConfig::operation_timeout] expires.
//!
//! # Feature flags
//!
//! The `serde` feature is available to enable serializing/deserializing identifiers, configuration and event
//! messages.

pub mod blocking;
pub mod btuuid;
pub mod error;

mod async_util;
mod bridge;
mod config;
mod connection;
mod dispatch;
mod events;
mod registry;
mod transport;

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub use async_util::EventStream;
pub use bridge::Bridge;
pub use btuuid::BluetoothUuidExt;
pub use config::{BridgeConfig, Serialization};
pub use connection::ConnectionState;
pub use error::{Error, ErrorKind, GattStatus, RejectReason, Rejection};
pub use events::{ConnectionEvent, Message};
pub use transport::{DiscoveredCharacteristic, DiscoveredService, GattHandle, Transport, TransportEvent};
pub use uuid::Uuid;

/// Convenience alias for a result with [`Error`]
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// A stable device identifier, typically the Bluetooth address in the format `AB:CD:EF:01:23:45`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Creates a device identifier.
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        DeviceId(id.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        DeviceId(id)
    }
}

/// The radio's on/off/transitioning condition.
///
/// The discriminants are the values delivered to the caller-facing layer.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AvailabilityState {
    /// The state could not be determined
    #[default]
    Unknown = 0,
    /// The radio is turning on or off
    Resetting = 1,
    /// The host has no Bluetooth LE radio
    Unsupported = 2,
    /// The application may not use the radio
    Unauthorized = 3,
    /// The radio is off
    PoweredOff = 4,
    /// The radio is on and usable
    PoweredOn = 5,
}

impl AvailabilityState {
    /// Platform adapter state code for "off".
    pub const ADAPTER_STATE_OFF: i32 = 10;
    /// Platform adapter state code for "turning on".
    pub const ADAPTER_STATE_TURNING_ON: i32 = 11;
    /// Platform adapter state code for "on".
    pub const ADAPTER_STATE_ON: i32 = 12;
    /// Platform adapter state code for "turning off".
    pub const ADAPTER_STATE_TURNING_OFF: i32 = 13;

    /// Maps a platform adapter state code. `None` means the host has no adapter at all.
    pub fn from_adapter_state(state: Option<i32>) -> Self {
        match state {
            None => AvailabilityState::Unsupported,
            Some(Self::ADAPTER_STATE_OFF) => AvailabilityState::PoweredOff,
            Some(Self::ADAPTER_STATE_ON) => AvailabilityState::PoweredOn,
            Some(Self::ADAPTER_STATE_TURNING_ON | Self::ADAPTER_STATE_TURNING_OFF) => AvailabilityState::Resetting,
            Some(_) => AvailabilityState::Unknown,
        }
    }

    /// Whether existing connections cannot survive this state.
    pub(crate) fn drops_connections(self) -> bool {
        matches!(
            self,
            AvailabilityState::PoweredOff | AvailabilityState::Resetting | AvailabilityState::Unsupported
        )
    }
}

/// Manufacturer specific data included in Bluetooth advertisements. See the Bluetooth Core Specification Supplement
/// §A.1.4 for details.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManufacturerData {
    /// Company identifier (defined [here](https://www.bluetooth.com/specifications/assigned-numbers/company-identifiers/))
    pub company_id: u16,
    /// Manufacturer specific data
    pub data: Vec<u8>,
}

impl ManufacturerData {
    /// The raw header delivered with scan results: the company id as two little-endian bytes followed by the data.
    pub fn head(&self) -> Vec<u8> {
        let mut head = Vec::with_capacity(2 + self.data.len());
        head.extend_from_slice(&self.company_id.to_le_bytes());
        head.extend_from_slice(&self.data);
        head
    }
}

/// An advertisement received while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanResult {
    /// The advertiser
    pub device_id: DeviceId,
    /// The advertised local name, empty when none was advertised
    pub name: String,
    /// The first manufacturer specific data entry, if any
    pub manufacturer_data: Option<ManufacturerData>,
    /// The signal strength in dBm of the received advertisement packet
    pub rssi: i16,
}

impl ScanResult {
    /// See [`ManufacturerData::head`]. Empty when the advertisement carried no manufacturer data.
    pub fn manufacturer_data_head(&self) -> Vec<u8> {
        self.manufacturer_data.as_ref().map(ManufacturerData::head).unwrap_or_default()
    }
}

/// How a characteristic should push value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NotificationMode {
    /// Unacknowledged value pushes
    Notification,
    /// Acknowledged value pushes
    Indication,
    /// No value pushes
    Disabled,
}

impl NotificationMode {
    /// Parses the caller-facing mode name. Anything other than `notification` or `indication` disables pushes.
    pub fn from_name(name: &str) -> Self {
        match name {
            "notification" => NotificationMode::Notification,
            "indication" => NotificationMode::Indication,
            _ => NotificationMode::Disabled,
        }
    }

    /// The value written to the client characteristic configuration descriptor.
    pub fn descriptor_value(self) -> [u8; 2] {
        match self {
            NotificationMode::Notification => [0x01, 0x00],
            NotificationMode::Indication => [0x02, 0x00],
            NotificationMode::Disabled => [0x00, 0x00],
        }
    }

    /// Whether the local notify flag is enabled for this mode.
    pub fn is_enabled(self) -> bool {
        !matches!(self, NotificationMode::Disabled)
    }
}

/// Write procedure used for a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WriteType {
    /// Write request; the device acknowledges
    WithResponse,
    /// Write command; no acknowledgement
    WithoutResponse,
}

/// GATT characteristic properties as defined in the Bluetooth Core Specification, Vol 3, Part G, §3.3.1.1.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CharacteristicProperties {
    pub broadcast: bool,
    pub read: bool,
    pub write_without_response: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
    pub authenticated_signed_writes: bool,
    pub extended_properties: bool,
}

impl CharacteristicProperties {
    /// Decodes the properties octet of a characteristic declaration.
    pub fn from_bits(bits: u8) -> Self {
        let bit = |n: u8| bits & (1 << n) != 0;
        CharacteristicProperties {
            broadcast: bit(0),
            read: bit(1),
            write_without_response: bit(2),
            write: bit(3),
            notify: bit(4),
            indicate: bit(5),
            authenticated_signed_writes: bit(6),
            extended_properties: bit(7),
        }
    }

    /// The write procedure a stack picks by default for a characteristic with these properties.
    pub fn default_write_type(self) -> WriteType {
        if self.write || !self.write_without_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        }
    }
}
