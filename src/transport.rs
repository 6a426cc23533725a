//! The narrow interface to the host radio stack.
//!
//! Every call here is fire-and-forget: `Ok(())` means the stack accepted the request and will report the outcome
//! later through exactly one [`TransportEvent`] (or the device disconnects first). `Err` means the stack refused to
//! even start.

use crate::error::{GattStatus, Rejection};
use crate::{AvailabilityState, CharacteristicProperties, DeviceId, ScanResult, Uuid, WriteType};

/// Adapter-level access to the host radio stack.
pub trait Transport: Send + Sync + 'static {
    /// Connection handle produced by [`Transport::connect`]. The bridge owns it exclusively until it is closed.
    type Handle: GattHandle;

    /// The current radio state.
    fn availability(&self) -> AvailabilityState;

    /// Starts scanning. A non-empty `services` restricts results to advertisers of any of those services.
    fn start_scan(&self, services: &[Uuid]) -> Result<(), Rejection>;

    /// Stops a running scan.
    fn stop_scan(&self) -> Result<(), Rejection>;

    /// Starts connecting to `id`. The outcome is reported with [`TransportEvent::ConnectionStateChanged`].
    ///
    /// The bridge holds its device registry while this runs, so the outcome must not be fed back into
    /// [`Bridge::handle_event`][crate::Bridge::handle_event] from inside this call.
    fn connect(&self, id: &DeviceId) -> Result<Self::Handle, Rejection>;
}

/// Per-connection access to the host radio stack.
pub trait GattHandle: Send + Sync + 'static {
    /// Starts service discovery; reported with [`TransportEvent::ServicesDiscovered`].
    fn discover_services(&self) -> Result<(), Rejection>;

    /// Starts a read; reported with [`TransportEvent::CharacteristicRead`].
    fn read_characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<(), Rejection>;

    /// Starts a write; reported with [`TransportEvent::CharacteristicWrite`].
    fn write_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        write_type: WriteType,
    ) -> Result<(), Rejection>;

    /// Toggles the stack's local routing of value pushes for a characteristic. Completes synchronously.
    fn set_characteristic_notification(&self, service: Uuid, characteristic: Uuid, enable: bool)
        -> Result<(), Rejection>;

    /// Starts a descriptor write; reported with [`TransportEvent::DescriptorWrite`].
    fn write_descriptor(
        &self,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<(), Rejection>;

    /// Starts MTU negotiation; reported with [`TransportEvent::MtuChanged`].
    fn request_mtu(&self, mtu: u16) -> Result<(), Rejection>;

    /// Tears down the link.
    fn disconnect(&self);

    /// Releases the handle. No callbacks are expected afterwards.
    fn close(&self);
}

/// A characteristic reported by service discovery
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredCharacteristic {
    /// The characteristic type
    pub uuid: Uuid,
    /// Declared properties
    pub properties: CharacteristicProperties,
    /// The write procedure the stack has configured for this characteristic
    pub write_type: WriteType,
    /// Descriptors present on the characteristic
    pub descriptors: Vec<Uuid>,
}

impl DiscoveredCharacteristic {
    /// Creates a characteristic whose write type follows its properties.
    pub fn new(uuid: Uuid, properties: CharacteristicProperties) -> Self {
        DiscoveredCharacteristic {
            uuid,
            properties,
            write_type: properties.default_write_type(),
            descriptors: Vec::new(),
        }
    }

    /// Adds a descriptor.
    pub fn with_descriptor(mut self, descriptor: Uuid) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Overrides the configured write type.
    pub fn with_write_type(mut self, write_type: WriteType) -> Self {
        self.write_type = write_type;
        self
    }
}

/// A service reported by service discovery
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredService {
    /// The service type
    pub uuid: Uuid,
    /// Characteristics of the service
    pub characteristics: Vec<DiscoveredCharacteristic>,
}

/// Callbacks from the host radio stack, fed to [`Bridge::handle_event`][crate::Bridge::handle_event].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The radio changed state
    AvailabilityChanged(AvailabilityState),
    /// An advertisement was received
    ScanResult(ScanResult),
    /// The running scan failed with a platform error code
    ScanFailed {
        /// Platform error code
        code: i32,
    },
    /// The link to a device changed state
    ConnectionStateChanged {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        status: GattStatus,
        /// `true` for a newly established link, `false` for any loss
        connected: bool,
    },
    /// Service discovery finished
    ServicesDiscovered {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        status: GattStatus,
        #[allow(missing_docs)]
        services: Vec<DiscoveredService>,
    },
    /// A read finished
    CharacteristicRead {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        service: Uuid,
        #[allow(missing_docs)]
        characteristic: Uuid,
        #[allow(missing_docs)]
        value: Vec<u8>,
        #[allow(missing_docs)]
        status: GattStatus,
    },
    /// A write finished
    CharacteristicWrite {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        service: Uuid,
        #[allow(missing_docs)]
        characteristic: Uuid,
        #[allow(missing_docs)]
        status: GattStatus,
    },
    /// The device pushed a value (notification or indication)
    CharacteristicChanged {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        service: Uuid,
        #[allow(missing_docs)]
        characteristic: Uuid,
        #[allow(missing_docs)]
        value: Vec<u8>,
    },
    /// A descriptor write finished
    DescriptorWrite {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        service: Uuid,
        #[allow(missing_docs)]
        characteristic: Uuid,
        #[allow(missing_docs)]
        descriptor: Uuid,
        #[allow(missing_docs)]
        status: GattStatus,
    },
    /// MTU negotiation finished
    MtuChanged {
        #[allow(missing_docs)]
        device_id: DeviceId,
        #[allow(missing_docs)]
        mtu: u16,
        #[allow(missing_docs)]
        status: GattStatus,
    },
}
