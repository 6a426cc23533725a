#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gatt_bridge::btuuid::{descriptors, BluetoothUuidExt};
use gatt_bridge::*;

pub const SERVICE: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
pub const MEASUREMENT: Uuid = Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);
pub const CONTROL_POINT: Uuid = Uuid::from_u128(0x00002a39_0000_1000_8000_00805f9b34fb);

/// Every call the bridge made into the host stack, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartScan(Vec<Uuid>),
    StopScan,
    Connect(DeviceId),
    DiscoverServices(DeviceId),
    Read(DeviceId, Uuid),
    Write(DeviceId, Uuid, Vec<u8>, WriteType),
    SetNotification(DeviceId, Uuid, bool),
    WriteDescriptor(DeviceId, Uuid, Uuid, Vec<u8>),
    RequestMtu(DeviceId, u16),
    Disconnect(DeviceId),
    Close(DeviceId),
}

#[derive(Default)]
struct MockState {
    availability: Option<AvailabilityState>,
    calls: Vec<Call>,
    rejections: HashMap<&'static str, RejectReason>,
}

/// A host stack that records calls and never calls back on its own; tests feed callbacks explicitly.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

pub struct MockHandle {
    id: DeviceId,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.set_availability(AvailabilityState::PoweredOn);
        mock
    }

    pub fn set_availability(&self, state: AvailabilityState) {
        self.state.lock().unwrap().availability = Some(state);
    }

    /// Makes every later call named `op` fail to start.
    pub fn reject(&self, op: &'static str, reason: RejectReason) {
        self.state.lock().unwrap().rejections.insert(op, reason);
    }

    pub fn accept(&self, op: &'static str) {
        self.state.lock().unwrap().rejections.remove(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| matches(c)).count()
    }

    /// Waits until at least `n` recorded calls satisfy `matches`.
    pub async fn wait_for(&self, n: usize, matches: impl Fn(&Call) -> bool) {
        for _ in 0..500 {
            if self.count(&matches) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("expected call never issued, got {:?}", self.calls());
    }
}

fn record(state: &Mutex<MockState>, op: &'static str, call: Call) -> Result<(), Rejection> {
    let mut state = state.lock().unwrap();
    if let Some(reason) = state.rejections.get(op) {
        return Err(Rejection::new(*reason, format!("{op} refused")));
    }
    state.calls.push(call);
    Ok(())
}

impl Transport for MockTransport {
    type Handle = MockHandle;

    fn availability(&self) -> AvailabilityState {
        self.state.lock().unwrap().availability.unwrap_or_default()
    }

    fn start_scan(&self, services: &[Uuid]) -> Result<(), Rejection> {
        record(&self.state, "start_scan", Call::StartScan(services.to_vec()))
    }

    fn stop_scan(&self) -> Result<(), Rejection> {
        record(&self.state, "stop_scan", Call::StopScan)
    }

    fn connect(&self, id: &DeviceId) -> Result<MockHandle, Rejection> {
        record(&self.state, "connect", Call::Connect(id.clone()))?;
        Ok(MockHandle {
            id: id.clone(),
            state: self.state.clone(),
        })
    }
}

impl GattHandle for MockHandle {
    fn discover_services(&self) -> Result<(), Rejection> {
        record(&self.state, "discover_services", Call::DiscoverServices(self.id.clone()))
    }

    fn read_characteristic(&self, _service: Uuid, characteristic: Uuid) -> Result<(), Rejection> {
        record(&self.state, "read", Call::Read(self.id.clone(), characteristic))
    }

    fn write_characteristic(
        &self,
        _service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        write_type: WriteType,
    ) -> Result<(), Rejection> {
        record(
            &self.state,
            "write",
            Call::Write(self.id.clone(), characteristic, value.to_vec(), write_type),
        )
    }

    fn set_characteristic_notification(
        &self,
        _service: Uuid,
        characteristic: Uuid,
        enable: bool,
    ) -> Result<(), Rejection> {
        record(
            &self.state,
            "set_notification",
            Call::SetNotification(self.id.clone(), characteristic, enable),
        )
    }

    fn write_descriptor(
        &self,
        _service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<(), Rejection> {
        record(
            &self.state,
            "write_descriptor",
            Call::WriteDescriptor(self.id.clone(), characteristic, descriptor, value.to_vec()),
        )
    }

    fn request_mtu(&self, mtu: u16) -> Result<(), Rejection> {
        record(&self.state, "request_mtu", Call::RequestMtu(self.id.clone(), mtu))
    }

    fn disconnect(&self) {
        self.state.lock().unwrap().calls.push(Call::Disconnect(self.id.clone()));
    }

    fn close(&self) {
        self.state.lock().unwrap().calls.push(Call::Close(self.id.clone()));
    }
}

/// A heart-rate-like profile: a notifying measurement and a writable control point.
pub fn profile() -> Vec<DiscoveredService> {
    vec![DiscoveredService {
        uuid: SERVICE,
        characteristics: vec![
            DiscoveredCharacteristic::new(MEASUREMENT, CharacteristicProperties::from_bits(0x12))
                .with_descriptor(descriptors::CLIENT_CHARACTERISTIC_CONFIGURATION),
            DiscoveredCharacteristic::new(CONTROL_POINT, CharacteristicProperties::from_bits(0x0a))
                .with_descriptor(Uuid::from_u16(0x2901)),
        ],
    }]
}

/// Installs a test-writer subscriber once per test binary; `RUST_LOG` selects what is shown.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn bridge(config: BridgeConfig) -> (Arc<Bridge<MockTransport>>, MockTransport) {
    init_tracing();
    let mock = MockTransport::new();
    (Arc::new(Bridge::new(mock.clone(), config)), mock)
}

/// Connects `id` and runs discovery, answering both callbacks.
pub fn establish(bridge: &Bridge<MockTransport>, id: &str) -> DeviceId {
    let id = DeviceId::from(id);
    bridge.connect(&id).unwrap();
    bridge.handle_event(TransportEvent::ConnectionStateChanged {
        device_id: id.clone(),
        status: GattStatus::SUCCESS,
        connected: true,
    });
    bridge.discover_services(&id).unwrap();
    bridge.handle_event(TransportEvent::ServicesDiscovered {
        device_id: id.clone(),
        status: GattStatus::SUCCESS,
        services: profile(),
    });
    id
}

pub fn write_done(id: &DeviceId, characteristic: Uuid) -> TransportEvent {
    TransportEvent::CharacteristicWrite {
        device_id: id.clone(),
        service: SERVICE,
        characteristic,
        status: GattStatus::SUCCESS,
    }
}

pub fn link_lost(id: &DeviceId) -> TransportEvent {
    TransportEvent::ConnectionStateChanged {
        device_id: id.clone(),
        status: GattStatus(8),
        connected: false,
    }
}
