//! Drives a [`Bridge`] against an in-process simulated peripheral whose "radio" answers every request from a
//! separate thread after a short delay, the way a platform callback thread would.

use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use futures_lite::StreamExt;
use gatt_bridge::btuuid::descriptors::CLIENT_CHARACTERISTIC_CONFIGURATION;
use gatt_bridge::*;
use tracing::metadata::LevelFilter;
use tracing::{info, warn};

const LED_AND_BUTTON_SERVICE: Uuid = Uuid::from_u128(0x00001523_1212_efde_1523_785feabcd123);
const BUTTON_STATE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x00001524_1212_efde_1523_785feabcd123);
const LED_STATE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x00001525_1212_efde_1523_785feabcd123);

const LATENCY: Duration = Duration::from_millis(50);

/// A radio whose callbacks are delivered on their own thread through `callbacks`.
#[derive(Clone)]
struct SimulatedRadio {
    callbacks: async_channel::Sender<TransportEvent>,
}

struct SimulatedLink {
    id: DeviceId,
    callbacks: async_channel::Sender<TransportEvent>,
}

impl SimulatedRadio {
    fn answer(callbacks: &async_channel::Sender<TransportEvent>, event: TransportEvent) {
        let callbacks = callbacks.clone();
        thread::spawn(move || {
            thread::sleep(LATENCY);
            let _ = callbacks.send_blocking(event);
        });
    }
}

impl Transport for SimulatedRadio {
    type Handle = SimulatedLink;

    fn availability(&self) -> AvailabilityState {
        AvailabilityState::PoweredOn
    }

    fn start_scan(&self, _services: &[Uuid]) -> Result<(), Rejection> {
        Self::answer(
            &self.callbacks,
            TransportEvent::ScanResult(ScanResult {
                device_id: "C0:FF:EE:00:00:01".into(),
                name: "Blinky".into(),
                manufacturer_data: Some(ManufacturerData {
                    company_id: 0x0059,
                    data: vec![0x01],
                }),
                rssi: -58,
            }),
        );
        Ok(())
    }

    fn stop_scan(&self) -> Result<(), Rejection> {
        Ok(())
    }

    fn connect(&self, id: &DeviceId) -> Result<SimulatedLink, Rejection> {
        Self::answer(
            &self.callbacks,
            TransportEvent::ConnectionStateChanged {
                device_id: id.clone(),
                status: GattStatus::SUCCESS,
                connected: true,
            },
        );
        Ok(SimulatedLink {
            id: id.clone(),
            callbacks: self.callbacks.clone(),
        })
    }
}

impl GattHandle for SimulatedLink {
    fn discover_services(&self) -> Result<(), Rejection> {
        let button_properties = CharacteristicProperties::from_bits(0x12);
        let button = DiscoveredCharacteristic::new(BUTTON_STATE_CHARACTERISTIC, button_properties)
            .with_descriptor(CLIENT_CHARACTERISTIC_CONFIGURATION);
        let led = DiscoveredCharacteristic::new(LED_STATE_CHARACTERISTIC, CharacteristicProperties::from_bits(0x0a));
        SimulatedRadio::answer(
            &self.callbacks,
            TransportEvent::ServicesDiscovered {
                device_id: self.id.clone(),
                status: GattStatus::SUCCESS,
                services: vec![DiscoveredService {
                    uuid: LED_AND_BUTTON_SERVICE,
                    characteristics: vec![button, led],
                }],
            },
        );
        Ok(())
    }

    fn read_characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<(), Rejection> {
        SimulatedRadio::answer(
            &self.callbacks,
            TransportEvent::CharacteristicRead {
                device_id: self.id.clone(),
                service,
                characteristic,
                value: vec![0x00],
                status: GattStatus::SUCCESS,
            },
        );
        Ok(())
    }

    fn write_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
        _value: &[u8],
        _write_type: WriteType,
    ) -> Result<(), Rejection> {
        SimulatedRadio::answer(
            &self.callbacks,
            TransportEvent::CharacteristicWrite {
                device_id: self.id.clone(),
                service,
                characteristic,
                status: GattStatus::SUCCESS,
            },
        );
        Ok(())
    }

    fn set_characteristic_notification(&self, _: Uuid, _: Uuid, _: bool) -> Result<(), Rejection> {
        Ok(())
    }

    fn write_descriptor(
        &self,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<(), Rejection> {
        SimulatedRadio::answer(
            &self.callbacks,
            TransportEvent::DescriptorWrite {
                device_id: self.id.clone(),
                service,
                characteristic,
                descriptor,
                status: GattStatus::SUCCESS,
            },
        );
        if value != [0, 0] {
            // the button is pressed and released a moment later
            for state in [0x01, 0x00] {
                SimulatedRadio::answer(
                    &self.callbacks,
                    TransportEvent::CharacteristicChanged {
                        device_id: self.id.clone(),
                        service,
                        characteristic,
                        value: vec![state],
                    },
                );
            }
        }
        Ok(())
    }

    fn request_mtu(&self, mtu: u16) -> Result<(), Rejection> {
        SimulatedRadio::answer(
            &self.callbacks,
            TransportEvent::MtuChanged {
                device_id: self.id.clone(),
                mtu: mtu.min(247),
                status: GattStatus::SUCCESS,
            },
        );
        Ok(())
    }

    fn disconnect(&self) {
        info!("{}: link down", self.id);
    }

    fn close(&self) {}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let (sender, receiver) = async_channel::unbounded();
    let config = BridgeConfig::default().with_operation_timeout(Duration::from_secs(5));
    let bridge = Arc::new(Bridge::new(SimulatedRadio { callbacks: sender }, config));

    // the callback pump: every host callback goes through `handle_event`
    tokio::spawn({
        let bridge = bridge.clone();
        async move {
            while let Ok(event) = receiver.recv().await {
                bridge.handle_event(event);
            }
        }
    });

    let mut messages = bridge.messages();
    let device = {
        info!("starting scan");
        let mut scan = bridge.scan_results();
        bridge.start_scan(&[LED_AND_BUTTON_SERVICE])?;
        let found = scan.next().await.ok_or("scan terminated")?;
        bridge.stop_scan()?;
        info!("found {} ({}) at {}dBm", found.name, found.device_id, found.rssi);
        found.device_id
    };

    bridge.connect(&device)?;
    loop {
        match messages.next().await.ok_or("message feed ended")? {
            Message::ConnectionState { state, .. } => {
                info!("{device}: {state:?}");
                if state == ConnectionEvent::Connected {
                    bridge.request_mtu(&device, 512).await?;
                    bridge.discover_services(&device)?;
                }
            }
            Message::ServiceDiscovered { service, characteristics, .. } => {
                info!("{device}: service {service} with {} characteristics", characteristics.len());
                break;
            }
            Message::MtuChanged { mtu, .. } => info!("{device}: MTU {mtu}"),
            other => warn!("unexpected {other:?}"),
        }
    }

    let led = bridge
        .read_characteristic(&device, LED_AND_BUTTON_SERVICE, LED_STATE_CHARACTERISTIC)
        .await?;
    info!("LED state is {led:?}");
    bridge
        .write_characteristic(&device, LED_AND_BUTTON_SERVICE, LED_STATE_CHARACTERISTIC, &[0x01])
        .await?;
    info!("LED switched on");

    bridge
        .configure_notification(
            &device,
            LED_AND_BUTTON_SERVICE,
            BUTTON_STATE_CHARACTERISTIC,
            NotificationMode::Notification,
        )
        .await?;
    info!("waiting for button changes");

    let mut presses = 0;
    while presses < 2 {
        if let Message::CharacteristicValue {
            characteristic, value, ..
        } = messages.next().await.ok_or("message feed ended")?
        {
            if characteristic == BUTTON_STATE_CHARACTERISTIC {
                info!("button state changed: {value:?}");
                presses += 1;
            }
        }
    }

    bridge.disconnect(&device)?;
    info!("disconnected");
    Ok(())
}
