//! Fake collaborators for deterministic tests without radio or broker.

use crate::acquisition::{CharacteristicHandle, GattConnection, GattConnector, GattError};
use crate::address::DeviceAddress;
use crate::decoder::{WavePlusRecord, WaveRegisters, decode_wave, decode_wave_plus};
use crate::publish::{Broker, BrokerError, BrokerSession, BrokerSettings, NetworkMonitor};
use crate::reading::DecodedReading;
use crate::scanner::{Advertisement, ScanError, Scanner};
use crate::sensor::{
    WAVE_HUMIDITY, WAVE_PLUS_CURRENT_VALUES, WAVE_PLUS_SERVICE, WAVE_RADON_LONG_TERM,
    WAVE_RADON_SHORT_TERM, WAVE_SERVICE, WAVE_TEMPERATURE,
};
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A stable device address for unit tests.
pub const TEST_ADDRESS: DeviceAddress = DeviceAddress([0x98, 0x07, 0x2D, 0x0A, 0x1B, 0x2C]);

/// A second address, used for non-matching advertisements.
pub const OTHER_ADDRESS: DeviceAddress = DeviceAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

/// A Wave Plus record: version 1, humidity 45.5 %, light 12, radon 47/52,
/// 21.50 degrees, 1001.5 hPa, 812 ppm CO2, 95 ppb VOC.
pub fn wave_plus_bytes() -> [u8; 16] {
    [
        0x01, // version
        0x5B, // humidity: 91 / 2 = 45.5
        0x0C, // ambient light
        0x00, // unused
        0x2F, 0x00, // radon short-term: 47
        0x34, 0x00, // radon long-term: 52
        0x66, 0x08, // temperature: 2150 / 100 = 21.50
        0x9B, 0xC3, // pressure: 50075 / 50 = 1001.5
        0x2C, 0x03, // CO2: 812
        0x5F, 0x00, // VOC: 95
    ]
}

pub fn wave_reading() -> DecodedReading {
    decode_wave(&WaveRegisters {
        temperature: 2150,
        humidity: 4567,
        radon_short_term: 185,
        radon_long_term: 74,
    })
}

pub fn wave_plus_reading() -> DecodedReading {
    decode_wave_plus(&WavePlusRecord::parse(&wave_plus_bytes()).unwrap())
}

pub fn broker_settings() -> BrokerSettings {
    BrokerSettings {
        host: "broker.test".to_string(),
        port: 1883,
        client_id: "wave-test".to_string(),
        username: None,
        password: None,
        timeout: Duration::from_secs(5),
    }
}

/// Scanner that replays a fixed list of advertisements.
#[derive(Debug)]
pub struct FakeScanner {
    advertisements: Vec<Advertisement>,
    /// Keep the channel open after replaying, like a real scan
    open_ended: bool,
    fail: bool,
    scans: AtomicUsize,
}

impl FakeScanner {
    /// Replays `advertisements`, then closes the channel.
    pub fn new(advertisements: Vec<Advertisement>) -> Self {
        Self {
            advertisements,
            open_ended: false,
            fail: false,
            scans: AtomicUsize::new(0),
        }
    }

    /// Replays `advertisements`, then keeps the scan running until dropped.
    pub fn open_ended(advertisements: Vec<Advertisement>) -> Self {
        Self {
            open_ended: true,
            ..Self::new(advertisements)
        }
    }

    /// Fails to start scanning.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl Scanner for FakeScanner {
    fn start_scan<'a>(
        &'a self,
        _services: &'a [Uuid],
    ) -> BoxFuture<'a, Result<mpsc::Receiver<Advertisement>, ScanError>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let advertisements = self.advertisements.clone();
        let fail = self.fail;
        let open_ended = self.open_ended;
        Box::pin(async move {
            if fail {
                return Err(ScanError::Bluetooth("adapter unavailable".to_string()));
            }
            let (tx, rx) = mpsc::channel(advertisements.len().max(1));
            for advertisement in advertisements {
                let _ = tx.try_send(advertisement);
            }
            if open_ended {
                tokio::spawn(async move { tx.closed().await });
            }
            Ok(rx)
        })
    }
}

/// The services and characteristic values a fake device exposes.
#[derive(Debug, Clone, Default)]
pub struct FakeDevice {
    services: HashSet<Uuid>,
    /// Service queries fail, as when the link drops while services resolve
    services_unavailable: bool,
    values: HashMap<(Uuid, Uuid), Option<Vec<u8>>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, service: Uuid) -> Self {
        self.services.insert(service);
        self
    }

    pub fn with_value(mut self, service: Uuid, characteristic: Uuid, value: Vec<u8>) -> Self {
        self.values.insert((service, characteristic), Some(value));
        self
    }

    /// The characteristic exists but reads return no data.
    pub fn with_empty_value(mut self, service: Uuid, characteristic: Uuid) -> Self {
        self.values.insert((service, characteristic), None);
        self
    }

    pub fn without_value(mut self, service: Uuid, characteristic: Uuid) -> Self {
        self.values.remove(&(service, characteristic));
        self
    }

    pub fn with_unavailable_services(mut self) -> Self {
        self.services_unavailable = true;
        self
    }
}

/// First-generation Wave: 21.50 degrees, 45.67 %, radon 185/74 Bq/m3.
pub fn fake_wave_device() -> FakeDevice {
    FakeDevice::new()
        .with_service(WAVE_SERVICE)
        .with_value(WAVE_SERVICE, WAVE_TEMPERATURE, 2150u16.to_le_bytes().to_vec())
        .with_value(WAVE_SERVICE, WAVE_HUMIDITY, 4567u16.to_le_bytes().to_vec())
        .with_value(WAVE_SERVICE, WAVE_RADON_SHORT_TERM, 185u16.to_le_bytes().to_vec())
        .with_value(WAVE_SERVICE, WAVE_RADON_LONG_TERM, 74u16.to_le_bytes().to_vec())
}

/// Wave Plus exposing [`wave_plus_bytes`].
pub fn fake_wave_plus_device() -> FakeDevice {
    FakeDevice::new()
        .with_service(WAVE_PLUS_SERVICE)
        .with_value(
            WAVE_PLUS_SERVICE,
            WAVE_PLUS_CURRENT_VALUES,
            wave_plus_bytes().to_vec(),
        )
}

#[derive(Debug, Default)]
struct ConnectionLog {
    connects: usize,
    disconnects: usize,
    reads: Vec<(Uuid, Uuid)>,
}

/// Connector handing out connections to a single fake device.
#[derive(Debug)]
pub struct FakeConnector {
    device: Option<FakeDevice>,
    fail_disconnect: bool,
    log: Arc<Mutex<ConnectionLog>>,
}

impl FakeConnector {
    pub fn new(device: FakeDevice) -> Self {
        Self {
            device: Some(device),
            fail_disconnect: false,
            log: Arc::default(),
        }
    }

    /// Every connection attempt fails.
    pub fn unreachable() -> Self {
        Self {
            device: None,
            ..Self::new(FakeDevice::new())
        }
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn connects(&self) -> usize {
        self.log.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> usize {
        self.log.lock().unwrap().disconnects
    }

    /// Characteristics read so far, as `(service, characteristic)`.
    pub fn reads(&self) -> Vec<(Uuid, Uuid)> {
        self.log.lock().unwrap().reads.clone()
    }
}

impl GattConnector for FakeConnector {
    fn connect(
        &self,
        _address: DeviceAddress,
    ) -> BoxFuture<'_, Result<Box<dyn GattConnection>, GattError>> {
        self.log.lock().unwrap().connects += 1;
        let result: Result<Box<dyn GattConnection>, GattError> = match self.device.clone() {
            Some(device) => Ok(Box::new(FakeConnection {
                device,
                located: Vec::new(),
                fail_disconnect: self.fail_disconnect,
                log: Arc::clone(&self.log),
            })),
            None => Err(GattError::Bluetooth("connection refused".to_string())),
        };
        Box::pin(async move { result })
    }
}

struct FakeConnection {
    device: FakeDevice,
    located: Vec<(Uuid, Uuid)>,
    fail_disconnect: bool,
    log: Arc<Mutex<ConnectionLog>>,
}

impl GattConnection for FakeConnection {
    fn has_service(&mut self, service: Uuid) -> BoxFuture<'_, Result<bool, GattError>> {
        let result = if self.device.services_unavailable {
            Err(GattError::Bluetooth("services not resolved".to_string()))
        } else {
            Ok(self.device.services.contains(&service))
        };
        Box::pin(async move { result })
    }

    fn characteristic(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> BoxFuture<'_, Result<Option<CharacteristicHandle>, GattError>> {
        let key = (service, characteristic);
        let handle = self.device.values.contains_key(&key).then(|| {
            self.located.push(key);
            CharacteristicHandle(self.located.len() - 1)
        });
        Box::pin(async move { Ok::<_, GattError>(handle) })
    }

    fn read(
        &mut self,
        handle: CharacteristicHandle,
    ) -> BoxFuture<'_, Result<Option<Vec<u8>>, GattError>> {
        let key = self.located[handle.0];
        self.log.lock().unwrap().reads.push(key);
        let value = self.device.values.get(&key).cloned().flatten();
        Box::pin(async move { Ok::<_, GattError>(value) })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<(), GattError>> {
        self.log.lock().unwrap().disconnects += 1;
        let fail = self.fail_disconnect;
        Box::pin(async move {
            if fail {
                Err(GattError::Bluetooth("already disconnected".to_string()))
            } else {
                Ok(())
            }
        })
    }
}

/// Network that comes up after a number of failed checks.
#[derive(Debug)]
pub struct FakeNetwork {
    offline_checks: usize,
    checks: AtomicUsize,
}

impl FakeNetwork {
    pub fn online() -> Self {
        Self::connected_after(0)
    }

    pub fn offline() -> Self {
        Self::connected_after(usize::MAX)
    }

    pub fn connected_after(offline_checks: usize) -> Self {
        Self {
            offline_checks,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl NetworkMonitor for FakeNetwork {
    fn is_connected(&self) -> BoxFuture<'_, bool> {
        let previous = self.checks.fetch_add(1, Ordering::SeqCst);
        let connected = previous >= self.offline_checks;
        Box::pin(async move { connected })
    }
}

#[derive(Debug, Default)]
struct BrokerLog {
    connects: usize,
    attempts: usize,
    closed: usize,
    messages: Vec<(String, String)>,
}

/// Broker recording every message it accepts.
#[derive(Debug, Default)]
pub struct FakeBroker {
    refuse: bool,
    fail_at: Option<usize>,
    log: Arc<Mutex<BrokerLog>>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connection attempt is refused.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// The publish attempt with zero-based index `index` fails.
    pub fn failing_publish_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn connects(&self) -> usize {
        self.log.lock().unwrap().connects
    }

    pub fn attempts(&self) -> usize {
        self.log.lock().unwrap().attempts
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().messages.clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.messages().into_iter().map(|(topic, _)| topic).collect()
    }
}

impl Broker for FakeBroker {
    fn connect<'a>(
        &'a self,
        _settings: &'a BrokerSettings,
    ) -> BoxFuture<'a, Result<Box<dyn BrokerSession>, BrokerError>> {
        self.log.lock().unwrap().connects += 1;
        let result: Result<Box<dyn BrokerSession>, BrokerError> = if self.refuse {
            Err(BrokerError::Connect("connection refused".to_string()))
        } else {
            Ok(Box::new(FakeSession {
                fail_at: self.fail_at,
                log: Arc::clone(&self.log),
            }))
        };
        Box::pin(async move { result })
    }
}

struct FakeSession {
    fail_at: Option<usize>,
    log: Arc<Mutex<BrokerLog>>,
}

impl BrokerSession for FakeSession {
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<(), BrokerError>> {
        let mut log = self.log.lock().unwrap();
        let attempt = log.attempts;
        log.attempts += 1;
        let result = if self.fail_at == Some(attempt) {
            Err(BrokerError::Publish("broker went away".to_string()))
        } else {
            log.messages.push((topic.to_string(), payload.to_string()));
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        self.log.lock().unwrap().closed += 1;
        Box::pin(async {})
    }
}
