// tests/common/mod.rs
#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    convert::Infallible,
    rc::Rc,
};

use anyhow::bail;
use embedded_hal::{delay::DelayNs, digital};
use esp32boiler::*;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    LedOn,
    LedOff,
    Activate,
    Scan,
    ConnectRequest(String),
    Disconnect,
    BrokerConnect(String),
    Publish(String, String),
    Convert,
    Read(Address),
}

/// Virtual clock in nanoseconds plus an ordered event log, shared by all mocks.
#[derive(Clone, Default)]
pub struct Rig {
    pub now_ns: Rc<Cell<u64>>,
    pub events: Rc<RefCell<Vec<Event>>>,
}

impl Rig {
    pub fn push(&self, e: Event) {
        self.events.borrow_mut().push(e);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn count(&self, f: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| f(e)).count()
    }

    pub fn publishes(&self) -> Vec<(String, String)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Publish(t, p) => Some((t.clone(), p.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.now_ns.get() / 1_000_000
    }

    pub fn indicator(&self, unit_ms: u32) -> Indicator<MockLed, MockDelay> {
        Indicator::new(
            MockLed {
                rig: self.clone(),
                lit: false,
                lit_ns: 0,
                lit_since: 0,
            },
            MockDelay { rig: self.clone() },
            unit_ms,
        )
    }
}

pub struct MockLed {
    rig: Rig,
    pub lit: bool,
    pub lit_ns: u64,
    lit_since: u64,
}

impl digital::ErrorType for MockLed {
    type Error = Infallible;
}

impl digital::OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.lit {
            self.lit_ns += self.rig.now_ns.get() - self.lit_since;
            self.rig.push(Event::LedOff);
        }
        self.lit = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.lit {
            self.lit_since = self.rig.now_ns.get();
            self.rig.push(Event::LedOn);
        }
        self.lit = true;
        Ok(())
    }
}

pub struct MockDelay {
    rig: Rig,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.rig.now_ns.set(self.rig.now_ns.get() + u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.rig.now_ns.set(self.rig.now_ns.get() + u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.rig.now_ns.set(self.rig.now_ns.get() + u64::from(ms) * 1_000_000);
    }
}

pub fn addr(rom: &str) -> Address {
    parse_rom(rom).unwrap()
}

pub struct MockBus {
    rig: Rig,
    pub sensors: Vec<Address>,
    pub temps: Vec<(Address, Option<f32>)>,
    pub scan_fails: bool,
    pub failing_sensor: Option<Address>,
}

impl MockBus {
    pub fn new(rig: &Rig, temps: &[(Address, Option<f32>)]) -> Self {
        MockBus {
            rig: rig.clone(),
            sensors: temps.iter().map(|(a, _)| *a).collect(),
            temps: temps.to_vec(),
            scan_fails: false,
            failing_sensor: None,
        }
    }
}

impl SensorBus for MockBus {
    fn scan(&mut self) -> anyhow::Result<Vec<Address>> {
        if self.scan_fails {
            bail!("bus stuck low");
        }
        Ok(self.sensors.clone())
    }

    fn convert_temp(&mut self) -> anyhow::Result<()> {
        self.rig.push(Event::Convert);
        Ok(())
    }

    fn read_temp(&mut self, address: &Address) -> anyhow::Result<Option<f32>> {
        self.rig.push(Event::Read(*address));
        if self.failing_sensor == Some(*address) {
            bail!("presence pulse missing");
        }
        Ok(self
            .temps
            .iter()
            .find(|(a, _)| a == address)
            .and_then(|(_, t)| *t))
    }
}

pub struct MockWifi {
    rig: Rig,
    /// failed association checks before each successful one
    pub misses_per_session: u32,
    misses_left: Cell<u32>,
    associated: Cell<bool>,
    /// the link drops after this many liveness checks while associated
    pub drop_after_checks: Option<u32>,
    checks: Cell<u32>,
    pub activate_failures: u32,
    pub connect_request_fails: bool,
    /// the n-th disconnect (1-based) fails
    pub fail_disconnect: Option<u32>,
    disconnects: u32,
    pub activations: u32,
}

impl MockWifi {
    pub fn new(rig: &Rig) -> Self {
        MockWifi {
            rig: rig.clone(),
            misses_per_session: 0,
            misses_left: Cell::new(0),
            associated: Cell::new(false),
            drop_after_checks: None,
            checks: Cell::new(0),
            activate_failures: 0,
            connect_request_fails: false,
            fail_disconnect: Some(1),
            disconnects: 0,
            activations: 0,
        }
    }
}

impl WifiLink for MockWifi {
    fn activate(&mut self) -> anyhow::Result<()> {
        self.rig.push(Event::Activate);
        self.activations += 1;
        if self.activate_failures > 0 {
            self.activate_failures -= 1;
            bail!("radio calibration failed");
        }
        self.misses_left.set(self.misses_per_session);
        Ok(())
    }

    fn scan(&mut self) -> anyhow::Result<Vec<AccessPoint>> {
        self.rig.push(Event::Scan);
        Ok(vec![AccessPoint {
            ssid: "internet".into(),
            channel: 6,
            rssi: -61,
        }])
    }

    fn is_associated(&self) -> anyhow::Result<bool> {
        if self.associated.get() {
            if let Some(limit) = self.drop_after_checks {
                self.checks.set(self.checks.get() + 1);
                if self.checks.get() > limit {
                    self.associated.set(false);
                }
            }
        }
        Ok(self.associated.get())
    }

    fn request_connect(&mut self, ssid: &str, _password: &str) -> anyhow::Result<()> {
        self.rig.push(Event::ConnectRequest(ssid.into()));
        if self.misses_left.get() > 0 {
            self.misses_left.set(self.misses_left.get() - 1);
        } else {
            self.associated.set(true);
            self.checks.set(0);
        }
        if self.connect_request_fails {
            bail!("ESP_ERR_WIFI_CONN");
        }
        Ok(())
    }

    fn status(&self) -> String {
        "ip 192.168.1.50".into()
    }

    fn rssi(&self) -> Option<i8> {
        self.associated.get().then_some(-61)
    }

    fn disconnect(&mut self) -> anyhow::Result<()> {
        self.rig.push(Event::Disconnect);
        self.associated.set(false);
        self.disconnects += 1;
        if self.fail_disconnect == Some(self.disconnects) {
            bail!("wifi driver gone");
        }
        Ok(())
    }
}

pub struct MockBroker {
    rig: Rig,
    /// queued handshake outcomes, success once empty
    pub outcomes: VecDeque<bool>,
    /// every client fails its publish number n (1-based)
    pub fail_publish: Option<u32>,
}

impl MockBroker {
    pub fn new(rig: &Rig) -> Self {
        MockBroker {
            rig: rig.clone(),
            outcomes: VecDeque::new(),
            fail_publish: None,
        }
    }
}

pub struct MockClient {
    rig: Rig,
    fail_publish: Option<u32>,
    sent: u32,
}

impl BrokerConnector for MockBroker {
    type Client = MockClient;

    fn connect(&mut self, endpoint: &BrokerEndpoint) -> anyhow::Result<MockClient> {
        self.rig.push(Event::BrokerConnect(endpoint.url.clone()));
        if !self.outcomes.pop_front().unwrap_or(true) {
            bail!("connection refused");
        }
        Ok(MockClient {
            rig: self.rig.clone(),
            fail_publish: self.fail_publish,
            sent: 0,
        })
    }
}

impl BrokerClient for MockClient {
    fn publish(&mut self, topic: &str, payload: &str) -> anyhow::Result<()> {
        self.sent += 1;
        if self.fail_publish == Some(self.sent) {
            bail!("broken pipe");
        }
        self.rig.push(Event::Publish(topic.into(), payload.into()));
        Ok(())
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        ssid: "internet".into(),
        password: "password".into(),
    }
}

pub fn endpoint() -> BrokerEndpoint {
    BrokerEndpoint {
        url: "mqtt://mqtt.local:1883".into(),
        client_id: "boiler".into(),
        keepalive: MQTT_KEEPALIVE,
    }
}

// EOF
