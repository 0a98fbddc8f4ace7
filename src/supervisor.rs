// supervisor.rs

use std::fmt;

use embedded_hal::{delay::DelayNs, digital::OutputPin};
use log::*;
use one_wire_bus::Address;

use crate::*;

const EXIT_PULSES: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    Associating,
    BrokerConnecting,
    Publishing,
    Faulted,
    Terminating,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceState::Associating => "associating",
            DeviceState::BrokerConnecting => "connecting broker",
            DeviceState::Publishing => "publishing",
            DeviceState::Faulted => "faulted",
            DeviceState::Terminating => "terminating",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum Termination {
    NoSensors,
    Fault(anyhow::Error),
}

pub struct Supervisor<B, W, K, P, D, S, R = ConstantDelay> {
    config: MyConfig,
    topics: TopicTable,
    bus: B,
    wifi: W,
    broker: K,
    indicator: Indicator<P, D>,
    stop: S,
    retry: R,
    state: DeviceState,
}

impl<B, W, K, P, D, S> Supervisor<B, W, K, P, D, S>
where
    B: SensorBus,
    W: WifiLink,
    K: BrokerConnector,
    P: OutputPin,
    D: DelayNs,
    S: StopRequest,
{
    pub fn new(
        config: MyConfig,
        topics: TopicTable,
        bus: B,
        wifi: W,
        broker: K,
        indicator: Indicator<P, D>,
        stop: S,
    ) -> Self {
        let retry = ConstantDelay(config.settle_units);
        Supervisor {
            config,
            topics,
            bus,
            wifi,
            broker,
            indicator,
            stop,
            retry,
            state: DeviceState::Associating,
        }
    }
}

impl<B, W, K, P, D, S, R> Supervisor<B, W, K, P, D, S, R>
where
    B: SensorBus,
    W: WifiLink,
    K: BrokerConnector,
    P: OutputPin,
    D: DelayNs,
    S: StopRequest,
    R: RetryPolicy,
{
    pub fn with_retry<R2: RetryPolicy>(self, retry: R2) -> Supervisor<B, W, K, P, D, S, R2> {
        Supervisor {
            config: self.config,
            topics: self.topics,
            bus: self.bus,
            wifi: self.wifi,
            broker: self.broker,
            indicator: self.indicator,
            stop: self.stop,
            retry,
            state: self.state,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    /// Returns only after the exit sequence has been shown.
    pub fn run(&mut self) -> Termination {
        let termination = match self.scan_sensors() {
            Ok(sensors) if sensors.is_empty() => {
                info!("No sensors, exiting");
                Termination::NoSensors
            }
            Ok(sensors) => Termination::Fault(self.retry_forever(&sensors)),
            Err(e) => {
                error!("Sensor scan failed: {e:#}");
                Termination::Fault(e)
            }
        };
        self.terminate();
        termination
    }

    fn scan_sensors(&mut self) -> anyhow::Result<Vec<Address>> {
        info!("Scanning 1-wire devices...");
        let sensors = self.bus.scan()?;
        info!("Found {} sensors", sensors.len());
        for s in sensors.iter() {
            let known = if self.topics.is_known(s) { "" } else { " (unexpected)" };
            info!("{}{known}", rom_hex(s));
        }
        Ok(sensors)
    }

    // Only a failure that escapes one whole pass ends up here.
    fn retry_forever(&mut self, sensors: &[Address]) -> anyhow::Error {
        let Self {
            config,
            topics,
            bus,
            wifi,
            broker,
            indicator,
            stop,
            retry,
            state,
        } = self;
        let credentials = config.credentials();
        let endpoint = config.broker_endpoint();

        loop {
            enter(state, DeviceState::Associating);
            let network = match wifi_connect(wifi, &credentials, indicator, retry) {
                Ok(n) => n,
                Err(e) => {
                    enter(state, DeviceState::Faulted);
                    error!("Network setup failed, retrying: {e:#}");
                    indicator.show(FAULT);
                    continue;
                }
            };

            enter(state, DeviceState::BrokerConnecting);
            match mqtt_connect(&network, broker, &endpoint, indicator) {
                BrokerConnect::Connected(mut session) => {
                    enter(state, DeviceState::Publishing);
                    let exit = publish_loop(
                        &mut session,
                        &network,
                        bus,
                        sensors,
                        topics,
                        indicator,
                        stop,
                    );
                    info!(
                        "Publish loop ended after {} messages: {exit:?}",
                        session.published()
                    );
                }
                BrokerConnect::Failed(_) => {
                    warn!("No broker session, starting over");
                }
            }

            if let Err(e) = network.disconnect() {
                enter(state, DeviceState::Faulted);
                return e;
            }
        }
    }

    fn terminate(&mut self) {
        enter(&mut self.state, DeviceState::Terminating);
        for _ in 0..EXIT_PULSES {
            info!("Exited");
            self.indicator.show(EXITING);
        }
    }
}

fn enter(state: &mut DeviceState, next: DeviceState) {
    if *state != next {
        info!("State: {} -> {next}", *state);
    }
    *state = next;
}

// EOF
