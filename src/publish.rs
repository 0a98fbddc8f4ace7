// publish.rs

use anyhow::Context;
use embedded_hal::{delay::DelayNs, digital::OutputPin};
use log::*;
use one_wire_bus::Address;

use crate::*;

pub trait StopRequest {
    fn stop_requested(&mut self) -> bool;
}

impl<F: FnMut() -> bool> StopRequest for F {
    fn stop_requested(&mut self) -> bool {
        self()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NeverStop;

impl StopRequest for NeverStop {
    fn stop_requested(&mut self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading<'t> {
    pub topic: &'t str,
    pub celsius: f32,
}

impl Reading<'_> {
    pub fn payload(&self) -> String {
        format_celsius(self.celsius)
    }
}

/// One decimal, halves rounded away from zero.
pub fn format_celsius(celsius: f32) -> String {
    let tenths = (f64::from(celsius) * 10.0).round();
    // + 0.0 turns -0.0 into 0.0
    format!("{:.1}", tenths / 10.0 + 0.0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub published: u32,
    pub unexpected: u32,
    pub missing: u32,
}

#[derive(Debug)]
pub enum LoopExit {
    Interrupted,
    NetworkLost,
    Failed(anyhow::Error),
}

pub fn run_cycle<C, B, P, D>(
    session: &mut BrokerSession<'_, C>,
    bus: &mut B,
    sensors: &[Address],
    topics: &TopicTable,
    indicator: &mut Indicator<P, D>,
) -> anyhow::Result<CycleReport>
where
    C: BrokerClient,
    B: SensorBus,
    P: OutputPin,
    D: DelayNs,
{
    let report = publish_readings(session, bus, sensors, topics, indicator)?;
    indicator.show(POLL_WAIT);
    Ok(report)
}

fn publish_readings<C, B, P, D>(
    session: &mut BrokerSession<'_, C>,
    bus: &mut B,
    sensors: &[Address],
    topics: &TopicTable,
    indicator: &mut Indicator<P, D>,
) -> anyhow::Result<CycleReport>
where
    C: BrokerClient,
    B: SensorBus,
    P: OutputPin,
    D: DelayNs,
{
    bus.convert_temp().context("Cannot start conversion")?;

    // conversion time
    indicator.show(SETTLE);

    let mut report = CycleReport::default();
    for address in sensors {
        let Some(celsius) = bus
            .read_temp(address)
            .with_context(|| format!("Cannot read sensor {}", rom_hex(address)))?
        else {
            report.missing += 1;
            continue;
        };

        match topics.resolve(address) {
            Some(topic) => {
                let reading = Reading { topic, celsius };
                let payload = reading.payload();
                info!("{topic}    {payload} degC");
                session
                    .publish(topic, &payload)
                    .with_context(|| format!("Failed to publish {topic}"))?;
                report.published += 1;
            }
            None => {
                warn!(
                    "Unexpected sensor: {} {} degC",
                    rom_hex(address),
                    format_celsius(celsius)
                );
                report.unexpected += 1;
            }
        }
    }
    Ok(report)
}

// POLL_WAIT one unit at a time, true when a stop arrived in between
fn idle<P, D, S>(indicator: &mut Indicator<P, D>, stop: &mut S) -> bool
where
    P: OutputPin,
    D: DelayNs,
    S: StopRequest,
{
    for unit in 0..POLL_WAIT.count {
        if unit > 0 && stop.stop_requested() {
            return true;
        }
        indicator.pulse(1, POLL_WAIT.duty);
    }
    false
}

/// Poll until something breaks. Never returns an error, the exit reason is the value.
pub fn publish_loop<C, W, B, P, D, S>(
    session: &mut BrokerSession<'_, C>,
    network: &NetworkSession<'_, W>,
    bus: &mut B,
    sensors: &[Address],
    topics: &TopicTable,
    indicator: &mut Indicator<P, D>,
    stop: &mut S,
) -> LoopExit
where
    C: BrokerClient,
    W: WifiLink,
    B: SensorBus,
    P: OutputPin,
    D: DelayNs,
    S: StopRequest,
{
    info!("Reading sensors and publishing to mqtt server");
    loop {
        if stop.stop_requested() {
            info!("Stop requested");
            return LoopExit::Interrupted;
        }
        if !network.is_alive() {
            error!("Lost connection to {}", network.ssid());
            return LoopExit::NetworkLost;
        }
        match publish_readings(session, bus, sensors, topics, indicator) {
            Ok(report) => debug!("Cycle done: {report:?}"),
            Err(e) => {
                error!("Failed to publish: {e:#}");
                return LoopExit::Failed(e);
            }
        }
        if idle(indicator, stop) {
            info!("Stop requested while idle");
            return LoopExit::Interrupted;
        }
    }
}


// EOF
