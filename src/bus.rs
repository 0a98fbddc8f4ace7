// bus.rs

use std::fmt::Write as _;

use anyhow::{anyhow, bail};
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use log::*;
use one_wire_bus::{Address, OneWire, OneWireError, SearchState};

pub trait SensorBus {
    fn scan(&mut self) -> anyhow::Result<Vec<Address>>;

    fn convert_temp(&mut self) -> anyhow::Result<()>;

    /// Last converted value of one sensor. `None` when the sensor answered
    /// but the scratchpad did not check out.
    fn read_temp(&mut self, address: &Address) -> anyhow::Result<Option<f32>>;
}

pub fn rom_hex(address: &Address) -> String {
    address
        .0
        .to_le_bytes()
        .iter()
        .fold(String::with_capacity(16), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}

pub fn parse_rom(hex: &str) -> anyhow::Result<Address> {
    let hex = hex.trim();
    if hex.len() != 16 || !hex.is_ascii() {
        bail!("ROM code must be 16 hex digits, got {hex:?}");
    }
    let mut bytes = [0u8; 8];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| anyhow!("ROM code {hex:?}: {e}"))?;
    }
    Ok(Address(u64::from_le_bytes(bytes)))
}

pub struct OneWireBus<P, D> {
    bus: OneWire<P>,
    delay: D,
}

impl<P, D, E> OneWireBus<P, D>
where
    P: OutputPin<Error = E> + InputPin<Error = E>,
    E: std::fmt::Debug,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> anyhow::Result<Self> {
        let bus = OneWire::new(pin).map_err(bus_error)?;
        Ok(OneWireBus { bus, delay })
    }
}

impl<P, D, E> SensorBus for OneWireBus<P, D>
where
    P: OutputPin<Error = E> + InputPin<Error = E>,
    E: std::fmt::Debug,
    D: DelayNs,
{
    fn scan(&mut self) -> anyhow::Result<Vec<Address>> {
        let mut found = Vec::new();
        let mut st: SearchState;
        let mut state = None;

        loop {
            match self
                .bus
                .device_search(state, false, &mut self.delay)
                .map_err(bus_error)?
            {
                None => break,
                Some((address, s)) => {
                    if is_ds18b20(&address) {
                        found.push(address);
                    } else {
                        debug!("Ignoring non-DS18B20 device {}", rom_hex(&address));
                    }
                    st = s;
                    state = Some(&st);
                }
            }
        }
        Ok(found)
    }

    fn convert_temp(&mut self) -> anyhow::Result<()> {
        ds18b20::start_simultaneous_temp_measurement(&mut self.bus, &mut self.delay)
            .map_err(bus_error)
    }

    fn read_temp(&mut self, address: &Address) -> anyhow::Result<Option<f32>> {
        let sensor = ds18b20::Ds18b20::new::<E>(*address).map_err(bus_error)?;
        let data = sensor.read_data(&mut self.bus, &mut self.delay);
        temperature(address, data.map(|d| d.temperature))
    }
}

pub fn is_ds18b20(address: &Address) -> bool {
    address.family_code() == ds18b20::FAMILY_CODE
}

// a garbled scratchpad is a skipped reading, anything else is a bus failure
fn temperature<E: std::fmt::Debug>(
    address: &Address,
    data: Result<f32, OneWireError<E>>,
) -> anyhow::Result<Option<f32>> {
    match data {
        Ok(celsius) => Ok(Some(celsius)),
        Err(OneWireError::CrcMismatch) => {
            debug!("CRC mismatch reading {}", rom_hex(address));
            Ok(None)
        }
        Err(e) => Err(bus_error(e)),
    }
}

// OneWireError does not implement std::error::Error
fn bus_error<E: std::fmt::Debug>(e: OneWireError<E>) -> anyhow::Error {
    anyhow!("one-wire bus error: {e:?}")
}


// EOF
