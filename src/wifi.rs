// wifi.rs

use std::fmt;

use anyhow::Context;
use embedded_hal::{delay::DelayNs, digital::OutputPin};
use log::*;

use crate::{Credentials, Indicator, TRYING};

pub const DEFAULT_SETTLE_UNITS: u32 = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct AccessPoint {
    pub ssid: String,
    pub channel: u8,
    pub rssi: i8,
}

impl fmt::Display for AccessPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:32} ch {:2} rssi {}", self.ssid, self.channel, self.rssi)
    }
}

pub trait WifiLink {
    fn activate(&mut self) -> anyhow::Result<()>;
    fn scan(&mut self) -> anyhow::Result<Vec<AccessPoint>>;
    fn is_associated(&self) -> anyhow::Result<bool>;
    /// Fire off an association attempt; does not wait for the outcome.
    fn request_connect(&mut self, ssid: &str, password: &str) -> anyhow::Result<()>;
    fn status(&self) -> String;
    fn rssi(&self) -> Option<i8>;
    fn disconnect(&mut self) -> anyhow::Result<()>;
}

pub trait RetryPolicy {
    fn settle_units(&mut self, attempt: u32) -> u32;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantDelay(pub u32);

impl Default for ConstantDelay {
    fn default() -> Self {
        ConstantDelay(DEFAULT_SETTLE_UNITS)
    }
}

impl RetryPolicy for ConstantDelay {
    fn settle_units(&mut self, _attempt: u32) -> u32 {
        self.0
    }
}

/// Live association. Consumed by `disconnect`, so it is never reused.
pub struct NetworkSession<'a, W: WifiLink> {
    link: &'a mut W,
    ssid: String,
    attempts: u32,
}

impl<W: WifiLink> fmt::Debug for NetworkSession<'_, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkSession")
            .field("ssid", &self.ssid)
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl<W: WifiLink> NetworkSession<'_, W> {
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_alive(&self) -> bool {
        match self.link.is_associated() {
            Ok(up) => up,
            Err(e) => {
                warn!("WiFi state unknown: {e:#}");
                false
            }
        }
    }

    pub fn rssi(&self) -> Option<i8> {
        self.link.rssi()
    }

    pub fn disconnect(self) -> anyhow::Result<()> {
        info!("Disconnecting from {}", self.ssid);
        self.link
            .disconnect()
            .with_context(|| format!("Cannot disconnect from {}", self.ssid))
    }
}

/// Block until associated. Only radio setup failures are errors, association
/// itself is retried without limit.
pub fn wifi_connect<'a, W, P, D, R>(
    link: &'a mut W,
    credentials: &Credentials,
    indicator: &mut Indicator<P, D>,
    retry: &mut R,
) -> anyhow::Result<NetworkSession<'a, W>>
where
    W: WifiLink,
    P: OutputPin,
    D: DelayNs,
    R: RetryPolicy,
{
    let attempts = match associate(link, credentials, indicator, retry) {
        Ok(n) => n,
        Err(e) => {
            error!("Failed to use wlan, not available? {e:#}");
            return Err(e);
        }
    };

    let rssi = link
        .rssi()
        .map_or_else(|| "-".to_string(), |r| r.to_string());
    info!("{} rssi {rssi}", link.status());
    info!("Connected to {}", credentials.ssid);

    Ok(NetworkSession {
        link,
        ssid: credentials.ssid.clone(),
        attempts,
    })
}

fn associate<W, P, D, R>(
    link: &mut W,
    credentials: &Credentials,
    indicator: &mut Indicator<P, D>,
    retry: &mut R,
) -> anyhow::Result<u32>
where
    W: WifiLink,
    P: OutputPin,
    D: DelayNs,
    R: RetryPolicy,
{
    info!("WiFi activating...");
    link.activate().context("Cannot activate WiFi")?;

    for ap in link.scan().context("Cannot scan WiFi")? {
        info!("{ap}");
    }

    let mut attempts = 0;
    while !link.is_associated().context("Cannot query WiFi state")? {
        attempts += 1;
        info!("Connecting to wlan, {} (attempt {attempts})", credentials.ssid);
        if let Err(e) = link.request_connect(&credentials.ssid, &credentials.password) {
            warn!("WiFi connect request failed: {e:#}");
        }
        indicator.show(TRYING);
        indicator.rest(retry.settle_units(attempts));
    }
    Ok(attempts)
}

// EOF
