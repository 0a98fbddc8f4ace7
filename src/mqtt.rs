// mqtt.rs

use std::{fmt, marker::PhantomData, time::Duration};

use embedded_hal::{delay::DelayNs, digital::OutputPin};
use log::*;

use crate::{Indicator, NetworkSession, WifiLink, CONNECTED};

pub const MQTT_KEEPALIVE: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug, PartialEq)]
pub struct BrokerEndpoint {
    pub url: String,
    pub client_id: String,
    pub keepalive: Duration,
}

pub trait BrokerClient {
    fn publish(&mut self, topic: &str, payload: &str) -> anyhow::Result<()>;
}

pub trait BrokerConnector {
    type Client: BrokerClient;

    /// One handshake attempt, no retries.
    fn connect(&mut self, endpoint: &BrokerEndpoint) -> anyhow::Result<Self::Client>;
}

pub struct BrokerSession<'n, C> {
    client: C,
    published: u32,
    _network: PhantomData<&'n ()>,
}

impl<C> fmt::Debug for BrokerSession<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSession")
            .field("published", &self.published)
            .finish()
    }
}

impl<C: BrokerClient> BrokerSession<'_, C> {
    pub fn publish(&mut self, topic: &str, payload: &str) -> anyhow::Result<()> {
        self.client.publish(topic, payload)?;
        self.published += 1;
        Ok(())
    }

    pub fn published(&self) -> u32 {
        self.published
    }
}

#[derive(Debug)]
pub enum BrokerConnect<'n, C> {
    Connected(BrokerSession<'n, C>),
    Failed(anyhow::Error),
}

pub fn mqtt_connect<'n, W, K, P, D>(
    network: &'n NetworkSession<'_, W>,
    connector: &mut K,
    endpoint: &BrokerEndpoint,
    indicator: &mut Indicator<P, D>,
) -> BrokerConnect<'n, K::Client>
where
    W: WifiLink,
    K: BrokerConnector,
    P: OutputPin,
    D: DelayNs,
{
    info!(
        "Connecting to MQTT Broker at {} over {}",
        endpoint.url,
        network.ssid()
    );
    match connector.connect(endpoint) {
        Ok(client) => {
            info!("Connected to MQTT Broker");
            indicator.show(CONNECTED);
            BrokerConnect::Connected(BrokerSession {
                client,
                published: 0,
                _network: PhantomData,
            })
        }
        Err(e) => {
            error!("Failed to connect to MQTT broker {}: {e:#}", endpoint.url);
            BrokerConnect::Failed(e)
        }
    }
}

// EOF
