// config.rs

use std::fmt;

use anyhow::Context;
use log::*;

use crate::*;

const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_SENSOR_TOPICS: &str = r#"{"atc/boiler_out/boiler":"28445ecb040000b3","atc/boiler_return/boiler":"2881ddcb04000042"}"#;

#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct MyConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,

    pub mqtt_broker: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,

    pub unit_ms: u32,
    pub settle_units: u32,

    pub sensor_topics: String,
}

impl Default for MyConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: option_env!("WIFI_SSID").unwrap_or("internet").into(),
            wifi_pass: option_env!("WIFI_PASS").unwrap_or("password").into(),

            mqtt_broker: option_env!("MQTT_BROKER").unwrap_or("mqtt.local").into(),
            mqtt_port: option_env!("MQTT_PORT")
                .unwrap_or("-")
                .parse()
                .unwrap_or(DEFAULT_MQTT_PORT),
            mqtt_client_id: option_env!("MQTT_CLIENT_ID").unwrap_or("boiler").into(),

            unit_ms: DEFAULT_UNIT_MS,
            settle_units: DEFAULT_SETTLE_UNITS,

            sensor_topics: option_env!("SENSOR_TOPICS")
                .unwrap_or(DEFAULT_SENSOR_TOPICS)
                .into(),
        }
    }
}

impl fmt::Debug for MyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MyConfig")
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_pass", &"<redacted>")
            .field("mqtt_broker", &self.mqtt_broker)
            .field("mqtt_port", &self.mqtt_port)
            .field("mqtt_client_id", &self.mqtt_client_id)
            .field("unit_ms", &self.unit_ms)
            .field("settle_units", &self.settle_units)
            .field("sensor_topics", &self.sensor_topics)
            .finish()
    }
}

impl MyConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            ssid: self.wifi_ssid.clone(),
            password: self.wifi_pass.clone(),
        }
    }

    pub fn broker_endpoint(&self) -> BrokerEndpoint {
        BrokerEndpoint {
            url: format!("mqtt://{}:{}", self.mqtt_broker, self.mqtt_port),
            client_id: self.mqtt_client_id.clone(),
            keepalive: MQTT_KEEPALIVE,
        }
    }

    pub fn topic_table(&self) -> anyhow::Result<TopicTable> {
        let table = TopicTable::from_json(&self.sensor_topics)
            .with_context(|| format!("Bad sensor topic table {:?}", self.sensor_topics))?;
        for b in table.iter() {
            info!("Sensor {} -> {}", rom_hex(&b.address), b.topic);
        }
        Ok(table)
    }
}


// EOF
