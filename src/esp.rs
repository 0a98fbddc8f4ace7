// esp.rs

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{anyhow, bail};
use embedded_svc::{
    mqtt::client::{EventPayload, QoS},
    wifi::{ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    delay::FreeRtos,
    gpio::{AnyInputPin, Input, PinDriver},
    modem::Modem,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    mqtt::client::{EspMqttClient, EspMqttEvent, MqttClientConfiguration},
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, EspWifi},
};
use esp_idf_sys::esp;
use log::*;

use crate::*;

const HANDSHAKE_TIMEOUT_MS: u32 = 10_000;
const HANDSHAKE_POLL_MS: u32 = 100;

pub struct EspWifiLink {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl EspWifiLink {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let espwifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let wifi = BlockingWifi::wrap(espwifi, sysloop)?;
        Ok(EspWifiLink { wifi })
    }
}

impl WifiLink for EspWifiLink {
    fn activate(&mut self) -> anyhow::Result<()> {
        if !self.wifi.is_started()? {
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
            info!("WiFi driver starting...");
            self.wifi.start()?;
        }
        Ok(())
    }

    fn scan(&mut self) -> anyhow::Result<Vec<AccessPoint>> {
        Ok(self
            .wifi
            .scan()?
            .into_iter()
            .map(|ap| AccessPoint {
                ssid: ap.ssid.as_str().to_string(),
                channel: ap.channel,
                rssi: ap.signal_strength,
            })
            .collect())
    }

    fn is_associated(&self) -> anyhow::Result<bool> {
        Ok(self.wifi.is_up()?)
    }

    fn request_connect(&mut self, ssid: &str, password: &str) -> anyhow::Result<()> {
        let wanted = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| anyhow!("SSID too long"))?,
            password: password
                .try_into()
                .map_err(|_| anyhow!("WiFi password too long"))?,
            ..Default::default()
        });
        // set_config fails with ESP_ERR_WIFI_STATE while an earlier connect is in flight
        if self.wifi.get_configuration()? != wanted {
            self.wifi.set_configuration(&wanted)?;
        }
        // the blocking wrapper would wait here, the retry loop does the waiting
        self.wifi.wifi_mut().connect()?;
        Ok(())
    }

    fn status(&self) -> String {
        match self.wifi.wifi().sta_netif().get_ip_info() {
            Ok(ip_info) => format!("ip {} gw {}", ip_info.ip, ip_info.subnet.gateway),
            Err(e) => format!("no ip ({e})"),
        }
    }

    fn rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_sys::wifi_ap_record_t::default();
        esp!(unsafe { esp_idf_sys::esp_wifi_sta_get_ap_info(&mut ap_info) }).ok()?;
        Some(ap_info.rssi)
    }

    fn disconnect(&mut self) -> anyhow::Result<()> {
        // no waiting for the event, the link may already be gone
        Ok(self.wifi.wifi_mut().disconnect()?)
    }
}

#[derive(Default)]
pub struct EspBroker;

pub struct EspBrokerClient {
    client: EspMqttClient<'static>,
    connected: Arc<AtomicBool>,
}

impl BrokerConnector for EspBroker {
    type Client = EspBrokerClient;

    fn connect(&mut self, endpoint: &BrokerEndpoint) -> anyhow::Result<EspBrokerClient> {
        let connected = Arc::new(AtomicBool::new(false));
        let flag = connected.clone();

        let client = EspMqttClient::new_cb(
            &endpoint.url,
            &MqttClientConfiguration {
                client_id: Some(endpoint.client_id.as_str()),
                keep_alive_interval: Some(endpoint.keepalive),
                ..Default::default()
            },
            move |event: EspMqttEvent<'_>| match event.payload() {
                EventPayload::Connected(_) => flag.store(true, Ordering::Relaxed),
                EventPayload::Disconnected => {
                    flag.store(false, Ordering::Relaxed);
                    warn!("MQTT connection closed.");
                }
                EventPayload::Error(e) => error!("MQTT error: {e:?}"),
                _ => {}
            },
        )?;

        let mut waited = 0;
        while !connected.load(Ordering::Relaxed) {
            if waited >= HANDSHAKE_TIMEOUT_MS {
                bail!("No CONNACK from {} in {waited} ms", endpoint.url);
            }
            FreeRtos::delay_ms(HANDSHAKE_POLL_MS);
            waited += HANDSHAKE_POLL_MS;
        }
        Ok(EspBrokerClient { client, connected })
    }
}

impl BrokerClient for EspBrokerClient {
    fn publish(&mut self, topic: &str, payload: &str) -> anyhow::Result<()> {
        if !self.connected.load(Ordering::Relaxed) {
            bail!("MQTT session lost");
        }
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes())?;
        Ok(())
    }
}

// BOOT button pressed between two idle units stops the publish loop
pub struct BootButton {
    pin: PinDriver<'static, AnyInputPin, Input>,
}

impl BootButton {
    pub fn new(pin: PinDriver<'static, AnyInputPin, Input>) -> Self {
        BootButton { pin }
    }
}

impl StopRequest for BootButton {
    fn stop_requested(&mut self) -> bool {
        self.pin.is_low()
    }
}

// EOF
