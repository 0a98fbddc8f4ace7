// build.rs

use std::env;

const DEFAULT_SENSOR_TOPICS: &str = r#"{"atc/boiler_out/boiler":"28445ecb040000b3","atc/boiler_return/boiler":"2881ddcb04000042"}"#;

fn main() -> anyhow::Result<()> {
    // Necessary because of this issue: https://github.com/rust-lang/cargo/issues/9641
    // see also https://github.com/rust-lang/cargo/issues/9554
    // Host builds (unit and integration tests) have no ESP-IDF to propagate.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::build::CfgArgs::output_propagated("ESP_IDF")?;
        embuild::build::LinkArgs::output_propagated("ESP_IDF")?;
    }

    let wifi_ssid = env::var("WIFI_SSID").unwrap_or_else(|_| "internet".into());
    let wifi_pass = env::var("WIFI_PASS").unwrap_or_else(|_| "password".into());
    let mqtt_broker = env::var("MQTT_BROKER").unwrap_or_else(|_| "mqtt.local".into());
    let mqtt_port = env::var("MQTT_PORT").unwrap_or_else(|_| "1883".into());
    let client_id = env::var("MQTT_CLIENT_ID").unwrap_or_else(|_| "boiler".into());
    let sensor_topics = env::var("SENSOR_TOPICS").unwrap_or_else(|_| DEFAULT_SENSOR_TOPICS.into());

    println!("cargo:rustc-env=WIFI_SSID={wifi_ssid}");
    println!("cargo:rustc-env=WIFI_PASS={wifi_pass}");
    println!("cargo:rustc-env=MQTT_BROKER={mqtt_broker}");
    println!("cargo:rustc-env=MQTT_PORT={mqtt_port}");
    println!("cargo:rustc-env=MQTT_CLIENT_ID={client_id}");
    println!("cargo:rustc-env=SENSOR_TOPICS={sensor_topics}");

    for var in ["WIFI_SSID", "WIFI_PASS", "MQTT_BROKER", "MQTT_PORT", "MQTT_CLIENT_ID", "SENSOR_TOPICS"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    Ok(())
}

// EOF
