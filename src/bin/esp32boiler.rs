// bin/esp32boiler.rs

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::main()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("esp32boiler runs on ESP-IDF targets only, see the library tests for host builds.");
}

#[cfg(target_os = "espidf")]
mod firmware {
    use esp32boiler::{esp::*, *};
    use esp_idf_hal::delay::{Ets, FreeRtos};
    use esp_idf_hal::gpio::{self, IOPin, InputPin, OutputPin, Pull};
    use esp_idf_hal::prelude::Peripherals;
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs};
    use log::*;

    esp_idf_sys::esp_app_desc!();

    pub fn main() -> anyhow::Result<()> {
        esp_idf_sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();

        info!("Hello.");
        info!("Starting up esp32boiler {FW_VERSION}.");

        let config = MyConfig::default();
        info!("My config:\n{config:#?}");

        let topics = match config.topic_table() {
            Ok(t) => t,
            Err(e) => {
                error!("{e:#}");
                error!("Cannot run without a topic table, rebooting.");
                FreeRtos::delay_ms(3000);
                esp_idf_hal::reset::restart();
            }
        };

        let sysloop = EspSystemEventLoop::take()?;
        let nvs_default_partition = nvs::EspDefaultNvsPartition::take()?;

        let peripherals = Peripherals::take()?;
        let pins = peripherals.pins;

        #[cfg(feature = "esp32c3")]
        let (led_pin, onewire_pin, button_pin) = (
            pins.gpio8.downgrade_output(),
            pins.gpio4.downgrade(),
            pins.gpio9.downgrade_input(),
        );

        #[cfg(feature = "esp32s")]
        let (led_pin, onewire_pin, button_pin) = (
            pins.gpio2.downgrade_output(),
            pins.gpio22.downgrade(),
            pins.gpio0.downgrade_input(),
        );

        let led = gpio::PinDriver::output(led_pin)?;
        let indicator = Indicator::new(led, FreeRtos, config.unit_ms);

        let mut onewire_drv = gpio::PinDriver::input_output_od(onewire_pin)?;
        onewire_drv.set_pull(Pull::Up)?;
        let bus = OneWireBus::new(onewire_drv, Ets)?;

        let button = BootButton::new(gpio::PinDriver::input(button_pin)?);

        let wifi = EspWifiLink::new(peripherals.modem, sysloop, nvs_default_partition)?;

        let mut supervisor = Supervisor::new(config, topics, bus, wifi, EspBroker, indicator, button);
        let termination = supervisor.run();

        // not actually returning from main() but we reboot instead
        info!("Supervisor finished ({termination:?}), reboot.");
        FreeRtos::delay_ms(3000);
        esp_idf_hal::reset::restart();
    }
}

// EOF
