//! WiFi station bring-up.
//!
//! The bridge is useless without a network, so this is strictly
//! boot-or-bust: join the configured station with a bounded retry budget,
//! wait for an address, or fail the boot.

use anyhow::{anyhow, Context};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{info, warn};

use crate::config::WifiSetup;

/// Join the configured network.
///
/// Returns the live handle; dropping it tears the interface down, so the
/// caller parks it for the life of the process.
pub fn join(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    setup: &WifiSetup,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?;

    let auth_method = if setup.pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: setup
            .ssid
            .try_into()
            .map_err(|_| anyhow!("ssid longer than 32 bytes"))?,
        password: setup
            .pass
            .try_into()
            .map_err(|_| anyhow!("passphrase longer than 64 bytes"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start().context("wifi start")?;
    info!("wifi started, joining '{}'", setup.ssid);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match wifi.connect() {
            Ok(()) => break,
            Err(e) if attempt < setup.max_retries => {
                warn!("join attempt {attempt}/{} failed: {e}", setup.max_retries);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("giving up on '{}' after {attempt} attempts", setup.ssid)
                });
            }
        }
    }

    wifi.wait_netif_up().context("waiting for address")?;
    let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
    info!("wifi up, address {}", ip_info.ip);

    Ok(wifi)
}
