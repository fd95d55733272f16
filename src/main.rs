//! uart-wifi-bridge - Main entry point
//!
//! Boot order mirrors the hardware dependencies:
//! 1. NVS flash (the WiFi driver persists calibration there)
//! 2. WiFi station, fatal if the retry budget runs out
//! 3. UART driver with its event queue
//! 4. TCP listener
//! 5. The two bridge tasks, pinned to one core
//! 6. Idle loop printing traffic reports

#[cfg(target_os = "espidf")]
mod firmware {
    use std::net::TcpStream;
    use std::thread;
    use std::time::Duration;

    use anyhow::{bail, Context};
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::cpu::Core;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::task::thread::ThreadSpawnConfiguration;
    use esp_idf_svc::log::EspLogger;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{error, info};

    use uart_wifi_bridge::config::{
        TcpSetup, UartSetup, WifiSetup, BRIDGE_CORE_ID, STATS_PERIOD_SECS, TASK_PRIORITY,
        TASK_STACK_SIZE,
    };
    use uart_wifi_bridge::hal::{net, uart, wifi};
    use uart_wifi_bridge::{BridgeStats, ClientSlot, SerialBridge, SocketServer};

    // Shared between the two tasks; static like the rest of the firmware
    // state so the spawned threads borrow at 'static.
    static SLOT: ClientSlot<TcpStream> = ClientSlot::new();
    static STATS: BridgeStats = BridgeStats::new();

    fn pin_to_bridge_core(name: &'static [u8]) -> anyhow::Result<()> {
        let core = match BRIDGE_CORE_ID {
            0 => Core::Core0,
            _ => Core::Core1,
        };
        ThreadSpawnConfiguration {
            name: Some(name),
            stack_size: TASK_STACK_SIZE,
            priority: TASK_PRIORITY,
            pin_to_core: Some(core),
            ..Default::default()
        }
        .set()
        .context("task spawn configuration")?;
        Ok(())
    }

    pub fn run() -> anyhow::Result<()> {
        esp_idf_svc::sys::link_patches();
        EspLogger::initialize_default();

        info!("{} booting", env!("VERSION_STRING"));

        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        // Also performs the flash init dance (erase and retry on stale
        // pages); the WiFi driver needs the partition.
        let nvs = EspDefaultNvsPartition::take()?;

        let _wifi = wifi::join(peripherals.modem, sysloop, nvs, &WifiSetup::default())?;

        let uart_setup = UartSetup::default();
        let (serial_rx, serial_tx) = uart::install(&uart_setup).context("uart driver")?;
        info!(
            "uart{} ready, {} baud, tx gpio{} rx gpio{}",
            uart_setup.port, uart_setup.baud, uart_setup.tx_pin, uart_setup.rx_pin
        );

        let tcp_setup = TcpSetup::default();
        let listener = net::bind_listener(tcp_setup.port, tcp_setup.backlog)?;

        pin_to_bridge_core(b"serial_bridge\0")?;
        let bridge_task = thread::Builder::new()
            .name("serial_bridge".into())
            .stack_size(TASK_STACK_SIZE)
            .spawn(move || SerialBridge::new(serial_rx, &SLOT, &STATS).run())?;

        pin_to_bridge_core(b"socket_server\0")?;
        let server_task = thread::Builder::new()
            .name("socket_server".into())
            .stack_size(TASK_STACK_SIZE)
            .spawn(move || {
                if let Err(e) = SocketServer::new(listener, serial_tx, &SLOT, &STATS).run() {
                    error!("socket server died: {e}");
                }
            })?;

        // Back to defaults for anything spawned later.
        ThreadSpawnConfiguration::default().set()?;

        info!("bridge running, port {}", tcp_setup.port);
        loop {
            thread::sleep(Duration::from_secs(STATS_PERIOD_SECS));
            info!("{}", STATS.snapshot());
            if bridge_task.is_finished() || server_task.is_finished() {
                bail!("a bridge task exited, rebooting");
            }
        }
    }
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("this binary targets ESP-IDF; on the host, run `cargo test` instead");
}
