//! Compile-time bridge configuration.
//!
//! Everything here is a build-time tunable; there is no runtime parameter
//! store. WiFi credentials come from the environment at compile time:
//!
//! ```text
//! BRIDGE_WIFI_SSID=mynet BRIDGE_WIFI_PASS=secret cargo build --release
//! ```

/// TCP port the bridge listens on.
pub const TCP_PORT: u16 = 3333;

/// Listener backlog. Kept at one so a single extra connector may queue in
/// the stack while a client is being served; everyone else is refused.
pub const TCP_BACKLOG: i32 = 1;

/// Serial driver ring buffer size in bytes. Also the upper bound on the
/// chunk a task moves per iteration, in either direction.
pub const SERIAL_BUF_SIZE: usize = 1024;

/// Depth of the serial driver's event queue.
pub const SERIAL_QUEUE_DEPTH: usize = 20;

/// Default line rate, 8N1, no flow control.
pub const SERIAL_BAUD: u32 = 115_200;

/// UART controller index. UART0 doubles as the USB console port, which is
/// exactly what this bridge exposes over the network.
pub const SERIAL_PORT_NUM: u32 = 0;

/// UART0 TX pin.
#[cfg(feature = "esp32s3")]
pub const SERIAL_TX_PIN: i32 = 1;
/// UART0 RX pin.
#[cfg(feature = "esp32s3")]
pub const SERIAL_RX_PIN: i32 = 3;

#[cfg(all(feature = "esp32p4", not(feature = "esp32s3")))]
pub const SERIAL_TX_PIN: i32 = 37;
#[cfg(all(feature = "esp32p4", not(feature = "esp32s3")))]
pub const SERIAL_RX_PIN: i32 = 38;

// No chip feature selected: fall back to the S3 console pins so host-side
// builds of the library still have a complete default setup.
#[cfg(not(any(feature = "esp32s3", feature = "esp32p4")))]
pub const SERIAL_TX_PIN: i32 = 1;
#[cfg(not(any(feature = "esp32s3", feature = "esp32p4")))]
pub const SERIAL_RX_PIN: i32 = 3;

/// Both bridge tasks run on this core.
pub const BRIDGE_CORE_ID: u32 = 0;

/// Stack size for each bridge task, in bytes.
pub const TASK_STACK_SIZE: usize = 8192;

/// FreeRTOS priority for each bridge task.
pub const TASK_PRIORITY: u8 = 2;

/// Seconds between traffic report lines from the main loop.
pub const STATS_PERIOD_SECS: u64 = 10;

/// Network to join.
pub const WIFI_SSID: &str = match option_env!("BRIDGE_WIFI_SSID") {
    Some(ssid) => ssid,
    None => "MyEsp32Bridge",
};

/// Network passphrase. Empty selects an open network.
pub const WIFI_PASS: &str = match option_env!("BRIDGE_WIFI_PASS") {
    Some(pass) => pass,
    None => "12345678",
};

/// Join attempts before boot gives up.
pub const WIFI_MAX_RETRY: u32 = 5;

/// Serial port parameters handed to the driver at install time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UartSetup {
    pub port: u32,
    pub baud: u32,
    pub tx_pin: i32,
    pub rx_pin: i32,
    /// Driver ring buffer size; the driver allocates twice this for each
    /// direction so a full chunk can queue behind a full chunk.
    pub buf_size: usize,
    pub queue_depth: usize,
}

impl Default for UartSetup {
    fn default() -> Self {
        Self {
            port: SERIAL_PORT_NUM,
            baud: SERIAL_BAUD,
            tx_pin: SERIAL_TX_PIN,
            rx_pin: SERIAL_RX_PIN,
            buf_size: SERIAL_BUF_SIZE,
            queue_depth: SERIAL_QUEUE_DEPTH,
        }
    }
}

/// Listener parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TcpSetup {
    pub port: u16,
    pub backlog: i32,
}

impl Default for TcpSetup {
    fn default() -> Self {
        Self {
            port: TCP_PORT,
            backlog: TCP_BACKLOG,
        }
    }
}

/// Station credentials and retry budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WifiSetup {
    pub ssid: &'static str,
    pub pass: &'static str,
    pub max_retries: u32,
}

impl Default for WifiSetup {
    fn default() -> Self {
        Self {
            ssid: WIFI_SSID,
            pass: WIFI_PASS,
            max_retries: WIFI_MAX_RETRY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let uart = UartSetup::default();
        assert_eq!(uart.baud, 115_200);
        assert!(uart.buf_size > 0);
        assert!(uart.queue_depth > 0);

        let tcp = TcpSetup::default();
        assert_eq!(tcp.port, 3333);
        assert!(tcp.backlog >= 1);

        let wifi = WifiSetup::default();
        assert!(!wifi.ssid.is_empty());
        assert!(wifi.max_retries > 0);
    }
}
