//! Bridge traffic counters.
//!
//! Plain monotonic atomics: both task loops bump them, the main loop logs a
//! [`Snapshot`] every few seconds. Diagnostics only, never coordination, so
//! everything is `Relaxed`.

use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Counters covering both bridge directions.
pub struct BridgeStats {
    /// Bytes moved serial -> client.
    serial_to_net: AtomicU64,

    /// Bytes moved client -> serial.
    net_to_serial: AtomicU64,

    /// Chunks dropped because no client was attached.
    dropped_chunks: AtomicU32,

    /// Serial input loss recoveries (flush + event reset).
    overflow_resets: AtomicU32,

    /// Serial driver errors, read or write side.
    serial_errors: AtomicU32,

    /// Socket send/recv errors.
    net_errors: AtomicU32,

    /// Clients accepted.
    connects: AtomicU32,

    /// Clients gone, orderly close or error.
    disconnects: AtomicU32,
}

impl BridgeStats {
    /// All counters at zero.
    pub const fn new() -> Self {
        Self {
            serial_to_net: AtomicU64::new(0),
            net_to_serial: AtomicU64::new(0),
            dropped_chunks: AtomicU32::new(0),
            overflow_resets: AtomicU32::new(0),
            serial_errors: AtomicU32::new(0),
            net_errors: AtomicU32::new(0),
            connects: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn add_serial_to_net(&self, n: usize) {
        self.serial_to_net.fetch_add(n as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_net_to_serial(&self, n: usize) {
        self.net_to_serial.fetch_add(n as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_dropped_chunk(&self) {
        self.dropped_chunks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_overflow_reset(&self) {
        self.overflow_resets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_serial_error(&self) {
        self.serial_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_net_error(&self) {
        self.net_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of all counters at one point in time.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            serial_to_net: self.serial_to_net.load(Ordering::Relaxed),
            net_to_serial: self.net_to_serial.load(Ordering::Relaxed),
            dropped_chunks: self.dropped_chunks.load(Ordering::Relaxed),
            overflow_resets: self.overflow_resets.load(Ordering::Relaxed),
            serial_errors: self.serial_errors.load(Ordering::Relaxed),
            net_errors: self.net_errors.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
        }
    }
}

impl Default for BridgeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters, formatted as one report line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub serial_to_net: u64,
    pub net_to_serial: u64,
    pub dropped_chunks: u32,
    pub overflow_resets: u32,
    pub serial_errors: u32,
    pub net_errors: u32,
    pub connects: u32,
    pub disconnects: u32,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "serial->net {}B, net->serial {}B, dropped {}, overflows {}, \
             serial errs {}, net errs {}, connects {}, disconnects {}",
            self.serial_to_net,
            self.net_to_serial,
            self.dropped_chunks,
            self.overflow_resets,
            self.serial_errors,
            self.net_errors,
            self.connects,
            self.disconnects
        )
    }
}
