//! Driver-facing seams for the bridge tasks.
//!
//! The task loops are generic over four narrow traits so the same code runs
//! against the ESP-IDF UART driver and lwIP sockets on the target, and
//! against in-memory fakes in host tests:
//!
//! - [`SerialRx`]: event-driven receive half of the serial port
//! - [`SerialTx`]: transmit half of the serial port
//! - [`NetListener`]: hands out client connections, one accept at a time
//! - [`ClientConn`]: a connected network client
//!
//! Blocking semantics live in the trait contracts, not the loops: the loops
//! assume `next_event`, `accept` and `recv` park the calling task until
//! there is something to do.

use std::io;

use crate::event::SerialEvent;

/// Error from the serial driver.
///
/// Serial errors are never fatal to the bridge: callers log, count and
/// carry on with the next event or chunk.
#[derive(Debug)]
pub enum SerialError {
    /// The underlying ESP-IDF driver call failed.
    #[cfg(target_os = "espidf")]
    Esp(esp_idf_svc::sys::EspError),

    /// The driver rejected or aborted the transfer.
    Driver(&'static str),
}

impl core::fmt::Display for SerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            #[cfg(target_os = "espidf")]
            Self::Esp(e) => write!(f, "uart driver error: {e}"),
            Self::Driver(reason) => write!(f, "uart driver error: {reason}"),
        }
    }
}

impl std::error::Error for SerialError {}

#[cfg(target_os = "espidf")]
impl From<esp_idf_svc::sys::EspError> for SerialError {
    fn from(e: esp_idf_svc::sys::EspError) -> Self {
        Self::Esp(e)
    }
}

/// Receive half of the serial port: the event channel plus buffered reads.
///
/// One task owns the receive half; the trait takes `&mut self` throughout.
pub trait SerialRx {
    /// Block until the driver reports the next event.
    ///
    /// Returns `None` once the event source has shut down for good, which
    /// ends the bridge loop. On the target this never happens; in tests it
    /// is how a scripted scenario finishes.
    fn next_event(&mut self) -> Option<SerialEvent>;

    /// Move up to `buf.len()` already-buffered bytes into `buf`.
    ///
    /// # Returns
    ///
    /// How many bytes actually arrived. Zero is legal (a stale event after
    /// a flush, for instance) and is not an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;

    /// Discard everything in the driver's input buffer.
    fn flush_input(&mut self) -> Result<(), SerialError>;

    /// Throw away all pending events.
    ///
    /// Used together with [`flush_input`](Self::flush_input) after input
    /// loss: queued `Data` events carry byte counts for bytes that no
    /// longer exist.
    fn reset_events(&mut self);
}

/// Transmit half of the serial port.
pub trait SerialTx {
    /// Blocking write of `buf` to the wire.
    ///
    /// # Returns
    ///
    /// How many bytes the driver accepted. Callers treat a short count as
    /// a diagnostic, not a failure.
    fn write(&mut self, buf: &[u8]) -> Result<usize, SerialError>;
}

/// Something that produces client connections.
pub trait NetListener {
    type Conn: ClientConn;

    /// Block until a client connects.
    ///
    /// # Errors
    ///
    /// An error here means the listener itself is broken. Callers treat it
    /// as fatal and stop serving.
    fn accept(&mut self) -> io::Result<Self::Conn>;
}

/// A connected network client.
///
/// `try_clone` exists so two tasks can hold independent handles to the same
/// connection: the server task keeps the receive side, while the writer
/// twin lives in the [`ClientSlot`](crate::slot::ClientSlot) for the serial
/// bridge to use. Dropping a handle releases its descriptor.
pub trait ClientConn: Send {
    /// Block until the peer sends something.
    ///
    /// # Returns
    ///
    /// The number of bytes received; `Ok(0)` means the peer closed the
    /// connection in an orderly way.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send up to `buf.len()` bytes to the peer, returning how many the
    /// transport accepted.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Duplicate the handle so another task can write to the same peer.
    fn try_clone(&self) -> io::Result<Self>
    where
        Self: Sized;

    /// Best-effort shutdown of both directions. Errors are deliberately
    /// swallowed; the handle is dropped right afterwards anyway.
    fn shutdown(&self);
}
