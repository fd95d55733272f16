//! Serial driver event notifications.
//!
//! The UART driver reports activity through a bounded event channel rather
//! than by being polled. Only the variants the bridge acts on are
//! distinguished; everything else arrives as [`SerialEvent::Other`] with the
//! driver's raw tag so it can still show up in debug logs.

/// One notification from the serial driver's event channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerialEvent {
    /// Received bytes are waiting in the driver buffer. The payload is the
    /// byte count the driver reported for this event; the actual read may
    /// return fewer.
    Data(usize),

    /// Hardware FIFO overflowed: bytes were lost at the wire before the
    /// driver could drain them.
    Overflow,

    /// Driver ring buffer filled up: bytes were lost inside the driver.
    BufferFull,

    /// Any other driver notification (break, parity error, pattern match).
    /// Carries the driver's raw event tag.
    Other(u32),
}
