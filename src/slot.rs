//! The single-client connection slot.
//!
//! At most one network client is attached to the bridge at any moment. The
//! slot owns the writer half of that connection behind a mutex: the server
//! task installs a handle on accept and removes it on teardown, while the
//! serial bridge task pushes every received chunk through [`ClientSlot::write`].
//!
//! The guard is held across the whole lookup-and-send. A teardown can never
//! yank the handle out from under a send in progress, and a send can never
//! start on a handle the server has already discarded. While the slot is
//! empty, writes report [`SlotWrite::NotConnected`] and the bytes are
//! dropped by the caller; that is the normal idle state, not a failure.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::driver::ClientConn;

/// Outcome of a slot write that did not hit a transport error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotWrite {
    /// The transport accepted this many bytes. May be short; callers decide
    /// whether a short count is worth retrying or just logging.
    Sent(usize),

    /// No client is attached. The chunk was not sent anywhere.
    NotConnected,
}

/// Guarded handle to the active client connection, if any.
pub struct ClientSlot<S> {
    client: Mutex<Option<S>>,
}

impl<S: ClientConn> ClientSlot<S> {
    /// Create an empty slot.
    pub const fn new() -> Self {
        Self {
            client: Mutex::new(None),
        }
    }

    /// Attach `conn` as the active client.
    ///
    /// # Returns
    ///
    /// The handle that was displaced, if one was still attached. The slot
    /// never closes it; dropping the returned handle does.
    pub fn set(&self, conn: S) -> Option<S> {
        self.lock().replace(conn)
    }

    /// Detach the active client, handing the handle back to the caller.
    pub fn clear(&self) -> Option<S> {
        self.lock().take()
    }

    /// True while a client handle is attached.
    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Send `bytes` to the attached client, if any.
    ///
    /// Exactly one transport send is issued and its count is reported in
    /// [`SlotWrite::Sent`]. The internal guard spans the entire send, so a
    /// concurrent [`set`](Self::set) or [`clear`](Self::clear) waits until
    /// the bytes are handed to the transport. Writers therefore never
    /// interleave and never touch a detached handle.
    ///
    /// # Errors
    ///
    /// Transport failures. The handle stays attached even then: the task
    /// that owns the connection will observe the broken socket on its own
    /// side and detach it.
    pub fn write(&self, bytes: &[u8]) -> io::Result<SlotWrite> {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(conn) => conn.send(bytes).map(SlotWrite::Sent),
            None => Ok(SlotWrite::NotConnected),
        }
    }

    /// Lock the slot, riding through poisoning.
    ///
    /// A poisoned mutex here means some writer panicked mid-send. The
    /// `Option` inside is still structurally sound, so later attach and
    /// detach operations must keep working.
    fn lock(&self) -> MutexGuard<'_, Option<S>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: ClientConn> Default for ClientSlot<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Minimal in-place fake; the real mocks live in `hal::mock`.
    #[derive(Clone)]
    struct Sink {
        sent: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Sink {
        fn new(fail: bool) -> Self {
            Self {
                sent: Arc::new(AtomicUsize::new(0)),
                fail,
            }
        }
    }

    impl ClientConn for Sink {
        fn recv(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
            }
            self.sent.fetch_add(buf.len(), Ordering::Relaxed);
            Ok(buf.len())
        }

        fn try_clone(&self) -> io::Result<Self> {
            Ok(self.clone())
        }

        fn shutdown(&self) {}
    }

    #[test]
    fn test_empty_slot_reports_not_connected() {
        let slot: ClientSlot<Sink> = ClientSlot::new();

        assert!(!slot.is_connected());
        assert_eq!(slot.write(b"abc").unwrap(), SlotWrite::NotConnected);
        assert!(slot.clear().is_none());
    }

    #[test]
    fn test_write_goes_to_attached_client() {
        let slot = ClientSlot::new();
        let sink = Sink::new(false);
        let sent = sink.sent.clone();

        assert!(slot.set(sink).is_none());
        assert!(slot.is_connected());

        assert_eq!(slot.write(b"hello").unwrap(), SlotWrite::Sent(5));
        assert_eq!(sent.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_set_returns_displaced_handle() {
        let slot = ClientSlot::new();
        let first = Sink::new(false);
        let first_sent = first.sent.clone();

        slot.set(first);
        let displaced = slot.set(Sink::new(false));
        assert!(displaced.is_some());

        // Writes now land on the second handle only.
        slot.write(b"xy").unwrap();
        assert_eq!(first_sent.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_transport_error_keeps_handle_attached() {
        let slot = ClientSlot::new();
        slot.set(Sink::new(true));

        assert!(slot.write(b"boom").is_err());
        assert!(slot.is_connected());
    }

    #[test]
    fn test_clear_then_write_drops_quietly() {
        let slot = ClientSlot::new();
        slot.set(Sink::new(false));
        assert!(slot.clear().is_some());

        assert_eq!(slot.write(b"late").unwrap(), SlotWrite::NotConnected);
    }
}
