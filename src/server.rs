//! Network to serial server task.
//!
//! Owns the listener and the whole client lifecycle: accept one client,
//! park its writer half in the [`ClientSlot`], pump its bytes into the
//! serial transmitter until it goes away, tear down, listen again.
//!
//! ```text
//!   listener ──accept──▶ conn ──try_clone──▶ slot (writer half)
//!                          │
//!                          └────recv────▶ serial tx (blocking write)
//! ```
//!
//! The listener backlog is kept small, so while one client is being served
//! any further connector waits in the stack; this task only ever sees the
//! next one after the current client is gone.

use std::io;

use log::{debug, error, info, warn};

use crate::config::SERIAL_BUF_SIZE;
use crate::driver::{ClientConn, NetListener, SerialTx};
use crate::slot::ClientSlot;
use crate::stats::BridgeStats;

/// Server lifecycle. [`Phase::Connected`] carries the receive half of the
/// live connection; its writer twin sits in the slot.
enum Phase<C> {
    Listening,
    Connected(C),
}

/// Accepts clients one at a time and forwards their bytes to the serial
/// port.
pub struct SocketServer<'a, L, T>
where
    L: NetListener,
{
    listener: L,
    serial: T,
    slot: &'a ClientSlot<L::Conn>,
    stats: &'a BridgeStats,
}

impl<'a, L, T> SocketServer<'a, L, T>
where
    L: NetListener,
    T: SerialTx,
{
    pub fn new(
        listener: L,
        serial: T,
        slot: &'a ClientSlot<L::Conn>,
        stats: &'a BridgeStats,
    ) -> Self {
        Self {
            listener,
            serial,
            slot,
            stats,
        }
    }

    /// Cycle between listening and serving, indefinitely.
    ///
    /// # Errors
    ///
    /// Only an accept failure lands here. That means the listener itself is
    /// unusable, so the task gives up and returns the error; client-level
    /// trouble never escapes the cycle.
    pub fn run(mut self) -> io::Result<()> {
        let mut phase = Phase::Listening;
        loop {
            phase = match phase {
                Phase::Listening => {
                    info!("listening for a client");
                    let conn = match self.listener.accept() {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("accept failed, server task exiting: {e}");
                            return Err(e);
                        }
                    };
                    match self.attach(conn) {
                        Some(conn) => Phase::Connected(conn),
                        None => Phase::Listening,
                    }
                }
                Phase::Connected(conn) => {
                    self.serve(conn);
                    Phase::Listening
                }
            };
        }
    }

    /// Install the writer half of a fresh connection in the slot.
    ///
    /// Returns the receive half, or `None` if the handle could not be
    /// duplicated (the client is dropped and the server keeps listening).
    fn attach(&mut self, conn: L::Conn) -> Option<L::Conn> {
        let writer = match conn.try_clone() {
            Ok(writer) => writer,
            Err(e) => {
                warn!("could not duplicate client handle: {e}");
                conn.shutdown();
                return None;
            }
        };

        if let Some(stale) = self.slot.set(writer) {
            // Teardown always clears before the next accept, so this is a
            // bug elsewhere; close the stray handle rather than leak it.
            warn!("slot still held a client at accept time, closing it");
            stale.shutdown();
        }

        self.stats.count_connect();
        info!("client connected");
        Some(conn)
    }

    /// Receive loop for one client. Never fatal: every exit path leads back
    /// to listening.
    fn serve(&mut self, mut conn: L::Conn) {
        let mut chunk = [0u8; SERIAL_BUF_SIZE];
        loop {
            match conn.recv(&mut chunk) {
                Ok(0) => {
                    info!("client closed the connection");
                    break;
                }
                Ok(n) => {
                    debug!("net rx {n} bytes");
                    match self.serial.write(&chunk[..n]) {
                        Ok(written) => {
                            self.stats.add_net_to_serial(written);
                            if written < n {
                                warn!("short serial write: {written} of {n} bytes");
                            }
                        }
                        Err(e) => {
                            self.stats.count_serial_error();
                            warn!("serial write failed: {e}");
                        }
                    }
                }
                Err(e) => {
                    warn!("client receive failed: {e}");
                    self.stats.count_net_error();
                    break;
                }
            }
        }
        self.detach(conn);
    }

    /// Tear one client down. The slot is cleared first, so the bridge task
    /// can no longer pick up a handle to a socket that is about to die;
    /// dropping the cleared handle and shutting down the receive half then
    /// releases both descriptors.
    fn detach(&mut self, conn: L::Conn) {
        drop(self.slot.clear());
        conn.shutdown();
        drop(conn);
        self.stats.count_disconnect();
        info!("client detached, back to listening");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SerialError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Connection fake fed from a script of recv results.
    #[derive(Clone)]
    struct FakeConn {
        script: Arc<Mutex<VecDeque<io::Result<Vec<u8>>>>>,
        shutdowns: Arc<AtomicU32>,
        clone_fails: Arc<AtomicBool>,
    }

    impl FakeConn {
        fn new(script: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into_iter().collect())),
                shutdowns: Arc::new(AtomicU32::new(0)),
                clone_fails: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl ClientConn for FakeConn {
        fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                // Script exhausted: behave like an orderly close.
                None => Ok(0),
            }
        }

        fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn try_clone(&self) -> io::Result<Self> {
            if self.clone_fails.load(Ordering::Relaxed) {
                return Err(io::Error::new(io::ErrorKind::Other, "no clone"));
            }
            Ok(self.clone())
        }

        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Listener fake that hands out a fixed set of connections, then fails
    /// accept to stop the cycle.
    struct FakeListener {
        pending: VecDeque<FakeConn>,
    }

    impl NetListener for FakeListener {
        type Conn = FakeConn;

        fn accept(&mut self) -> io::Result<FakeConn> {
            self.pending
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "listener down"))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingTx {
        written: Arc<Mutex<Vec<u8>>>,
        fail: bool,
    }

    impl SerialTx for RecordingTx {
        fn write(&mut self, buf: &[u8]) -> Result<usize, SerialError> {
            if self.fail {
                return Err(SerialError::Driver("tx jammed"));
            }
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    #[test]
    fn test_client_bytes_reach_serial_in_order() {
        let conn = FakeConn::new(vec![Ok(b"hel".to_vec()), Ok(b"lo".to_vec()), Ok(vec![])]);
        let listener = FakeListener {
            pending: [conn].into(),
        };

        let slot = ClientSlot::new();
        let stats = BridgeStats::new();
        let tx = RecordingTx::default();
        let written = tx.written.clone();

        let result = SocketServer::new(listener, tx, &slot, &stats).run();

        assert!(result.is_err()); // listener script ran dry
        assert_eq!(written.lock().unwrap().as_slice(), b"hello");
        assert_eq!(stats.snapshot().net_to_serial, 5);
    }

    #[test]
    fn test_slot_follows_connection_lifecycle() {
        // One client that closes immediately, then accept fails.
        let conn = FakeConn::new(vec![Ok(vec![])]);
        let shutdowns = conn.shutdowns.clone();
        let listener = FakeListener {
            pending: [conn].into(),
        };

        let slot = ClientSlot::new();
        let stats = BridgeStats::new();
        let _ = SocketServer::new(listener, RecordingTx::default(), &slot, &stats).run();

        // Attached during serve, cleared at teardown.
        assert!(!slot.is_connected());
        let snap = stats.snapshot();
        assert_eq!(snap.connects, 1);
        assert_eq!(snap.disconnects, 1);
        // Receive half shut down once at detach.
        assert_eq!(shutdowns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_recv_error_tears_down_and_relistens() {
        let broken = FakeConn::new(vec![Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        ))]);
        let healthy = FakeConn::new(vec![Ok(b"ok".to_vec()), Ok(vec![])]);
        let listener = FakeListener {
            pending: [broken, healthy].into(),
        };

        let slot = ClientSlot::new();
        let stats = BridgeStats::new();
        let tx = RecordingTx::default();
        let written = tx.written.clone();

        let _ = SocketServer::new(listener, tx, &slot, &stats).run();

        // Second client was served after the first blew up.
        assert_eq!(written.lock().unwrap().as_slice(), b"ok");
        let snap = stats.snapshot();
        assert_eq!(snap.net_errors, 1);
        assert_eq!(snap.connects, 2);
        assert_eq!(snap.disconnects, 2);
    }

    #[test]
    fn test_serial_write_failure_is_not_fatal() {
        let conn = FakeConn::new(vec![Ok(b"abc".to_vec()), Ok(b"def".to_vec()), Ok(vec![])]);
        let listener = FakeListener {
            pending: [conn].into(),
        };

        let slot = ClientSlot::new();
        let stats = BridgeStats::new();
        let tx = RecordingTx {
            fail: true,
            ..Default::default()
        };

        let _ = SocketServer::new(listener, tx, &slot, &stats).run();

        let snap = stats.snapshot();
        // Both chunks hit the jammed transmitter, the client was still
        // drained to its orderly close.
        assert_eq!(snap.serial_errors, 2);
        assert_eq!(snap.disconnects, 1);
    }

    #[test]
    fn test_clone_failure_skips_client() {
        let conn = FakeConn::new(vec![Ok(b"never".to_vec())]);
        conn.clone_fails.store(true, Ordering::Relaxed);
        let shutdowns = conn.shutdowns.clone();
        let listener = FakeListener {
            pending: [conn].into(),
        };

        let slot = ClientSlot::new();
        let stats = BridgeStats::new();
        let _ = SocketServer::new(listener, RecordingTx::default(), &slot, &stats).run();

        assert_eq!(stats.snapshot().connects, 0);
        assert_eq!(shutdowns.load(Ordering::Relaxed), 1);
        assert!(!slot.is_connected());
    }

    #[test]
    fn test_accept_failure_is_fatal() {
        let listener = FakeListener {
            pending: VecDeque::new(),
        };
        let slot = ClientSlot::new();
        let stats = BridgeStats::new();

        let result = SocketServer::new(listener, RecordingTx::default(), &slot, &stats).run();

        assert!(result.is_err());
    }
}
