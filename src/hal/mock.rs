//! In-memory stand-ins for the serial port and the network.
//!
//! The task loops are exercised on the host by scripting these fakes:
//! [`MockSerial`] plays the UART driver (event channel included) and
//! [`MockConn`]/[`MockListener`] play the socket side. Each fake comes with
//! a handle that stays with the test while the fake itself moves into the
//! task under test.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::driver::{ClientConn, NetListener, SerialError, SerialRx, SerialTx};
use crate::event::SerialEvent;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct SerialState {
    /// Bytes "arrived on the wire", waiting in the driver buffer.
    rx_buffered: Mutex<VecDeque<u8>>,
    /// Bytes the bridge wrote out of the transmit half.
    tx_written: Mutex<Vec<u8>>,
    flushes: AtomicU32,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// Scripted serial port. Implements both halves; a test that needs the
/// receive and transmit sides in different tasks clones it, the clones
/// share one wire. The test keeps the [`SerialHandle`].
#[derive(Clone)]
pub struct MockSerial {
    events: Receiver<SerialEvent>,
    state: Arc<SerialState>,
}

/// Test-side controls for a [`MockSerial`].
pub struct SerialHandle {
    events: Sender<SerialEvent>,
    state: Arc<SerialState>,
}

impl MockSerial {
    /// Build a serial fake with a bounded event channel, like the real
    /// driver's queue.
    pub fn new(queue_depth: usize) -> (Self, SerialHandle) {
        let (tx, rx) = bounded(queue_depth);
        let state = Arc::new(SerialState::default());
        (
            Self {
                events: rx,
                state: state.clone(),
            },
            SerialHandle { events: tx, state },
        )
    }
}

impl SerialHandle {
    /// Queue incoming bytes and the matching `Data` event.
    pub fn inject(&self, bytes: &[u8]) {
        lock(&self.state.rx_buffered).extend(bytes.iter().copied());
        self.events
            .send(SerialEvent::Data(bytes.len()))
            .expect("mock event channel closed");
    }

    /// Queue a bare event with no bytes behind it.
    pub fn inject_event(&self, event: SerialEvent) {
        self.events.send(event).expect("mock event channel closed");
    }

    /// Everything the bridge wrote out of the transmit half so far.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.state.tx_written).clone()
    }

    /// How many times the input buffer was flushed.
    pub fn flushes(&self) -> u32 {
        self.state.flushes.load(Ordering::Relaxed)
    }

    /// Bytes still sitting unread in the fake driver buffer.
    pub fn buffered(&self) -> usize {
        lock(&self.state.rx_buffered).len()
    }

    /// Make subsequent reads or writes fail.
    pub fn jam(&self, reads: bool, writes: bool) {
        self.state.fail_reads.store(reads, Ordering::Relaxed);
        self.state.fail_writes.store(writes, Ordering::Relaxed);
    }
}

impl SerialRx for MockSerial {
    fn next_event(&mut self) -> Option<SerialEvent> {
        // Blocks like the driver queue; ends when the handle is dropped.
        self.events.recv().ok()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        if self.state.fail_reads.load(Ordering::Relaxed) {
            return Err(SerialError::Driver("mock read jammed"));
        }
        let mut buffered = lock(&self.state.rx_buffered);
        let n = buf.len().min(buffered.len());
        for slot in buf.iter_mut().take(n) {
            *slot = buffered.pop_front().unwrap_or_default();
        }
        Ok(n)
    }

    fn flush_input(&mut self) -> Result<(), SerialError> {
        lock(&self.state.rx_buffered).clear();
        self.state.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn reset_events(&mut self) {
        while self.events.try_recv().is_ok() {}
    }
}

impl SerialTx for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, SerialError> {
        if self.state.fail_writes.load(Ordering::Relaxed) {
            return Err(SerialError::Driver("mock write jammed"));
        }
        lock(&self.state.tx_written).extend_from_slice(buf);
        Ok(buf.len())
    }
}

struct ConnState {
    /// Chunks the "peer" will send; closing the handle ends the stream.
    incoming: Receiver<Vec<u8>>,
    /// Bytes sent towards the peer.
    outgoing: Mutex<Vec<u8>>,
    shutdowns: AtomicU32,
    fail_sends: AtomicBool,
    /// Carry-over when a recv chunk did not fit the caller's buffer.
    spill: Mutex<VecDeque<u8>>,
}

/// In-memory client connection.
#[derive(Clone)]
pub struct MockConn {
    state: Arc<ConnState>,
}

/// Test-side peer of a [`MockConn`].
pub struct ConnHandle {
    outgoing_chunks: Option<Sender<Vec<u8>>>,
    state: Arc<ConnState>,
}

impl MockConn {
    pub fn new() -> (Self, ConnHandle) {
        let (tx, rx) = bounded(64);
        let state = Arc::new(ConnState {
            incoming: rx,
            outgoing: Mutex::new(Vec::new()),
            shutdowns: AtomicU32::new(0),
            fail_sends: AtomicBool::new(false),
            spill: Mutex::new(VecDeque::new()),
        });
        (
            Self {
                state: state.clone(),
            },
            ConnHandle {
                outgoing_chunks: Some(tx),
                state,
            },
        )
    }
}

impl ConnHandle {
    /// Send bytes from the fake peer; the connection's `recv` will see
    /// them. Dropping the handle reads as an orderly close.
    pub fn send(&self, bytes: &[u8]) {
        self.outgoing_chunks
            .as_ref()
            .expect("peer already closed")
            .send(bytes.to_vec())
            .expect("mock conn closed");
    }

    /// Hang up from the peer side. The connection reads it as an orderly
    /// close; unlike dropping the handle, it stays usable for assertions.
    pub fn close(&mut self) {
        self.outgoing_chunks = None;
    }

    /// Everything the bridge sent to the fake peer so far.
    pub fn received(&self) -> Vec<u8> {
        lock(&self.state.outgoing).clone()
    }

    pub fn shutdowns(&self) -> u32 {
        self.state.shutdowns.load(Ordering::Relaxed)
    }

    /// Make subsequent sends on the connection fail.
    pub fn break_sends(&self) {
        self.state.fail_sends.store(true, Ordering::Relaxed);
    }
}

impl ClientConn for MockConn {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut spill = lock(&self.state.spill);
        if spill.is_empty() {
            match self.state.incoming.recv() {
                Ok(chunk) => spill.extend(chunk),
                // Peer handle dropped: orderly close.
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(spill.len());
        for slot in buf.iter_mut().take(n) {
            *slot = spill.pop_front().unwrap_or_default();
        }
        Ok(n)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state.fail_sends.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock peer gone"));
        }
        lock(&self.state.outgoing).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn try_clone(&self) -> io::Result<Self> {
        Ok(self.clone())
    }

    fn shutdown(&self) {
        self.state.shutdowns.fetch_add(1, Ordering::Relaxed);
    }
}

/// Hands out scripted connections; accept fails once the script runs dry
/// or the test drops the [`ListenerHandle`].
pub struct MockListener {
    pending: Receiver<MockConn>,
}

/// Test-side feeder for a [`MockListener`].
pub struct ListenerHandle {
    pending: Sender<MockConn>,
}

impl MockListener {
    pub fn new() -> (Self, ListenerHandle) {
        let (tx, rx) = bounded(16);
        (Self { pending: rx }, ListenerHandle { pending: tx })
    }
}

impl ListenerHandle {
    /// Queue the next connection `accept` will produce.
    pub fn connect(&self) -> ConnHandle {
        let (conn, handle) = MockConn::new();
        self.pending.send(conn).expect("mock listener closed");
        handle
    }
}

impl NetListener for MockListener {
    type Conn = MockConn;

    fn accept(&mut self) -> io::Result<MockConn> {
        self.pending
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "mock listener shut down"))
    }
}
