//! Serial to network bridge task.
//!
//! One loop, one job: park on the serial driver's event channel, pull the
//! reported bytes out of the driver buffer, hand them to the client slot.
//!
//! ```text
//!   serial driver ──events──▶ SerialBridge ──ClientSlot::write──▶ client
//!                      ▲            │
//!                      └─flush+reset┘   (input loss recovery)
//! ```
//!
//! Nothing in this loop is fatal. Lost input is flushed and counted, a
//! transport error is the server task's cue to tear the client down, and
//! an empty slot is the normal idle state. The loop ends only when the
//! event source itself hangs up.

use log::{debug, warn};

use crate::config::SERIAL_BUF_SIZE;
use crate::driver::{ClientConn, SerialRx};
use crate::event::SerialEvent;
use crate::slot::{ClientSlot, SlotWrite};
use crate::stats::BridgeStats;

/// Pumps serial input into the attached network client.
pub struct SerialBridge<'a, R, S> {
    rx: R,
    slot: &'a ClientSlot<S>,
    stats: &'a BridgeStats,
    /// Reused for every chunk; the loop never allocates.
    chunk: [u8; SERIAL_BUF_SIZE],
}

impl<'a, R, S> SerialBridge<'a, R, S>
where
    R: SerialRx,
    S: ClientConn,
{
    pub fn new(rx: R, slot: &'a ClientSlot<S>, stats: &'a BridgeStats) -> Self {
        Self {
            rx,
            slot,
            stats,
            chunk: [0; SERIAL_BUF_SIZE],
        }
    }

    /// Consume driver events until the event source shuts down.
    pub fn run(mut self) {
        while let Some(event) = self.rx.next_event() {
            self.handle_event(event);
        }
        debug!("serial event source closed, bridge loop done");
    }

    /// React to a single driver event.
    ///
    /// Split out of [`run`](Self::run) so tests can step the loop
    /// synchronously.
    fn handle_event(&mut self, event: SerialEvent) {
        match event {
            SerialEvent::Data(len) => self.forward(len),
            SerialEvent::Overflow | SerialEvent::BufferFull => self.recover(event),
            SerialEvent::Other(tag) => debug!("ignoring serial event tag {tag}"),
        }
    }

    /// Move one reported chunk from the driver buffer to the client.
    fn forward(&mut self, len: usize) {
        let want = len.min(self.chunk.len());
        let got = match self.rx.read(&mut self.chunk[..want]) {
            // Stale event, the bytes were flushed in the meantime.
            Ok(0) => return,
            Ok(n) => n,
            Err(e) => {
                self.stats.count_serial_error();
                warn!("serial read failed: {e}");
                return;
            }
        };
        debug!("serial rx {got} bytes");

        match self.slot.write(&self.chunk[..got]) {
            Ok(SlotWrite::Sent(sent)) => {
                self.stats.add_serial_to_net(sent);
                if sent < got {
                    warn!("short send to client: {sent} of {got} bytes");
                }
            }
            Ok(SlotWrite::NotConnected) => {
                // Nobody listening; the chunk evaporates.
                self.stats.count_dropped_chunk();
            }
            Err(e) => {
                self.stats.count_net_error();
                warn!("send to client failed: {e}");
            }
        }
    }

    /// Input was lost. Drop whatever is left in the driver buffer and the
    /// event queue in one go: the counts in already-queued events refer to
    /// bytes that no longer exist.
    fn recover(&mut self, event: SerialEvent) {
        warn!("serial input lost ({event:?}), flushing driver buffer");
        if let Err(e) = self.rx.flush_input() {
            self.stats.count_serial_error();
            warn!("input flush failed: {e}");
        }
        self.rx.reset_events();
        self.stats.count_overflow_reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SerialError;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Scripted receive half: a queue of events plus a pool of buffered
    /// bytes the `Data` events refer to.
    struct ScriptedRx {
        events: VecDeque<SerialEvent>,
        buffered: VecDeque<u8>,
        fail_reads: bool,
        flushes: u32,
        resets: u32,
    }

    impl ScriptedRx {
        fn new() -> Self {
            Self {
                events: VecDeque::new(),
                buffered: VecDeque::new(),
                fail_reads: false,
                flushes: 0,
                resets: 0,
            }
        }

        fn push_data(&mut self, bytes: &[u8]) {
            self.buffered.extend(bytes);
            self.events.push_back(SerialEvent::Data(bytes.len()));
        }
    }

    impl SerialRx for ScriptedRx {
        fn next_event(&mut self) -> Option<SerialEvent> {
            self.events.pop_front()
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
            if self.fail_reads {
                return Err(SerialError::Driver("scripted failure"));
            }
            let n = buf.len().min(self.buffered.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.buffered.pop_front().unwrap();
            }
            Ok(n)
        }

        fn flush_input(&mut self) -> Result<(), SerialError> {
            self.buffered.clear();
            self.flushes += 1;
            Ok(())
        }

        fn reset_events(&mut self) {
            self.events.clear();
            self.resets += 1;
        }
    }

    #[derive(Clone, Default)]
    struct Sink {
        data: Arc<Mutex<Vec<u8>>>,
    }

    impl ClientConn for Sink {
        fn recv(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn try_clone(&self) -> io::Result<Self> {
            Ok(self.clone())
        }

        fn shutdown(&self) {}
    }

    #[test]
    fn test_data_events_forward_in_order() {
        let mut rx = ScriptedRx::new();
        rx.push_data(b"ab");
        rx.push_data(b"cd");
        rx.push_data(b"e");

        let slot = ClientSlot::new();
        let sink = Sink::default();
        let data = sink.data.clone();
        slot.set(sink);

        let stats = BridgeStats::new();
        SerialBridge::new(rx, &slot, &stats).run();

        assert_eq!(data.lock().unwrap().as_slice(), b"abcde");
        assert_eq!(stats.snapshot().serial_to_net, 5);
    }

    #[test]
    fn test_chunks_drop_while_disconnected() {
        let mut rx = ScriptedRx::new();
        rx.push_data(b"lost");

        let slot: ClientSlot<Sink> = ClientSlot::new();
        let stats = BridgeStats::new();
        SerialBridge::new(rx, &slot, &stats).run();

        let snap = stats.snapshot();
        assert_eq!(snap.serial_to_net, 0);
        assert_eq!(snap.dropped_chunks, 1);
    }

    #[test]
    fn test_overflow_flushes_and_resumes() {
        let mut rx = ScriptedRx::new();
        rx.push_data(b"stale");
        // Overflow invalidates everything queued so far.
        rx.events.push_front(SerialEvent::Overflow);

        let slot = ClientSlot::new();
        let sink = Sink::default();
        let data = sink.data.clone();
        slot.set(sink);

        let stats = BridgeStats::new();
        let mut bridge = SerialBridge::new(rx, &slot, &stats);

        // Step the overflow by hand, then feed fresh data and drain.
        let event = bridge.rx.next_event().unwrap();
        bridge.handle_event(event);
        assert_eq!(bridge.rx.flushes, 1);
        assert_eq!(bridge.rx.resets, 1);
        assert!(bridge.rx.events.is_empty());
        assert!(bridge.rx.buffered.is_empty());

        bridge.rx.push_data(b"fresh");
        bridge.run();

        assert_eq!(data.lock().unwrap().as_slice(), b"fresh");
        assert_eq!(stats.snapshot().overflow_resets, 1);
    }

    #[test]
    fn test_buffer_full_counts_as_recovery() {
        let mut rx = ScriptedRx::new();
        rx.events.push_back(SerialEvent::BufferFull);

        let slot: ClientSlot<Sink> = ClientSlot::new();
        let stats = BridgeStats::new();
        SerialBridge::new(rx, &slot, &stats).run();

        assert_eq!(stats.snapshot().overflow_resets, 1);
    }

    #[test]
    fn test_read_error_is_not_fatal() {
        let mut rx = ScriptedRx::new();
        rx.push_data(b"zz");
        rx.fail_reads = true;

        let slot = ClientSlot::new();
        slot.set(Sink::default());

        let stats = BridgeStats::new();
        SerialBridge::new(rx, &slot, &stats).run();

        assert_eq!(stats.snapshot().serial_errors, 1);
    }

    #[test]
    fn test_unknown_events_are_ignored() {
        let mut rx = ScriptedRx::new();
        rx.events.push_back(SerialEvent::Other(42));
        rx.push_data(b"ok");

        let slot = ClientSlot::new();
        let sink = Sink::default();
        let data = sink.data.clone();
        slot.set(sink);

        let stats = BridgeStats::new();
        SerialBridge::new(rx, &slot, &stats).run();

        assert_eq!(data.lock().unwrap().as_slice(), b"ok");
    }

    #[test]
    fn test_spurious_data_event_reads_nothing() {
        let mut rx = ScriptedRx::new();
        rx.events.push_back(SerialEvent::Data(8));

        let slot = ClientSlot::new();
        let sink = Sink::default();
        let data = sink.data.clone();
        slot.set(sink);

        let stats = BridgeStats::new();
        SerialBridge::new(rx, &slot, &stats).run();

        assert!(data.lock().unwrap().is_empty());
        assert_eq!(stats.snapshot().serial_to_net, 0);
    }
}
