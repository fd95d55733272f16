//! # uart-wifi-bridge
//!
//! Transparent byte bridge between a UART and a single TCP client.
//!
//! ## Architecture
//!
//! Two blocking task loops share exactly one piece of state, the
//! [`ClientSlot`]:
//!
//! ```text
//!   serial rx ──▶ SerialBridge ──▶ ClientSlot ──▶ client
//!   client    ──▶ SocketServer ──▶ serial tx
//!                       │
//!                       └── installs/clears the slot handle
//! ```
//!
//! Bytes are opaque: no framing, no flow control, no protocol. Each
//! direction preserves order; while no client is attached, serial input is
//! dropped and counted. The loops are generic over the traits in
//! [`driver`], so the same code runs against ESP-IDF on the target and
//! against in-memory fakes in tests.

pub mod bridge;
pub mod config;
pub mod driver;
pub mod event;
pub mod hal;
pub mod server;
pub mod slot;
pub mod stats;

pub use bridge::SerialBridge;
pub use driver::{ClientConn, NetListener, SerialError, SerialRx, SerialTx};
pub use event::SerialEvent;
pub use server::SocketServer;
pub use slot::{ClientSlot, SlotWrite};
pub use stats::{BridgeStats, Snapshot};
