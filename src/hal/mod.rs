//! Platform glue for the bridge.
//!
//! Thin wrappers around the actual I/O; the task loops upstairs stay
//! platform-free. `net` rides on `std::net` and therefore serves the target
//! (lwIP) and the host equally. `uart` and `wifi` talk to ESP-IDF and only
//! exist there. `mock` provides the in-memory stand-ins the test suite
//! drives the loops with.

pub mod mock;
pub mod net;

#[cfg(target_os = "espidf")]
pub mod uart;

#[cfg(target_os = "espidf")]
pub mod wifi;
