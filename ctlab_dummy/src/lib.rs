//! Test double for c't Lab modules.
//!
//! [`DummyDevice`] keeps registers in memory and answers the line protocol;
//! [`LoopbackTransport`] connects it to a `ctlab_protocol` client in-process,
//! [`server`] exposes it over TCP and [`TcpLineTransport`] is the matching
//! client side.

pub mod device;
pub mod loopback;
pub mod server;
pub mod tcp;

pub use device::{DummyDevice, StateFile};
pub use loopback::LoopbackTransport;
pub use tcp::TcpLineTransport;
