// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! OPC UA client: the opc.tcp transport with request multiplexing, the
//! secure channel with automatic token renewal, and a session facade over
//! the service sets the stack implements.

mod session;
mod transport;

pub use session::{Client, ClientConfig, Session};
pub use transport::{AsyncSecureChannel, TransportConfiguration};
