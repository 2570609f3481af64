// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The server side of the opc.tcp transport.

mod tcp;

pub(crate) use tcp::{Request, TcpConnector, TcpTransport, TransportConfig, TransportPollResult};
