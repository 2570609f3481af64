// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! OPC UA server implementation: the TCP transport and secure channel
//! lifecycle, sessions, the pluggable node store with namespaces, the
//! attribute / method / node management service sets, the subscription
//! engine, and the asynchronous operation queue.

pub mod address_space;
pub mod async_ops;
pub mod authenticator;
pub mod config;
pub mod connection;
pub mod identity_token;
pub mod info;
pub mod server;
pub mod services;
pub mod session;
pub mod subscriptions;
pub mod transport;

pub use address_space::{AddressSpace, DefaultNodeStore, NodeStore, NodeStoreSwitch};
pub use config::{Limits, ServerConfig, ServerEndpoint};
pub use server::{Server, ServerHandle, ServerState};
