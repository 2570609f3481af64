// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The umbrella crate of the stack, re-exporting the member crates under
//! one name. Enable the `server`, `client` and `pubsub` features as needed.

/// Core OPC UA data types and the binary codec.
pub mod types {
    pub use uastack_types::*;
}

/// Secure channel, chunking and transport core.
pub mod core {
    pub use uastack_core::*;
}

/// Cryptography: security policies, keys and certificates.
pub mod crypto {
    pub use uastack_crypto::*;
}

/// Node classes, references and the type tree.
pub mod nodes {
    pub use uastack_nodes::*;
}

#[cfg(feature = "server")]
/// The OPC UA server.
pub mod server {
    pub use uastack_server::*;
}

#[cfg(feature = "client")]
/// The OPC UA client.
pub mod client {
    pub use uastack_client::*;
}

#[cfg(feature = "pubsub")]
/// OPC UA PubSub.
pub mod pubsub {
    pub use uastack_pubsub::*;
}
