// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Core communication machinery shared by the client and server: message
//! chunks, the secure channel, the chunker, TCP framing, and the timer
//! scheduler and connection-manager abstractions used by the PubSub layer.

pub mod comms;
pub mod config;
pub mod messages;
pub mod runtime;
pub mod sync;

pub use messages::{Message, RequestMessage, ResponseMessage};

/// Transport profile URIs from part 6 and part 14.
pub mod profiles {
    /// opc.tcp with UA-SecureConversation and UA-Binary.
    pub const TRANSPORT_PROFILE_URI_BINARY: &str =
        "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary";
    /// PubSub over UDP with UADP encoding.
    pub const TRANSPORT_PROFILE_URI_PUBSUB_UDP_UADP: &str =
        "http://opcfoundation.org/UA-Profile/Transport/pubsub-udp-uadp";
    /// PubSub over MQTT with UADP encoding.
    pub const TRANSPORT_PROFILE_URI_PUBSUB_MQTT_UADP: &str =
        "http://opcfoundation.org/UA-Profile/Transport/pubsub-mqtt-uadp";
    /// PubSub over MQTT with JSON encoding.
    pub const TRANSPORT_PROFILE_URI_PUBSUB_MQTT_JSON: &str =
        "http://opcfoundation.org/UA-Profile/Transport/pubsub-mqtt-json";
    /// PubSub over raw Ethernet with UADP encoding.
    pub const TRANSPORT_PROFILE_URI_PUBSUB_ETH_UADP: &str =
        "http://opcfoundation.org/UA-Profile/Transport/pubsub-eth-uadp";
    /// PubSub over AMQP.
    pub const TRANSPORT_PROFILE_URI_PUBSUB_AMQP: &str =
        "http://opcfoundation.org/UA-Profile/Transport/pubsub-amqp";
}
