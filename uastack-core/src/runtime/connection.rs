// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The connection manager abstraction. A connection manager owns one kind of
//! transport (UDP, MQTT, ...) and hands datagrams or broker messages to a
//! callback. The PubSub layer picks a manager by transport profile URI.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use uastack_types::StatusCode;

/// Lifecycle state of a connection manager or other event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSourceState {
    /// Created, never started.
    Fresh,
    /// Stopped after having run.
    Stopped,
    /// Start requested, not yet running.
    Starting,
    /// Running.
    Started,
    /// Stop requested, connections are winding down.
    Stopping,
}

/// State of one connection, reported to the connection callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The connection is being established asynchronously.
    Opening,
    /// The connection is established and usable.
    Established,
    /// The connection is closing; this is always the final callback for a
    /// connection, whatever the reason for the close.
    Closing,
}

/// Identifier of one connection within its manager. One `open_connection`
/// call may produce several connections, e.g. one per address family.
pub type ConnectionId = u64;

/// Event delivered to a connection callback.
#[derive(Debug)]
pub struct ConnectionEvent {
    /// The connection the event belongs to.
    pub id: ConnectionId,
    /// The new state of the connection.
    pub state: ConnectionState,
    /// Received payload bytes, empty for pure state changes.
    pub payload: Vec<u8>,
}

/// Callback receiving connection state changes and data.
pub type ConnectionCallback = std::sync::Arc<dyn Fn(ConnectionEvent) + Send + Sync>;

/// Options for opening a TCP connection or listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpParams {
    /// Receive buffer size in bytes.
    #[serde(rename = "recv-bufsize")]
    pub recv_bufsize: u32,
    /// Hostname to connect to. Required for outgoing connections.
    pub hostname: Option<String>,
    /// Port to connect to. Required for outgoing connections.
    pub port: Option<u16>,
    /// Port to listen on, for listeners.
    #[serde(rename = "listen-port")]
    pub listen_port: Option<u16>,
    /// Hostnames to bind listeners to.
    #[serde(rename = "listen-hostnames")]
    pub listen_hostnames: Vec<String>,
}

impl Default for TcpParams {
    fn default() -> Self {
        TcpParams {
            recv_bufsize: 65536,
            hostname: None,
            port: None,
            listen_port: None,
            listen_hostnames: Vec::new(),
        }
    }
}

/// Options for opening a UDP send or receive connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpParams {
    /// Open a receiving socket instead of a sending one.
    pub listen: bool,
    /// Unicast or multicast addresses.
    pub hostname: Vec<String>,
    /// The port to send to or listen on.
    pub port: u16,
    /// Network interface to bind multicast traffic to.
    pub interface: Option<String>,
    /// Multicast time to live.
    pub ttl: u32,
    /// Whether multicast traffic loops back to the host.
    pub loopback: bool,
    /// Allow address reuse.
    pub reuse: bool,
    /// Socket priority, platform dependent.
    pub sockpriority: Option<u32>,
    /// Validate the source address of received datagrams.
    pub validate: bool,
}

impl Default for UdpParams {
    fn default() -> Self {
        UdpParams {
            listen: false,
            hostname: Vec::new(),
            port: 4840,
            interface: None,
            ttl: 1,
            loopback: true,
            reuse: false,
            sockpriority: None,
            validate: false,
        }
    }
}

/// Options for an MQTT broker connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttParams {
    /// Broker hostname.
    pub hostname: String,
    /// Broker port.
    pub port: u16,
    /// Optional user name.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    #[serde(rename = "keep-alive")]
    pub keep_alive: u16,
    /// The topic to publish to or subscribe on. Required.
    pub topic: String,
    /// Subscribe to the topic instead of publishing.
    pub subscribe: bool,
}

impl Default for MqttParams {
    fn default() -> Self {
        MqttParams {
            hostname: "localhost".to_owned(),
            port: 1883,
            username: None,
            password: None,
            keep_alive: 400,
            topic: String::new(),
            subscribe: false,
        }
    }
}

/// Options for a raw Ethernet connection. Recognized in configuration; no
/// manager for the Ethernet profile ships with the stack, so opening one is
/// rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EthernetParams {
    /// Open a receiving connection instead of a sending one.
    pub listen: bool,
    /// The network interface to use. Required.
    pub interface: String,
    /// Destination MAC address, as six colon separated hex bytes.
    pub address: Option<String>,
    /// EtherType of sent frames.
    pub ethertype: Option<u16>,
    /// Receive frames regardless of their destination address.
    pub promiscuous: bool,
    /// VLAN id, 12 bits.
    pub vid: Option<u16>,
    /// VLAN priority code point, 3 bits.
    pub pcp: Option<u8>,
    /// VLAN drop eligible indicator.
    pub dei: bool,
}

impl Default for EthernetParams {
    fn default() -> Self {
        EthernetParams {
            listen: false,
            interface: String::new(),
            address: None,
            ethertype: None,
            promiscuous: false,
            vid: None,
            pcp: None,
            dei: false,
        }
    }
}

/// Parameters for opening a connection, typed per transport. Managers reject
/// parameter kinds they do not own with `BadInvalidArgument`.
#[derive(Debug, Clone)]
pub enum ConnectionParams {
    /// Parameters for a TCP connection.
    Tcp(TcpParams),
    /// Parameters for a UDP connection.
    Udp(UdpParams),
    /// Parameters for an MQTT connection.
    Mqtt(MqttParams),
    /// Parameters for a raw Ethernet connection.
    Ethernet(EthernetParams),
}

/// A transport owned by the event loop. Implementations exist for UDP and
/// MQTT in the pubsub crate; the opc.tcp transports use the tokio stream
/// types directly.
#[async_trait::async_trait]
pub trait ConnectionManager: Send + Sync {
    /// A short name for logs, e.g. "udp".
    fn name(&self) -> &str;

    /// The lifecycle state of the manager.
    fn state(&self) -> EventSourceState;

    /// Start the manager. Valid from `Fresh` or `Stopped`.
    async fn start(&self) -> Result<(), StatusCode>;

    /// Stop the manager, closing all connections. Every open connection
    /// receives a final `Closing` event.
    async fn stop(&self);

    /// Open one or more connections described by `params`. The callback is
    /// invoked with `Opening` for asynchronous opens and `Established` once
    /// usable; synchronous opens may report `Established` inline.
    async fn open_connection(
        &self,
        params: ConnectionParams,
        callback: ConnectionCallback,
    ) -> Result<Vec<ConnectionId>, StatusCode>;

    /// Send a buffer on a connection. Ownership of the buffer transfers to
    /// the manager.
    async fn send(&self, id: ConnectionId, buf: BytesMut) -> Result<(), StatusCode>;

    /// Close a connection. The callback receives a final `Closing` event.
    async fn close_connection(&self, id: ConnectionId) -> Result<(), StatusCode>;

    /// Allocate a network buffer for sending. The default just allocates;
    /// managers may pool.
    fn alloc_network_buffer(&self, size: usize) -> BytesMut {
        BytesMut::with_capacity(size)
    }
}
