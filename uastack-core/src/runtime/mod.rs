// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The timer scheduler and the connection-manager abstraction. These drive
//! cyclic work such as subscription publishing and PubSub writer groups, and
//! abstract the datagram/broker transports PubSub rides on.

mod connection;
mod scheduler;

pub use connection::{
    ConnectionCallback, ConnectionEvent, ConnectionId, ConnectionManager, ConnectionParams,
    ConnectionState, EthernetParams, EventSourceState, MqttParams, TcpParams, UdpParams,
};
pub use scheduler::{CycleMissPolicy, TimerId, TimerScheduler};
