// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! PubSub connections and the concrete connection managers.
//!
//! A [`PubSubConnection`] owns writer groups and reader groups and talks to
//! the network through a [`ConnectionManager`] chosen by transport profile
//! URI. UDP is implemented here; MQTT is available behind the `mqtt`
//! feature. The Ethernet and AMQP profiles are recognized in configuration
//! but rejected at open.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use hashbrown::HashMap;
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use tokio::net::UdpSocket;

use uastack_core::{
    profiles,
    runtime::{
        ConnectionCallback, ConnectionEvent, ConnectionId, ConnectionManager, ConnectionParams,
        ConnectionState, EventSourceState, TimerScheduler, UdpParams,
    },
};
use uastack_types::StatusCode;

use crate::{reader::ReaderGroup, writer::WriterGroup, PubSubState};

/// A PubSub connection: a publisher id, a transport, and the writer and
/// reader groups riding on it.
pub struct PubSubConnection {
    /// Name of the connection.
    pub name: String,
    /// The transport profile URI selecting the connection manager.
    pub transport_profile_uri: String,
    /// The publisher id stamped on published network messages.
    pub publisher_id: u16,
    /// State of the connection.
    pub state: PubSubState,
    /// The writer groups.
    pub writer_groups: Vec<WriterGroup>,
    /// The reader groups, behind a lock so the receive callback can reach
    /// them.
    pub reader_groups: Arc<Mutex<Vec<ReaderGroup>>>,
    manager: Arc<dyn ConnectionManager>,
    params: ConnectionParams,
    send_connection: Option<ConnectionId>,
}

impl PubSubConnection {
    /// Create a connection over the given manager. The manager must match
    /// the transport profile; unsupported profiles are rejected here.
    pub fn new(
        name: &str,
        transport_profile_uri: &str,
        publisher_id: u16,
        manager: Arc<dyn ConnectionManager>,
        params: ConnectionParams,
    ) -> Result<PubSubConnection, StatusCode> {
        match transport_profile_uri {
            profiles::TRANSPORT_PROFILE_URI_PUBSUB_UDP_UADP
            | profiles::TRANSPORT_PROFILE_URI_PUBSUB_MQTT_UADP
            | profiles::TRANSPORT_PROFILE_URI_PUBSUB_MQTT_JSON => {}
            profiles::TRANSPORT_PROFILE_URI_PUBSUB_ETH_UADP
            | profiles::TRANSPORT_PROFILE_URI_PUBSUB_AMQP => {
                error!("Transport profile {transport_profile_uri} is not supported");
                return Err(StatusCode::BadServiceUnsupported);
            }
            other => {
                error!("Unknown transport profile {other}");
                return Err(StatusCode::BadInvalidArgument);
            }
        }
        Ok(PubSubConnection {
            name: name.to_string(),
            transport_profile_uri: transport_profile_uri.to_string(),
            publisher_id,
            state: PubSubState::Disabled,
            writer_groups: Vec::new(),
            reader_groups: Arc::new(Mutex::new(Vec::new())),
            manager,
            params,
            send_connection: None,
        })
    }

    /// Enable the connection: open the transport and move to
    /// `PreOperational` until the established callback arrives.
    pub async fn enable(&mut self) -> Result<(), StatusCode> {
        self.state.transition(PubSubState::PreOperational)?;
        if self.manager.state() != EventSourceState::Started {
            self.manager.start().await?;
        }

        let reader_groups = self.reader_groups.clone();
        let callback: ConnectionCallback = Arc::new(move |event: ConnectionEvent| {
            match event.state {
                ConnectionState::Opening => {}
                ConnectionState::Established => {
                    debug!("PubSub connection {} established", event.id);
                }
                ConnectionState::Closing => {
                    debug!("PubSub connection {} closing", event.id);
                }
            }
            if !event.payload.is_empty() {
                let mut groups = reader_groups.lock();
                for group in groups.iter_mut() {
                    let _ = group.on_receive(&event.payload);
                }
            }
        });

        let ids = self
            .manager
            .open_connection(self.params.clone(), callback)
            .await?;
        self.send_connection = ids.first().copied();
        self.state.transition(PubSubState::Operational)?;

        for group in &mut self.writer_groups {
            group.state.transition(PubSubState::PreOperational)?;
            group.state.transition(PubSubState::Operational)?;
            for writer in &mut group.writers {
                writer.state.transition(PubSubState::PreOperational)?;
                writer.state.transition(PubSubState::Operational)?;
            }
        }
        let mut readers = self.reader_groups.lock();
        for group in readers.iter_mut() {
            group.state.transition(PubSubState::PreOperational)?;
            group.state.transition(PubSubState::Operational)?;
            for reader in &mut group.readers {
                reader.state.transition(PubSubState::PreOperational)?;
                reader.state.transition(PubSubState::Operational)?;
            }
        }
        info!("PubSub connection {} enabled", self.name);
        Ok(())
    }

    /// Disable the connection and everything on it.
    pub async fn disable(&mut self) {
        for group in &mut self.writer_groups {
            let _ = group.state.transition(PubSubState::Disabled);
        }
        {
            let mut readers = self.reader_groups.lock();
            for group in readers.iter_mut() {
                let _ = group.state.transition(PubSubState::Disabled);
            }
        }
        if let Some(id) = self.send_connection.take() {
            let _ = self.manager.close_connection(id).await;
        }
        let _ = self.state.transition(PubSubState::Disabled);
    }

    /// Publish every writer group that is due, rescheduling per its
    /// cycle-miss policy. Returns the next publish deadline.
    pub async fn publish_due(&mut self, now: Instant) -> Option<Instant> {
        if self.state != PubSubState::Operational {
            return None;
        }
        let Some(connection_id) = self.send_connection else {
            return None;
        };
        for group in &mut self.writer_groups {
            if group.state != PubSubState::Operational || !group.is_due(now) {
                continue;
            }
            group.reschedule(now);
            match group.publish(self.publisher_id) {
                Ok(bytes) => {
                    let mut buf = self.manager.alloc_network_buffer(bytes.len());
                    buf.extend_from_slice(&bytes);
                    if let Err(e) = self.manager.send(connection_id, buf).await {
                        error!("Publish failed on group {}: {e}", group.name);
                        let _ = group.state.transition(PubSubState::Error);
                    }
                }
                Err(e) => {
                    error!("Cannot encode network message for group {}: {e}", group.name);
                    let _ = group.state.transition(PubSubState::Error);
                }
            }
        }
        self.writer_groups
            .iter()
            .filter(|g| g.state == PubSubState::Operational)
            .map(|g| g.next_publish())
            .min()
    }

    /// Register a cyclic callback on the scheduler that wakes the publish
    /// task whenever any group's interval elapses. The returned receiver
    /// fires on each scheduled cycle.
    pub fn attach_to_scheduler(
        &self,
        scheduler: &mut TimerScheduler,
        now: Instant,
    ) -> tokio::sync::mpsc::UnboundedReceiver<Instant> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        for group in &self.writer_groups {
            let tx = tx.clone();
            scheduler.add_cyclic(
                move |now| {
                    let _ = tx.send(now);
                },
                group.publishing_interval,
                Some(now),
                group.cycle_policy,
                now,
            );
        }
        rx
    }
}

/// A UDP connection manager for the `pubsub-udp-uadp` profile. One open may
/// create a sending socket, a listening socket, or both.
pub struct UdpConnectionManager {
    state: RwLock<EventSourceState>,
    next_id: AtomicU64,
    sockets: Mutex<HashMap<ConnectionId, SendTarget>>,
}

struct SendTarget {
    socket: Arc<UdpSocket>,
    remote: Option<SocketAddr>,
}

impl UdpConnectionManager {
    /// Create the manager in the `Fresh` state.
    pub fn new() -> UdpConnectionManager {
        UdpConnectionManager {
            state: RwLock::new(EventSourceState::Fresh),
            next_id: AtomicU64::new(1),
            sockets: Mutex::new(HashMap::new()),
        }
    }

    fn alloc_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for UdpConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConnectionManager for UdpConnectionManager {
    fn name(&self) -> &str {
        "udp"
    }

    fn state(&self) -> EventSourceState {
        *self.state.read()
    }

    async fn start(&self) -> Result<(), StatusCode> {
        let mut state = self.state.write();
        match *state {
            EventSourceState::Fresh | EventSourceState::Stopped => {
                *state = EventSourceState::Started;
                Ok(())
            }
            _ => Err(StatusCode::BadInvalidState),
        }
    }

    async fn stop(&self) {
        *self.state.write() = EventSourceState::Stopping;
        self.sockets.lock().clear();
        *self.state.write() = EventSourceState::Stopped;
    }

    async fn open_connection(
        &self,
        params: ConnectionParams,
        callback: ConnectionCallback,
    ) -> Result<Vec<ConnectionId>, StatusCode> {
        if self.state() != EventSourceState::Started {
            return Err(StatusCode::BadInvalidState);
        }
        let ConnectionParams::Udp(params) = params else {
            return Err(StatusCode::BadInvalidArgument);
        };
        let mut ids = Vec::new();

        if params.listen {
            // One listening connection per hostname
            for host in &params.hostname {
                let id = self.alloc_id();
                let addr = format!("{}:{}", host, params.port);
                let socket = bind_udp(&addr, &params).await?;
                let socket = Arc::new(socket);
                callback(ConnectionEvent {
                    id,
                    state: ConnectionState::Opening,
                    payload: Vec::new(),
                });
                self.sockets.lock().insert(
                    id,
                    SendTarget {
                        socket: socket.clone(),
                        remote: None,
                    },
                );

                let cb = callback.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 65536];
                    cb(ConnectionEvent {
                        id,
                        state: ConnectionState::Established,
                        payload: Vec::new(),
                    });
                    loop {
                        match socket.recv_from(&mut buf).await {
                            Ok((n, _from)) => {
                                cb(ConnectionEvent {
                                    id,
                                    state: ConnectionState::Established,
                                    payload: buf[..n].to_vec(),
                                });
                            }
                            Err(e) => {
                                debug!("UDP receive loop ended: {e}");
                                break;
                            }
                        }
                    }
                    cb(ConnectionEvent {
                        id,
                        state: ConnectionState::Closing,
                        payload: Vec::new(),
                    });
                });
                ids.push(id);
            }
        } else {
            let Some(host) = params.hostname.first() else {
                return Err(StatusCode::BadInvalidArgument);
            };
            let id = self.alloc_id();
            let remote: SocketAddr = format!("{}:{}", host, params.port)
                .parse()
                .map_err(|_| StatusCode::BadInvalidArgument)?;
            let socket = bind_udp("0.0.0.0:0", &params).await?;
            self.sockets.lock().insert(
                id,
                SendTarget {
                    socket: Arc::new(socket),
                    remote: Some(remote),
                },
            );
            // Datagram sends are connectionless: established right away.
            callback(ConnectionEvent {
                id,
                state: ConnectionState::Established,
                payload: Vec::new(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn send(&self, id: ConnectionId, buf: BytesMut) -> Result<(), StatusCode> {
        let (socket, remote) = {
            let sockets = self.sockets.lock();
            let Some(target) = sockets.get(&id) else {
                return Err(StatusCode::BadNotFound);
            };
            (target.socket.clone(), target.remote)
        };
        let Some(remote) = remote else {
            return Err(StatusCode::BadInvalidState);
        };
        socket.send_to(&buf, remote).await.map_err(|e| {
            error!("UDP send failed: {e}");
            StatusCode::BadCommunicationError
        })?;
        Ok(())
    }

    async fn close_connection(&self, id: ConnectionId) -> Result<(), StatusCode> {
        // Dropping the socket ends the receive loop, which reports Closing.
        if self.sockets.lock().remove(&id).is_some() {
            Ok(())
        } else {
            Err(StatusCode::BadNotFound)
        }
    }
}

async fn bind_udp(addr: &str, params: &UdpParams) -> Result<UdpSocket, StatusCode> {
    use socket2::{Domain, Protocol, Socket, Type};
    let addr: SocketAddr = addr.parse().map_err(|_| StatusCode::BadInvalidArgument)?;
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|_| StatusCode::BadResourceUnavailable)?;
    socket
        .set_nonblocking(true)
        .map_err(|_| StatusCode::BadResourceUnavailable)?;
    if params.reuse {
        let _ = socket.set_reuse_address(true);
    }
    let _ = socket.set_multicast_ttl_v4(params.ttl);
    let _ = socket.set_multicast_loop_v4(params.loopback);
    socket
        .bind(&addr.into())
        .map_err(|_| StatusCode::BadResourceUnavailable)?;

    // Multicast group membership for multicast listen addresses
    if let SocketAddr::V4(v4) = addr {
        if v4.ip().is_multicast() {
            let _ = socket.join_multicast_v4(v4.ip(), &std::net::Ipv4Addr::UNSPECIFIED);
        }
    }

    UdpSocket::from_std(socket.into()).map_err(|_| StatusCode::BadResourceUnavailable)
}

#[cfg(feature = "mqtt")]
pub use mqtt::MqttConnectionManager;

#[cfg(feature = "mqtt")]
mod mqtt {
    //! MQTT connection manager for the `pubsub-mqtt-*` profiles, built on
    //! rumqttc.

    use super::*;
    use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
    use uastack_core::runtime::MqttParams;

    /// Connection manager publishing and subscribing through an MQTT
    /// broker.
    pub struct MqttConnectionManager {
        state: RwLock<EventSourceState>,
        next_id: AtomicU64,
        clients: Mutex<HashMap<ConnectionId, (AsyncClient, String)>>,
    }

    impl MqttConnectionManager {
        /// Create the manager in the `Fresh` state.
        pub fn new() -> MqttConnectionManager {
            MqttConnectionManager {
                state: RwLock::new(EventSourceState::Fresh),
                next_id: AtomicU64::new(1),
                clients: Mutex::new(HashMap::new()),
            }
        }

        fn spawn_event_loop(
            id: ConnectionId,
            mut event_loop: EventLoop,
            callback: ConnectionCallback,
        ) {
            tokio::spawn(async move {
                loop {
                    match event_loop.poll().await {
                        Ok(rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                            callback(ConnectionEvent {
                                id,
                                state: ConnectionState::Established,
                                payload: Vec::new(),
                            });
                        }
                        Ok(rumqttc::Event::Incoming(rumqttc::Packet::Publish(publish))) => {
                            callback(ConnectionEvent {
                                id,
                                state: ConnectionState::Established,
                                payload: publish.payload.to_vec(),
                            });
                        }
                        Ok(_) => {}
                        Err(e) => {
                            debug!("MQTT event loop ended: {e}");
                            callback(ConnectionEvent {
                                id,
                                state: ConnectionState::Closing,
                                payload: Vec::new(),
                            });
                            break;
                        }
                    }
                }
            });
        }
    }

    impl Default for MqttConnectionManager {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl ConnectionManager for MqttConnectionManager {
        fn name(&self) -> &str {
            "mqtt"
        }

        fn state(&self) -> EventSourceState {
            *self.state.read()
        }

        async fn start(&self) -> Result<(), StatusCode> {
            *self.state.write() = EventSourceState::Started;
            Ok(())
        }

        async fn stop(&self) {
            *self.state.write() = EventSourceState::Stopping;
            self.clients.lock().clear();
            *self.state.write() = EventSourceState::Stopped;
        }

        async fn open_connection(
            &self,
            params: ConnectionParams,
            callback: ConnectionCallback,
        ) -> Result<Vec<ConnectionId>, StatusCode> {
            let ConnectionParams::Mqtt(params) = params else {
                return Err(StatusCode::BadInvalidArgument);
            };
            if params.topic.is_empty() {
                return Err(StatusCode::BadInvalidArgument);
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);

            let mut options =
                MqttOptions::new(format!("uastack-{id}"), &params.hostname, params.port);
            options.set_keep_alive(std::time::Duration::from_secs(params.keep_alive as u64));
            if let (Some(user), Some(password)) = (&params.username, &params.password) {
                options.set_credentials(user, password);
            }
            let (client, event_loop) = AsyncClient::new(options, 16);

            // The broker connection completes asynchronously.
            callback(ConnectionEvent {
                id,
                state: ConnectionState::Opening,
                payload: Vec::new(),
            });
            if params.subscribe {
                client
                    .subscribe(&params.topic, QoS::AtLeastOnce)
                    .await
                    .map_err(|_| StatusCode::BadCommunicationError)?;
            }
            Self::spawn_event_loop(id, event_loop, callback);
            self.clients
                .lock()
                .insert(id, (client, params.topic.clone()));
            Ok(vec![id])
        }

        async fn send(&self, id: ConnectionId, buf: BytesMut) -> Result<(), StatusCode> {
            let (client, topic) = {
                let clients = self.clients.lock();
                let Some((client, topic)) = clients.get(&id) else {
                    return Err(StatusCode::BadNotFound);
                };
                (client.clone(), topic.clone())
            };
            client
                .publish(topic, QoS::AtLeastOnce, false, buf.to_vec())
                .await
                .map_err(|_| StatusCode::BadCommunicationError)
        }

        async fn close_connection(&self, id: ConnectionId) -> Result<(), StatusCode> {
            let removed = { self.clients.lock().remove(&id) };
            if let Some((client, _)) = removed {
                let _ = client.disconnect().await;
                Ok(())
            } else {
                Err(StatusCode::BadNotFound)
            }
        }
    }
}
