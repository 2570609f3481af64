// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The server: shared state under the service lock, the TCP accept loop, the
//! tick loop driving subscriptions and periodic maintenance, and the async
//! operation workers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use log::{debug, error, info};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use uastack_core::{
    comms::secure_channel::{Role, SecureChannel},
    runtime::{CycleMissPolicy, TimerScheduler},
    ResponseMessage,
};
use uastack_crypto::CertificateStore;
use uastack_types::{
    ContextOwned, CustomTypeTable, DecodingOptions, NamespaceMap, NodeId, NotificationMessage,
    PublishResponse, ResponseHeader, StatusCode,
};

use crate::{
    address_space::{load_core_namespace, refresh_namespace_array, AddressSpace},
    async_ops::{AsyncMethodHandler, AsyncOperationQueue},
    authenticator::{AuthManager, DefaultAuthenticator},
    config::ServerConfig,
    connection::{Connection, DeferredSender},
    info::ServerInfo,
    services,
    session::SessionManager,
    subscriptions::{Event, SubscriptionStore, TickResult},
    transport::{TcpConnector, TransportConfig},
};

/// Mutable server state, guarded by the service mutex. Everything the
/// service handlers touch lives here; callbacks into user code run while
/// the lock is held by the calling service, never from another thread.
pub struct ServerState {
    /// Shared server information.
    pub info: Arc<ServerInfo>,
    /// The address space.
    pub address_space: AddressSpace,
    /// The session manager.
    pub sessions: SessionManager,
    /// The subscription store.
    pub subscriptions: SubscriptionStore,
    /// The async operation queue, shared with the workers under its own
    /// lock.
    pub async_ops: Arc<AsyncOperationQueue>,
    /// The authenticator for session activation.
    pub authenticator: Arc<dyn AuthManager>,
    /// Handler for async method calls run on worker threads. When none is
    /// registered the tick loop runs async calls inline.
    pub async_method_handler: Option<AsyncMethodHandler>,
    /// The encoding context shared with the transports.
    pub encoding_context: Arc<parking_lot::RwLock<ContextOwned>>,
    channels: HashMap<u32, DeferredSender>,
    tick_notify: Arc<Notify>,
    worker_notify: Arc<Notify>,
}

impl ServerState {
    /// Register a channel's deferred response sender.
    pub(crate) fn register_channel(&mut self, secure_channel_id: u32, sender: DeferredSender) {
        self.channels.insert(secure_channel_id, sender);
    }

    /// Remove a channel's deferred response sender.
    pub(crate) fn deregister_channel(&mut self, secure_channel_id: u32) {
        self.channels.remove(&secure_channel_id);
    }

    /// Send a deferred response on a channel.
    pub fn send_response(
        &self,
        secure_channel_id: u32,
        request_id: u32,
        response: ResponseMessage,
    ) {
        if let Some(sender) = self.channels.get(&secure_channel_id) {
            let _ = sender.send((request_id, response));
        } else {
            debug!("Channel {secure_channel_id} is gone, dropping deferred response");
        }
    }

    /// Wake the tick loop, e.g. because a subscription or publish request
    /// changed.
    pub fn wake_tick(&self) {
        self.tick_notify.notify_one();
    }

    /// Wake the async workers.
    pub fn wake_workers(&self) {
        self.worker_notify.notify_waiters();
    }

    /// Add a namespace, keeping the NamespaceArray variable and the
    /// encoding context in sync. Returns the namespace index.
    pub fn add_namespace(&mut self, uri: &str) -> u16 {
        let index = self.address_space.add_namespace(uri);
        refresh_namespace_array(&mut self.address_space);
        self.encoding_context
            .write()
            .namespaces_mut()
            .add_namespace(uri);
        index
    }

    /// Fire an event at every subscription with a matching event item.
    pub fn fire_event(&mut self, event: &Event) {
        let address_space = &self.address_space;
        for subscription in self.subscriptions.iter_mut() {
            subscription.notify_event(event, address_space);
        }
        self.wake_tick();
    }

    /// One pass of the publish machinery: expire stale publish requests,
    /// sample and tick due subscriptions, and send out responses. Returns
    /// the next deadline.
    pub(crate) fn tick(&mut self, now: Instant) -> Option<Instant> {
        // Expired publish requests answer with BadTimeout.
        let mut timed_out = Vec::new();
        for session in self.sessions.iter_mut() {
            for publish in session.expire_publish_requests(now) {
                timed_out.push(publish);
            }
        }
        for publish in timed_out {
            self.send_response(
                publish.secure_channel_id,
                publish.request_id,
                ResponseMessage::ServiceFault(Box::new(uastack_types::ServiceFault {
                    response_header: ResponseHeader::new_service_result(
                        publish.request_handle,
                        StatusCode::BadTimeout,
                    ),
                })),
            );
        }

        // Tick due subscriptions.
        let mut responses = Vec::new();
        let mut dead = Vec::new();
        {
            let address_space = &self.address_space;
            let sessions = &mut self.sessions;
            for subscription in self.subscriptions.iter_mut() {
                if !subscription.is_due(now) {
                    continue;
                }
                subscription.sample(now, address_space);

                let session = sessions.get_mut(&subscription.session_id);
                let publish_available = session
                    .as_ref()
                    .map(|s| s.publish_queue_len() > 0)
                    .unwrap_or(false);
                match subscription.tick(now, publish_available) {
                    TickResult::None => {}
                    TickResult::Message(message) | TickResult::KeepAlive(message) => {
                        if let Some(session) = session {
                            if let Some(publish) = session.dequeue_publish() {
                                responses.push(build_publish_response(
                                    subscription.id,
                                    subscription.available_sequence_numbers(),
                                    message,
                                    publish,
                                ));
                            }
                        }
                    }
                    TickResult::Terminated => {
                        // Tell the client if a request is available, then
                        // drop the subscription.
                        if let Some(publish) = session.and_then(|s| s.dequeue_publish()) {
                            let message =
                                subscription.status_change_message(StatusCode::BadTimeout);
                            responses.push(build_publish_response(
                                subscription.id,
                                None,
                                message,
                                publish,
                            ));
                        }
                        dead.push(subscription.id);
                    }
                }
            }
        }
        for (secure_channel_id, request_id, response) in responses {
            self.send_response(secure_channel_id, request_id, response);
        }
        for id in dead {
            self.subscriptions.remove(id);
        }

        // Completed async responses.
        for completed in self.async_ops.take_completed() {
            self.send_response(
                completed.secure_channel_id,
                completed.request_id,
                completed.response.into(),
            );
        }

        self.subscriptions.next_deadline()
    }

    // Run queued async operations inline when no workers are configured.
    pub(crate) fn drain_async_inline(&mut self) {
        if self.async_method_handler.is_some() || self.info.config.async_workers > 0 {
            return;
        }
        while let Some((key, index, request)) = self.async_ops.dispatch() {
            let queue = self.async_ops.clone();
            let result = services::sync_method_call(self, &request);
            queue.set_result(key, index, result);
        }
    }
}

fn build_publish_response(
    subscription_id: u32,
    available_sequence_numbers: Option<Vec<u32>>,
    notification_message: NotificationMessage,
    publish: crate::session::QueuedPublish,
) -> (u32, u32, ResponseMessage) {
    (
        publish.secure_channel_id,
        publish.request_id,
        PublishResponse {
            response_header: ResponseHeader::new_service_result(
                publish.request_handle,
                StatusCode::Good,
            ),
            subscription_id,
            available_sequence_numbers,
            more_notifications: false,
            notification_message,
            results: publish.results,
            diagnostic_infos: None,
        }
        .into(),
    )
}

/// Handle to a running server for the embedding application: shut it down,
/// or reach into the state to add nodes and fire events.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<Mutex<ServerState>>,
    token: CancellationToken,
}

impl ServerHandle {
    /// The service state, under the service mutex.
    pub fn state(&self) -> &Arc<Mutex<ServerState>> {
        &self.state
    }

    /// Request the server to stop.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// The cancellation token of the server.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// The OPC UA server. Owns the listener, the tick loop and the workers.
pub struct Server {
    state: Arc<Mutex<ServerState>>,
    info: Arc<ServerInfo>,
    token: CancellationToken,
    tick_notify: Arc<Notify>,
    worker_notify: Arc<Notify>,
}

impl Server {
    /// Create a server with an anonymous-only authenticator and an empty
    /// certificate store.
    pub fn new(config: ServerConfig) -> Server {
        Server::new_with(
            config,
            Arc::new(parking_lot::RwLock::new(CertificateStore::new())),
            Arc::new(DefaultAuthenticator::anonymous_only()),
        )
    }

    /// Create a server with the given certificate store and authenticator.
    pub fn new_with(
        config: ServerConfig,
        certificate_store: Arc<parking_lot::RwLock<CertificateStore>>,
        authenticator: Arc<dyn AuthManager>,
    ) -> Server {
        let info = Arc::new(ServerInfo::new(config, certificate_store));

        let mut address_space = AddressSpace::new();
        load_core_namespace(&mut address_space);

        let decoding_options = DecodingOptions {
            max_message_size: info.config.limits.max_message_size,
            max_chunk_count: info.config.limits.max_chunk_count,
            ..Default::default()
        };
        let encoding_context = Arc::new(parking_lot::RwLock::new(ContextOwned::new(
            NamespaceMap::new(),
            CustomTypeTable::new(),
            decoding_options,
        )));

        let tick_notify = Arc::new(Notify::new());
        let worker_notify = Arc::new(Notify::new());
        let async_ops = Arc::new(AsyncOperationQueue::new(
            info.config.limits.max_async_operation_queue_size,
            info.config.limits.async_operation_timeout_ms,
        ));

        let state = ServerState {
            info: info.clone(),
            address_space,
            sessions: SessionManager::new(),
            subscriptions: SubscriptionStore::new(),
            async_ops,
            authenticator,
            async_method_handler: None,
            encoding_context,
            channels: HashMap::new(),
            tick_notify: tick_notify.clone(),
            worker_notify: worker_notify.clone(),
        };

        Server {
            state: Arc::new(Mutex::new(state)),
            info,
            token: CancellationToken::new(),
            tick_notify,
            worker_notify,
        }
    }

    /// A handle for the embedding application.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            state: self.state.clone(),
            token: self.token.clone(),
        }
    }

    /// Run the server until shutdown.
    pub async fn run(self) -> Result<(), StatusCode> {
        let addr = format!("{}:{}", self.info.config.host, self.info.config.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            error!("Cannot bind {addr}: {e}");
            StatusCode::BadCommunicationError
        })?;
        info!("Server listening on {addr}");

        self.spawn_tick_loop();
        self.spawn_workers();

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(a) => a,
                        Err(e) => {
                            error!("Accept failed: {e}");
                            continue;
                        }
                    };
                    debug!("Connection from {peer}");
                    self.spawn_connection(stream);
                }
            }
        }
        info!("Server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream) {
        let info = self.info.clone();
        let state = self.state.clone();
        let token = self.token.child_token();
        let encoding_context = state.lock().encoding_context.clone();

        tokio::spawn(async move {
            let config = TransportConfig {
                send_buffer_size: info.config.limits.send_buffer_size,
                receive_buffer_size: info.config.limits.receive_buffer_size,
                max_message_size: info.config.limits.max_message_size,
                max_chunk_count: info.config.limits.max_chunk_count,
                hello_timeout: Duration::from_millis(info.config.hello_timeout_ms),
            };
            let decoding_options = encoding_context.read().options().clone();
            let connector = TcpConnector::new(stream, config, decoding_options);
            let transport = match connector.connect(info.clone(), token.clone()).await {
                Ok(t) => t,
                Err(e) => {
                    debug!("Connection failed during handshake: {e}");
                    return;
                }
            };
            // The channel is Temporary from here until OpenSecureChannel.
            let channel = SecureChannel::new(
                info.certificate_store.clone(),
                Role::Server,
                encoding_context,
            );
            Connection::new(transport, channel, state, token).run().await;
        });
    }

    // The tick loop drives subscription publishing and, through the timer
    // scheduler, the periodic maintenance work: session expiry and the
    // async operation timeout sweep.
    fn spawn_tick_loop(&self) {
        let state = self.state.clone();
        let token = self.token.clone();
        let tick_notify = self.tick_notify.clone();

        tokio::spawn(async move {
            let mut scheduler = TimerScheduler::new();
            let now = Instant::now();

            let expiry_state = state.clone();
            scheduler.add_cyclic(
                move |now| {
                    let mut state = expiry_state.lock();
                    for session_id in state.sessions.expired_sessions(now) {
                        expire_session(&mut state, &session_id);
                    }
                },
                Duration::from_millis(1000),
                None,
                CycleMissPolicy::CurrentTime,
                now,
            );

            let sweep_state = state.clone();
            scheduler.add_cyclic(
                move |now| {
                    let state = sweep_state.lock();
                    state.async_ops.check_timeouts(now);
                },
                Duration::from_millis(500),
                None,
                CycleMissPolicy::CurrentTime,
                now,
            );

            loop {
                let now = Instant::now();
                let timer_deadline = scheduler.run_iterate(now);
                let subscription_deadline = {
                    let mut state = state.lock();
                    state.drain_async_inline();
                    state.tick(now)
                };

                let deadline = [timer_deadline, subscription_deadline]
                    .into_iter()
                    .flatten()
                    .min()
                    .unwrap_or(now + Duration::from_millis(500));
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick_notify.notified() => {}
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
                }
            }
        });
    }

    // Async workers process queued operations through the registered
    // handler. They never take the service mutex.
    fn spawn_workers(&self) {
        let workers = self.info.config.async_workers;
        for worker in 0..workers {
            let token = self.token.clone();
            let worker_notify = self.worker_notify.clone();
            let (queue, handler, tick_notify) = {
                let state = self.state.lock();
                (
                    state.async_ops.clone(),
                    state.async_method_handler.clone(),
                    state.tick_notify.clone(),
                )
            };
            let Some(handler) = handler else {
                debug!("No async handler registered, worker {worker} not started");
                return;
            };

            tokio::spawn(async move {
                loop {
                    while let Some((key, index, request)) = queue.dispatch() {
                        let inputs = request.input_arguments.clone().unwrap_or_default();
                        let result =
                            match handler(&request.object_id, &request.method_id, &inputs) {
                                Ok(outputs) => uastack_types::CallMethodResult {
                                    status_code: StatusCode::Good,
                                    output_arguments: Some(outputs),
                                    ..Default::default()
                                },
                                Err(status_code) => uastack_types::CallMethodResult {
                                    status_code,
                                    ..Default::default()
                                },
                            };
                        queue.set_result(key, index, result);
                        tick_notify.notify_one();
                    }
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = worker_notify.notified() => {}
                    }
                }
            });
        }
    }
}

fn expire_session(state: &mut ServerState, session_id: &NodeId) {
    info!("Session {session_id} timed out");
    state.sessions.remove(session_id);
    state
        .async_ops
        .cancel_session(session_id, StatusCode::BadSessionClosed);
    // Subscriptions of an expired session die with it
    state.subscriptions.remove_for_session(session_id);
}
