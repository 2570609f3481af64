// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Drives one client connection: the secure channel lifecycle from the
//! HELLO/ACKNOWLEDGE handshake through OpenSecureChannel, token renewal and
//! CloseSecureChannel, and the dispatch of service requests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::{debug, error, info};
use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use uastack_core::{
    comms::{
        message_chunk_info::ChunkInfo,
        secure_channel::SecureChannel,
        security_header::SecurityHeader,
        tcp_types::ErrorMessage,
    },
    RequestMessage, ResponseMessage,
};
use uastack_crypto::SecurityPolicy;
use uastack_types::{
    ByteString, ChannelSecurityToken, DateTime, MessageSecurityMode, OpenSecureChannelRequest,
    OpenSecureChannelResponse, ResponseHeader, SecurityTokenRequestType, StatusCode,
};

use crate::{
    server::ServerState,
    services::{self, ChannelInfo, HandleResult},
    transport::{Request, TcpTransport, TransportPollResult},
};

static NEXT_CHANNEL_ID: AtomicU32 = AtomicU32::new(1);

/// The lifecycle of the server side secure channel. `Fresh` is the time
/// before the HELLO handshake, which happens in the connector; the channel
/// created after ACKNOWLEDGE is `Temporary` until OpenSecureChannel
/// succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Temporary,
    Open,
    Closed,
}

/// Deferred response routed to a connection: (request id, response).
pub(crate) type DeferredResponse = (u32, ResponseMessage);
/// Sender half registered in the server state by channel id.
pub(crate) type DeferredSender = UnboundedSender<DeferredResponse>;

pub(crate) struct Connection {
    transport: TcpTransport,
    channel: SecureChannel,
    state: ChannelState,
    secure_channel_id: u32,
    /// A renew was issued and the client has not yet used the new token.
    renewing: bool,
    server_state: Arc<Mutex<ServerState>>,
    deferred_rx: UnboundedReceiver<DeferredResponse>,
    deferred_tx: DeferredSender,
    token: CancellationToken,
}

impl Connection {
    pub(crate) fn new(
        transport: TcpTransport,
        channel: SecureChannel,
        server_state: Arc<Mutex<ServerState>>,
        token: CancellationToken,
    ) -> Connection {
        let (deferred_tx, deferred_rx) = deferred_channel();
        Connection {
            transport,
            channel,
            state: ChannelState::Temporary,
            secure_channel_id: 0,
            renewing: false,
            server_state,
            deferred_rx,
            deferred_tx,
            token,
        }
    }

    /// Run the connection until it closes.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    self.transport.enqueue_error(ErrorMessage::new(
                        StatusCode::BadServerHalted,
                        "Server shutting down",
                    ));
                    self.transport.set_closing();
                }
                deferred = self.deferred_rx.recv() => {
                    if let Some((request_id, response)) = deferred {
                        let _ = self.transport.enqueue_message_for_send(
                            &mut self.channel,
                            response,
                            request_id,
                        );
                    }
                }
                result = self.transport.poll(&mut self.channel) => {
                    match result {
                        TransportPollResult::OutgoingMessageSent
                        | TransportPollResult::IncomingChunk => {}
                        TransportPollResult::IncomingMessage(request) => {
                            if self.handle_message(request).is_err() {
                                self.transport.set_closing();
                            }
                        }
                        TransportPollResult::RecoverableError(status, request_id, request_handle) => {
                            // A corrupt message aborts the message, not the
                            // channel.
                            debug!("Recoverable error {status} on request {request_id}");
                            let fault = ResponseMessage::ServiceFault(Box::new(
                                uastack_types::ServiceFault {
                                    response_header: ResponseHeader::new_service_result(
                                        request_handle,
                                        status,
                                    ),
                                },
                            ));
                            let _ = self.transport.enqueue_message_for_send(
                                &mut self.channel,
                                fault,
                                request_id,
                            );
                        }
                        TransportPollResult::Error(status) => {
                            error!("Fatal transport error {status}, closing channel");
                            self.transport.enqueue_error(ErrorMessage::new(status, "Fatal error"));
                            self.transport.set_closing();
                        }
                        TransportPollResult::Closed => break,
                    }
                }
            }
        }
        self.state = ChannelState::Closed;

        // Sessions survive the channel within their timeout, another channel
        // may re-activate them.
        let mut state = self.server_state.lock();
        state.deregister_channel(self.secure_channel_id);
        state.sessions.detach_channel(self.secure_channel_id);
        info!("Channel {} closed", self.secure_channel_id);
    }

    fn handle_message(&mut self, request: Request) -> Result<(), StatusCode> {
        match request.message {
            RequestMessage::OpenSecureChannel(r) => {
                self.open_secure_channel(&r, request.request_id, &request.chunk_info)
            }
            RequestMessage::CloseSecureChannel(_) => {
                debug!("Client closed secure channel {}", self.secure_channel_id);
                self.transport.set_closing();
                Ok(())
            }
            message => {
                if self.state != ChannelState::Open {
                    error!("Service request on a channel that is not open");
                    return Err(StatusCode::BadSecureChannelIdInvalid);
                }
                self.validate_token(&request.chunk_info)?;

                let channel_info = ChannelInfo {
                    secure_channel_id: self.secure_channel_id,
                    security_policy: self.channel.security_policy(),
                    security_mode: self.channel.security_mode(),
                };
                let result = {
                    let mut state = self.server_state.lock();
                    let ctx_handle = state.encoding_context.clone();
                    let ctx_r = ctx_handle.read();
                    let ctx = ctx_r.context();
                    services::handle_request(
                        &mut state,
                        &channel_info,
                        message,
                        request.request_id,
                        &ctx,
                    )
                };
                match result {
                    HandleResult::Response(response) => {
                        let _ = self.transport.enqueue_message_for_send(
                            &mut self.channel,
                            response,
                            request.request_id,
                        );
                    }
                    HandleResult::Deferred => {}
                }
                Ok(())
            }
        }
    }

    // The token of a symmetric message must belong to this channel and be
    // within its lifetime. First use of a renewed token completes the
    // rotation.
    fn validate_token(&mut self, chunk_info: &ChunkInfo) -> Result<(), StatusCode> {
        let SecurityHeader::Symmetric(header) = &chunk_info.security_header else {
            return Err(StatusCode::BadSecurityChecksFailed);
        };
        if !self.channel.is_known_token(header.token_id) {
            error!("Unknown token id {}", header.token_id);
            return Err(StatusCode::BadSecureChannelTokenUnknown);
        }
        // The previous token is accepted for 25% of its lifetime after the
        // renewal; beyond that the current token's expiry governs.
        let expiry = self.channel.token_created_at()
            + chrono::Duration::milliseconds((self.channel.token_lifetime() as i64 * 5) / 4);
        if DateTime::now() > expiry {
            error!("Token {} has expired", header.token_id);
            return Err(StatusCode::BadSecureChannelTokenUnknown);
        }
        if self.renewing && header.token_id == self.channel.token_id() {
            // The client switched to the renewed token; the old one will
            // age out of the key store.
            self.renewing = false;
        }
        Ok(())
    }

    fn open_secure_channel(
        &mut self,
        request: &OpenSecureChannelRequest,
        request_id: u32,
        chunk_info: &ChunkInfo,
    ) -> Result<(), StatusCode> {
        // The security header of the OPN chunk carries policy and the client
        // certificate.
        let security_policy = match &chunk_info.security_header {
            SecurityHeader::Asymmetric(header) => {
                let policy = SecurityPolicy::from_uri(header.security_policy_uri.as_ref());
                if policy == SecurityPolicy::Unknown {
                    return Err(StatusCode::BadSecurityPolicyRejected);
                }
                if policy != SecurityPolicy::None {
                    self.channel
                        .set_remote_cert_from_byte_string(&header.sender_certificate)?;
                }
                policy
            }
            SecurityHeader::Symmetric(_) => return Err(StatusCode::BadSecurityChecksFailed),
        };
        if security_policy == SecurityPolicy::None
            && request.security_mode != MessageSecurityMode::None
        {
            error!("Cannot use a security mode with the None policy");
            return Err(StatusCode::BadSecurityModeRejected);
        }
        if request.security_mode == MessageSecurityMode::Invalid {
            return Err(StatusCode::BadSecurityModeRejected);
        }

        match request.request_type {
            SecurityTokenRequestType::Issue => {
                if self.state != ChannelState::Temporary {
                    error!("OpenSecureChannel issue on an already open channel");
                    return Err(StatusCode::BadRequestTypeInvalid);
                }
                self.secure_channel_id = NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed);
            }
            SecurityTokenRequestType::Renew => {
                if self.state != ChannelState::Open {
                    error!("OpenSecureChannel renew on a channel that is not open");
                    return Err(StatusCode::BadRequestTypeInvalid);
                }
                if self.renewing {
                    // A second renew while the previous rotation has not
                    // completed is rejected.
                    error!("Renew while a token rotation is still pending");
                    return Err(StatusCode::BadSecurityChecksFailed);
                }
            }
        }

        let max_lifetime = {
            let state = self.server_state.lock();
            state.info.config.limits.max_security_token_lifetime_ms
        };
        let revised_lifetime = if request.requested_lifetime == 0 {
            max_lifetime
        } else {
            request.requested_lifetime.clamp(1000, max_lifetime)
        };

        let token = ChannelSecurityToken {
            channel_id: self.secure_channel_id,
            token_id: self.channel.token_id() + 1,
            created_at: DateTime::now(),
            revised_lifetime,
        };

        self.channel.set_security_policy(security_policy);
        self.channel.set_security_mode(request.security_mode);
        self.channel
            .set_remote_nonce_from_byte_string(&request.client_nonce)?;
        self.channel.set_security_token(token.clone());
        if security_policy != SecurityPolicy::None {
            self.channel.create_random_nonce();
            self.channel.derive_keys();
        }

        match request.request_type {
            SecurityTokenRequestType::Issue => {
                self.state = ChannelState::Open;
                self.server_state
                    .lock()
                    .register_channel(self.secure_channel_id, self.deferred_tx.clone());
                info!(
                    "Opened secure channel {} with policy {} mode {:?}",
                    self.secure_channel_id, security_policy, request.security_mode
                );
            }
            SecurityTokenRequestType::Renew => {
                self.renewing = true;
                info!("Renewed token on channel {}", self.secure_channel_id);
            }
        }

        let server_nonce = if security_policy == SecurityPolicy::None {
            ByteString::null()
        } else {
            self.channel.local_nonce_as_byte_string()
        };
        let response: ResponseMessage = OpenSecureChannelResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            server_protocol_version: 0,
            security_token: token,
            server_nonce,
        }
        .into();
        let _ = self
            .transport
            .enqueue_message_for_send(&mut self.channel, response, request_id);
        Ok(())
    }

}

/// Create the deferred-response plumbing for a new connection.
pub(crate) fn deferred_channel() -> (DeferredSender, UnboundedReceiver<DeferredResponse>) {
    tokio::sync::mpsc::unbounded_channel()
}
