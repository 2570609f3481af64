// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use uastack_crypto::X509;
use uastack_types::{
    AuthenticationToken, ByteString, IntegerId, NodeId, StatusCode, UAString,
};

use crate::{authenticator::UserToken, identity_token::IdentityToken};

/// A publish request parked on the session until a publishing cycle
/// produces something to send.
pub struct QueuedPublish {
    /// The transport request id, needed to route the response.
    pub request_id: u32,
    /// The request handle from the request header.
    pub request_handle: IntegerId,
    /// The channel the request arrived on.
    pub secure_channel_id: u32,
    /// Acknowledgement results to return with the response.
    pub results: Option<Vec<StatusCode>>,
    /// When the request times out with BadTimeout.
    pub deadline: Instant,
}

/// A session: the logical user context created over a secure channel.
pub struct Session {
    /// The session id, also its node id in the session diagnostics.
    session_id: NodeId,
    /// The secret token identifying requests of this session.
    authentication_token: AuthenticationToken,
    /// The channel currently carrying the session. A session is bound to at
    /// most one channel at a time; re-activation can move it.
    secure_channel_id: u32,
    /// Whether ActivateSession succeeded on this session.
    activated: bool,
    /// Negotiated session timeout.
    timeout: Duration,
    /// Last time a request arrived for this session.
    last_service_request: Instant,
    /// The nonce used for the client signature of the next activation.
    session_nonce: ByteString,
    /// The certificate of the client that created the session. Re-activation
    /// from another channel must present the same certificate.
    client_certificate: Option<X509>,
    /// The endpoint the session was created against.
    endpoint_url: UAString,
    /// The authenticated user, set on activation.
    user_token: Option<UserToken>,
    /// The identity used to activate.
    identity: IdentityToken,
    /// Parked publish requests, oldest first.
    publish_queue: VecDeque<QueuedPublish>,
}

impl Session {
    /// Create a new, unactivated session.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: NodeId,
        authentication_token: AuthenticationToken,
        secure_channel_id: u32,
        timeout: Duration,
        session_nonce: ByteString,
        client_certificate: Option<X509>,
        endpoint_url: UAString,
    ) -> Session {
        Session {
            session_id,
            authentication_token,
            secure_channel_id,
            activated: false,
            timeout,
            last_service_request: Instant::now(),
            session_nonce,
            client_certificate,
            endpoint_url,
            user_token: None,
            identity: IdentityToken::None,
            publish_queue: VecDeque::new(),
        }
    }

    /// The session id.
    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    /// The authentication token of the session.
    pub fn authentication_token(&self) -> &AuthenticationToken {
        &self.authentication_token
    }

    /// The channel currently carrying the session.
    pub fn secure_channel_id(&self) -> u32 {
        self.secure_channel_id
    }

    /// Whether the session has been activated.
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// The session nonce for the next activation signature.
    pub fn session_nonce(&self) -> &ByteString {
        &self.session_nonce
    }

    /// The certificate of the creating client.
    pub fn client_certificate(&self) -> Option<&X509> {
        self.client_certificate.as_ref()
    }

    /// The endpoint the session was created against.
    pub fn endpoint_url(&self) -> &UAString {
        &self.endpoint_url
    }

    /// The authenticated user token.
    pub fn user_token(&self) -> Option<&UserToken> {
        self.user_token.as_ref()
    }

    /// Activate the session: bind it to the given channel and store the
    /// authenticated identity. A fresh nonce is set for the next activation.
    pub fn activate(
        &mut self,
        secure_channel_id: u32,
        server_nonce: ByteString,
        identity: IdentityToken,
        user_token: UserToken,
    ) {
        self.activated = true;
        self.secure_channel_id = secure_channel_id;
        self.session_nonce = server_nonce;
        self.identity = identity;
        self.user_token = Some(user_token);
        self.keep_alive();
    }

    /// Mark session activity, postponing its expiry.
    pub fn keep_alive(&mut self) {
        self.last_service_request = Instant::now();
    }

    /// The instant the session expires if nothing else happens.
    pub fn deadline(&self) -> Instant {
        self.last_service_request + self.timeout
    }

    /// Validate the session has not timed out.
    pub fn validate_timed_out(&self) -> Result<(), StatusCode> {
        if Instant::now() > self.deadline() {
            Err(StatusCode::BadSessionClosed)
        } else {
            Ok(())
        }
    }

    /// Park a publish request. The caller enforces the queue limit.
    pub fn enqueue_publish(&mut self, publish: QueuedPublish) {
        self.publish_queue.push_back(publish);
    }

    /// Take the oldest queued publish request.
    pub fn dequeue_publish(&mut self) -> Option<QueuedPublish> {
        self.publish_queue.pop_front()
    }

    /// Number of queued publish requests.
    pub fn publish_queue_len(&self) -> usize {
        self.publish_queue.len()
    }

    /// Drop queued publish requests past their deadline, returning them so
    /// the caller can answer with BadTimeout.
    pub fn expire_publish_requests(&mut self, now: Instant) -> Vec<QueuedPublish> {
        let mut expired = Vec::new();
        while self
            .publish_queue
            .front()
            .is_some_and(|front| front.deadline <= now)
        {
            if let Some(publish) = self.publish_queue.pop_front() {
                expired.push(publish);
            }
        }
        expired
    }

    /// Detach the session from its channel, e.g. when the channel dies. The
    /// session survives until its timeout; another channel may reactivate it
    /// with the same client certificate.
    pub fn detach_channel(&mut self) {
        self.secure_channel_id = 0;
    }
}
