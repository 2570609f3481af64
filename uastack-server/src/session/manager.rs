// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use log::{error, info};

use uastack_crypto::{random, SecurityPolicy};
use uastack_types::{AuthenticationToken, NodeId, StatusCode};

use super::instance::Session;

static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);

pub(crate) fn next_session_id() -> NodeId {
    // Session ids live in namespace 1 by convention
    NodeId::new(1, NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Manages all sessions on the server, enforcing the session limit and
/// evicting timed out sessions.
#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<NodeId, Session>,
}

impl SessionManager {
    /// Create an empty manager.
    pub fn new() -> SessionManager {
        SessionManager {
            sessions: HashMap::new(),
        }
    }

    /// Find a session by its authentication token.
    pub fn find_by_token_mut(&mut self, token: &AuthenticationToken) -> Option<&mut Session> {
        self.sessions
            .values_mut()
            .find(|s| s.authentication_token() == token)
    }

    /// Find a session by its id.
    pub fn get_mut(&mut self, session_id: &NodeId) -> Option<&mut Session> {
        self.sessions.get_mut(session_id)
    }

    /// Register a freshly created session. When the server is saturated the
    /// oldest session without subscriptions is purged to make room; if every
    /// session has subscriptions the create fails with BadTooManySessions.
    pub fn register(
        &mut self,
        session: Session,
        max_sessions: usize,
        has_subscriptions: impl Fn(&NodeId) -> bool,
    ) -> Result<(), StatusCode> {
        if self.sessions.len() >= max_sessions {
            let purgeable = self
                .sessions
                .values()
                .filter(|s| !has_subscriptions(s.session_id()))
                .min_by_key(|s| s.deadline())
                .map(|s| s.session_id().clone());
            match purgeable {
                Some(id) => {
                    info!("Purging session {id} to make room for a new session");
                    self.sessions.remove(&id);
                }
                None => {
                    error!("Too many sessions, and none can be purged");
                    return Err(StatusCode::BadTooManySessions);
                }
            }
        }
        self.sessions
            .insert(session.session_id().clone(), session);
        Ok(())
    }

    /// Remove a session by id.
    pub fn remove(&mut self, session_id: &NodeId) -> Option<Session> {
        self.sessions.remove(session_id)
    }

    /// Sessions whose timeout has elapsed.
    pub fn expired_sessions(&self, now: Instant) -> Vec<NodeId> {
        self.sessions
            .values()
            .filter(|s| s.deadline() < now)
            .map(|s| s.session_id().clone())
            .collect()
    }

    /// Detach every session bound to the given channel. The sessions stay
    /// alive for their timeout so another channel may reactivate them.
    pub fn detach_channel(&mut self, secure_channel_id: u32) {
        for session in self.sessions.values_mut() {
            if session.secure_channel_id() == secure_channel_id {
                session.detach_channel();
            }
        }
    }

    /// Iterate sessions mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` when no sessions exist.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Build the pieces of a new session: id, authentication token and nonce.
pub(crate) fn new_session_parts(
    security_policy: SecurityPolicy,
) -> (NodeId, AuthenticationToken, uastack_types::ByteString) {
    let session_id = next_session_id();
    let authentication_token = AuthenticationToken(NodeId::new(0, random::byte_string(32)));
    let nonce = if security_policy == SecurityPolicy::None {
        random::byte_string(32)
    } else {
        security_policy.random_nonce()
    };
    (session_id, authentication_token, nonce)
}

/// Clamp a requested session timeout to the server maximum.
pub(crate) fn revise_session_timeout(requested_ms: f64, max_ms: u64) -> Duration {
    let requested = if requested_ms.is_finite() && requested_ms >= 1.0 {
        requested_ms as u64
    } else {
        max_ms
    };
    Duration::from_millis(requested.min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uastack_types::ByteString;

    fn session(id: u32) -> Session {
        Session::new(
            NodeId::new(1, id),
            AuthenticationToken(NodeId::new(0, random::byte_string(32))),
            1,
            Duration::from_secs(60),
            ByteString::null(),
            None,
            "opc.tcp://localhost:4840".into(),
        )
    }

    #[test]
    fn saturation_purges_session_without_subscriptions() {
        let mut mgr = SessionManager::new();
        mgr.register(session(1), 2, |_| false).unwrap();
        mgr.register(session(2), 2, |_| false).unwrap();
        // Session 1 and 2 have no subscriptions, one gets purged
        mgr.register(session(3), 2, |_| false).unwrap();
        assert_eq!(mgr.len(), 2);

        // All remaining sessions have subscriptions: no room
        let err = mgr.register(session(4), 2, |_| true).unwrap_err();
        assert_eq!(err, StatusCode::BadTooManySessions);
    }

    #[test]
    fn detach_keeps_session_alive() {
        let mut mgr = SessionManager::new();
        mgr.register(session(1), 10, |_| false).unwrap();
        mgr.detach_channel(1);
        let session = mgr.get_mut(&NodeId::new(1, 1u32)).unwrap();
        assert_eq!(session.secure_channel_id(), 0);
        assert!(session.validate_timed_out().is_ok());
    }
}
