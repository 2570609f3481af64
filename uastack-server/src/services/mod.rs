// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Service request dispatch. Each service decodes into a request structure,
//! routes the operations to operation-level handlers, and produces a
//! response. Operation failures go into per-operation status codes with an
//! overall `Good` result; whole-request failures become service faults.

mod attributes;
mod method;
mod node_management;
mod session_svc;
mod subscription_svc;

pub use method::sync_method_call;

use log::debug;

use uastack_core::{RequestMessage, ResponseMessage};
use uastack_crypto::SecurityPolicy;
use uastack_types::{
    AuthenticationToken, Context, MessageSecurityMode, NodeId, StatusCode,
};

use crate::{authenticator::UserToken, server::ServerState};

/// Properties of the secure channel a request arrived on.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    /// The id of the channel.
    pub secure_channel_id: u32,
    /// The security policy of the channel.
    pub security_policy: SecurityPolicy,
    /// The security mode of the channel.
    pub security_mode: MessageSecurityMode,
}

/// Result of handling one request.
pub enum HandleResult {
    /// A response to send now.
    Response(ResponseMessage),
    /// The response is produced later, e.g. by a publishing cycle or an
    /// async worker.
    Deferred,
}

impl HandleResult {
    fn fault(request_header: &uastack_types::RequestHeader, status: StatusCode) -> HandleResult {
        HandleResult::Response(ResponseMessage::service_fault(request_header, status))
    }
}

/// Handle one service request. Secure channel management messages never
/// reach this function; they are handled by the connection.
pub fn handle_request(
    state: &mut ServerState,
    channel: &ChannelInfo,
    request: RequestMessage,
    request_id: u32,
    ctx: &Context<'_>,
) -> HandleResult {
    debug!("Handling request {request_id}");
    match request {
        RequestMessage::CreateSession(request) => {
            session_svc::create_session(state, channel, &request)
        }
        RequestMessage::ActivateSession(request) => {
            session_svc::activate_session(state, channel, &request, ctx)
        }
        RequestMessage::CloseSession(request) => {
            session_svc::close_session(state, channel, &request)
        }
        RequestMessage::Cancel(request) => session_svc::cancel(state, channel, &request),
        RequestMessage::Read(request) => with_session(state, channel, request, |state, s, r| {
            attributes::read(state, &s, &r)
        }),
        RequestMessage::Write(request) => with_session(state, channel, request, |state, s, r| {
            attributes::write(state, &s, &r)
        }),
        RequestMessage::Call(request) => {
            let session = match resolve_session(state, channel, &request.request_header) {
                Ok(session) => session,
                Err(status) => return HandleResult::fault(&request.request_header, status),
            };
            method::call(state, channel, &session, &request, request_id)
        }
        RequestMessage::AddNodes(request) => {
            with_session(state, channel, request, |state, s, r| {
                node_management::add_nodes(state, &s, &r, ctx)
            })
        }
        RequestMessage::AddReferences(request) => {
            with_session(state, channel, request, |state, s, r| {
                node_management::add_references(state, &s, &r)
            })
        }
        RequestMessage::DeleteNodes(request) => {
            with_session(state, channel, request, |state, s, r| {
                node_management::delete_nodes(state, &s, &r)
            })
        }
        RequestMessage::DeleteReferences(request) => {
            with_session(state, channel, request, |state, s, r| {
                node_management::delete_references(state, &s, &r)
            })
        }
        RequestMessage::CreateSubscription(request) => {
            with_session(state, channel, request, |state, s, r| {
                subscription_svc::create_subscription(state, &s, &r)
            })
        }
        RequestMessage::SetPublishingMode(request) => {
            with_session(state, channel, request, |state, s, r| {
                subscription_svc::set_publishing_mode(state, &s, &r)
            })
        }
        RequestMessage::DeleteSubscriptions(request) => {
            with_session(state, channel, request, |state, s, r| {
                subscription_svc::delete_subscriptions(state, &s, &r)
            })
        }
        RequestMessage::CreateMonitoredItems(request) => {
            with_session(state, channel, request, |state, s, r| {
                subscription_svc::create_monitored_items(state, &s, &r, ctx)
            })
        }
        RequestMessage::DeleteMonitoredItems(request) => {
            with_session(state, channel, request, |state, s, r| {
                subscription_svc::delete_monitored_items(state, &s, &r)
            })
        }
        RequestMessage::Publish(request) => {
            subscription_svc::publish(state, channel, &request, request_id)
        }
        RequestMessage::Republish(request) => {
            with_session(state, channel, request, |state, s, r| {
                subscription_svc::republish(state, &s, &r)
            })
        }
        // Routed in the connection before dispatch
        RequestMessage::OpenSecureChannel(request) => {
            HandleResult::fault(&request.request_header, StatusCode::BadUnexpectedError)
        }
        RequestMessage::CloseSecureChannel(request) => {
            HandleResult::fault(&request.request_header, StatusCode::BadUnexpectedError)
        }
    }
}

/// An activated session resolved from a request header.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    /// The session id.
    pub session_id: NodeId,
    /// The authenticated user.
    pub user_token: UserToken,
}

// Resolve and touch the session of a request. Any request on a session
// keeps it alive.
fn resolve_session(
    state: &mut ServerState,
    channel: &ChannelInfo,
    request_header: &uastack_types::RequestHeader,
) -> Result<ResolvedSession, StatusCode> {
    let token = AuthenticationToken(request_header.authentication_token.clone());
    let Some(session) = state.sessions.find_by_token_mut(&token) else {
        return Err(StatusCode::BadSessionIdInvalid);
    };
    session.validate_timed_out()?;
    if !session.is_activated() {
        return Err(StatusCode::BadSessionNotActivated);
    }
    if session.secure_channel_id() != channel.secure_channel_id {
        return Err(StatusCode::BadSecureChannelIdInvalid);
    }
    session.keep_alive();
    Ok(ResolvedSession {
        session_id: session.session_id().clone(),
        user_token: session
            .user_token()
            .cloned()
            .unwrap_or_else(UserToken::anonymous),
    })
}

fn with_session<R, F>(
    state: &mut ServerState,
    channel: &ChannelInfo,
    request: Box<R>,
    f: F,
) -> HandleResult
where
    R: HasRequestHeader,
    F: FnOnce(&mut ServerState, ResolvedSession, R) -> Result<ResponseMessage, StatusCode>,
{
    let session = match resolve_session(state, channel, request.request_header()) {
        Ok(session) => session,
        Err(status) => {
            return HandleResult::Response(ResponseMessage::service_fault(
                request.request_header(),
                status,
            ))
        }
    };
    // The header is needed for faults after the request is consumed
    let header = request.request_header().clone();
    match f(state, session, *request) {
        Ok(response) => HandleResult::Response(response),
        Err(status) => {
            HandleResult::Response(ResponseMessage::service_fault(&header, status))
        }
    }
}

/// Trait over request structures exposing their header.
pub trait HasRequestHeader {
    /// The request header of the message.
    fn request_header(&self) -> &uastack_types::RequestHeader;
}

macro_rules! has_request_header {
    ($($t:ty),* $(,)?) => {
        $(
            impl HasRequestHeader for $t {
                fn request_header(&self) -> &uastack_types::RequestHeader {
                    &self.request_header
                }
            }
        )*
    };
}

has_request_header!(
    uastack_types::ReadRequest,
    uastack_types::WriteRequest,
    uastack_types::CallRequest,
    uastack_types::AddNodesRequest,
    uastack_types::AddReferencesRequest,
    uastack_types::DeleteNodesRequest,
    uastack_types::DeleteReferencesRequest,
    uastack_types::CreateSubscriptionRequest,
    uastack_types::SetPublishingModeRequest,
    uastack_types::DeleteSubscriptionsRequest,
    uastack_types::CreateMonitoredItemsRequest,
    uastack_types::DeleteMonitoredItemsRequest,
    uastack_types::PublishRequest,
    uastack_types::RepublishRequest,
);
