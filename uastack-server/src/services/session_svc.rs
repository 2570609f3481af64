// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The session service set: CreateSession, ActivateSession, CloseSession
//! and Cancel.

use log::{error, info};

use uastack_core::ResponseMessage;
use uastack_crypto::{self as crypto, SecurityPolicy, X509};
use uastack_types::{
    ActivateSessionRequest, ActivateSessionResponse, AuthenticationToken, CancelRequest,
    CancelResponse, CloseSessionRequest, CloseSessionResponse, Context, CreateSessionRequest,
    CreateSessionResponse, ResponseHeader, SignatureData, StatusCode,
};

use crate::{
    identity_token::IdentityToken,
    server::ServerState,
    session::{new_session_parts, revise_session_timeout, Session},
};

use super::{ChannelInfo, HandleResult};

pub(crate) fn create_session(
    state: &mut ServerState,
    channel: &ChannelInfo,
    request: &CreateSessionRequest,
) -> HandleResult {
    match create_session_inner(state, channel, request) {
        Ok(response) => HandleResult::Response(response.into()),
        Err(status) => HandleResult::Response(ResponseMessage::service_fault(
            &request.request_header,
            status,
        )),
    }
}

fn create_session_inner(
    state: &mut ServerState,
    channel: &ChannelInfo,
    request: &CreateSessionRequest,
) -> Result<CreateSessionResponse, StatusCode> {
    if request.endpoint_url.is_null() {
        error!("Create session was passed a null endpoint url");
        return Err(StatusCode::BadTcpEndpointUrlInvalid);
    }
    let endpoints = state.info.endpoint_descriptions();
    if endpoints.is_empty() {
        return Err(StatusCode::BadTcpEndpointUrlInvalid);
    }

    // With security enabled the client certificate must verify against the
    // trust store.
    let client_certificate = if channel.security_policy != SecurityPolicy::None {
        let cert = X509::from_byte_string(&request.client_certificate)?;
        state
            .info
            .certificate_store
            .read()
            .validate_or_reject_application_instance_cert(
                &cert,
                channel.security_policy,
                None,
                None,
            )?;
        Some(cert)
    } else {
        None
    };

    let timeout = revise_session_timeout(
        request.requested_session_timeout,
        state.info.config.max_session_timeout_ms,
    );

    // Sign client certificate and nonce so the client can verify who it is
    // talking to.
    let server_signature = match &state.info.server_pkey {
        Some(pkey) if channel.security_policy != SecurityPolicy::None => {
            crypto::create_signature_data(
                pkey,
                channel.security_policy,
                &request.client_certificate,
                &request.client_nonce,
            )
            .unwrap_or_else(|err| {
                error!("Cannot create server signature: {err}");
                SignatureData::null()
            })
        }
        _ => SignatureData::null(),
    };

    let (session_id, authentication_token, server_nonce) =
        new_session_parts(channel.security_policy);

    let session = Session::new(
        session_id.clone(),
        authentication_token.clone(),
        channel.secure_channel_id,
        timeout,
        server_nonce.clone(),
        client_certificate,
        request.endpoint_url.clone(),
    );

    let subscriptions = &state.subscriptions;
    state.sessions.register(
        session,
        state.info.config.limits.max_sessions,
        |session_id| subscriptions.count_for_session(session_id) > 0,
    )?;
    info!("Created session {session_id}");

    Ok(CreateSessionResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        session_id,
        authentication_token: authentication_token.0,
        revised_session_timeout: timeout.as_millis() as f64,
        server_nonce,
        server_certificate: state.info.server_certificate_as_byte_string(),
        server_endpoints: Some(endpoints),
        server_software_certificates: None,
        server_signature,
        max_request_message_size: state.info.config.limits.max_message_size as u32,
    })
}

pub(crate) fn activate_session(
    state: &mut ServerState,
    channel: &ChannelInfo,
    request: &ActivateSessionRequest,
    ctx: &Context<'_>,
) -> HandleResult {
    match activate_session_inner(state, channel, request, ctx) {
        Ok(response) => HandleResult::Response(response.into()),
        Err(status) => HandleResult::Response(ResponseMessage::service_fault(
            &request.request_header,
            status,
        )),
    }
}

fn activate_session_inner(
    state: &mut ServerState,
    channel: &ChannelInfo,
    request: &ActivateSessionRequest,
    ctx: &Context<'_>,
) -> Result<ActivateSessionResponse, StatusCode> {
    let token = AuthenticationToken(request.request_header.authentication_token.clone());
    let identity = IdentityToken::parse(&request.user_identity_token, ctx)?;
    let user_token = state.authenticator.authenticate(&identity)?;
    let server_certificate = state.info.server_certificate.clone();
    let security_policy = channel.security_policy;

    let Some(session) = state.sessions.find_by_token_mut(&token) else {
        return Err(StatusCode::BadSessionIdInvalid);
    };
    session.validate_timed_out()?;

    if security_policy != SecurityPolicy::None {
        // The client proves possession of its certificate's key by signing
        // server certificate and nonce.
        let (Some(client_certificate), Some(server_certificate)) =
            (session.client_certificate(), server_certificate.as_ref())
        else {
            return Err(StatusCode::BadSecurityChecksFailed);
        };
        crypto::verify_signature_data(
            &request.client_signature,
            security_policy,
            client_certificate,
            server_certificate,
            session.session_nonce().as_ref(),
        )
        .map_err(|e| {
            error!("Client signature verification failed: {e}");
            StatusCode::BadApplicationSignatureInvalid
        })?;
    }

    // Re-activation may move the session to another channel, but an
    // unactivated session can only be activated from its creating channel.
    if !session.is_activated() && session.secure_channel_id() != channel.secure_channel_id {
        error!(
            "ActivateSession rejected, channel {} did not create this session",
            channel.secure_channel_id
        );
        return Err(StatusCode::BadSecureChannelIdInvalid);
    }

    // Fresh nonce for the next activation
    let server_nonce = if security_policy == SecurityPolicy::None {
        crypto::random::byte_string(32)
    } else {
        security_policy.random_nonce()
    };
    session.activate(
        channel.secure_channel_id,
        server_nonce.clone(),
        identity,
        user_token,
    );
    info!("Activated session {}", session.session_id());

    Ok(ActivateSessionResponse {
        response_header: ResponseHeader::new_good(&request.request_header),
        server_nonce,
        results: None,
        diagnostic_infos: None,
    })
}

pub(crate) fn close_session(
    state: &mut ServerState,
    channel: &ChannelInfo,
    request: &CloseSessionRequest,
) -> HandleResult {
    let token = AuthenticationToken(request.request_header.authentication_token.clone());
    let Some(session) = state.sessions.find_by_token_mut(&token) else {
        return HandleResult::Response(ResponseMessage::service_fault(
            &request.request_header,
            StatusCode::BadSessionIdInvalid,
        ));
    };
    if !session.is_activated() && session.secure_channel_id() != channel.secure_channel_id {
        return HandleResult::Response(ResponseMessage::service_fault(
            &request.request_header,
            StatusCode::BadSecureChannelIdInvalid,
        ));
    }
    let session_id = session.session_id().clone();
    state.sessions.remove(&session_id);
    state
        .async_ops
        .cancel_session(&session_id, StatusCode::BadSessionClosed);
    if request.delete_subscriptions {
        let removed = state.subscriptions.remove_for_session(&session_id);
        info!(
            "Closed session {session_id}, deleted {} subscriptions",
            removed.len()
        );
    } else {
        info!("Closed session {session_id}, subscriptions remain until they expire");
    }

    HandleResult::Response(
        CloseSessionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
        }
        .into(),
    )
}

pub(crate) fn cancel(
    state: &mut ServerState,
    channel: &ChannelInfo,
    request: &CancelRequest,
) -> HandleResult {
    let session = match super::resolve_session(state, channel, &request.request_header) {
        Ok(session) => session,
        Err(status) => {
            return HandleResult::Response(ResponseMessage::service_fault(
                &request.request_header,
                status,
            ))
        }
    };
    let cancel_count = state
        .async_ops
        .cancel(&session.session_id, request.request_handle);
    HandleResult::Response(
        CancelResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            cancel_count,
        }
        .into(),
    )
}
