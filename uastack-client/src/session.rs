// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The client session facade: create and activate a session over a secure
//! channel, call the services the stack implements, and pump publish
//! requests for subscriptions.

use std::sync::Arc;

use log::{debug, error, info};

use uastack_core::{config::Config, RequestMessage, ResponseMessage};
use uastack_crypto::SecurityPolicy;
use uastack_types::{
    ActivateSessionRequest, AnonymousIdentityToken, ApplicationType, ByteString,
    CallMethodRequest, CallMethodResult, CallRequest, CloseSessionRequest, ContextOwned,
    CreateSessionRequest, CreateSubscriptionRequest, CreateMonitoredItemsRequest, DataValue,
    ExtensionObject, MonitoredItemCreateRequest, MonitoredItemCreateResult, NodeId,
    NotificationMessage, PublishRequest, ReadRequest, ReadValueId, StatusCode,
    SubscriptionAcknowledgement, TimestampsToReturn, UAString, UserTokenPolicy, Variant,
    WriteRequest, WriteValue,
};

use crate::transport::{AsyncSecureChannel, TransportConfiguration};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Application name advertised in the session.
    pub application_name: String,
    /// Application uri advertised in the session.
    pub application_uri: String,
    /// Product uri advertised in the session.
    pub product_uri: String,
    /// Requested session timeout in milliseconds.
    pub session_timeout_ms: f64,
    /// Transport limits.
    pub transport: TransportConfiguration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_name: "uastack client".to_string(),
            application_uri: "urn:uastack:client".to_string(),
            product_uri: "urn:uastack".to_string(),
            session_timeout_ms: 60_000.0,
            transport: TransportConfiguration::default(),
        }
    }
}

impl serde::Serialize for ClientConfig {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ClientConfig", 3)?;
        s.serialize_field("application_name", &self.application_name)?;
        s.serialize_field("application_uri", &self.application_uri)?;
        s.serialize_field("product_uri", &self.product_uri)?;
        s.end()
    }
}

impl Config for ClientConfig {
    fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.application_uri.is_empty() {
            errors.push("Application uri is empty".to_string());
        }
        errors
    }

    fn application_name(&self) -> UAString {
        UAString::from(&self.application_name)
    }

    fn application_uri(&self) -> UAString {
        UAString::from(&self.application_uri)
    }

    fn product_uri(&self) -> UAString {
        UAString::from(&self.product_uri)
    }

    fn application_type(&self) -> ApplicationType {
        ApplicationType::Client
    }

    fn discovery_urls(&self) -> Option<Vec<UAString>> {
        None
    }
}

/// The client: connects channels and creates sessions.
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// Create a client from a config.
    pub fn new(config: ClientConfig) -> Client {
        Client { config }
    }

    /// Connect to an endpoint, create and activate an anonymous session.
    /// The transport event loop is spawned on the runtime.
    pub async fn connect_to_endpoint(&self, endpoint_url: &str) -> Result<Session, StatusCode> {
        let channel = Arc::new(AsyncSecureChannel::new(
            endpoint_url,
            SecurityPolicy::None,
            self.config.transport.clone(),
        ));
        let event_loop = channel.connect().await?;
        tokio::spawn(event_loop.run());

        let session = Session {
            channel,
            config: self.config.clone(),
            endpoint_url: endpoint_url.to_string(),
            session_id: NodeId::null(),
        };
        session.create_and_activate().await
    }
}

/// An activated session over a secure channel.
pub struct Session {
    channel: Arc<AsyncSecureChannel>,
    config: ClientConfig,
    endpoint_url: String,
    session_id: NodeId,
}

impl Session {
    async fn create_and_activate(mut self) -> Result<Session, StatusCode> {
        let request = CreateSessionRequest {
            request_header: self.channel.make_request_header(),
            client_description: self.config.application_description(),
            server_uri: UAString::null(),
            endpoint_url: UAString::from(self.endpoint_url.as_str()),
            session_name: UAString::from("uastack session"),
            client_nonce: uastack_crypto::random::byte_string(32),
            client_certificate: ByteString::null(),
            requested_session_timeout: self.config.session_timeout_ms,
            max_response_message_size: 0,
        };
        let response = self.channel.send(request.into()).await?;
        let ResponseMessage::CreateSession(response) = response else {
            return Err(unexpected(response));
        };
        self.session_id = response.session_id.clone();
        self.channel
            .set_auth_token(response.authentication_token.clone());
        info!("Created session {}", self.session_id);

        // Activate with the anonymous identity
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let token = AnonymousIdentityToken {
            policy_id: UserTokenPolicy::anonymous().policy_id,
        };
        let request = ActivateSessionRequest {
            request_header: self.channel.make_request_header(),
            client_signature: Default::default(),
            client_software_certificates: None,
            locale_ids: None,
            user_identity_token: ExtensionObject::from_message(&token, &ctx),
            user_token_signature: Default::default(),
        };
        let response = self.channel.send(request.into()).await?;
        let ResponseMessage::ActivateSession(_) = response else {
            return Err(unexpected(response));
        };
        info!("Activated session {}", self.session_id);
        Ok(self)
    }

    /// The id of the session.
    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    /// Build a request header carrying the session's authentication token,
    /// for requests sent through [`Self::send`].
    pub fn make_request_header(&self) -> uastack_types::RequestHeader {
        self.channel.make_request_header()
    }

    /// Read attributes.
    pub async fn read(
        &self,
        nodes_to_read: Vec<ReadValueId>,
        timestamps_to_return: TimestampsToReturn,
        max_age: f64,
    ) -> Result<Vec<DataValue>, StatusCode> {
        let request = ReadRequest {
            request_header: self.channel.make_request_header(),
            max_age,
            timestamps_to_return,
            nodes_to_read: Some(nodes_to_read),
        };
        let response = self.channel.send(request.into()).await?;
        let ResponseMessage::Read(response) = response else {
            return Err(unexpected(response));
        };
        Ok(response.results.unwrap_or_default())
    }

    /// Write attributes, returning one status per operation.
    pub async fn write(
        &self,
        nodes_to_write: Vec<WriteValue>,
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let request = WriteRequest {
            request_header: self.channel.make_request_header(),
            nodes_to_write: Some(nodes_to_write),
        };
        let response = self.channel.send(request.into()).await?;
        let ResponseMessage::Write(response) = response else {
            return Err(unexpected(response));
        };
        Ok(response.results.unwrap_or_default())
    }

    /// Call a single method.
    pub async fn call_method(
        &self,
        object_id: impl Into<NodeId>,
        method_id: impl Into<NodeId>,
        input_arguments: Option<Vec<Variant>>,
    ) -> Result<CallMethodResult, StatusCode> {
        let request = CallRequest {
            request_header: self.channel.make_request_header(),
            methods_to_call: Some(vec![CallMethodRequest {
                object_id: object_id.into(),
                method_id: method_id.into(),
                input_arguments,
            }]),
        };
        let response = self.channel.send(request.into()).await?;
        let ResponseMessage::Call(response) = response else {
            return Err(unexpected(response));
        };
        response
            .results
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or(StatusCode::BadUnexpectedError)
    }

    /// Send any request through the session's channel. Useful for services
    /// without a dedicated helper, e.g. AddNodes.
    pub async fn send(&self, request: RequestMessage) -> Result<ResponseMessage, StatusCode> {
        self.channel.send(request).await
    }

    /// Create a subscription, returning (id, revised publishing interval).
    pub async fn create_subscription(
        &self,
        publishing_interval_ms: f64,
        lifetime_count: u32,
        max_keep_alive_count: u32,
    ) -> Result<(u32, f64), StatusCode> {
        let request = CreateSubscriptionRequest {
            request_header: self.channel.make_request_header(),
            requested_publishing_interval: publishing_interval_ms,
            requested_lifetime_count: lifetime_count,
            requested_max_keep_alive_count: max_keep_alive_count,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        };
        let response = self.channel.send(request.into()).await?;
        let ResponseMessage::CreateSubscription(response) = response else {
            return Err(unexpected(response));
        };
        Ok((
            response.subscription_id,
            response.revised_publishing_interval,
        ))
    }

    /// Create monitored items on a subscription.
    pub async fn create_monitored_items(
        &self,
        subscription_id: u32,
        items: Vec<MonitoredItemCreateRequest>,
    ) -> Result<Vec<MonitoredItemCreateResult>, StatusCode> {
        let request = CreateMonitoredItemsRequest {
            request_header: self.channel.make_request_header(),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Some(items),
        };
        let response = self.channel.send(request.into()).await?;
        let ResponseMessage::CreateMonitoredItems(response) = response else {
            return Err(unexpected(response));
        };
        Ok(response.results.unwrap_or_default())
    }

    /// Send one publish request and wait for a notification message.
    /// Returns the subscription id, the message, and the acknowledgement to
    /// send with the next publish.
    pub async fn publish(
        &self,
        acknowledgements: Vec<SubscriptionAcknowledgement>,
    ) -> Result<(u32, NotificationMessage), StatusCode> {
        let request = PublishRequest {
            request_header: self.channel.make_request_header(),
            subscription_acknowledgements: if acknowledgements.is_empty() {
                None
            } else {
                Some(acknowledgements)
            },
        };
        let response = self.channel.send(request.into()).await?;
        let ResponseMessage::Publish(response) = response else {
            return Err(unexpected(response));
        };
        Ok((response.subscription_id, response.notification_message))
    }

    /// Run a publish pump: keep one publish request outstanding and hand
    /// every received notification to the callback. Ends when the callback
    /// returns `false` or the channel fails.
    pub async fn run_publish_loop(
        &self,
        mut on_notification: impl FnMut(u32, NotificationMessage) -> bool,
    ) -> StatusCode {
        let mut acks = Vec::new();
        loop {
            match self.publish(std::mem::take(&mut acks)).await {
                Ok((subscription_id, message)) => {
                    acks.push(SubscriptionAcknowledgement {
                        subscription_id,
                        sequence_number: message.sequence_number,
                    });
                    if !on_notification(subscription_id, message) {
                        return StatusCode::Good;
                    }
                }
                Err(status) => {
                    debug!("Publish loop ended: {status}");
                    return status;
                }
            }
        }
    }

    /// Close the session and the channel.
    pub async fn disconnect(&self) -> Result<(), StatusCode> {
        let request = CloseSessionRequest {
            request_header: self.channel.make_request_header(),
            delete_subscriptions: true,
        };
        match self.channel.send(request.into()).await {
            Ok(ResponseMessage::CloseSession(_)) => {}
            Ok(other) => {
                error!("Unexpected close session response: {:?}", other.header().service_result)
            }
            Err(status) => debug!("Close session failed: {status}"),
        }
        self.channel.close_channel().await;
        Ok(())
    }
}

fn unexpected(response: ResponseMessage) -> StatusCode {
    match response {
        ResponseMessage::ServiceFault(fault) => fault.response_header.service_result,
        _ => StatusCode::BadUnknownResponse,
    }
}
