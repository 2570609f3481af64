// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

use uastack_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    DataValue, DateTime, DiagnosticInfo, ExtensionObject, IntegerId, MessageInfo, ObjectId,
    RequestHeader, ResponseHeader, StatusCode, Variant,
};

#[allow(unused)]
mod opcua {
    pub use crate as types;
}

/// Request to create a subscription on the session.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateSubscriptionRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// Requested publishing interval in milliseconds.
    pub requested_publishing_interval: f64,
    /// Cycles without a publish request before the subscription dies.
    pub requested_lifetime_count: u32,
    /// Empty cycles before a keep-alive is sent.
    pub requested_max_keep_alive_count: u32,
    /// Maximum notifications in a single publish response, 0 for no limit.
    pub max_notifications_per_publish: u32,
    /// Whether publishing starts enabled.
    pub publishing_enabled: bool,
    /// Relative priority among the session's subscriptions.
    pub priority: u8,
}

impl MessageInfo for CreateSubscriptionRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CreateSubscriptionRequest_Encoding_DefaultBinary
    }
}

/// Response to CreateSubscription with the revised parameters.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateSubscriptionResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// Server-assigned subscription id.
    pub subscription_id: IntegerId,
    /// The publishing interval granted by the server.
    pub revised_publishing_interval: f64,
    /// The lifetime count granted by the server.
    pub revised_lifetime_count: u32,
    /// The keep-alive count granted by the server.
    pub revised_max_keep_alive_count: u32,
}

impl MessageInfo for CreateSubscriptionResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CreateSubscriptionResponse_Encoding_DefaultBinary
    }
}

/// Request to enable or disable publishing on subscriptions.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SetPublishingModeRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The new publishing enabled state.
    pub publishing_enabled: bool,
    /// The subscriptions to change.
    pub subscription_ids: Option<Vec<IntegerId>>,
}

impl MessageInfo for SetPublishingModeRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::SetPublishingModeRequest_Encoding_DefaultBinary
    }
}

/// Response to SetPublishingMode.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SetPublishingModeResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One status per subscription in request order.
    pub results: Option<Vec<StatusCode>>,
    /// Diagnostics for the operations.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for SetPublishingModeResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::SetPublishingModeResponse_Encoding_DefaultBinary
    }
}

/// Request to delete subscriptions.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteSubscriptionsRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The subscriptions to delete.
    pub subscription_ids: Option<Vec<IntegerId>>,
}

impl MessageInfo for DeleteSubscriptionsRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::DeleteSubscriptionsRequest_Encoding_DefaultBinary
    }
}

/// Response to DeleteSubscriptions.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteSubscriptionsResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One status per subscription in request order.
    pub results: Option<Vec<StatusCode>>,
    /// Diagnostics for the operations.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for DeleteSubscriptionsResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::DeleteSubscriptionsResponse_Encoding_DefaultBinary
    }
}

/// Acknowledges receipt of a notification message so the server can drop it
/// from the retransmission queue.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SubscriptionAcknowledgement {
    /// The subscription the message belongs to.
    pub subscription_id: IntegerId,
    /// The sequence number being acknowledged.
    pub sequence_number: u32,
}

/// Request for the next notification message. Queued by the server until a
/// publishing cycle produces notifications or a keep-alive.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct PublishRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// Acknowledgements for previously received messages.
    pub subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
}

impl MessageInfo for PublishRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::PublishRequest_Encoding_DefaultBinary
    }
}

/// Response carrying one notification message of a subscription.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct PublishResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// The subscription the message belongs to.
    pub subscription_id: IntegerId,
    /// Sequence numbers available for republishing.
    pub available_sequence_numbers: Option<Vec<u32>>,
    /// Whether more notifications are queued.
    pub more_notifications: bool,
    /// The notification message.
    pub notification_message: NotificationMessage,
    /// One status per acknowledgement in the request.
    pub results: Option<Vec<StatusCode>>,
    /// Diagnostics for the acknowledgements.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for PublishResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::PublishResponse_Encoding_DefaultBinary
    }
}

/// Request to retransmit a notification message from the retransmission
/// queue.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct RepublishRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The subscription the message belongs to.
    pub subscription_id: IntegerId,
    /// The sequence number to retransmit.
    pub retransmit_sequence_number: u32,
}

impl MessageInfo for RepublishRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::RepublishRequest_Encoding_DefaultBinary
    }
}

/// Response to Republish.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct RepublishResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// The retransmitted message.
    pub notification_message: NotificationMessage,
}

impl MessageInfo for RepublishResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::RepublishResponse_Encoding_DefaultBinary
    }
}

/// A notification message produced by one publishing cycle.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct NotificationMessage {
    /// Sequence number of the message, starting at 1.
    pub sequence_number: u32,
    /// When the message was produced.
    pub publish_time: DateTime,
    /// DataChangeNotification, EventNotificationList or
    /// StatusChangeNotification bodies.
    pub notification_data: Option<Vec<ExtensionObject>>,
}

impl MessageInfo for NotificationMessage {
    fn type_id(&self) -> ObjectId {
        ObjectId::NotificationMessage_Encoding_DefaultBinary
    }
}

/// One changed value of a monitored item.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MonitoredItemNotification {
    /// The client handle of the item.
    pub client_handle: IntegerId,
    /// The new value.
    pub value: DataValue,
}

/// A batch of data change notifications.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DataChangeNotification {
    /// The changed values.
    pub monitored_items: Option<Vec<MonitoredItemNotification>>,
    /// Diagnostics for the items.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for DataChangeNotification {
    fn type_id(&self) -> ObjectId {
        ObjectId::DataChangeNotification_Encoding_DefaultBinary
    }
}

/// The selected fields of one event.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct EventFieldList {
    /// The client handle of the item.
    pub client_handle: IntegerId,
    /// One value per select clause of the event filter.
    pub event_fields: Option<Vec<Variant>>,
}

/// A batch of event notifications.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct EventNotificationList {
    /// The events.
    pub events: Option<Vec<EventFieldList>>,
}

impl MessageInfo for EventNotificationList {
    fn type_id(&self) -> ObjectId {
        ObjectId::EventNotificationList_Encoding_DefaultBinary
    }
}

/// Notifies the client that the subscription changed state.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct StatusChangeNotification {
    /// The new status of the subscription.
    pub status: StatusCode,
    /// Diagnostics for the status.
    pub diagnostic_info: DiagnosticInfo,
}

impl MessageInfo for StatusChangeNotification {
    fn type_id(&self) -> ObjectId {
        ObjectId::StatusChangeNotification_Encoding_DefaultBinary
    }
}
