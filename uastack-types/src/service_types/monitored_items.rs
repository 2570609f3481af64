// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

use uastack_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    DiagnosticInfo, ExtensionObject, IntegerId, MessageInfo, MonitoringMode, ObjectId,
    ReadValueId, RequestHeader, ResponseHeader, StatusCode, TimestampsToReturn,
};

#[allow(unused)]
mod opcua {
    pub use crate as types;
}

/// Parameters of a monitored item.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MonitoringParameters {
    /// Client-assigned handle returned in notifications.
    pub client_handle: IntegerId,
    /// Sampling interval in milliseconds; -1 to use the publishing interval.
    pub sampling_interval: f64,
    /// Data change or event filter, or null.
    pub filter: ExtensionObject,
    /// Requested notification queue size.
    pub queue_size: u32,
    /// Discard the oldest entry when the queue overflows, else the newest.
    pub discard_oldest: bool,
}

/// One monitored item to create.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MonitoredItemCreateRequest {
    /// The node and attribute to monitor.
    pub item_to_monitor: ReadValueId,
    /// Initial monitoring mode.
    pub monitoring_mode: MonitoringMode,
    /// Requested parameters.
    pub requested_parameters: MonitoringParameters,
}

/// Result of creating one monitored item.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct MonitoredItemCreateResult {
    /// Status of the operation.
    pub status_code: StatusCode,
    /// Server-assigned id of the item.
    pub monitored_item_id: IntegerId,
    /// The sampling interval granted by the server.
    pub revised_sampling_interval: f64,
    /// The queue size granted by the server.
    pub revised_queue_size: u32,
    /// Filter validation result, e.g. an EventFilterResult.
    pub filter_result: ExtensionObject,
}

/// Request to create monitored items on a subscription.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateMonitoredItemsRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The subscription to add items to.
    pub subscription_id: IntegerId,
    /// Which timestamps to include in notifications.
    pub timestamps_to_return: TimestampsToReturn,
    /// The items to create.
    pub items_to_create: Option<Vec<MonitoredItemCreateRequest>>,
}

impl MessageInfo for CreateMonitoredItemsRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CreateMonitoredItemsRequest_Encoding_DefaultBinary
    }
}

/// Response to CreateMonitoredItems.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateMonitoredItemsResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One result per item in request order.
    pub results: Option<Vec<MonitoredItemCreateResult>>,
    /// Diagnostics for the operations.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for CreateMonitoredItemsResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CreateMonitoredItemsResponse_Encoding_DefaultBinary
    }
}

/// Request to delete monitored items from a subscription.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteMonitoredItemsRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The subscription owning the items.
    pub subscription_id: IntegerId,
    /// The ids of the items to delete.
    pub monitored_item_ids: Option<Vec<IntegerId>>,
}

impl MessageInfo for DeleteMonitoredItemsRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::DeleteMonitoredItemsRequest_Encoding_DefaultBinary
    }
}

/// Response to DeleteMonitoredItems.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct DeleteMonitoredItemsResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One status per item in request order.
    pub results: Option<Vec<StatusCode>>,
    /// Diagnostics for the operations.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for DeleteMonitoredItemsResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::DeleteMonitoredItemsResponse_Encoding_DefaultBinary
    }
}
