// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

use uastack_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    DataValue, DiagnosticInfo, MessageInfo, NodeId, ObjectId, QualifiedName, RequestHeader,
    ResponseHeader, StatusCode, TimestampsToReturn, UAString,
};

#[allow(unused)]
mod opcua {
    pub use crate as types;
}

/// Identifies an attribute of a node to read, with an optional index range
/// into array values.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ReadValueId {
    /// The node to read.
    pub node_id: NodeId,
    /// The attribute to read, one of [`crate::AttributeId`].
    pub attribute_id: u32,
    /// Index range into an array value, text form.
    pub index_range: UAString,
    /// Requested data encoding of the value, empty for binary.
    pub data_encoding: QualifiedName,
}

impl ReadValueId {
    /// Read the value attribute of the given node.
    pub fn value_of(node_id: impl Into<NodeId>) -> ReadValueId {
        ReadValueId {
            node_id: node_id.into(),
            attribute_id: crate::AttributeId::Value as u32,
            ..Default::default()
        }
    }
}

/// Request to read attributes of one or more nodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ReadRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// Maximum acceptable age of the values in milliseconds, 0 to force a
    /// fresh read.
    pub max_age: f64,
    /// Which timestamps to include in the results.
    pub timestamps_to_return: TimestampsToReturn,
    /// The attributes to read.
    pub nodes_to_read: Option<Vec<ReadValueId>>,
}

impl MessageInfo for ReadRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::ReadRequest_Encoding_DefaultBinary
    }
}

/// Response to Read, one data value per operation in request order.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ReadResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One result per read operation.
    pub results: Option<Vec<DataValue>>,
    /// Diagnostics for the operations.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for ReadResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::ReadResponse_Encoding_DefaultBinary
    }
}

/// One write operation: a node, attribute, optional index range and the
/// value to store.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct WriteValue {
    /// The node to write.
    pub node_id: NodeId,
    /// The attribute to write.
    pub attribute_id: u32,
    /// Index range into an array value, text form.
    pub index_range: UAString,
    /// The value to write.
    pub value: DataValue,
}

/// Request to write attributes of one or more nodes.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct WriteRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The writes to perform.
    pub nodes_to_write: Option<Vec<WriteValue>>,
}

impl MessageInfo for WriteRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::WriteRequest_Encoding_DefaultBinary
    }
}

/// Response to Write, one status per operation in request order.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct WriteResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One status per write operation.
    pub results: Option<Vec<StatusCode>>,
    /// Diagnostics for the operations.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for WriteResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::WriteResponse_Encoding_DefaultBinary
    }
}
