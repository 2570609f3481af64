// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

use uastack_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    DiagnosticInfo, LocalizedText, MessageInfo, NodeId, ObjectId, RequestHeader, ResponseHeader,
    StatusCode, UAString, Variant,
};

#[allow(unused)]
mod opcua {
    pub use crate as types;
}

/// Describes one argument of a method, used in the InputArguments and
/// OutputArguments properties.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct Argument {
    /// Name of the argument.
    pub name: UAString,
    /// Data type of the argument.
    pub data_type: NodeId,
    /// Value rank of the argument.
    pub value_rank: i32,
    /// Array dimensions, for array arguments.
    pub array_dimensions: Option<Vec<u32>>,
    /// Description of the argument.
    pub description: LocalizedText,
}

impl MessageInfo for Argument {
    fn type_id(&self) -> ObjectId {
        ObjectId::Argument_Encoding_DefaultBinary
    }
}

/// One method call: the object, the method, and the input arguments.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CallMethodRequest {
    /// The object the method is called on.
    pub object_id: NodeId,
    /// The method to call.
    pub method_id: NodeId,
    /// The input arguments, in declaration order.
    pub input_arguments: Option<Vec<Variant>>,
}

/// Result of one method call.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CallMethodResult {
    /// Overall result of the call.
    pub status_code: StatusCode,
    /// One status per input argument.
    pub input_argument_results: Option<Vec<StatusCode>>,
    /// Diagnostics for the input arguments.
    pub input_argument_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    /// The output arguments, in declaration order.
    pub output_arguments: Option<Vec<Variant>>,
}

/// Request to call one or more methods.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CallRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The calls to perform.
    pub methods_to_call: Option<Vec<CallMethodRequest>>,
}

impl MessageInfo for CallRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CallRequest_Encoding_DefaultBinary
    }
}

/// Response to Call.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CallResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// One result per call in request order.
    pub results: Option<Vec<CallMethodResult>>,
    /// Diagnostics for the calls.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for CallResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CallResponse_Encoding_DefaultBinary
    }
}
