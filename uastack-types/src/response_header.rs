// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `ResponseHeader`.

use uastack_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    DateTime, DiagnosticInfo, ExtensionObject, IntegerId, RequestHeader, StatusCode, UAString,
};

#[allow(unused)]
mod opcua {
    pub use crate as types;
}

/// The header returned with every service response. Service level failures
/// are carried in `service_result`; operation level failures are carried in
/// the response body.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ResponseHeader {
    /// The time the server sent the response.
    pub timestamp: DateTime,
    /// The request handle given by the client.
    pub request_handle: IntegerId,
    /// The overall result of the service call.
    pub service_result: StatusCode,
    /// Diagnostics for the service as a whole.
    pub service_diagnostics: DiagnosticInfo,
    /// Table of strings referenced by the diagnostics.
    pub string_table: Option<Vec<UAString>>,
    /// Reserved for additional header fields.
    pub additional_header: ExtensionObject,
}

impl ResponseHeader {
    /// A good response for the given request.
    pub fn new_good(request_header: &RequestHeader) -> ResponseHeader {
        ResponseHeader::new_service_result(request_header.request_handle, StatusCode::Good)
    }

    /// A response with the given service result for the given request.
    pub fn new_for_request(
        request_header: &RequestHeader,
        service_result: StatusCode,
    ) -> ResponseHeader {
        ResponseHeader::new_service_result(request_header.request_handle, service_result)
    }

    /// A response with the given service result and request handle.
    pub fn new_service_result(
        request_handle: IntegerId,
        service_result: StatusCode,
    ) -> ResponseHeader {
        ResponseHeader {
            timestamp: DateTime::now(),
            request_handle,
            service_result,
            service_diagnostics: DiagnosticInfo::null(),
            string_table: None,
            additional_header: ExtensionObject::null(),
        }
    }
}
