// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `RequestHeader`.

use uastack_macros::{BinaryDecodable, BinaryEncodable};

use crate::{DateTime, ExtensionObject, IntegerId, NodeId, UAString};

#[allow(unused)]
mod opcua {
    pub use crate as types;
}

/// The header passed with every service request.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct RequestHeader {
    /// The session authentication token, as issued by CreateSession. A null
    /// node id before a session is established.
    pub authentication_token: NodeId,
    /// The time the client sent the request.
    pub timestamp: DateTime,
    /// Client-assigned identifier returned in the response and usable with
    /// the Cancel service.
    pub request_handle: IntegerId,
    /// Bit mask of diagnostics to return.
    pub return_diagnostics: u32,
    /// Identifier portion of an audit entry.
    pub audit_entry_id: UAString,
    /// Requested timeout in milliseconds, 0 for no hint.
    pub timeout_hint: u32,
    /// Reserved for additional header fields.
    pub additional_header: ExtensionObject,
}

impl RequestHeader {
    /// Create a new request header.
    pub fn new(
        authentication_token: &NodeId,
        timestamp: &DateTime,
        request_handle: IntegerId,
    ) -> RequestHeader {
        RequestHeader {
            authentication_token: authentication_token.clone(),
            timestamp: *timestamp,
            request_handle,
            return_diagnostics: 0,
            audit_entry_id: UAString::null(),
            timeout_hint: 0,
            additional_header: ExtensionObject::null(),
        }
    }

    /// A dummy header for internal requests.
    pub fn dummy() -> RequestHeader {
        RequestHeader::new(&NodeId::null(), &DateTime::now(), 1)
    }
}
