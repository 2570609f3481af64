// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

use uastack_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    ByteString, DateTime, MessageInfo, MessageSecurityMode, ObjectId, RequestHeader,
    ResponseHeader, SecurityTokenRequestType,
};

#[allow(unused)]
mod opcua {
    pub use crate as types;
}

/// The security token issued by OpenSecureChannel, identifying the key set
/// in use on a channel.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ChannelSecurityToken {
    /// The id of the secure channel.
    pub channel_id: u32,
    /// The id of the token.
    pub token_id: u32,
    /// When the token was created, by the server clock.
    pub created_at: DateTime,
    /// Lifetime of the token in milliseconds.
    pub revised_lifetime: u32,
}

/// Request to open or renew a secure channel.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct OpenSecureChannelRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The protocol version the client supports.
    pub client_protocol_version: u32,
    /// Issue a new token or renew an existing one.
    pub request_type: SecurityTokenRequestType,
    /// Requested message security mode.
    pub security_mode: MessageSecurityMode,
    /// Client nonce for key derivation.
    pub client_nonce: ByteString,
    /// Requested token lifetime in milliseconds.
    pub requested_lifetime: u32,
}

impl MessageInfo for OpenSecureChannelRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::OpenSecureChannelRequest_Encoding_DefaultBinary
    }
}

/// Response to OpenSecureChannel.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct OpenSecureChannelResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// The protocol version the server supports.
    pub server_protocol_version: u32,
    /// The issued token.
    pub security_token: ChannelSecurityToken,
    /// Server nonce for key derivation.
    pub server_nonce: ByteString,
}

impl MessageInfo for OpenSecureChannelResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::OpenSecureChannelResponse_Encoding_DefaultBinary
    }
}

/// Request to close a secure channel.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CloseSecureChannelRequest {
    /// Common request header.
    pub request_header: RequestHeader,
}

impl MessageInfo for CloseSecureChannelRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CloseSecureChannelRequest_Encoding_DefaultBinary
    }
}

/// Response to CloseSecureChannel. Never actually sent on the wire.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CloseSecureChannelResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
}

impl MessageInfo for CloseSecureChannelResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CloseSecureChannelResponse_Encoding_DefaultBinary
    }
}

/// Generic fault response, sent when a service fails as a whole.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ServiceFault {
    /// Response header carrying the service result.
    pub response_header: ResponseHeader,
}

impl MessageInfo for ServiceFault {
    fn type_id(&self) -> ObjectId {
        ObjectId::ServiceFault_Encoding_DefaultBinary
    }
}

impl ServiceFault {
    /// Create a fault for the given request with the given status.
    pub fn new(request_header: &RequestHeader, service_result: crate::StatusCode) -> ServiceFault {
        ServiceFault {
            response_header: ResponseHeader::new_for_request(request_header, service_result),
        }
    }
}
