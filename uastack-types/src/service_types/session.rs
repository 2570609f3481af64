// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

use uastack_macros::{BinaryDecodable, BinaryEncodable};

use crate::{
    ApplicationType, ByteString, DiagnosticInfo, ExtensionObject, LocalizedText,
    MessageInfo, MessageSecurityMode, NodeId, ObjectId, RequestHeader, ResponseHeader, StatusCode,
    UAString, UserTokenType,
};

#[allow(unused)]
mod opcua {
    pub use crate as types;
}

/// Describes an OPC UA application, servers advertise these.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ApplicationDescription {
    /// Globally unique application uri.
    pub application_uri: UAString,
    /// Product uri of the vendor.
    pub product_uri: UAString,
    /// Human readable application name.
    pub application_name: LocalizedText,
    /// Type of application.
    pub application_type: ApplicationType,
    /// Gateway server uri, if reached through a gateway.
    pub gateway_server_uri: UAString,
    /// Discovery profile uri.
    pub discovery_profile_uri: UAString,
    /// Urls the application can be discovered at.
    pub discovery_urls: Option<Vec<UAString>>,
}

/// A user token policy advertised by an endpoint.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct UserTokenPolicy {
    /// Identifier of the policy, referenced by identity tokens.
    pub policy_id: UAString,
    /// Kind of token the policy accepts.
    pub token_type: UserTokenType,
    /// Issued token type uri, for IssuedToken policies.
    pub issued_token_type: UAString,
    /// Endpoint of the token issuer.
    pub issuer_endpoint_url: UAString,
    /// Security policy used to encrypt the token, or null to use the
    /// channel's policy.
    pub security_policy_uri: UAString,
}

impl UserTokenPolicy {
    /// The anonymous token policy.
    pub fn anonymous() -> UserTokenPolicy {
        UserTokenPolicy {
            policy_id: "anonymous".into(),
            token_type: UserTokenType::Anonymous,
            issued_token_type: UAString::null(),
            issuer_endpoint_url: UAString::null(),
            security_policy_uri: UAString::null(),
        }
    }
}

/// An endpoint advertised by a server: a url, security policy and mode.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct EndpointDescription {
    /// The url of the endpoint.
    pub endpoint_url: UAString,
    /// The server application.
    pub server: ApplicationDescription,
    /// DER form of the server certificate.
    pub server_certificate: ByteString,
    /// Security mode of the endpoint.
    pub security_mode: MessageSecurityMode,
    /// Security policy uri of the endpoint.
    pub security_policy_uri: UAString,
    /// Identity token policies accepted on this endpoint.
    pub user_identity_tokens: Option<Vec<UserTokenPolicy>>,
    /// Transport profile uri of the endpoint.
    pub transport_profile_uri: UAString,
    /// Relative security level, higher is more secure.
    pub security_level: u8,
}

/// A signature created with a certificate's private key.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SignatureData {
    /// Uri of the signature algorithm.
    pub algorithm: UAString,
    /// The signature bytes.
    pub signature: ByteString,
}

impl SignatureData {
    /// An empty signature, used with the None security policy.
    pub fn null() -> SignatureData {
        SignatureData::default()
    }
}

/// A software certificate signed by an authority.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct SignedSoftwareCertificate {
    /// The DER certificate data.
    pub certificate_data: ByteString,
    /// Signature over the certificate data.
    pub signature: ByteString,
}

/// Request to create a session.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateSessionRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// Description of the client application.
    pub client_description: ApplicationDescription,
    /// Uri of the server the client wants to talk to.
    pub server_uri: UAString,
    /// The url the client used to connect.
    pub endpoint_url: UAString,
    /// Human readable session name.
    pub session_name: UAString,
    /// Client nonce used for the server signature.
    pub client_nonce: ByteString,
    /// DER form of the client certificate.
    pub client_certificate: ByteString,
    /// Requested session timeout in milliseconds.
    pub requested_session_timeout: f64,
    /// Maximum response size the client accepts.
    pub max_response_message_size: u32,
}

impl MessageInfo for CreateSessionRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CreateSessionRequest_Encoding_DefaultBinary
    }
}

/// Response to CreateSession.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CreateSessionResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// The id of the created session.
    pub session_id: NodeId,
    /// Secret token the client passes in every request header.
    pub authentication_token: NodeId,
    /// The session timeout granted by the server, in milliseconds.
    pub revised_session_timeout: f64,
    /// Server nonce for the client signature on activation.
    pub server_nonce: ByteString,
    /// DER form of the server certificate.
    pub server_certificate: ByteString,
    /// The endpoints of the server, so the client can verify it connected
    /// to the right place.
    pub server_endpoints: Option<Vec<EndpointDescription>>,
    /// Obsolete, always empty.
    pub server_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
    /// Server signature over client certificate and nonce.
    pub server_signature: SignatureData,
    /// Maximum request size the server accepts.
    pub max_request_message_size: u32,
}

impl MessageInfo for CreateSessionResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CreateSessionResponse_Encoding_DefaultBinary
    }
}

/// Request to activate a session, binding it to the sending channel and
/// applying a user identity.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ActivateSessionRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// Client signature over server certificate and nonce.
    pub client_signature: SignatureData,
    /// Obsolete, always empty.
    pub client_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
    /// Locales in preference order.
    pub locale_ids: Option<Vec<UAString>>,
    /// The identity token, an extension object holding one of the token
    /// structures matching a policy of the endpoint.
    pub user_identity_token: ExtensionObject,
    /// Signature created with the identity token, for X509 tokens.
    pub user_token_signature: SignatureData,
}

impl MessageInfo for ActivateSessionRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::ActivateSessionRequest_Encoding_DefaultBinary
    }
}

/// Response to ActivateSession.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct ActivateSessionResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// New server nonce for the next activation.
    pub server_nonce: ByteString,
    /// Results for the software certificates, unused.
    pub results: Option<Vec<StatusCode>>,
    /// Diagnostics for the results.
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl MessageInfo for ActivateSessionResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::ActivateSessionResponse_Encoding_DefaultBinary
    }
}

/// Request to close a session.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CloseSessionRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// Delete the session's subscriptions as well.
    pub delete_subscriptions: bool,
}

impl MessageInfo for CloseSessionRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CloseSessionRequest_Encoding_DefaultBinary
    }
}

/// Response to CloseSession.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CloseSessionResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
}

impl MessageInfo for CloseSessionResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CloseSessionResponse_Encoding_DefaultBinary
    }
}

/// Request to cancel outstanding operations with a matching request handle.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CancelRequest {
    /// Common request header.
    pub request_header: RequestHeader,
    /// The request handle of the requests to cancel.
    pub request_handle: u32,
}

impl MessageInfo for CancelRequest {
    fn type_id(&self) -> ObjectId {
        ObjectId::CancelRequest_Encoding_DefaultBinary
    }
}

/// Response to Cancel.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct CancelResponse {
    /// Common response header.
    pub response_header: ResponseHeader,
    /// Number of operations that were cancelled.
    pub cancel_count: u32,
}

impl MessageInfo for CancelResponse {
    fn type_id(&self) -> ObjectId {
        ObjectId::CancelResponse_Encoding_DefaultBinary
    }
}

/// Anonymous identity token.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct AnonymousIdentityToken {
    /// The policy id of the matching endpoint policy.
    pub policy_id: UAString,
}

impl MessageInfo for AnonymousIdentityToken {
    fn type_id(&self) -> ObjectId {
        ObjectId::AnonymousIdentityToken_Encoding_DefaultBinary
    }
}

/// User name and password identity token. The password may be encrypted with
/// the server certificate depending on the policy.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct UserNameIdentityToken {
    /// The policy id of the matching endpoint policy.
    pub policy_id: UAString,
    /// The user name.
    pub user_name: UAString,
    /// The password, possibly encrypted.
    pub password: ByteString,
    /// Uri of the encryption algorithm applied to the password, null for
    /// plaintext.
    pub encryption_algorithm: UAString,
}

impl MessageInfo for UserNameIdentityToken {
    fn type_id(&self) -> ObjectId {
        ObjectId::UserNameIdentityToken_Encoding_DefaultBinary
    }
}

/// X509 certificate identity token.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct X509IdentityToken {
    /// The policy id of the matching endpoint policy.
    pub policy_id: UAString,
    /// DER form of the user certificate.
    pub certificate_data: ByteString,
}

impl MessageInfo for X509IdentityToken {
    fn type_id(&self) -> ObjectId {
        ObjectId::X509IdentityToken_Encoding_DefaultBinary
    }
}

/// Identity token issued by an external authority.
#[derive(Debug, Clone, PartialEq, Default, BinaryEncodable, BinaryDecodable)]
pub struct IssuedIdentityToken {
    /// The policy id of the matching endpoint policy.
    pub policy_id: UAString,
    /// The token data, possibly encrypted.
    pub token_data: ByteString,
    /// Uri of the encryption algorithm applied to the token.
    pub encryption_algorithm: UAString,
}

impl MessageInfo for IssuedIdentityToken {
    fn type_id(&self) -> ObjectId {
        ObjectId::IssuedIdentityToken_Encoding_DefaultBinary
    }
}
