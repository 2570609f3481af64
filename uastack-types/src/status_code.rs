// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The numeric OPC UA status code set.
//!
//! Status codes are 32-bit values with the severity in the top two bits and
//! the sub-code below. The numeric values are part of the wire protocol and
//! must not be changed.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::{
    encoding::{read_u32, write_u32, DecodingOptions, EncodingResult},
    SimpleBinaryDecodable, SimpleBinaryEncodable,
};

/// A 32-bit OPC UA status code.
#[derive(Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StatusCode(u32);

macro_rules! status_codes {
    ( $( ($name:ident, $value:expr, $doc:expr), )* ) => {
        impl StatusCode {
            $(
                #[doc = $doc]
                pub const $name: StatusCode = StatusCode($value);
            )*

            /// Look up the symbolic name of this status code, ignoring any
            /// info bits. Returns `"Unknown"` for values outside the set.
            pub fn name(&self) -> &'static str {
                match self.0 & 0xffff_0000 {
                    $( $value => stringify!($name), )*
                    _ => "Unknown",
                }
            }
        }
    };
}

status_codes! {
    (Good, 0x0000_0000, "The operation succeeded."),
    (GoodSubscriptionTransferred, 0x002d_0000, "The subscription was transferred to another session."),
    (GoodCompletesAsynchronously, 0x002e_0000, "The processing will complete asynchronously."),
    (GoodOverload, 0x002f_0000, "Sampling has slowed down due to resource limitations."),
    (GoodClipped, 0x0030_0000, "The value written was accepted but was clipped."),
    (UncertainInitialValue, 0x4092_0000, "The value is an initial value for a variable that normally receives its value from another variable."),
    (UncertainReferenceNotDeleted, 0x40bc_0000, "The server was not able to delete all target references."),
    (BadUnexpectedError, 0x8001_0000, "An unexpected error occurred."),
    (BadInternalError, 0x8002_0000, "An internal error occurred as a result of a programming or configuration error."),
    (BadOutOfMemory, 0x8003_0000, "Not enough memory to complete the operation."),
    (BadResourceUnavailable, 0x8004_0000, "An operating system resource is not available."),
    (BadCommunicationError, 0x8005_0000, "A low level communication error occurred."),
    (BadEncodingError, 0x8006_0000, "Encoding halted because of invalid data in the objects being serialized."),
    (BadDecodingError, 0x8007_0000, "Decoding halted because of invalid data in the stream."),
    (BadEncodingLimitsExceeded, 0x8008_0000, "The message encoding/decoding limits imposed by the stack have been exceeded."),
    (BadUnknownResponse, 0x8009_0000, "An unrecognized response was received from the server."),
    (BadTimeout, 0x800a_0000, "The operation timed out."),
    (BadServiceUnsupported, 0x800b_0000, "The server does not support the requested service."),
    (BadShutdown, 0x800c_0000, "The operation was cancelled because the application is shutting down."),
    (BadServerNotConnected, 0x800d_0000, "The operation could not complete because the client is not connected to the server."),
    (BadServerHalted, 0x800e_0000, "The server has stopped and cannot process any requests."),
    (BadNothingToDo, 0x800f_0000, "No processing could be done because there was nothing to do."),
    (BadTooManyOperations, 0x8010_0000, "The request could not be processed because it specified too many operations."),
    (BadDataTypeIdUnknown, 0x8011_0000, "The extension object cannot be (de)serialized because the data type id is not recognized."),
    (BadCertificateInvalid, 0x8012_0000, "The certificate provided as a parameter is not valid."),
    (BadSecurityChecksFailed, 0x8013_0000, "An error occurred verifying security."),
    (BadCertificateTimeInvalid, 0x8014_0000, "The certificate has expired or is not yet valid."),
    (BadCertificateIssuerTimeInvalid, 0x8015_0000, "An issuer certificate has expired or is not yet valid."),
    (BadCertificateHostNameInvalid, 0x8016_0000, "The hostname used to connect to a server does not match a hostname in the certificate."),
    (BadCertificateUriInvalid, 0x8017_0000, "The URI specified in the ApplicationDescription does not match the URI in the certificate."),
    (BadCertificateUseNotAllowed, 0x8018_0000, "The certificate may not be used for the requested operation."),
    (BadCertificateIssuerUseNotAllowed, 0x8019_0000, "The issuer certificate may not be used for the requested operation."),
    (BadCertificateUntrusted, 0x801a_0000, "The certificate is not trusted."),
    (BadCertificateRevocationUnknown, 0x801b_0000, "It was not possible to determine if the certificate has been revoked."),
    (BadCertificateIssuerRevocationUnknown, 0x801c_0000, "It was not possible to determine if the issuer certificate has been revoked."),
    (BadCertificateRevoked, 0x801d_0000, "The certificate has been revoked."),
    (BadCertificateIssuerRevoked, 0x801e_0000, "The issuer certificate has been revoked."),
    (BadUserAccessDenied, 0x801f_0000, "User does not have permission to perform the requested operation."),
    (BadIdentityTokenInvalid, 0x8020_0000, "The user identity token is not valid."),
    (BadIdentityTokenRejected, 0x8021_0000, "The user identity token is valid but the server has rejected it."),
    (BadSecureChannelIdInvalid, 0x8022_0000, "The specified secure channel is no longer valid."),
    (BadInvalidTimestamp, 0x8023_0000, "The timestamp is outside the range allowed by the server."),
    (BadNonceInvalid, 0x8024_0000, "The nonce does appear to be not a random value or it is not the correct length."),
    (BadSessionIdInvalid, 0x8025_0000, "The session id is not valid."),
    (BadSessionClosed, 0x8026_0000, "The session was closed by the client."),
    (BadSessionNotActivated, 0x8027_0000, "The session cannot be used because ActivateSession has not been called."),
    (BadSubscriptionIdInvalid, 0x8028_0000, "The subscription id is not valid."),
    (BadRequestHeaderInvalid, 0x802a_0000, "The header for the request is missing or invalid."),
    (BadTimestampsToReturnInvalid, 0x802b_0000, "The timestamps to return parameter is invalid."),
    (BadRequestCancelledByClient, 0x802c_0000, "The request was cancelled by the client."),
    (BadNoCommunication, 0x8031_0000, "Communication with the data source is defined, but not established, and there is no last known value available."),
    (BadWaitingForInitialData, 0x8032_0000, "Waiting for the server to obtain values from the underlying data source."),
    (BadNodeIdInvalid, 0x8033_0000, "The syntax of the node id is not valid."),
    (BadNodeIdUnknown, 0x8034_0000, "The node id refers to a node that does not exist in the server address space."),
    (BadAttributeIdInvalid, 0x8035_0000, "The attribute is not supported for the specified Node."),
    (BadIndexRangeInvalid, 0x8036_0000, "The syntax of the index range parameter is invalid."),
    (BadIndexRangeNoData, 0x8037_0000, "No data exists within the range of indexes specified."),
    (BadDataEncodingInvalid, 0x8038_0000, "The data encoding is invalid."),
    (BadDataEncodingUnsupported, 0x8039_0000, "The server does not support the requested data encoding for the node."),
    (BadNotReadable, 0x803a_0000, "The access level does not allow reading or subscribing to the Node."),
    (BadNotWritable, 0x803b_0000, "The access level does not allow writing to the Node."),
    (BadOutOfRange, 0x803c_0000, "The value was out of range."),
    (BadNotSupported, 0x803d_0000, "The requested operation is not supported."),
    (BadNotFound, 0x803e_0000, "A requested item was not found or a search operation ended without success."),
    (BadObjectDeleted, 0x803f_0000, "The object cannot be used because it has been deleted."),
    (BadNotImplemented, 0x8040_0000, "Requested operation is not implemented."),
    (BadMonitoringModeInvalid, 0x8041_0000, "The monitoring mode is invalid."),
    (BadMonitoredItemIdInvalid, 0x8042_0000, "The monitoring item id does not refer to a valid monitored item."),
    (BadMonitoredItemFilterInvalid, 0x8043_0000, "The monitored item filter parameter is not valid."),
    (BadMonitoredItemFilterUnsupported, 0x8044_0000, "The server does not support the requested monitored item filter."),
    (BadFilterNotAllowed, 0x8045_0000, "A monitoring filter cannot be used in combination with the attribute specified."),
    (BadStructureMissing, 0x8046_0000, "A mandatory structured parameter was missing or null."),
    (BadEventFilterInvalid, 0x8047_0000, "The event filter is not valid."),
    (BadContentFilterInvalid, 0x8048_0000, "The content filter is not valid."),
    (BadFilterOperandInvalid, 0x8049_0000, "The operand used in a content filter is not valid."),
    (BadContinuationPointInvalid, 0x804a_0000, "The continuation point provided is longer valid."),
    (BadNoContinuationPoints, 0x804b_0000, "The operation could not be processed because all continuation points have been allocated."),
    (BadReferenceTypeIdInvalid, 0x804c_0000, "The reference type id does not refer to a valid reference type node."),
    (BadBrowseDirectionInvalid, 0x804d_0000, "The browse direction is not valid."),
    (BadNodeNotInView, 0x804e_0000, "The node is not part of the view."),
    (BadServerUriInvalid, 0x804f_0000, "The ServerUri is not a valid URI."),
    (BadRequestTypeInvalid, 0x8053_0000, "The security token request type is not valid."),
    (BadSecurityModeRejected, 0x8054_0000, "The security mode does not meet the requirements set by the server."),
    (BadSecurityPolicyRejected, 0x8055_0000, "The security policy does not meet the requirements set by the server."),
    (BadTooManySessions, 0x8056_0000, "The server has reached its maximum number of sessions."),
    (BadUserSignatureInvalid, 0x8057_0000, "The user token signature is missing or invalid."),
    (BadApplicationSignatureInvalid, 0x8058_0000, "The signature generated with the client certificate is missing or invalid."),
    (BadNoValidCertificates, 0x8059_0000, "The client did not provide at least one software certificate that is valid and meets the profile requirements for the server."),
    (BadRequestCancelledByRequest, 0x805a_0000, "The request was cancelled by the client with the Cancel service."),
    (BadParentNodeIdInvalid, 0x805b_0000, "The parent node id does not to refer to a valid node."),
    (BadReferenceNotAllowed, 0x805c_0000, "The reference could not be created because it violates constraints imposed by the data model."),
    (BadNodeIdRejected, 0x805d_0000, "The requested node id was rejected because it was either invalid or server does not allow node ids to be specified by the client."),
    (BadNodeIdExists, 0x805e_0000, "The requested node id is already used by another node."),
    (BadNodeClassInvalid, 0x805f_0000, "The node class is not valid."),
    (BadBrowseNameInvalid, 0x8060_0000, "The browse name is invalid."),
    (BadBrowseNameDuplicated, 0x8061_0000, "The browse name is not unique among nodes that share the same relationship with the parent."),
    (BadNodeAttributesInvalid, 0x8062_0000, "The node attributes are not valid for the node class."),
    (BadTypeDefinitionInvalid, 0x8063_0000, "The type definition node id does not reference an appropriate type node."),
    (BadSourceNodeIdInvalid, 0x8064_0000, "The source node id does not reference a valid node."),
    (BadTargetNodeIdInvalid, 0x8065_0000, "The target node id does not reference a valid node."),
    (BadDuplicateReferenceNotAllowed, 0x8066_0000, "The reference type between the nodes is already defined."),
    (BadInvalidSelfReference, 0x8067_0000, "The server does not allow this type of self reference on this node."),
    (BadReferenceLocalOnly, 0x8068_0000, "The reference type is not valid for a reference to a remote server."),
    (BadNoDeleteRights, 0x8069_0000, "The server will not allow the node to be deleted."),
    (BadServerIndexInvalid, 0x806a_0000, "The server index is not valid."),
    (BadViewIdUnknown, 0x806b_0000, "The view id does not refer to a valid view node."),
    (BadTooManyMatches, 0x806d_0000, "The requested operation has too many matches to return."),
    (BadQueryTooComplex, 0x806e_0000, "The requested operation requires too many resources in the server."),
    (BadNoMatch, 0x806f_0000, "The requested operation has no match to return."),
    (BadMaxAgeInvalid, 0x8070_0000, "The max age parameter is invalid."),
    (BadHistoryOperationInvalid, 0x8071_0000, "The history details parameter is not valid."),
    (BadHistoryOperationUnsupported, 0x8072_0000, "The server does not support the requested operation."),
    (BadWriteNotSupported, 0x8073_0000, "The server does not support writing the combination of value, status and timestamps provided."),
    (BadTypeMismatch, 0x8074_0000, "The value supplied for the attribute is not of the same type as the attribute's value."),
    (BadMethodInvalid, 0x8075_0000, "The method id does not refer to a method for the specified object."),
    (BadArgumentsMissing, 0x8076_0000, "The client did not specify all of the input arguments for the method."),
    (BadTooManySubscriptions, 0x8077_0000, "The server has reached its maximum number of subscriptions."),
    (BadTooManyPublishRequests, 0x8078_0000, "The server has reached the maximum number of queued publish requests."),
    (BadNoSubscription, 0x8079_0000, "There is no subscription available for this session."),
    (BadSequenceNumberUnknown, 0x807a_0000, "The sequence number is unknown to the server."),
    (BadMessageNotAvailable, 0x807b_0000, "The requested notification message is no longer available."),
    (BadInsufficientClientProfile, 0x807c_0000, "The client of the current session does not support one or more Profiles that are necessary for the subscription."),
    (BadTcpServerTooBusy, 0x807d_0000, "The server cannot process the request because it is too busy."),
    (BadTcpMessageTypeInvalid, 0x807e_0000, "The type of the message specified in the header invalid."),
    (BadTcpSecureChannelUnknown, 0x807f_0000, "The SecureChannelId and/or TokenId are not currently in use."),
    (BadTcpMessageTooLarge, 0x8080_0000, "The size of the message specified in the header is too large."),
    (BadTcpNotEnoughResources, 0x8081_0000, "There are not enough resources to process the request."),
    (BadTcpInternalError, 0x8082_0000, "An internal error occurred."),
    (BadTcpEndpointUrlInvalid, 0x8083_0000, "The server does not recognize the QueryString specified."),
    (BadRequestInterrupted, 0x8084_0000, "The request could not be sent because of a network interruption."),
    (BadRequestTimeout, 0x8085_0000, "Timeout occurred while processing the request."),
    (BadSecureChannelClosed, 0x8086_0000, "The secure channel has been closed."),
    (BadSecureChannelTokenUnknown, 0x8087_0000, "The token has expired or is not recognized."),
    (BadSequenceNumberInvalid, 0x8088_0000, "The sequence number is not valid."),
    (BadConfigurationError, 0x8089_0000, "There is a problem with the configuration that affects the usefulness of the value."),
    (BadNotConnected, 0x808a_0000, "The variable should receive its value from another variable, but has never been configured to do so."),
    (BadDeadbandFilterInvalid, 0x808e_0000, "The deadband filter is not valid."),
    (BadNoData, 0x809b_0000, "No data exists for the requested time range or event filter."),
    (BadInvalidArgument, 0x80ab_0000, "One or more arguments are invalid."),
    (BadConnectionRejected, 0x80ac_0000, "Could not establish a network connection to remote server."),
    (BadDisconnect, 0x80ad_0000, "The server has disconnected from the client."),
    (BadConnectionClosed, 0x80ae_0000, "The network connection has been closed."),
    (BadInvalidState, 0x80af_0000, "The operation cannot be completed because the object is closed, uninitialized or in some other invalid state."),
    (BadEndOfStream, 0x80b0_0000, "Cannot move beyond end of the stream."),
    (BadMaxConnectionsReached, 0x80b7_0000, "The operation could not be finished because all available connections are in use."),
    (BadRequestTooLarge, 0x80b8_0000, "The request message size exceeds limits set by the server."),
    (BadResponseTooLarge, 0x80b9_0000, "The response message size exceeds limits set by the client."),
    (BadInvalidTimestampArgument, 0x80bd_0000, "The defined timestamp to return was invalid."),
    (BadProtocolVersionUnsupported, 0x80be_0000, "The applications do not have compatible protocol versions."),
    (BadFilterOperatorInvalid, 0x80c1_0000, "An unrecognized operator was provided in a filter."),
    (BadFilterOperatorUnsupported, 0x80c2_0000, "A valid operator was provided, but the server does not provide support for this filter operator."),
    (BadFilterOperandCountMismatch, 0x80c3_0000, "The number of operands provided for the filter operator was less then expected for the operand provided."),
    (BadFilterElementInvalid, 0x80c4_0000, "The referenced element is not a valid element in the content filter."),
    (BadFilterLiteralInvalid, 0x80c5_0000, "The referenced literal is not a valid value."),
    (BadIdentityChangeNotSupported, 0x80c6_0000, "The server does not support changing the user identity assigned to the session."),
    (BadTooManyMonitoredItems, 0x80db_0000, "The request could not be processed because there are too many monitored items in the subscription."),
    (BadTooManyArguments, 0x80e5_0000, "Too many arguments were provided."),
    (BadSecurityModeInsufficient, 0x80e6_0000, "The operation is not permitted over the current secure channel."),
    (BadCertificateChainIncomplete, 0x810d_0000, "The certificate chain is incomplete."),
    (BadNotExecutable, 0x8111_0000, "The executable attribute does not allow the execution of the method."),
    (BadNumericOverflow, 0x8112_0000, "The number was not accepted because of a numeric overflow."),
    (BadWouldBlock, 0x80b5_0000, "Non blocking behaviour is required and the operation would block."),
    (BadSyntaxError, 0x80b6_0000, "A value had an invalid syntax."),
}

impl StatusCode {
    /// Mask over the severity bits.
    pub const SEVERITY_MASK: u32 = 0xc000_0000;
    /// Severity bit indicating a bad status.
    pub const SEVERITY_BAD: u32 = 0x8000_0000;
    /// Severity bit indicating an uncertain status.
    pub const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;
    /// Info type bit indicating the info bits describe a data value.
    pub const INFO_TYPE_DATA_VALUE: u32 = 0x0000_0400;
    /// Info bit indicating a monitored item queue overflow.
    pub const INFO_BITS_OVERFLOW: u32 = 0x0000_0080;

    /// Create a status code from raw bits, keeping unknown values as-is
    /// since they are still valid on the wire.
    pub const fn from_bits(bits: u32) -> Self {
        StatusCode(bits)
    }

    /// Get the raw bits of this status code.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// The top two bits are zero, so the status is good.
    pub const fn is_good(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == 0
    }

    /// The uncertain severity bit is set.
    pub const fn is_uncertain(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == Self::SEVERITY_UNCERTAIN
    }

    /// The bad severity bit is set.
    pub const fn is_bad(&self) -> bool {
        self.0 & Self::SEVERITY_BAD != 0
    }

    /// Return this code with the data value overflow info bits set, used on
    /// monitored item queue overflow.
    pub const fn set_overflow(self) -> Self {
        StatusCode(self.0 | Self::INFO_TYPE_DATA_VALUE | Self::INFO_BITS_OVERFLOW)
    }

    /// Return `true` if the data value overflow bit is set.
    pub const fn overflow(&self) -> bool {
        self.0 & (Self::INFO_TYPE_DATA_VALUE | Self::INFO_BITS_OVERFLOW)
            == (Self::INFO_TYPE_DATA_VALUE | Self::INFO_BITS_OVERFLOW)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        if name == "Unknown" {
            write!(f, "{:#010x}", self.0)
        } else {
            write!(f, "{}", name)
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl SimpleBinaryEncodable for StatusCode {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.0)
    }
}

impl SimpleBinaryDecodable for StatusCode {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(StatusCode(read_u32(stream)?))
    }
}

impl From<StatusCode> for std::io::Error {
    fn from(value: StatusCode) -> Self {
        std::io::Error::other(format!("StatusCode {}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::StatusCode;

    #[test]
    fn severity() {
        assert!(StatusCode::Good.is_good());
        assert!(!StatusCode::Good.is_bad());
        assert!(StatusCode::BadTypeMismatch.is_bad());
        assert!(StatusCode::UncertainInitialValue.is_uncertain());
        assert!(!StatusCode::UncertainInitialValue.is_bad());
    }

    #[test]
    fn wire_values() {
        // These are protocol constants, the exact values matter.
        assert_eq!(StatusCode::BadTypeMismatch.bits(), 0x8074_0000);
        assert_eq!(StatusCode::BadNodeIdUnknown.bits(), 0x8034_0000);
        assert_eq!(StatusCode::BadCertificateRevoked.bits(), 0x801d_0000);
    }

    #[test]
    fn overflow_bits() {
        let code = StatusCode::Good.set_overflow();
        assert!(code.is_good());
        assert!(code.overflow());
        assert_eq!(code.name(), "Good");
    }
}
