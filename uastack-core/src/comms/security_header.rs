// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The security and sequence headers carried by every chunk.
//!
//! OPN chunks carry the asymmetric form naming the policy and certificates;
//! every other chunk carries the symmetric form, which is just the token id
//! selecting the key set.

use std::io::{Read, Write};

use uastack_types::{
    constants, ByteString, DecodingOptions, EncodingResult, Error, SimpleBinaryDecodable,
    SimpleBinaryEncodable, StatusCode, UAString,
};

use uastack_crypto::{SecurityPolicy, Thumbprint, X509};

/// The security header of a chunk, in whichever form its message type
/// demands.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityHeader {
    /// The OPN form.
    Asymmetric(AsymmetricSecurityHeader),
    /// The MSG/CLO form.
    Symmetric(SymmetricSecurityHeader),
}

impl SecurityHeader {
    /// Decode whichever form the message type implies. There is no
    /// discriminant on the wire, which is why this is not a
    /// `SimpleBinaryDecodable`.
    pub fn decode_from_stream<S: Read + ?Sized>(
        stream: &mut S,
        is_open_secure_channel: bool,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        if !is_open_secure_channel {
            let header = SymmetricSecurityHeader::decode(stream, decoding_options)?;
            return Ok(SecurityHeader::Symmetric(header));
        }

        let header = AsymmetricSecurityHeader::decode(stream, decoding_options)?;
        // Reject unknown policies before any of the header is trusted
        let uri = header.security_policy_uri.as_ref();
        if !uri.is_empty() && SecurityPolicy::from_uri(uri) == SecurityPolicy::Unknown {
            return Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                format!("OPN chunk names unknown security policy {uri}"),
            ));
        }
        Ok(SecurityHeader::Asymmetric(header))
    }
}

impl SimpleBinaryEncodable for SecurityHeader {
    fn byte_len(&self) -> usize {
        match self {
            SecurityHeader::Asymmetric(h) => h.byte_len(),
            SecurityHeader::Symmetric(h) => h.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self {
            SecurityHeader::Asymmetric(h) => h.encode(stream),
            SecurityHeader::Symmetric(h) => h.encode(stream),
        }
    }
}

/// The symmetric security header: the id of the token securing the chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricSecurityHeader {
    /// The token id.
    pub token_id: u32,
}

impl SimpleBinaryEncodable for SymmetricSecurityHeader {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.token_id.encode(stream)
    }
}

impl SimpleBinaryDecodable for SymmetricSecurityHeader {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(SymmetricSecurityHeader {
            token_id: u32::decode(stream, decoding_options)?,
        })
    }
}

/// The asymmetric security header of OPN chunks: the policy plus the
/// certificates needed to verify and decrypt the handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct AsymmetricSecurityHeader {
    /// URI of the security policy in force.
    pub security_policy_uri: UAString,
    /// DER certificate of the sender, null with the None policy.
    pub sender_certificate: ByteString,
    /// SHA-1 thumbprint of the receiver certificate the sender encrypted
    /// for, null with the None policy.
    pub receiver_certificate_thumbprint: ByteString,
}

impl AsymmetricSecurityHeader {
    /// The header for an unsecured channel.
    pub fn none() -> AsymmetricSecurityHeader {
        AsymmetricSecurityHeader {
            security_policy_uri: SecurityPolicy::None.to_uri().into(),
            sender_certificate: ByteString::null(),
            receiver_certificate_thumbprint: ByteString::null(),
        }
    }

    /// The header for a secured channel.
    pub fn new(
        security_policy: SecurityPolicy,
        sender_certificate: &X509,
        receiver_certificate_thumbprint: ByteString,
    ) -> AsymmetricSecurityHeader {
        AsymmetricSecurityHeader {
            security_policy_uri: security_policy.to_uri().into(),
            sender_certificate: sender_certificate.as_byte_string(),
            receiver_certificate_thumbprint,
        }
    }
}

impl SimpleBinaryEncodable for AsymmetricSecurityHeader {
    fn byte_len(&self) -> usize {
        self.security_policy_uri.byte_len()
            + self.sender_certificate.byte_len()
            + self.receiver_certificate_thumbprint.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.security_policy_uri.encode(stream)?;
        self.sender_certificate.encode(stream)?;
        self.receiver_certificate_thumbprint.encode(stream)
    }
}

impl SimpleBinaryDecodable for AsymmetricSecurityHeader {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let security_policy_uri = UAString::decode(stream, decoding_options)?;
        let sender_certificate = ByteString::decode(stream, decoding_options)?;
        let receiver_certificate_thumbprint = ByteString::decode(stream, decoding_options)?;

        if sender_certificate.len() >= constants::MAX_CERTIFICATE_LENGTH as isize {
            return Err(Error::new(
                StatusCode::BadEncodingLimitsExceeded,
                format!(
                    "Sender certificate of {} bytes exceeds the {} byte limit",
                    sender_certificate.len(),
                    constants::MAX_CERTIFICATE_LENGTH
                ),
            ));
        }
        let thumbprint_len = receiver_certificate_thumbprint.len();
        if thumbprint_len > 0 && thumbprint_len != Thumbprint::THUMBPRINT_SIZE as isize {
            return Err(Error::decoding(format!(
                "Receiver thumbprint of {thumbprint_len} bytes is not a SHA-1 thumbprint"
            )));
        }
        Ok(AsymmetricSecurityHeader {
            security_policy_uri,
            sender_certificate,
            receiver_certificate_thumbprint,
        })
    }
}

/// The sequence header: the chunk's sequence number and the request all
/// chunks of the message share.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceHeader {
    /// Strictly increasing per channel.
    pub sequence_number: u32,
    /// The request this chunk belongs to.
    pub request_id: u32,
}

impl SimpleBinaryEncodable for SequenceHeader {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.sequence_number.encode(stream)?;
        self.request_id.encode(stream)
    }
}

impl SimpleBinaryDecodable for SequenceHeader {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        Ok(SequenceHeader {
            sequence_number: u32::decode(stream, decoding_options)?,
            request_id: u32::decode(stream, decoding_options)?,
        })
    }
}
