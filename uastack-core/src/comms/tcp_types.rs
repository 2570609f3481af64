// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The HELLO / ACKNOWLEDGE / ERROR handshake messages and the constants of
//! the opc.tcp framing.

use std::io::{Read, Write};

use log::error;

use uastack_types::{
    constants as types_constants, read_u32, status_code::StatusCode, write_u32, DecodingOptions,
    EncodingResult, Error, SimpleBinaryDecodable, SimpleBinaryEncodable, UAString,
};

/// Message type of a HELLO message.
pub const HELLO_MESSAGE: &[u8] = b"HEL";
/// Message type of an ACKNOWLEDGE message.
pub const ACKNOWLEDGE_MESSAGE: &[u8] = b"ACK";
/// Message type of an ERROR message.
pub const ERROR_MESSAGE: &[u8] = b"ERR";
/// Message type of a regular message chunk.
pub const CHUNK_MESSAGE: &[u8] = b"MSG";
/// Message type of an open secure channel chunk.
pub const OPEN_SECURE_CHANNEL_MESSAGE: &[u8] = b"OPN";
/// Message type of a close secure channel chunk.
pub const CLOSE_SECURE_CHANNEL_MESSAGE: &[u8] = b"CLO";

/// Chunk type byte of an intermediate chunk.
pub const CHUNK_INTERMEDIATE: u8 = b'C';
/// Chunk type byte of the final chunk of a message.
pub const CHUNK_FINAL: u8 = b'F';
/// Chunk type byte of a final chunk aborting a message.
pub const CHUNK_FINAL_ERROR: u8 = b'A';

/// Minimum size in bytes a chunk may be negotiated down to.
pub const MIN_CHUNK_SIZE: usize = types_constants::MIN_CHUNK_SIZE;

/// Size in bytes of the fixed part of the HEL/ACK/ERR message header:
/// 3 byte type, 1 byte reserved, 4 byte length.
pub const MESSAGE_HEADER_SIZE: usize = 8;

fn write_message_header<S: Write + ?Sized>(
    stream: &mut S,
    message_type: &[u8],
    message_size: usize,
) -> EncodingResult<()> {
    stream.write_all(message_type).map_err(Error::encoding)?;
    stream.write_all(b"F").map_err(Error::encoding)?;
    write_u32(stream, message_size as u32)
}

fn read_message_header<S: Read + ?Sized>(
    stream: &mut S,
    expected_type: &[u8],
) -> EncodingResult<u32> {
    let mut ty = [0u8; 4];
    stream.read_exact(&mut ty).map_err(Error::decoding)?;
    if &ty[0..3] != expected_type {
        return Err(Error::new(
            StatusCode::BadTcpMessageTypeInvalid,
            format!("Expected message type {expected_type:?}, got {ty:?}"),
        ));
    }
    read_u32(stream)
}

/// The HELLO message, the first message a client sends on a connection,
/// negotiating buffer sizes and limits.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    /// Protocol version, currently always 0.
    pub protocol_version: u32,
    /// Largest chunk the client can receive.
    pub receive_buffer_size: u32,
    /// Largest chunk the client will send.
    pub send_buffer_size: u32,
    /// Largest reassembled message size the client accepts, 0 for no limit.
    pub max_message_size: u32,
    /// Largest number of chunks per message the client accepts, 0 for no
    /// limit.
    pub max_chunk_count: u32,
    /// The endpoint the client wants to talk to.
    pub endpoint_url: UAString,
}

impl SimpleBinaryEncodable for HelloMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + 20 + self.endpoint_url.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_message_header(stream, HELLO_MESSAGE, self.byte_len())?;
        write_u32(stream, self.protocol_version)?;
        write_u32(stream, self.receive_buffer_size)?;
        write_u32(stream, self.send_buffer_size)?;
        write_u32(stream, self.max_message_size)?;
        write_u32(stream, self.max_chunk_count)?;
        self.endpoint_url.encode(stream)
    }
}

impl SimpleBinaryDecodable for HelloMessage {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let _message_size = read_message_header(stream, HELLO_MESSAGE)?;
        Ok(HelloMessage {
            protocol_version: read_u32(stream)?,
            receive_buffer_size: read_u32(stream)?,
            send_buffer_size: read_u32(stream)?,
            max_message_size: read_u32(stream)?,
            max_chunk_count: read_u32(stream)?,
            endpoint_url: UAString::decode(stream, decoding_options)?,
        })
    }
}

impl HelloMessage {
    /// Create a hello message for the given endpoint and limits.
    pub fn new(
        endpoint_url: &str,
        send_buffer_size: usize,
        receive_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> HelloMessage {
        HelloMessage {
            protocol_version: 0,
            receive_buffer_size: receive_buffer_size as u32,
            send_buffer_size: send_buffer_size as u32,
            max_message_size: max_message_size as u32,
            max_chunk_count: max_chunk_count as u32,
            endpoint_url: UAString::from(endpoint_url),
        }
    }

    /// Test that the endpoint url is one of the given endpoints.
    pub fn is_endpoint_url_valid(&self, endpoints: &[String]) -> bool {
        if self.endpoint_url.is_null() || self.endpoint_url.as_ref().len() > 4096 {
            return false;
        }
        // Ignore the scheme-less suffix comparison subtleties; exact match
        // or prefix match on the url without trailing slash.
        let url = self.endpoint_url.as_ref().trim_end_matches('/');
        endpoints.iter().any(|e| e.trim_end_matches('/') == url)
    }

    /// Test that the buffer sizes are within what the spec allows.
    pub fn is_valid_buffer_sizes(&self) -> bool {
        self.receive_buffer_size as usize >= MIN_CHUNK_SIZE
            && self.send_buffer_size as usize >= MIN_CHUNK_SIZE
    }
}

/// The ACKNOWLEDGE message, the server's reply to HELLO with the revised
/// limits.
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgeMessage {
    /// Protocol version the server speaks.
    pub protocol_version: u32,
    /// Largest chunk the server can receive.
    pub receive_buffer_size: u32,
    /// Largest chunk the server will send.
    pub send_buffer_size: u32,
    /// Largest reassembled message the server accepts.
    pub max_message_size: u32,
    /// Largest number of chunks per message the server accepts.
    pub max_chunk_count: u32,
}

impl SimpleBinaryEncodable for AcknowledgeMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + 20
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_message_header(stream, ACKNOWLEDGE_MESSAGE, self.byte_len())?;
        write_u32(stream, self.protocol_version)?;
        write_u32(stream, self.receive_buffer_size)?;
        write_u32(stream, self.send_buffer_size)?;
        write_u32(stream, self.max_message_size)?;
        write_u32(stream, self.max_chunk_count)?;
        Ok(())
    }
}

impl SimpleBinaryDecodable for AcknowledgeMessage {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let _message_size = read_message_header(stream, ACKNOWLEDGE_MESSAGE)?;
        Ok(AcknowledgeMessage {
            protocol_version: read_u32(stream)?,
            receive_buffer_size: read_u32(stream)?,
            send_buffer_size: read_u32(stream)?,
            max_message_size: read_u32(stream)?,
            max_chunk_count: read_u32(stream)?,
        })
    }
}

impl AcknowledgeMessage {
    /// Create an acknowledge with the given revised limits.
    pub fn new(
        protocol_version: u32,
        receive_buffer_size: u32,
        send_buffer_size: u32,
        max_message_size: u32,
        max_chunk_count: u32,
    ) -> AcknowledgeMessage {
        AcknowledgeMessage {
            protocol_version,
            receive_buffer_size,
            send_buffer_size,
            max_message_size,
            max_chunk_count,
        }
    }
}

/// The ERROR message, sent before dropping a connection for a transport
/// level error.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    /// The numeric status code of the error.
    pub error: u32,
    /// Human readable reason.
    pub reason: UAString,
}

impl SimpleBinaryEncodable for ErrorMessage {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_SIZE + 4 + self.reason.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_message_header(stream, ERROR_MESSAGE, self.byte_len())?;
        write_u32(stream, self.error)?;
        self.reason.encode(stream)
    }
}

impl SimpleBinaryDecodable for ErrorMessage {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let _message_size = read_message_header(stream, ERROR_MESSAGE)?;
        Ok(ErrorMessage {
            error: read_u32(stream)?,
            reason: UAString::decode(stream, decoding_options)?,
        })
    }
}

impl ErrorMessage {
    /// Create an error message from a status code and reason.
    pub fn new(status_code: StatusCode, reason: &str) -> ErrorMessage {
        error!("Sending error {}: {}", status_code, reason);
        ErrorMessage {
            error: status_code.bits(),
            reason: UAString::from(reason),
        }
    }

    /// The status code of the error.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_bits(self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn hello_round_trip() {
        let hello = HelloMessage::new("opc.tcp://localhost:4840/", 65536, 65536, 0, 0);
        let bytes = hello.encode_to_vec();
        assert_eq!(bytes.len(), hello.byte_len());
        let decoded =
            HelloMessage::decode(&mut Cursor::new(bytes), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn error_round_trip() {
        let err = ErrorMessage::new(StatusCode::BadTcpMessageTooLarge, "too large");
        let bytes = err.encode_to_vec();
        let decoded =
            ErrorMessage::decode(&mut Cursor::new(bytes), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded.status(), StatusCode::BadTcpMessageTooLarge);
    }

    #[test]
    fn hello_endpoint_url() {
        let hello = HelloMessage::new("opc.tcp://localhost:4840/", 65536, 65536, 0, 0);
        assert!(hello.is_endpoint_url_valid(&["opc.tcp://localhost:4840".to_owned()]));
        assert!(!hello.is_endpoint_url_valid(&["opc.tcp://other:4840".to_owned()]));
        assert!(hello.is_valid_buffer_sizes());
    }
}
