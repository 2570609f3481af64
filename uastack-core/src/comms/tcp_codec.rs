// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! A tokio codec that reads the opc.tcp framing: HEL/ACK/ERR handshake
//! messages and raw message chunks. Chunks are returned undecrypted; the
//! secure channel strips security later.

use std::io::Cursor;

use bytes::{Buf, BytesMut};
use log::error;
use tokio_util::codec::Decoder;

use uastack_types::{DecodingOptions, SimpleBinaryDecodable, StatusCode};

use super::{
    message_chunk::MessageChunk,
    tcp_types::{
        AcknowledgeMessage, ErrorMessage, HelloMessage, ACKNOWLEDGE_MESSAGE, CHUNK_MESSAGE,
        CLOSE_SECURE_CHANNEL_MESSAGE, ERROR_MESSAGE, HELLO_MESSAGE, MESSAGE_HEADER_SIZE,
        OPEN_SECURE_CHANNEL_MESSAGE,
    },
};

/// One frame read off the wire.
#[derive(Debug)]
pub enum Message {
    /// A HELLO message.
    Hello(HelloMessage),
    /// An ACKNOWLEDGE message.
    Acknowledge(AcknowledgeMessage),
    /// An ERROR message.
    Error(ErrorMessage),
    /// A message chunk, still secured.
    Chunk(MessageChunk),
}

/// Decoder for the opc.tcp framing.
pub struct TcpCodec {
    decoding_options: DecodingOptions,
}

impl TcpCodec {
    /// Create a new codec with the given limits.
    pub fn new(decoding_options: DecodingOptions) -> TcpCodec {
        TcpCodec { decoding_options }
    }

    fn is_valid_message_type(t: &[u8]) -> bool {
        matches!(
            t,
            HELLO_MESSAGE
                | ACKNOWLEDGE_MESSAGE
                | ERROR_MESSAGE
                | CHUNK_MESSAGE
                | OPEN_SECURE_CHANNEL_MESSAGE
                | CLOSE_SECURE_CHANNEL_MESSAGE
        )
    }
}

impl Decoder for TcpCodec {
    type Item = Message;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, std::io::Error> {
        if buf.len() < MESSAGE_HEADER_SIZE {
            return Ok(None);
        }

        let message_type = &buf[0..3];
        if !Self::is_valid_message_type(message_type) {
            error!("Invalid message type in stream: {message_type:?}");
            return Err(StatusCode::BadTcpMessageTypeInvalid.into());
        }

        let message_size = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        if message_size < MESSAGE_HEADER_SIZE {
            return Err(StatusCode::BadTcpInternalError.into());
        }
        if self.decoding_options.max_message_size > 0
            && message_size > self.decoding_options.max_message_size
        {
            error!(
                "Message size {} exceeds configured maximum {}",
                message_size, self.decoding_options.max_message_size
            );
            return Err(StatusCode::BadTcpMessageTooLarge.into());
        }
        if buf.len() < message_size {
            // Wait for the full frame
            buf.reserve(message_size - buf.len());
            return Ok(None);
        }

        let frame = buf.copy_to_bytes(message_size);
        let mut stream = Cursor::new(&frame[..]);

        let message = match &frame[0..3] {
            HELLO_MESSAGE => Message::Hello(
                HelloMessage::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
            ACKNOWLEDGE_MESSAGE => Message::Acknowledge(
                AcknowledgeMessage::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
            ERROR_MESSAGE => Message::Error(
                ErrorMessage::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
            _ => Message::Chunk(
                MessageChunk::decode(&mut stream, &self.decoding_options)
                    .map_err(std::io::Error::from)?,
            ),
        };
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uastack_types::SimpleBinaryEncodable;

    #[test]
    fn decodes_hello_across_partial_reads() {
        let hello = HelloMessage::new("opc.tcp://localhost:4840/", 65536, 65536, 0, 0);
        let bytes = hello.encode_to_vec();

        let mut codec = TcpCodec::new(DecodingOptions::test());
        let mut buf = BytesMut::new();
        // Feed the first half, expect no frame yet
        buf.extend_from_slice(&bytes[..5]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&bytes[5..]);
        match codec.decode(&mut buf).unwrap() {
            Some(Message::Hello(decoded)) => assert_eq!(decoded, hello),
            other => panic!("Expected hello, got {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage() {
        let mut codec = TcpCodec::new(DecodingOptions::test());
        let mut buf = BytesMut::from(&b"GARBAGE_"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
