// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Parsed header information of a message chunk.

use std::io::Cursor;

use uastack_types::{EncodingResult, SimpleBinaryDecodable};

use super::{
    message_chunk::{MessageChunk, MessageChunkHeader},
    secure_channel::SecureChannel,
    security_header::{SecurityHeader, SequenceHeader},
};

/// The decoded headers of a (decrypted) message chunk, and the position of
/// the message body inside the chunk data.
#[derive(Debug)]
pub struct ChunkInfo {
    /// The message chunk header.
    pub message_header: MessageChunkHeader,
    /// The security header, symmetric or asymmetric by message type.
    pub security_header: SecurityHeader,
    /// The sequence header with sequence number and request id.
    pub sequence_header: SequenceHeader,
    /// Byte offset of the message body within the chunk data.
    pub body_offset: usize,
    /// Length in bytes of the message body.
    pub body_length: usize,
}

impl ChunkInfo {
    /// Parse the headers of the given chunk. The chunk must already have had
    /// security removed, so the data after the headers is the plain body.
    pub fn new(chunk: &MessageChunk, secure_channel: &SecureChannel) -> EncodingResult<ChunkInfo> {
        let decoding_options = secure_channel.decoding_options();
        let mut stream = Cursor::new(&chunk.data);

        let message_header = MessageChunkHeader::decode(&mut stream, &decoding_options)?;
        let security_header = SecurityHeader::decode_from_stream(
            &mut stream,
            message_header.message_type.is_open_secure_channel(),
            &decoding_options,
        )?;
        let sequence_header = SequenceHeader::decode(&mut stream, &decoding_options)?;

        let body_offset = stream.position() as usize;
        let body_length = chunk.data.len() - body_offset;

        Ok(ChunkInfo {
            message_header,
            security_header,
            sequence_header,
            body_offset,
            body_length,
        })
    }
}
