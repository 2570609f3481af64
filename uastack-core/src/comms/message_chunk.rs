// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Chunks: the frames a logical message is split into for transmission.
//!
//! A chunk is `[header][security header][sequence header][body]`, with
//! padding and a signature appended once security is applied. The header
//! packs the message type, whether the chunk ends its message, the total
//! chunk size and the channel id.

use std::io::{Cursor, Read, Write};

use log::error;
use uastack_types::{
    process_decode_io_result, read_u32, read_u8, write_u32, write_u8, DecodingOptions,
    EncodingResult, Error, SimpleBinaryDecodable, SimpleBinaryEncodable, StatusCode,
};

use super::{
    message_chunk_info::ChunkInfo,
    secure_channel::SecureChannel,
    security_header::SequenceHeader,
    tcp_types::{
        CHUNK_FINAL, CHUNK_FINAL_ERROR, CHUNK_INTERMEDIATE, CHUNK_MESSAGE,
        CLOSE_SECURE_CHANNEL_MESSAGE, MIN_CHUNK_SIZE, OPEN_SECURE_CHANNEL_MESSAGE,
    },
};

/// Bytes in a chunk header: type tag, final flag, size, channel id.
pub const MESSAGE_CHUNK_HEADER_SIZE: usize = 3 + 1 + 4 + 4;
/// Where the size field sits, right after the packed four byte tag.
pub const MESSAGE_SIZE_OFFSET: usize = 4;

/// The message kind a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageChunkType {
    /// An ordinary service message.
    Message,
    /// An OpenSecureChannel message.
    OpenSecureChannel,
    /// A CloseSecureChannel message.
    CloseSecureChannel,
}

impl MessageChunkType {
    /// Whether this is the OPN kind.
    pub fn is_open_secure_channel(&self) -> bool {
        matches!(self, MessageChunkType::OpenSecureChannel)
    }

    fn tag(&self) -> &'static [u8] {
        match self {
            MessageChunkType::Message => CHUNK_MESSAGE,
            MessageChunkType::OpenSecureChannel => OPEN_SECURE_CHANNEL_MESSAGE,
            MessageChunkType::CloseSecureChannel => CLOSE_SECURE_CHANNEL_MESSAGE,
        }
    }
}

/// Whether a chunk continues, ends, or aborts its message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageIsFinalType {
    /// More chunks follow.
    Intermediate,
    /// The message is complete with this chunk.
    Final,
    /// The sender gave up on the message; receivers drop what they have.
    FinalError,
}

impl MessageIsFinalType {
    fn tag(&self) -> u8 {
        match self {
            MessageIsFinalType::Intermediate => CHUNK_INTERMEDIATE,
            MessageIsFinalType::Final => CHUNK_FINAL,
            MessageIsFinalType::FinalError => CHUNK_FINAL_ERROR,
        }
    }
}

/// The fixed header of every chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageChunkHeader {
    /// The message kind.
    pub message_type: MessageChunkType,
    /// Whether the chunk ends its message.
    pub is_final: MessageIsFinalType,
    /// Chunk size in bytes, header included.
    pub message_size: u32,
    /// The secure channel the chunk travels on, 0 before one is issued.
    pub secure_channel_id: u32,
}

impl SimpleBinaryEncodable for MessageChunkHeader {
    fn byte_len(&self) -> usize {
        MESSAGE_CHUNK_HEADER_SIZE
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        stream
            .write_all(self.message_type.tag())
            .map_err(Error::encoding)?;
        write_u8(stream, self.is_final.tag())?;
        write_u32(stream, self.message_size)?;
        write_u32(stream, self.secure_channel_id)
    }
}

impl SimpleBinaryDecodable for MessageChunkHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let mut tag = [0u8; 3];
        process_decode_io_result(stream.read_exact(&mut tag))?;
        let message_type = match &tag[..] {
            CHUNK_MESSAGE => MessageChunkType::Message,
            OPEN_SECURE_CHANNEL_MESSAGE => MessageChunkType::OpenSecureChannel,
            CLOSE_SECURE_CHANNEL_MESSAGE => MessageChunkType::CloseSecureChannel,
            other => return Err(Error::decoding(format!("Bad chunk type tag {other:?}"))),
        };
        let is_final = match read_u8(stream)? {
            CHUNK_FINAL => MessageIsFinalType::Final,
            CHUNK_INTERMEDIATE => MessageIsFinalType::Intermediate,
            CHUNK_FINAL_ERROR => MessageIsFinalType::FinalError,
            other => return Err(Error::decoding(format!("Bad chunk final flag {other}"))),
        };
        Ok(MessageChunkHeader {
            message_type,
            is_final,
            message_size: read_u32(stream)?,
            secure_channel_id: read_u32(stream)?,
        })
    }
}

/// One chunk as raw bytes, headers included. The data may still be
/// encrypted; [`SecureChannel`] strips and applies security on whole
/// chunks.
#[derive(Debug, Clone)]
pub struct MessageChunk {
    /// The complete chunk: headers, body, and padding/signature when
    /// security is on.
    pub data: Vec<u8>,
}

/// Returned when the negotiated chunk size is below the protocol minimum,
/// which points at a negotiation bug rather than bad input.
#[derive(Debug)]
pub struct MessageChunkTooSmall;

impl MessageChunk {
    /// Assemble a plain (not yet secured) chunk around a body fragment.
    pub fn new(
        sequence_number: u32,
        request_id: u32,
        message_type: MessageChunkType,
        is_final: MessageIsFinalType,
        secure_channel: &SecureChannel,
        body: &[u8],
    ) -> EncodingResult<MessageChunk> {
        let security_header = secure_channel.make_security_header(message_type);
        let sequence_header = SequenceHeader {
            sequence_number,
            request_id,
        };
        let size = MESSAGE_CHUNK_HEADER_SIZE
            + security_header.byte_len()
            + sequence_header.byte_len()
            + body.len();

        let header = MessageChunkHeader {
            message_type,
            is_final,
            message_size: size as u32,
            secure_channel_id: secure_channel.secure_channel_id(),
        };

        let mut stream = Cursor::new(Vec::with_capacity(size));
        header.encode(&mut stream)?;
        security_header.encode(&mut stream)?;
        sequence_header.encode(&mut stream)?;
        stream.write_all(body).map_err(Error::encoding)?;
        Ok(MessageChunk {
            data: stream.into_inner(),
        })
    }

    /// How many body bytes fit into a chunk of `max_chunk_size` once the
    /// headers, the signature, and the worst-case padding are taken out.
    pub fn body_size_from_message_size(
        message_type: MessageChunkType,
        secure_channel: &SecureChannel,
        max_chunk_size: usize,
    ) -> Result<usize, MessageChunkTooSmall> {
        if max_chunk_size < MIN_CHUNK_SIZE {
            error!("Chunk size {max_chunk_size} is below the protocol minimum");
            return Err(MessageChunkTooSmall);
        }
        let security_header = secure_channel.make_security_header(message_type);
        let header_size = MESSAGE_CHUNK_HEADER_SIZE + security_header.byte_len() + 8;
        let signature_size = secure_channel.signature_size(&security_header);
        let (plain_block_size, minimum_padding) =
            secure_channel.get_padding_block_sizes(&security_header, signature_size, message_type);

        // When encrypting, the encrypted region must land on a whole number
        // of cipher blocks, so round the budget down to one first.
        let usable = if plain_block_size > 0 {
            max_chunk_size - max_chunk_size % plain_block_size
        } else {
            max_chunk_size
        };
        Ok(usable - header_size - signature_size - minimum_padding)
    }

    /// Decode just the fixed header.
    pub fn message_header(
        &self,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<MessageChunkHeader> {
        MessageChunkHeader::decode(&mut Cursor::new(&self.data), decoding_options)
    }

    /// Whether this chunk carries an OpenSecureChannel message.
    pub fn is_open_secure_channel(&self, decoding_options: &DecodingOptions) -> bool {
        self.message_header(decoding_options)
            .map(|h| h.message_type.is_open_secure_channel())
            .unwrap_or(false)
    }

    /// Parse the headers and locate the body.
    pub fn chunk_info(&self, secure_channel: &SecureChannel) -> EncodingResult<ChunkInfo> {
        ChunkInfo::new(self, secure_channel)
    }

    // Offset of the first encrypted byte: everything after the security
    // header.
    pub(crate) fn encrypted_data_offset(
        &self,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<usize> {
        use super::security_header::SecurityHeader;
        let mut stream = Cursor::new(&self.data);
        let header = MessageChunkHeader::decode(&mut stream, decoding_options)?;
        SecurityHeader::decode_from_stream(
            &mut stream,
            header.message_type.is_open_secure_channel(),
            decoding_options,
        )?;
        Ok(stream.position() as usize)
    }
}

impl SimpleBinaryEncodable for MessageChunk {
    fn byte_len(&self) -> usize {
        self.data.len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        stream.write_all(&self.data).map_err(Error::encoding)
    }
}

impl SimpleBinaryDecodable for MessageChunk {
    fn decode<S: Read + ?Sized>(
        in_stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let header = MessageChunkHeader::decode(in_stream, decoding_options).map_err(|e| {
            Error::new(
                StatusCode::BadCommunicationError,
                format!("Chunk header unreadable: {e:?}"),
            )
        })?;
        let size = header.message_size as usize;
        if decoding_options.max_message_size > 0 && size > decoding_options.max_message_size {
            return Err(Error::new(
                StatusCode::BadTcpMessageTooLarge,
                format!(
                    "Chunk of {size} bytes exceeds the {} byte limit",
                    decoding_options.max_message_size
                ),
            ));
        }

        // Reassemble the full chunk: re-encode the header, then read the
        // remainder straight into the buffer behind it.
        let mut data = vec![0u8; size];
        let mut cursor = Cursor::new(&mut data[..]);
        header.encode(&mut cursor)?;
        let header_len = cursor.position() as usize;
        process_decode_io_result(in_stream.read_exact(&mut data[header_len..]))?;
        Ok(MessageChunk { data })
    }
}
