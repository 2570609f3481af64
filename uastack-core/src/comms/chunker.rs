// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Splitting messages into chunks and putting them back together.
//!
//! Encoding streams the message straight into chunk-sized buffers, so even
//! a large message never exists as one contiguous allocation. Decoding
//! walks the chunk bodies as one continuous `Read`.

use std::io::{Read, Write};

use log::error;
use uastack_crypto::SecurityPolicy;
use uastack_types::{
    BinaryDecodable, BinaryEncodable, EncodingResult, Error, NodeId, ObjectId, StatusCode,
};

use crate::{
    comms::{
        message_chunk::{MessageChunk, MessageChunkType, MessageIsFinalType},
        secure_channel::SecureChannel,
    },
    Message,
};

// A `Read` over the concatenated bodies of a chunk sequence. Steps to the
// next chunk when the current body runs dry, checking final flags on the
// way.
struct ChunkReader<'a> {
    chunks: &'a [MessageChunk],
    channel: &'a SecureChannel,
    /// Index of the chunk currently being read.
    index: usize,
    /// The remaining body slice of that chunk.
    body: &'a [u8],
}

impl<'a> ChunkReader<'a> {
    fn new(channel: &'a SecureChannel, chunks: &'a [MessageChunk]) -> Result<Self, Error> {
        if chunks.is_empty() {
            return Err(Error::new(
                StatusCode::BadUnexpectedError,
                "No chunks to read",
            ));
        }
        let mut reader = ChunkReader {
            chunks,
            channel,
            index: 0,
            body: &[],
        };
        reader.body = reader.body_of(0)?;
        Ok(reader)
    }

    fn body_of(&self, index: usize) -> Result<&'a [u8], Error> {
        let info = self.chunks[index].chunk_info(self.channel)?;
        let expected = if index + 1 == self.chunks.len() {
            MessageIsFinalType::Final
        } else {
            MessageIsFinalType::Intermediate
        };
        if info.message_header.is_final != expected {
            return Err(Error::decoding("Chunk sequence has a misplaced final flag"));
        }
        Ok(&self.chunks[index].data[info.body_offset..info.body_offset + info.body_length])
    }
}

impl Read for ChunkReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.body.is_empty() {
            if self.index + 1 >= self.chunks.len() {
                return Ok(0);
            }
            self.index += 1;
            self.body = self.body_of(self.index)?;
        }
        let n = self.body.len().min(buf.len());
        buf[..n].copy_from_slice(&self.body[..n]);
        self.body = &self.body[n..];
        Ok(n)
    }
}

// A `Write` that fills fixed-size body buffers and seals each one into a
// chunk as it fills. The expected chunk count is computed up front from
// the message size, so the final chunk can be flagged as such while it is
// written.
struct ChunkWriter<'a> {
    channel: &'a SecureChannel,
    message_type: MessageChunkType,
    request_id: u32,
    next_sequence_number: u32,
    chunks: Vec<MessageChunk>,
    chunks_expected: usize,
    body_capacity: usize,
    message_remaining: usize,
    buffer: Vec<u8>,
    sealed: bool,
}

impl<'a> ChunkWriter<'a> {
    fn new(
        message_type: MessageChunkType,
        channel: &'a SecureChannel,
        max_chunk_size: usize,
        message_size: usize,
        request_id: u32,
        request_handle: u32,
        sequence_number: u32,
    ) -> Result<Self, Error> {
        let body_capacity = if max_chunk_size > 0 {
            MessageChunk::body_size_from_message_size(message_type, channel, max_chunk_size)
                .map_err(|_| {
                    Error::new(
                        StatusCode::BadTcpInternalError,
                        format!("Negotiated chunk size {max_chunk_size} cannot hold a message"),
                    )
                    .with_context(
                        Some(request_id),
                        (request_handle > 0).then_some(request_handle),
                    )
                })?
        } else {
            // No limit: the whole message is one chunk
            message_size
        };
        let chunks_expected = if body_capacity > 0 {
            message_size / body_capacity + 1
        } else {
            1
        };
        let first = body_capacity.min(message_size);
        Ok(ChunkWriter {
            channel,
            message_type,
            request_id,
            next_sequence_number: sequence_number,
            chunks: Vec::with_capacity(chunks_expected),
            chunks_expected,
            body_capacity,
            message_remaining: message_size,
            buffer: Vec::with_capacity(first),
            sealed: false,
        })
    }

    // Turn the current buffer into a chunk and start the next one.
    fn seal_chunk(&mut self) -> EncodingResult<()> {
        if self.sealed {
            return Ok(());
        }
        let is_last = self.chunks.len() + 1 == self.chunks_expected;
        let body = std::mem::take(&mut self.buffer);
        self.message_remaining = self.message_remaining.saturating_sub(body.len());
        let chunk = MessageChunk::new(
            self.next_sequence_number,
            self.request_id,
            self.message_type,
            if is_last {
                MessageIsFinalType::Final
            } else {
                MessageIsFinalType::Intermediate
            },
            self.channel,
            &body,
        )?;
        self.next_sequence_number += 1;
        self.chunks.push(chunk);
        if is_last {
            self.sealed = true;
        } else {
            let next = self.body_capacity.min(self.message_remaining);
            self.buffer = Vec::with_capacity(next);
        }
        Ok(())
    }

    fn finish(mut self) -> EncodingResult<Vec<MessageChunk>> {
        if !self.sealed {
            self.seal_chunk()?;
        }
        if !self.sealed {
            return Err(Error::encoding("Message was shorter than its declared size"));
        }
        Ok(self.chunks)
    }
}

impl Write for ChunkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.sealed {
            return Ok(0);
        }
        let space = self.body_capacity - self.buffer.len();
        let n = buf.len().min(space);
        self.buffer.extend_from_slice(&buf[..n]);
        if self.buffer.len() == self.body_capacity && !self.sealed {
            self.seal_chunk()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Turns messages into chunk sequences and chunk sequences back into
/// messages.
pub struct Chunker;

impl Chunker {
    /// Check a reassembled chunk sequence: consistent channel id, sequence
    /// numbers strictly increasing from `starting_sequence_number` with no
    /// gaps, and one request id throughout. Returns the last sequence
    /// number on success; a replayed or reordered chunk fails with
    /// `BadSequenceNumberInvalid`.
    pub fn validate_chunks(
        starting_sequence_number: u32,
        secure_channel: &SecureChannel,
        chunks: &[MessageChunk],
    ) -> Result<u32, Error> {
        let channel_id = secure_channel.secure_channel_id();
        let mut expected_sequence = starting_sequence_number;
        let mut request_id = None;

        for (i, chunk) in chunks.iter().enumerate() {
            let info = chunk.chunk_info(secure_channel)?;
            let header = &info.sequence_header;

            if channel_id != 0 && info.message_header.secure_channel_id != channel_id {
                return Err(Error::new(
                    StatusCode::BadSecureChannelIdInvalid,
                    format!(
                        "Chunk {} is for channel {}, not {}",
                        i, info.message_header.secure_channel_id, channel_id
                    ),
                ));
            }
            match (i, header.sequence_number) {
                // The first chunk may jump ahead but never backwards
                (0, n) if n >= expected_sequence => expected_sequence = n,
                (0, n) => {
                    return Err(Error::new(
                        StatusCode::BadSequenceNumberInvalid,
                        format!("Sequence number {n} reuses a value below {expected_sequence}"),
                    ));
                }
                (_, n) if n == expected_sequence => {}
                (_, n) => {
                    return Err(Error::new(
                        StatusCode::BadSequenceNumberInvalid,
                        format!("Chunk {i} has sequence number {n}, expected {expected_sequence}"),
                    ));
                }
            }
            match request_id {
                None => request_id = Some(header.request_id),
                Some(id) if id == header.request_id => {}
                Some(id) => {
                    return Err(Error::new(
                        StatusCode::BadSequenceNumberInvalid,
                        format!(
                            "Chunk {} switches request id from {} to {}",
                            i, id, header.request_id
                        ),
                    ));
                }
            }
            expected_sequence += 1;
        }
        Ok(expected_sequence - 1)
    }

    /// Encode a message as a chunk sequence. `max_chunk_size` bounds each
    /// chunk and `max_message_size` the whole message; 0 disables either
    /// limit.
    pub fn encode(
        sequence_number: u32,
        request_id: u32,
        max_message_size: usize,
        max_chunk_size: usize,
        secure_channel: &SecureChannel,
        message: &impl Message,
    ) -> Result<Vec<MessageChunk>, Error> {
        if secure_channel.security_policy() == SecurityPolicy::Unknown {
            return Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                "Channel policy is unknown",
            ));
        }

        let handle = message.request_handle();
        let handle_opt = (handle > 0).then_some(handle);

        let ctx_handle = secure_channel.context();
        let ctx = ctx_handle.context();
        let type_id = message.type_id();
        // The message on the wire is its encoding id followed by the body
        let message_size = type_id.byte_len(&ctx) + message.byte_len(&ctx);
        if max_message_size > 0 && message_size > max_message_size {
            error!("Message of {message_size} bytes exceeds the {max_message_size} byte limit");
            let status = if secure_channel.is_client_role() {
                StatusCode::BadRequestTooLarge
            } else {
                StatusCode::BadResponseTooLarge
            };
            return Err(Error::new(status, "Message too large")
                .with_context(Some(request_id), handle_opt));
        }

        let mut writer = ChunkWriter::new(
            message.message_type(),
            secure_channel,
            max_chunk_size,
            message_size,
            request_id,
            handle,
            sequence_number,
        )?;
        type_id.encode(&mut writer, &ctx)?;
        message
            .encode(&mut writer, &ctx)
            .map_err(|e| e.with_context(Some(request_id), handle_opt))?;
        writer.finish()
    }

    /// Decode a message from a complete chunk sequence. When
    /// `expected_node_id` is given the message must carry exactly that
    /// encoding id.
    pub fn decode<T: Message>(
        chunks: &[MessageChunk],
        secure_channel: &SecureChannel,
        expected_node_id: Option<NodeId>,
    ) -> Result<T, Error> {
        let mut reader = ChunkReader::new(secure_channel, chunks)?;
        let ctx_handle = secure_channel.context();
        let ctx = ctx_handle.context();

        let node_id = NodeId::decode(&mut reader, &ctx)?;
        if let Some(expected) = expected_node_id {
            if node_id != expected {
                return Err(Error::decoding(format!(
                    "Message id {node_id} does not match the expected {expected}"
                )));
            }
        }
        let object_id = object_id_of(&node_id)?;
        T::decode_by_object_id(&mut reader, object_id, &ctx)
    }
}

fn object_id_of(node_id: &NodeId) -> Result<ObjectId, Error> {
    node_id
        .as_object_id()
        .map_err(|_| Error::decoding(format!("Message id {node_id} is not a known object id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RequestMessage, ResponseMessage};
    use uastack_types::{ReadRequest, ReadValueId, RequestHeader};

    // The smallest chunk size a peer may negotiate.
    const SMALL_CHUNKS: usize = super::super::tcp_types::MIN_CHUNK_SIZE;

    // A read request large enough to need several chunks at SMALL_CHUNKS.
    fn big_request() -> RequestMessage {
        ReadRequest {
            request_header: RequestHeader::dummy(),
            max_age: 0.0,
            timestamps_to_return: Default::default(),
            nodes_to_read: Some(
                (0..2000u32)
                    .map(|i| ReadValueId::value_of((2u16, 5000 + i)))
                    .collect(),
            ),
        }
        .into()
    }

    #[test]
    fn fragmented_message_round_trips() {
        let channel = SecureChannel::new_no_certificate_store();
        let request = big_request();

        let chunks = Chunker::encode(1, 11, 0, SMALL_CHUNKS, &channel, &request).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(
            Chunker::validate_chunks(1, &channel, &chunks).unwrap(),
            chunks.len() as u32
        );

        let decoded: RequestMessage = Chunker::decode(&chunks, &channel, None).unwrap();
        let (RequestMessage::Read(decoded), RequestMessage::Read(original)) = (decoded, request)
        else {
            panic!("Wrong message type");
        };
        assert_eq!(decoded.nodes_to_read, original.nodes_to_read);
    }

    #[test]
    fn fragmentation_preserves_the_body_bytes() {
        let channel = SecureChannel::new_no_certificate_store();
        let request = big_request();

        let whole = Chunker::encode(1, 12, 0, 0, &channel, &request).unwrap();
        assert_eq!(whole.len(), 1);
        let split = Chunker::encode(1, 12, 0, SMALL_CHUNKS, &channel, &request).unwrap();

        let body_bytes = |chunks: &[MessageChunk]| -> Vec<u8> {
            chunks
                .iter()
                .flat_map(|c| {
                    let info = c.chunk_info(&channel).unwrap();
                    c.data[info.body_offset..info.body_offset + info.body_length].to_vec()
                })
                .collect()
        };
        assert_eq!(body_bytes(&whole), body_bytes(&split));
    }

    #[test]
    fn out_of_order_chunks_fail() {
        let channel = SecureChannel::new_no_certificate_store();
        let mut chunks =
            Chunker::encode(1, 13, 0, SMALL_CHUNKS, &channel, &big_request()).unwrap();
        assert!(chunks.len() >= 2);
        chunks.swap(0, 1);
        assert_eq!(
            Chunker::validate_chunks(1, &channel, &chunks)
                .unwrap_err()
                .status(),
            StatusCode::BadSequenceNumberInvalid
        );
    }

    #[test]
    fn replayed_sequence_numbers_fail() {
        let channel = SecureChannel::new_no_certificate_store();
        let chunks = Chunker::encode(5, 14, 0, 0, &channel, &big_request()).unwrap();
        // A receiver already past sequence number 5 treats this as a replay
        assert_eq!(
            Chunker::validate_chunks(6, &channel, &chunks)
                .unwrap_err()
                .status(),
            StatusCode::BadSequenceNumberInvalid
        );
    }

    #[test]
    fn responses_round_trip_too() {
        use uastack_types::{ResponseHeader, ServiceFault, StatusCode};
        let channel = SecureChannel::new_no_certificate_store();
        let fault: ResponseMessage = ServiceFault {
            response_header: ResponseHeader::new_service_result(9, StatusCode::BadNodeIdUnknown),
        }
        .into();
        let chunks = Chunker::encode(1, 2, 0, 0, &channel, &fault).unwrap();
        let decoded: ResponseMessage = Chunker::decode(&chunks, &channel, None).unwrap();
        let ResponseMessage::ServiceFault(decoded) = decoded else {
            panic!("Wrong message type");
        };
        assert_eq!(
            decoded.response_header.service_result,
            StatusCode::BadNodeIdUnknown
        );
    }
}
