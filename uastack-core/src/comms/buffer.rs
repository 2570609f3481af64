// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The outgoing side of a transport: messages are chunked on write, security
//! is applied one chunk at a time, and the resulting bytes are drained into
//! the network stream.

use std::collections::VecDeque;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use uastack_types::{EncodingResult, Error, SimpleBinaryEncodable, StatusCode};

use super::{
    chunker::Chunker,
    message_chunk::MessageChunk,
    secure_channel::SecureChannel,
    tcp_types::ErrorMessage,
};
use crate::Message;

/// How much an encrypted chunk can grow over its plain form: padding, the
/// signature and one cipher block of slack.
const CHUNK_GROWTH_SLACK: usize = 4096;

/// Buffer of outgoing chunks and bytes for one transport.
pub struct SendBuffer {
    /// Bytes with security applied, ready for the wire.
    buffer: VecDeque<u8>,
    /// Chunks waiting for security to be applied.
    chunks: VecDeque<MessageChunk>,
    /// Negotiated maximum chunk size for outgoing chunks.
    pub send_buffer_size: usize,
    /// Negotiated maximum size of an outgoing message.
    pub max_message_size: usize,
    /// Negotiated maximum number of chunks per message.
    pub max_chunk_count: usize,
    /// The sequence number of the next chunk. Sequence numbers increase
    /// monotonically for the lifetime of the channel.
    last_sent_sequence_number: u32,
}

impl SendBuffer {
    /// Create a new send buffer with the given negotiated limits.
    pub fn new(send_buffer_size: usize, max_message_size: usize, max_chunk_count: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(send_buffer_size),
            chunks: VecDeque::new(),
            send_buffer_size,
            max_message_size,
            max_chunk_count,
            last_sent_sequence_number: 0,
        }
    }

    /// Revise the limits after HELLO/ACKNOWLEDGE negotiation.
    pub fn revise(
        &mut self,
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) {
        if send_buffer_size > 0 {
            self.send_buffer_size = send_buffer_size;
        }
        if max_message_size > 0 {
            self.max_message_size = max_message_size;
        }
        if max_chunk_count > 0 {
            self.max_chunk_count = max_chunk_count;
        }
    }

    /// Encode a message into chunks and queue them for sending. Returns the
    /// request id on success.
    pub fn write(
        &mut self,
        request_id: u32,
        message: impl Message,
        secure_channel: &SecureChannel,
    ) -> Result<u32, Error> {
        let chunks = Chunker::encode(
            self.last_sent_sequence_number + 1,
            request_id,
            self.max_message_size,
            self.send_buffer_size,
            secure_channel,
            &message,
        )?;

        if self.max_chunk_count > 0 && chunks.len() > self.max_chunk_count {
            return Err(Error::new(
                StatusCode::BadCommunicationError,
                format!(
                    "Message requires {} chunks, exceeding the negotiated limit of {}",
                    chunks.len(),
                    self.max_chunk_count
                ),
            ));
        }

        self.last_sent_sequence_number += chunks.len() as u32;
        self.chunks.extend(chunks);
        Ok(request_id)
    }

    /// Write an ERROR message straight into the output buffer, bypassing
    /// chunking and security.
    pub fn write_error(&mut self, message: ErrorMessage) {
        // Unlikely to fail, the message is tiny.
        let buf = message.encode_to_vec();
        self.buffer.extend(buf);
    }

    /// `true` if chunks are waiting and the byte buffer has been drained, so
    /// the next chunk can be secured and staged.
    pub fn should_encode_chunks(&self) -> bool {
        !self.chunks.is_empty() && !self.can_read()
    }

    /// Apply security to the next queued chunk and stage its bytes.
    pub fn encode_next_chunk(&mut self, secure_channel: &SecureChannel) -> EncodingResult<()> {
        let Some(chunk) = self.chunks.pop_front() else {
            return Ok(());
        };
        let mut dst = vec![0u8; chunk.data.len() + CHUNK_GROWTH_SLACK];
        let size = secure_channel
            .apply_security(&chunk, &mut dst)
            .map_err(|e| Error::new(e, "Failed to apply security to outgoing chunk"))?;
        self.buffer.extend(&dst[..size]);
        Ok(())
    }

    /// `true` if bytes are staged for the wire.
    pub fn can_read(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Write the staged bytes into the stream.
    pub async fn read_into_async<W: AsyncWrite + Unpin>(
        &mut self,
        write: &mut W,
    ) -> std::io::Result<()> {
        let (a, b) = self.buffer.as_slices();
        write.write_all(a).await?;
        if !b.is_empty() {
            write.write_all(b).await?;
        }
        write.flush().await?;
        self.buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestMessage;
    use uastack_types::{CloseSecureChannelRequest, RequestHeader};

    #[test]
    fn sequence_numbers_increase_monotonically() {
        let channel = SecureChannel::new_no_certificate_store();
        let mut buffer = SendBuffer::new(65536, 0, 0);
        for request_id in 1..5u32 {
            let message: RequestMessage = CloseSecureChannelRequest {
                request_header: RequestHeader::dummy(),
            }
            .into();
            buffer.write(request_id, message, &channel).unwrap();
        }
        assert_eq!(buffer.last_sent_sequence_number, 4);
        assert!(buffer.should_encode_chunks());
        buffer.encode_next_chunk(&channel).unwrap();
        assert!(buffer.can_read());
    }
}
