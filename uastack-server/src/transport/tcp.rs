// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The server end of the opc.tcp transport: the HELLO/ACKNOWLEDGE
//! negotiation and the frame loop feeding chunks through the secure
//! channel into whole requests.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::StreamExt;
use log::error;
use tokio::{
    io::{AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
};
use tokio_util::{codec::FramedRead, sync::CancellationToken};

use uastack_core::{
    comms::{
        buffer::SendBuffer,
        chunker::Chunker,
        message_chunk::{MessageChunk, MessageIsFinalType},
        message_chunk_info::ChunkInfo,
        secure_channel::SecureChannel,
        tcp_codec::{Message, TcpCodec},
        tcp_types::{AcknowledgeMessage, ErrorMessage, HelloMessage},
    },
    RequestMessage, ResponseMessage,
};
use uastack_types::{
    DecodingOptions, Error, ResponseHeader, ServiceFault, SimpleBinaryEncodable, StatusCode,
};

use crate::info::ServerInfo;

/// Limits a transport runs under, from the server configuration.
#[derive(Debug, Clone)]
pub(crate) struct TransportConfig {
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
    pub max_message_size: usize,
    pub max_chunk_count: usize,
    pub hello_timeout: Duration,
}

/// A fully reassembled request with the transport context needed to answer
/// it.
#[derive(Debug)]
pub(crate) struct Request {
    pub message: RequestMessage,
    pub chunk_info: ChunkInfo,
    pub request_id: u32,
}

/// What one poll of the transport produced.
#[derive(Debug)]
pub(crate) enum TransportPollResult {
    /// Outgoing bytes were flushed.
    OutgoingMessageSent,
    /// A chunk arrived; its message is not complete yet.
    IncomingChunk,
    /// A whole request arrived.
    IncomingMessage(Request),
    /// A request failed in a way only that request needs to know about.
    RecoverableError(StatusCode, u32, u32),
    /// The channel is broken; send ERR and close.
    Error(StatusCode),
    /// The connection is gone.
    Closed,
}

// 0 means unlimited on either side of the negotiation.
fn negotiate_limit(ours: u32, theirs: u32) -> u32 {
    match (ours, theirs) {
        (0, theirs) => theirs,
        (ours, 0) => ours,
        (ours, theirs) => ours.min(theirs),
    }
}

/// Performs the HELLO handshake for a fresh connection, producing the
/// transport on success.
pub(crate) struct TcpConnector {
    read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
    write: WriteHalf<TcpStream>,
    deadline: Instant,
    config: TransportConfig,
    decoding_options: DecodingOptions,
}

impl TcpConnector {
    pub fn new(
        stream: TcpStream,
        config: TransportConfig,
        decoding_options: DecodingOptions,
    ) -> Self {
        let (read, write) = tokio::io::split(stream);
        TcpConnector {
            read: FramedRead::new(read, TcpCodec::new(decoding_options.clone())),
            write,
            deadline: Instant::now() + config.hello_timeout,
            config,
            decoding_options,
        }
    }

    pub async fn connect(
        mut self,
        info: Arc<ServerInfo>,
        token: CancellationToken,
    ) -> Result<TcpTransport, StatusCode> {
        let failure = tokio::select! {
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(self.deadline)) => {
                ErrorMessage::new(StatusCode::BadTimeout, "No HELLO before the deadline")
            }
            _ = token.cancelled() => {
                ErrorMessage::new(StatusCode::BadServerHalted, "Server is stopping")
            }
            outcome = self.negotiate(info) => match outcome {
                Ok(buffer) => {
                    return Ok(TcpTransport::new(self.read, self.write, buffer));
                }
                Err(failure) => failure,
            }
        };
        // Best effort; the peer may already be gone
        let _ = self.write.write_all(&failure.encode_to_vec()).await;
        Err(failure.status())
    }

    // Wait for HELLO, validate it, answer with ACKNOWLEDGE carrying the
    // revised limits.
    async fn negotiate(&mut self, info: Arc<ServerInfo>) -> Result<SendBuffer, ErrorMessage> {
        let err = |status, reason: &str| ErrorMessage::new(status, reason);

        let hello: HelloMessage = match self.read.next().await {
            Some(Ok(Message::Hello(hello))) => hello,
            Some(Ok(other)) => {
                return Err(err(
                    StatusCode::BadCommunicationError,
                    &format!("First message was {other:?}, not HELLO"),
                ));
            }
            Some(Err(e)) => {
                return Err(err(
                    StatusCode::BadCommunicationError,
                    &format!("Read failed while waiting for HELLO: {e}"),
                ));
            }
            None => return Err(err(StatusCode::BadCommunicationError, "Stream closed")),
        };

        if hello.protocol_version > 0 {
            return Err(err(
                StatusCode::BadProtocolVersionUnsupported,
                "Unsupported protocol version",
            ));
        }
        if !hello.is_endpoint_url_valid(&info.endpoint_urls()) {
            return Err(err(
                StatusCode::BadTcpEndpointUrlInvalid,
                "HELLO names an unknown endpoint",
            ));
        }
        if !hello.is_valid_buffer_sizes() {
            return Err(err(
                StatusCode::BadCommunicationError,
                "HELLO buffer sizes are below the minimum",
            ));
        }

        let ack = AcknowledgeMessage::new(
            0,
            (self.config.receive_buffer_size as u32).min(hello.send_buffer_size),
            (self.config.send_buffer_size as u32).min(hello.receive_buffer_size),
            negotiate_limit(
                self.decoding_options.max_message_size as u32,
                hello.max_message_size,
            ),
            negotiate_limit(
                self.decoding_options.max_chunk_count as u32,
                hello.max_chunk_count,
            ),
        );
        let mut buffer = SendBuffer::new(
            self.config.send_buffer_size,
            self.config.max_message_size,
            self.config.max_chunk_count,
        );
        buffer.revise(
            ack.send_buffer_size as usize,
            ack.max_message_size as usize,
            ack.max_chunk_count as usize,
        );
        self.write
            .write_all(&ack.encode_to_vec())
            .await
            .map_err(|e| {
                err(
                    StatusCode::BadCommunicationError,
                    &format!("Failed to send ACKNOWLEDGE: {e}"),
                )
            })?;
        Ok(buffer)
    }
}

/// The established transport: drains the send buffer and reassembles
/// incoming chunks into requests.
pub(crate) struct TcpTransport {
    read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
    write: WriteHalf<TcpStream>,
    send_buffer: SendBuffer,
    closing: bool,
    /// Chunks of the request currently being reassembled.
    partial_request: Vec<MessageChunk>,
    last_received_sequence_number: u32,
}

impl TcpTransport {
    pub fn new(
        read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
        write: WriteHalf<TcpStream>,
        send_buffer: SendBuffer,
    ) -> Self {
        Self {
            read,
            write,
            send_buffer,
            closing: false,
            partial_request: Vec::new(),
            last_received_sequence_number: 0,
        }
    }

    /// Close once everything queued has been flushed.
    pub fn set_closing(&mut self) {
        self.closing = true;
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Queue an ERR message.
    pub fn enqueue_error(&mut self, message: ErrorMessage) {
        self.send_buffer.write_error(message);
    }

    /// Queue a response. An encoding failure that can be pinned to a
    /// request becomes a service fault for that request instead of killing
    /// the connection.
    pub fn enqueue_message_for_send(
        &mut self,
        channel: &mut SecureChannel,
        message: ResponseMessage,
        request_id: u32,
    ) -> Result<(), StatusCode> {
        let Err(e) = self.send_buffer.write(request_id, message, channel) else {
            return Ok(());
        };
        log::warn!("Response failed to encode: {e}");
        match e.full_context() {
            Some((request_id, request_handle)) => {
                let fault = ServiceFault {
                    response_header: ResponseHeader::new_service_result(request_handle, e.into()),
                };
                self.send_buffer
                    .write(request_id, ResponseMessage::from(fault), channel)?;
                Ok(())
            }
            None => Err(e.into()),
        }
    }

    /// One step of the transport: stage and flush outgoing bytes while
    /// listening for incoming frames.
    pub async fn poll(&mut self, channel: &mut SecureChannel) -> TransportPollResult {
        if self.send_buffer.should_encode_chunks() {
            if let Err(e) = self.send_buffer.encode_next_chunk(channel) {
                return TransportPollResult::Error(e.status());
            }
        }

        if self.send_buffer.can_read() {
            tokio::select! {
                sent = self.send_buffer.read_into_async(&mut self.write) => {
                    match sent {
                        Ok(()) => TransportPollResult::OutgoingMessageSent,
                        Err(e) => {
                            error!("Flush failed: {e}");
                            TransportPollResult::Closed
                        }
                    }
                }
                frame = self.read.next() => self.on_frame(frame, channel),
            }
        } else if self.closing {
            TransportPollResult::Closed
        } else {
            let frame = self.read.next().await;
            self.on_frame(frame, channel)
        }
    }

    fn on_frame(
        &mut self,
        frame: Option<Result<Message, std::io::Error>>,
        channel: &mut SecureChannel,
    ) -> TransportPollResult {
        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                error!("Stream error: {e}");
                return TransportPollResult::Error(StatusCode::BadConnectionClosed);
            }
            None => return TransportPollResult::Closed,
        };
        match self.accept_chunk(frame, channel) {
            Ok(None) => TransportPollResult::IncomingChunk,
            Ok(Some(request)) => {
                self.partial_request.clear();
                TransportPollResult::IncomingMessage(request)
            }
            Err(e) => {
                self.partial_request.clear();
                match e.full_context() {
                    Some((id, handle)) => {
                        TransportPollResult::RecoverableError(e.status(), id, handle)
                    }
                    None => TransportPollResult::Error(e.status()),
                }
            }
        }
    }

    // Feed one frame into the reassembly buffer; a Final chunk completes
    // and decodes the request.
    fn accept_chunk(
        &mut self,
        frame: Message,
        channel: &mut SecureChannel,
    ) -> Result<Option<Request>, Error> {
        let Message::Chunk(chunk) = frame else {
            return Err(Error::new(
                StatusCode::BadUnexpectedError,
                format!("Unexpected frame after the handshake: {frame:?}"),
            ));
        };

        let header = chunk.message_header(&channel.decoding_options())?;
        if header.is_final == MessageIsFinalType::FinalError {
            // The peer abandoned the message; whoever sent it times out
            self.partial_request.clear();
            return Ok(None);
        }

        let chunk = channel.verify_and_remove_security(&chunk.data)?;
        if self.partial_request.len() == self.send_buffer.max_chunk_count {
            return Err(Error::decoding(format!(
                "Message exceeds the negotiated {} chunk limit",
                self.send_buffer.max_chunk_count
            )));
        }
        self.partial_request.push(chunk);
        if header.is_final == MessageIsFinalType::Intermediate {
            return Ok(None);
        }

        let chunk_info = self.partial_request[0].chunk_info(channel)?;
        let request_id = chunk_info.sequence_header.request_id;
        self.last_received_sequence_number = Chunker::validate_chunks(
            self.last_received_sequence_number + 1,
            channel,
            &self.partial_request,
        )?;
        let message = Chunker::decode(&self.partial_request, channel, None)
            .map_err(|e| e.with_request_id(request_id))?;
        Ok(Some(Request {
            message,
            chunk_info,
            request_id,
        }))
    }
}
