// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The client side of the opc.tcp transport: HELLO/ACKNOWLEDGE negotiation,
//! request multiplexing over the secure channel, and token renewal at 75%
//! of the token lifetime.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;

use futures::StreamExt;
use hashbrown::HashMap;
use log::{debug, error};
use parking_lot::RwLock;
use tokio::{
    io::{AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    sync::{mpsc, oneshot},
};
use tokio_util::codec::FramedRead;

use uastack_core::{
    comms::{
        buffer::SendBuffer,
        chunker::Chunker,
        message_chunk::{MessageChunk, MessageIsFinalType},
        secure_channel::SecureChannel,
        tcp_codec::{Message, TcpCodec},
        tcp_types::HelloMessage,
    },
    trace_read_lock, trace_write_lock, RequestMessage, ResponseMessage,
};
use uastack_crypto::SecurityPolicy;
use uastack_types::{
    DateTime, NodeId, OpenSecureChannelRequest, RequestHeader, SecurityTokenRequestType,
    SimpleBinaryEncodable, StatusCode,
};

/// Transport limits for a client connection.
#[derive(Debug, Clone)]
pub struct TransportConfiguration {
    /// Largest chunk to send.
    pub send_buffer_size: usize,
    /// Largest chunk to accept.
    pub recv_buffer_size: usize,
    /// Largest reassembled message to accept.
    pub max_message_size: usize,
    /// Largest chunk count per message.
    pub max_chunk_count: usize,
}

impl Default for TransportConfiguration {
    fn default() -> Self {
        Self {
            send_buffer_size: uastack_types::constants::SEND_BUFFER_SIZE,
            recv_buffer_size: uastack_types::constants::RECEIVE_BUFFER_SIZE,
            max_message_size: uastack_types::constants::MAX_MESSAGE_SIZE,
            max_chunk_count: uastack_types::constants::MAX_CHUNK_COUNT,
        }
    }
}

/// One outgoing request with the slot its response lands in.
pub(crate) struct OutgoingMessage {
    pub request: RequestMessage,
    pub response_tx: oneshot::Sender<Result<ResponseMessage, StatusCode>>,
}

pub(crate) type RequestSend = mpsc::Sender<OutgoingMessage>;

/// The transport poll loop: sends queued requests and routes responses back
/// by request id.
pub struct TransportEventLoop {
    read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
    write: WriteHalf<TcpStream>,
    secure_channel: Arc<RwLock<SecureChannel>>,
    outgoing: mpsc::Receiver<OutgoingMessage>,
    send_buffer: SendBuffer,
    pending: HashMap<u32, oneshot::Sender<Result<ResponseMessage, StatusCode>>>,
    chunks: Vec<MessageChunk>,
    last_received_sequence_number: u32,
    next_request_id: u32,
}

impl TransportEventLoop {
    /// Poll the transport once. Returns `Err` when the connection died.
    pub async fn poll(&mut self) -> Result<(), StatusCode> {
        if self.send_buffer.should_encode_chunks() {
            let channel = trace_read_lock!(self.secure_channel);
            self.send_buffer
                .encode_next_chunk(&channel)
                .map_err(|e| e.status())?;
        }

        if self.send_buffer.can_read() {
            tokio::select! {
                r = self.send_buffer.read_into_async(&mut self.write) => {
                    r.map_err(|_| StatusCode::BadConnectionClosed)
                }
                incoming = self.read.next() => self.handle_incoming(incoming),
            }
        } else {
            tokio::select! {
                outgoing = self.outgoing.recv() => {
                    match outgoing {
                        Some(message) => self.enqueue(message),
                        None => Err(StatusCode::BadConnectionClosed),
                    }
                }
                incoming = self.read.next() => self.handle_incoming(incoming),
            }
        }
    }

    /// Drive the loop until the connection dies, failing all outstanding
    /// requests.
    pub async fn run(mut self) {
        loop {
            if let Err(status) = self.poll().await {
                debug!("Transport loop ended: {status}");
                break;
            }
        }
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(StatusCode::BadConnectionClosed));
        }
    }

    fn enqueue(&mut self, message: OutgoingMessage) -> Result<(), StatusCode> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let channel = trace_read_lock!(self.secure_channel);
        match self
            .send_buffer
            .write(request_id, message.request, &channel)
        {
            Ok(_) => {
                self.pending.insert(request_id, message.response_tx);
                Ok(())
            }
            Err(e) => {
                error!("Failed to encode request: {e}");
                let _ = message.response_tx.send(Err(e.status()));
                Ok(())
            }
        }
    }

    fn handle_incoming(
        &mut self,
        incoming: Option<Result<Message, std::io::Error>>,
    ) -> Result<(), StatusCode> {
        let message = match incoming {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                error!("Transport read error: {e}");
                return Err(StatusCode::BadConnectionClosed);
            }
            None => return Err(StatusCode::BadConnectionClosed),
        };
        match message {
            Message::Error(error) => {
                error!("Server sent error {}", error.status());
                Err(error.status())
            }
            Message::Chunk(chunk) => self.handle_chunk(chunk),
            unexpected => {
                error!("Unexpected message on established transport: {unexpected:?}");
                Err(StatusCode::BadUnexpectedError)
            }
        }
    }

    fn handle_chunk(&mut self, chunk: MessageChunk) -> Result<(), StatusCode> {
        let mut channel = trace_write_lock!(self.secure_channel);
        let header = chunk
            .message_header(&channel.decoding_options())
            .map_err(|e| e.status())?;
        if header.is_final == MessageIsFinalType::FinalError {
            // The message was aborted; its requestor times out.
            self.chunks.clear();
            return Ok(());
        }
        let chunk = channel
            .verify_and_remove_security(&chunk.data)
            .map_err(|e| e.status())?;
        self.chunks.push(chunk);
        if header.is_final == MessageIsFinalType::Intermediate {
            return Ok(());
        }

        let chunk_info = self.chunks[0].chunk_info(&channel).map_err(|e| e.status())?;
        let request_id = chunk_info.sequence_header.request_id;
        self.last_received_sequence_number = Chunker::validate_chunks(
            self.last_received_sequence_number + 1,
            &channel,
            &self.chunks,
        )
        .map_err(|e| e.status())?;
        let result = Chunker::decode::<ResponseMessage>(&self.chunks, &channel, None);
        self.chunks.clear();
        drop(channel);

        match result {
            Ok(response) => {
                if let Some(tx) = self.pending.remove(&request_id) {
                    let _ = tx.send(Ok(response));
                } else {
                    debug!("Response for unknown request id {request_id}");
                }
                Ok(())
            }
            Err(e) => {
                error!("Failed to decode response: {e}");
                if let Some(tx) = self.pending.remove(&request_id) {
                    let _ = tx.send(Err(e.status()));
                }
                Ok(())
            }
        }
    }
}

/// A secure channel to a server, opening the connection, issuing and
/// renewing its token, and multiplexing requests.
pub struct AsyncSecureChannel {
    endpoint_url: String,
    security_policy: SecurityPolicy,
    transport_config: TransportConfiguration,
    secure_channel: Arc<RwLock<SecureChannel>>,
    /// Requested token lifetime in milliseconds.
    channel_lifetime: u32,
    request_send: RwLock<Option<RequestSend>>,
    request_timeout: Duration,
    /// The session authentication token attached to request headers.
    auth_token: arc_swap::ArcSwap<NodeId>,
    request_handle: AtomicU32,
    renew_lock: tokio::sync::Mutex<()>,
}

impl AsyncSecureChannel {
    /// Create a channel for the given endpoint. Only the None security
    /// policy opens without a configured certificate.
    pub fn new(
        endpoint_url: &str,
        security_policy: SecurityPolicy,
        transport_config: TransportConfiguration,
    ) -> AsyncSecureChannel {
        AsyncSecureChannel {
            endpoint_url: endpoint_url.to_string(),
            security_policy,
            transport_config,
            secure_channel: Arc::new(RwLock::new(SecureChannel::new_no_certificate_store())),
            channel_lifetime: 60_000,
            request_send: RwLock::new(None),
            request_timeout: Duration::from_secs(30),
            auth_token: arc_swap::ArcSwap::from_pointee(NodeId::null()),
            request_handle: AtomicU32::new(1),
            renew_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Build a request header carrying the session authentication token.
    pub fn make_request_header(&self) -> RequestHeader {
        let handle = self.request_handle.fetch_add(1, Ordering::Relaxed);
        let mut header = RequestHeader::new(&self.auth_token.load(), &DateTime::now(), handle);
        header.timeout_hint = self.request_timeout.as_millis() as u32;
        header
    }

    /// Set the session authentication token used in request headers.
    pub fn set_auth_token(&self, token: NodeId) {
        self.auth_token.store(Arc::new(token));
    }

    /// Connect, negotiate HELLO/ACKNOWLEDGE and open the secure channel.
    /// Returns the event loop; the caller drives or spawns it.
    pub async fn connect(&self) -> Result<TransportEventLoop, StatusCode> {
        {
            let mut channel = trace_write_lock!(self.secure_channel);
            channel.clear_security_token();
            channel.set_security_policy(self.security_policy);
            channel.set_security_mode(if self.security_policy == SecurityPolicy::None {
                uastack_types::MessageSecurityMode::None
            } else {
                uastack_types::MessageSecurityMode::SignAndEncrypt
            });
        }

        let (host, port) = parse_endpoint(&self.endpoint_url)?;
        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| {
                error!("Cannot connect to {}: {e}", self.endpoint_url);
                StatusCode::BadConnectionRejected
            })?;
        let (read, mut write) = tokio::io::split(stream);

        let decoding_options = {
            let channel = trace_read_lock!(self.secure_channel);
            channel.decoding_options()
        };
        let mut read = FramedRead::new(read, TcpCodec::new(decoding_options));

        // HELLO / ACKNOWLEDGE
        let hello = HelloMessage::new(
            &self.endpoint_url,
            self.transport_config.send_buffer_size,
            self.transport_config.recv_buffer_size,
            self.transport_config.max_message_size,
            self.transport_config.max_chunk_count,
        );
        write
            .write_all(&hello.encode_to_vec())
            .await
            .map_err(|_| StatusCode::BadConnectionClosed)?;
        let ack = match read.next().await {
            Some(Ok(Message::Acknowledge(ack))) => ack,
            Some(Ok(Message::Error(e))) => return Err(e.status()),
            _ => return Err(StatusCode::BadConnectionClosed),
        };

        let mut send_buffer = SendBuffer::new(
            self.transport_config.send_buffer_size,
            self.transport_config.max_message_size,
            self.transport_config.max_chunk_count,
        );
        send_buffer.revise(
            ack.receive_buffer_size as usize,
            ack.max_message_size as usize,
            ack.max_chunk_count as usize,
        );

        let (send, recv) = mpsc::channel(32);
        let mut event_loop = TransportEventLoop {
            read,
            write,
            secure_channel: self.secure_channel.clone(),
            outgoing: recv,
            send_buffer,
            pending: HashMap::new(),
            chunks: Vec::new(),
            last_received_sequence_number: 0,
            next_request_id: 1,
        };

        // Open the channel before handing the loop to the caller.
        let response_rx = Self::send_on(
            &send,
            self.open_secure_channel_request(SecurityTokenRequestType::Issue),
        )
        .await?;
        let response = self
            .drive_until_response(&mut event_loop, response_rx)
            .await?;
        self.end_issue_or_renew(response)?;

        *self.request_send.write() = Some(send);
        Ok(event_loop)
    }

    async fn drive_until_response(
        &self,
        event_loop: &mut TransportEventLoop,
        mut rx: oneshot::Receiver<Result<ResponseMessage, StatusCode>>,
    ) -> Result<ResponseMessage, StatusCode> {
        loop {
            tokio::select! {
                r = &mut rx => {
                    return r.map_err(|_| StatusCode::BadConnectionClosed)?;
                }
                r = event_loop.poll() => {
                    r?;
                }
            }
        }
    }

    fn open_secure_channel_request(
        &self,
        request_type: SecurityTokenRequestType,
    ) -> RequestMessage {
        let client_nonce = {
            let mut channel = trace_write_lock!(self.secure_channel);
            channel.create_random_nonce();
            channel.local_nonce_as_byte_string()
        };
        OpenSecureChannelRequest {
            request_header: self.make_request_header(),
            client_protocol_version: 0,
            request_type,
            security_mode: {
                let channel = trace_read_lock!(self.secure_channel);
                channel.security_mode()
            },
            client_nonce,
            requested_lifetime: self.channel_lifetime,
        }
        .into()
    }

    fn end_issue_or_renew(&self, response: ResponseMessage) -> Result<(), StatusCode> {
        match response {
            ResponseMessage::OpenSecureChannel(response) => {
                let mut channel = trace_write_lock!(self.secure_channel);
                channel.set_security_token(response.security_token.clone());
                if channel.security_policy() != SecurityPolicy::None {
                    channel.set_remote_nonce_from_byte_string(&response.server_nonce)?;
                    channel.derive_keys();
                }
                debug!(
                    "Secure channel {} token {}",
                    response.security_token.channel_id, response.security_token.token_id
                );
                Ok(())
            }
            ResponseMessage::ServiceFault(fault) => Err(fault.response_header.service_result),
            _ => Err(StatusCode::BadUnknownResponse),
        }
    }

    async fn send_on(
        send: &RequestSend,
        request: RequestMessage,
    ) -> Result<oneshot::Receiver<Result<ResponseMessage, StatusCode>>, StatusCode> {
        let (tx, rx) = oneshot::channel();
        send.send(OutgoingMessage {
            request,
            response_tx: tx,
        })
        .await
        .map_err(|_| StatusCode::BadNotConnected)?;
        Ok(rx)
    }

    /// Send a request and await its response, renewing the token first when
    /// 75% of its lifetime has elapsed.
    pub async fn send(&self, request: RequestMessage) -> Result<ResponseMessage, StatusCode> {
        let send = self
            .request_send
            .read()
            .clone()
            .ok_or(StatusCode::BadNotConnected)?;

        let should_renew = {
            let channel = trace_read_lock!(self.secure_channel);
            channel.should_renew_security_token()
        };
        if should_renew {
            // Take the lock, then check again so concurrent requests renew
            // only once.
            let _guard = self.renew_lock.lock().await;
            let should_renew = {
                let channel = trace_read_lock!(self.secure_channel);
                channel.should_renew_security_token()
            };
            if should_renew {
                let rx = Self::send_on(
                    &send,
                    self.open_secure_channel_request(SecurityTokenRequestType::Renew),
                )
                .await?;
                let response = tokio::time::timeout(self.request_timeout, rx)
                    .await
                    .map_err(|_| StatusCode::BadRequestTimeout)?
                    .map_err(|_| StatusCode::BadConnectionClosed)??;
                self.end_issue_or_renew(response)?;
            }
        }

        let rx = Self::send_on(&send, request).await?;
        tokio::time::timeout(self.request_timeout, rx)
            .await
            .map_err(|_| StatusCode::BadRequestTimeout)?
            .map_err(|_| StatusCode::BadConnectionClosed)?
    }

    /// Send the close secure channel message; no response is expected.
    pub async fn close_channel(&self) {
        let request: RequestMessage = uastack_types::CloseSecureChannelRequest {
            request_header: self.make_request_header(),
        }
        .into();
        if let Some(send) = self.request_send.read().clone() {
            let (tx, _rx) = oneshot::channel();
            let _ = send
                .send(OutgoingMessage {
                    request,
                    response_tx: tx,
                })
                .await;
        }
    }
}

fn parse_endpoint(url: &str) -> Result<(String, u16), StatusCode> {
    // opc.tcp://host:port[/path]
    let rest = url
        .strip_prefix("opc.tcp://")
        .ok_or(StatusCode::BadTcpEndpointUrlInvalid)?;
    let authority = rest.split('/').next().unwrap_or(rest);
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| StatusCode::BadTcpEndpointUrlInvalid)?;
            Ok((host.to_string(), port))
        }
        None => Ok((
            authority.to_string(),
            uastack_types::constants::DEFAULT_OPC_UA_SERVER_PORT,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_parsing() {
        assert_eq!(
            parse_endpoint("opc.tcp://localhost:4855/").unwrap(),
            ("localhost".to_string(), 4855)
        );
        assert_eq!(
            parse_endpoint("opc.tcp://device").unwrap(),
            ("device".to_string(), 4840)
        );
        assert!(parse_endpoint("http://localhost").is_err());
    }
}
