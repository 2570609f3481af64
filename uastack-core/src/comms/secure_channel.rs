// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Channel security: policy and mode, the nonces and derived key sets, and
//! applying or removing security on whole chunks.
//!
//! A chunk is laid out as
//!
//! ```text
//! header | security header | sequence header | body | padding | signature
//! ```
//!
//! where the region from the sequence header onward is signed and, with
//! SignAndEncrypt, encrypted. OPN chunks use the asymmetric path against
//! the certificates; everything else uses the symmetric keys derived from
//! the nonces exchanged in OpenSecureChannel.

use std::{
    collections::HashMap,
    io::{Cursor, Write},
    ops::{Deref, Range},
    sync::Arc,
};

use bytes::Buf;
use chrono::Duration;
use log::error;

use parking_lot::RwLock;
use uastack_crypto::{AesKey, CertificateStore, KeySize, PrivateKey, SecurityPolicy, X509};
use uastack_types::{
    write_bytes, write_u32, write_u8, ByteString, ChannelSecurityToken, ContextOwned, DateTime,
    DecodingOptions, Error, MessageSecurityMode, SimpleBinaryDecodable, StatusCode,
};

use super::{
    message_chunk::{MessageChunk, MessageChunkHeader, MessageChunkType, MESSAGE_SIZE_OFFSET},
    security_header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader},
};

/// Which side of the conversation this channel implements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Role {
    /// Not yet determined, only used in tests.
    Unknown,
    /// The connecting side.
    Client,
    /// The listening side.
    Server,
}

// Signing key, encryption key and IV for one direction.
type KeySet = (Vec<u8>, AesKey, Vec<u8>);

// A peer key set retained after a token rotation. The peer may keep using
// an old token for a quarter of its lifetime, so superseded keys stick
// around until that window closes.
#[derive(Debug)]
struct RetainedKeys {
    keys: KeySet,
    valid_until: DateTime,
}

/// The security state of one channel.
#[derive(Debug)]
pub struct SecureChannel {
    role: Role,
    security_policy: SecurityPolicy,
    security_mode: MessageSecurityMode,
    /// Channel id assigned by the server, 0 before the OPN handshake.
    secure_channel_id: u32,
    /// Id, creation time and lifetime of the active token.
    token_id: u32,
    token_created_at: DateTime,
    token_lifetime: u32,
    /// Our certificate and key, when crypto is configured.
    cert: Option<X509>,
    private_key: Option<PrivateKey>,
    /// The peer certificate, from the OPN security header or the endpoint.
    remote_cert: Option<X509>,
    /// The nonces the key sets are derived from.
    local_nonce: Vec<u8>,
    remote_nonce: Vec<u8>,
    /// Keys securing what we send.
    local_keys: Option<KeySet>,
    /// Keys verifying what the peer sends, by token id, so a rotation does
    /// not invalidate messages still in flight under the old token.
    remote_keys_by_token: HashMap<u32, RetainedKeys>,
    /// Shared encoding context.
    encoding_context: Arc<RwLock<ContextOwned>>,
}

impl SecureChannel {
    /// A channel without certificates, for unsecured connections and tests.
    pub fn new_no_certificate_store() -> SecureChannel {
        Self::build(Role::Unknown, None, None, Default::default())
    }

    /// A channel using the application certificate from the store.
    pub fn new(
        certificate_store: Arc<RwLock<CertificateStore>>,
        role: Role,
        encoding_context: Arc<RwLock<ContextOwned>>,
    ) -> SecureChannel {
        let (cert, private_key) = {
            let store = certificate_store.read();
            let cert = store
                .read_own_cert()
                .map_err(|e| error!("No usable application certificate: {e}"))
                .ok();
            let key = store
                .read_own_pkey()
                .map_err(|e| error!("No usable application key: {e}"))
                .ok();
            (cert, key)
        };
        Self::build(role, cert, private_key, encoding_context)
    }

    fn build(
        role: Role,
        cert: Option<X509>,
        private_key: Option<PrivateKey>,
        encoding_context: Arc<RwLock<ContextOwned>>,
    ) -> SecureChannel {
        SecureChannel {
            role,
            security_policy: SecurityPolicy::None,
            security_mode: MessageSecurityMode::None,
            secure_channel_id: 0,
            token_id: 0,
            token_created_at: DateTime::now(),
            token_lifetime: 0,
            cert,
            private_key,
            remote_cert: None,
            local_nonce: Vec::new(),
            remote_nonce: Vec::new(),
            local_keys: None,
            remote_keys_by_token: HashMap::new(),
            encoding_context,
        }
    }

    /// Whether this is the client end.
    pub fn is_client_role(&self) -> bool {
        self.role == Role::Client
    }

    /// The security policy.
    pub fn security_policy(&self) -> SecurityPolicy {
        self.security_policy
    }

    /// Set the security policy.
    pub fn set_security_policy(&mut self, security_policy: SecurityPolicy) {
        self.security_policy = security_policy;
    }

    /// The security mode.
    pub fn security_mode(&self) -> MessageSecurityMode {
        self.security_mode
    }

    /// Set the security mode.
    pub fn set_security_mode(&mut self, security_mode: MessageSecurityMode) {
        self.security_mode = security_mode;
    }

    /// The channel id.
    pub fn secure_channel_id(&self) -> u32 {
        self.secure_channel_id
    }

    /// The id of the active token.
    pub fn token_id(&self) -> u32 {
        self.token_id
    }

    /// When the active token was created.
    pub fn token_created_at(&self) -> DateTime {
        self.token_created_at
    }

    /// Lifetime of the active token in milliseconds.
    pub fn token_lifetime(&self) -> u32 {
        self.token_lifetime
    }

    /// Read the peer certificate out of an OPN security header.
    pub fn set_remote_cert_from_byte_string(
        &mut self,
        remote_cert: &ByteString,
    ) -> Result<(), StatusCode> {
        self.remote_cert = if remote_cert.is_null() {
            None
        } else {
            Some(X509::from_byte_string(remote_cert)?)
        };
        Ok(())
    }

    /// Forget the token, e.g. before reconnecting.
    pub fn clear_security_token(&mut self) {
        self.secure_channel_id = 0;
        self.token_id = 0;
        self.token_created_at = DateTime::now();
        self.token_lifetime = 0;
    }

    /// Adopt a token from an OPN request or response.
    pub fn set_security_token(&mut self, token: ChannelSecurityToken) {
        self.secure_channel_id = token.channel_id;
        self.token_id = token.token_id;
        self.token_created_at = token.created_at;
        self.token_lifetime = token.revised_lifetime;
    }

    /// Clients renew once three quarters of the token lifetime have passed.
    pub fn should_renew_security_token(&self) -> bool {
        if self.token_id == 0 {
            return false;
        }
        let renew_after = Duration::milliseconds((self.token_lifetime as i64 * 3) / 4);
        DateTime::now() - self.token_created_at > renew_after
    }

    /// Whether the token id is the active one or a retained predecessor.
    pub fn is_known_token(&self, token_id: u32) -> bool {
        token_id == self.token_id || self.remote_keys_by_token.contains_key(&token_id)
    }

    /// The shared encoding context.
    pub fn context(&self) -> impl Deref<Target = ContextOwned> + '_ {
        self.encoding_context.read()
    }

    /// A copy of the decoding options.
    pub fn decoding_options(&self) -> DecodingOptions {
        self.context().options().clone()
    }

    /// Generate a fresh local nonce of the policy's length.
    pub fn create_random_nonce(&mut self) {
        self.local_nonce = vec![0u8; self.security_policy.secure_channel_nonce_length()];
        uastack_crypto::random::bytes(&mut self.local_nonce);
    }

    /// The local nonce, for the OPN message.
    pub fn local_nonce_as_byte_string(&self) -> ByteString {
        if self.local_nonce.is_empty() {
            ByteString::null()
        } else {
            ByteString::from(&self.local_nonce)
        }
    }

    /// Adopt the peer nonce from an OPN message, checking its length
    /// against the policy.
    pub fn set_remote_nonce_from_byte_string(
        &mut self,
        remote_nonce: &ByteString,
    ) -> Result<(), StatusCode> {
        if self.security_policy == SecurityPolicy::None {
            self.remote_nonce = remote_nonce.as_ref().to_vec();
            return Ok(());
        }
        let expected = self.security_policy.secure_channel_nonce_length();
        if remote_nonce.len() != expected as isize {
            error!(
                "Peer nonce has {} bytes, the policy needs {expected}",
                remote_nonce.len()
            );
            return Err(StatusCode::BadNonceInvalid);
        }
        self.remote_nonce = remote_nonce.as_ref().to_vec();
        Ok(())
    }

    /// Derive both key sets from the nonces, per part 6 6.7.5: a side's
    /// keys use the other side's nonce as the PRF secret, so both ends
    /// compute identical sets. The previous remote keys are retained under
    /// their token id for a quarter of the old lifetime.
    pub fn derive_keys(&mut self) {
        let now = DateTime::now();
        self.remote_keys_by_token
            .retain(|_, retained| now < retained.valid_until);

        let remote = self
            .security_policy
            .make_secure_channel_keys(&self.local_nonce, &self.remote_nonce);
        let grace = Duration::milliseconds((self.token_lifetime as i64 * 5) / 4);
        self.remote_keys_by_token.insert(
            self.token_id,
            RetainedKeys {
                keys: remote,
                valid_until: self.token_created_at + grace,
            },
        );
        self.local_keys = Some(
            self.security_policy
                .make_secure_channel_keys(&self.remote_nonce, &self.local_nonce),
        );
    }

    fn local_keys(&self) -> Result<&KeySet, Error> {
        self.local_keys.as_ref().ok_or_else(|| {
            Error::new(StatusCode::BadSecureChannelClosed, "No derived local keys")
        })
    }

    fn remote_keys(&self, token_id: u32) -> Result<&KeySet, Error> {
        self.remote_keys_by_token
            .get(&token_id)
            .map(|r| &r.keys)
            .ok_or_else(|| {
                Error::new(
                    StatusCode::BadSecureChannelTokenUnknown,
                    format!("No keys for token {token_id}"),
                )
            })
    }

    /// The security header chunks of the given type carry.
    pub fn make_security_header(&self, message_type: MessageChunkType) -> SecurityHeader {
        if !message_type.is_open_secure_channel() {
            return SecurityHeader::Symmetric(SymmetricSecurityHeader {
                token_id: self.token_id,
            });
        }
        let header = match (&self.security_policy, &self.cert) {
            (SecurityPolicy::None, _) | (_, None) => AsymmetricSecurityHeader::none(),
            (policy, Some(cert)) => {
                let thumbprint = self
                    .remote_cert
                    .as_ref()
                    .map(|c| c.thumbprint().as_byte_string())
                    .unwrap_or_else(ByteString::null);
                AsymmetricSecurityHeader::new(*policy, cert, thumbprint)
            }
        };
        SecurityHeader::Asymmetric(header)
    }

    /// Signature length appended to chunks carrying the given header.
    pub fn signature_size(&self, security_header: &SecurityHeader) -> usize {
        match security_header {
            // Asymmetric signatures are as long as the signing key
            SecurityHeader::Asymmetric(header) => {
                if header.sender_certificate.is_null() {
                    0
                } else {
                    X509::from_byte_string(&header.sender_certificate)
                        .and_then(|cert| cert.public_key())
                        .map(|key| key.size())
                        .unwrap_or(0)
                }
            }
            SecurityHeader::Symmetric(_) => self.security_policy.symmetric_signature_size(),
        }
    }

    // Keys over 2048 bits need a two byte padding length.
    fn minimum_padding(key_length: usize) -> usize {
        if key_length > 256 {
            2
        } else {
            1
        }
    }

    /// Plain text block size and minimum padding for chunks carrying the
    /// given header; (0, 0) when the chunk will not be padded at all.
    pub fn get_padding_block_sizes(
        &self,
        security_header: &SecurityHeader,
        signature_size: usize,
        message_type: MessageChunkType,
    ) -> (usize, usize) {
        let padded = self.security_policy != SecurityPolicy::None
            && (self.security_mode == MessageSecurityMode::SignAndEncrypt
                || message_type.is_open_secure_channel());
        if !padded {
            return (0, 0);
        }
        match security_header {
            SecurityHeader::Asymmetric(header) => {
                let key = (!header.sender_certificate.is_null())
                    .then(|| self.remote_cert.as_ref())
                    .flatten()
                    .and_then(|cert| cert.public_key().ok());
                match key {
                    Some(key) => {
                        let padding = self.security_policy.asymmetric_encryption_padding();
                        (
                            key.plain_text_block_size(padding),
                            Self::minimum_padding(key.size()),
                        )
                    }
                    None => (self.security_policy.plain_block_size(), signature_size),
                }
            }
            SecurityHeader::Symmetric(_) => (
                self.security_policy.plain_block_size(),
                Self::minimum_padding(signature_size),
            ),
        }
    }

    // Padding needed so that sequence header + body + padding + signature
    // fills whole cipher blocks. Returns (total padding, length bytes).
    fn padding_size(
        &self,
        security_header: &SecurityHeader,
        body_size: usize,
        signature_size: usize,
        message_type: MessageChunkType,
    ) -> (usize, usize) {
        let (block, minimum) =
            self.get_padding_block_sizes(security_header, signature_size, message_type);
        if block == 0 {
            return (0, 0);
        }
        let encrypted = 8 + body_size + signature_size + minimum;
        let fill = (block - encrypted % block) % block;
        (minimum + fill, minimum)
    }

    // Rewrite the size field of an encoded chunk in place.
    fn patch_message_size(data: &mut [u8], message_size: usize) -> Result<(), Error> {
        let mut stream = Cursor::new(data);
        stream.advance(MESSAGE_SIZE_OFFSET);
        write_u32(&mut stream, message_size as u32)
    }

    fn patch_size_and_truncate(mut data: Vec<u8>, size: usize) -> Result<Vec<u8>, Error> {
        Self::patch_message_size(&mut data, size)?;
        data.truncate(size);
        Ok(data)
    }

    // Copy the chunk and append padding bytes and room for the signature,
    // fixing up the size field.
    fn pad_and_reserve_signature(&self, chunk: &MessageChunk) -> Result<Vec<u8>, Error> {
        let info = chunk.chunk_info(self)?;
        let signature_size = self.signature_size(&info.security_header);
        let (padding, minimum) = self.padding_size(
            &info.security_header,
            info.body_length,
            signature_size,
            info.message_header.message_type,
        );

        let mut stream =
            Cursor::new(Vec::with_capacity(chunk.data.len() + padding + signature_size));
        stream.write_all(&chunk.data).map_err(Error::encoding)?;
        if padding > 0 {
            // Every padding byte holds the padding length, with a second
            // high byte for long keys
            match minimum {
                1 => {
                    let _ = write_bytes(&mut stream, (padding - 1) as u8, padding)?;
                }
                _ => {
                    let value = padding - 2;
                    let _ = write_bytes(&mut stream, (value & 0xff) as u8, padding - 1)?;
                    write_u8(&mut stream, (value >> 8) as u8)?;
                }
            }
        }
        let _ = write_bytes(&mut stream, 0u8, signature_size)?;

        let size = chunk.data.len() + padding + signature_size;
        Self::patch_size_and_truncate(stream.into_inner(), size)
    }

    /// Secure an outgoing chunk into `dst`, returning the bytes written.
    /// With the None policy or mode the chunk is copied through untouched.
    pub fn apply_security(
        &self,
        chunk: &MessageChunk,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let secured = self.security_policy != SecurityPolicy::None
            && self.security_mode != MessageSecurityMode::None;
        if !secured {
            if chunk.data.len() > dst.len() {
                error!("Chunk does not fit the send buffer");
                return Err(StatusCode::BadEncodingLimitsExceeded);
            }
            dst[..chunk.data.len()].copy_from_slice(&chunk.data);
            return Ok(chunk.data.len());
        }

        let header_end = chunk.encrypted_data_offset(&self.decoding_options())?;
        let mut padded = self.pad_and_reserve_signature(chunk)?;
        let encrypted_range = header_end..padded.len();

        if chunk.is_open_secure_channel(&self.decoding_options()) {
            self.asymmetric_secure(&mut padded, encrypted_range, dst)
        } else {
            let signed_range = 0..padded.len() - self.security_policy.symmetric_signature_size();
            self.symmetric_secure(&mut padded, signed_range, encrypted_range, dst)
        }
    }

    // OPN chunks: sign with our private key, encrypt with the peer's
    // public key. The size field must be patched before signing because
    // encryption grows the chunk.
    fn asymmetric_secure(
        &self,
        src: &mut [u8],
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let signing_key = self
            .private_key
            .as_ref()
            .ok_or(StatusCode::BadSecurityChecksFailed)?;
        let encryption_key = self
            .remote_cert
            .as_ref()
            .ok_or(StatusCode::BadSecurityChecksFailed)?
            .public_key()?;

        let header_size = encrypted_range.start;
        let plain_size = encrypted_range.end - encrypted_range.start;
        let cipher_size = encryption_key.calculate_cipher_text_size(
            plain_size,
            self.security_policy.asymmetric_encryption_padding(),
        );
        Self::patch_message_size(src, header_size + cipher_size)?;
        dst[..header_size].copy_from_slice(&src[..header_size]);

        let signature_size = signing_key.size();
        let (signed, signature) = src.split_at_mut(encrypted_range.end - signature_size);
        self.security_policy
            .asymmetric_sign(signing_key, signed, &mut signature[..signature_size])?;

        let written = self.security_policy.asymmetric_encrypt(
            &encryption_key,
            &src[encrypted_range.clone()],
            &mut dst[encrypted_range.start..],
        )?;
        if written != cipher_size {
            error!("Cipher text size {written} does not match the computed {cipher_size}");
            return Err(StatusCode::BadSecurityChecksFailed);
        }
        Ok(header_size + written)
    }

    // MSG/CLO chunks: sign then, with SignAndEncrypt, encrypt with the
    // derived keys.
    fn symmetric_secure(
        &self,
        src: &mut [u8],
        signed_range: Range<usize>,
        encrypted_range: Range<usize>,
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        let signature_size = self.security_policy.symmetric_signature_size();
        let (signing_key, encryption_key, iv) = {
            let keys = self.local_keys().map_err(|e| e.status())?;
            (&keys.0, &keys.1, &keys.2)
        };

        let (signed, signature) = src.split_at_mut(signed_range.end);
        self.security_policy
            .symmetric_sign(signing_key, signed, &mut signature[..signature_size])?;

        match self.security_mode {
            MessageSecurityMode::Sign => {
                let size = signed_range.end + signature_size;
                dst[..size].copy_from_slice(&src[..size]);
                Ok(size)
            }
            MessageSecurityMode::SignAndEncrypt => {
                dst[..encrypted_range.start].copy_from_slice(&src[..encrypted_range.start]);
                let written = self.security_policy.symmetric_encrypt(
                    encryption_key,
                    iv,
                    &src[encrypted_range.clone()],
                    &mut dst[encrypted_range.start..],
                )?;
                Ok(encrypted_range.start + written)
            }
            _ => Err(StatusCode::BadSecurityChecksFailed),
        }
    }

    /// Verify and strip security from a received chunk, yielding the plain
    /// chunk with padding and signature removed.
    pub fn verify_and_remove_security(&mut self, src: &[u8]) -> Result<MessageChunk, Error> {
        let decoding_options = self.decoding_options();
        let mut stream = Cursor::new(src);
        let header = MessageChunkHeader::decode(&mut stream, &decoding_options)?;
        let security_header = SecurityHeader::decode_from_stream(
            &mut stream,
            header.message_type.is_open_secure_channel(),
            &decoding_options,
        )?;
        let header_end = stream.position() as usize;

        if header.message_size as usize != src.len() {
            return Err(Error::new(
                StatusCode::BadUnexpectedError,
                format!(
                    "Chunk declares {} bytes but {} arrived",
                    header.message_size,
                    src.len()
                ),
            ));
        }

        if header.message_type.is_open_secure_channel() {
            let SecurityHeader::Asymmetric(security_header) = security_header else {
                return Err(Error::new(
                    StatusCode::BadUnexpectedError,
                    "OPN chunk without an asymmetric header",
                ));
            };
            return self.remove_asymmetric_security(src, security_header, header_end);
        }

        let secured = self.security_policy != SecurityPolicy::None
            && self.security_mode != MessageSecurityMode::None;
        if !secured {
            return Ok(MessageChunk { data: src.to_vec() });
        }
        let SecurityHeader::Symmetric(security_header) = security_header else {
            return Err(Error::new(
                StatusCode::BadUnexpectedError,
                "MSG chunk without a symmetric header",
            ));
        };
        self.remove_symmetric_security(src, security_header.token_id, header_end)
    }

    // The OPN direction of the receive path. The policy comes from the
    // header itself, since this is the first secured thing a server sees.
    fn remove_asymmetric_security(
        &mut self,
        src: &[u8],
        header: AsymmetricSecurityHeader,
        header_end: usize,
    ) -> Result<MessageChunk, Error> {
        let policy = SecurityPolicy::from_uri(header.security_policy_uri.as_ref());
        match policy {
            SecurityPolicy::Unknown => {
                return Err(Error::new(
                    StatusCode::BadSecurityPolicyRejected,
                    format!("Unknown policy {}", header.security_policy_uri),
                ));
            }
            SecurityPolicy::None => {
                return Ok(MessageChunk { data: src.to_vec() });
            }
            _ => self.security_policy = policy,
        }

        // A secured OPN is always signed and encrypted, whatever the mode.
        if header.sender_certificate.is_null() {
            return Err(Error::new(
                StatusCode::BadCertificateInvalid,
                "Secured OPN without a sender certificate",
            ));
        }
        let sender_cert = X509::from_byte_string(&header.sender_certificate)?;
        let verification_key = sender_cert.public_key()?;

        // The thumbprint says which of our certificates the peer encrypted
        // for; we only have the one.
        let own_cert = self.cert.as_ref().ok_or_else(|| {
            Error::new(StatusCode::BadNoValidCertificates, "No own certificate")
        })?;
        if own_cert.thumbprint().value() != header.receiver_certificate_thumbprint.as_ref() {
            return Err(Error::new(
                StatusCode::BadNoValidCertificates,
                "OPN was encrypted for a different certificate",
            ));
        }
        let private_key = self.private_key.as_ref().ok_or_else(|| {
            Error::new(StatusCode::BadNoValidCertificates, "No own private key")
        })?;

        let mut dst = vec![0u8; src.len()];
        dst[..header_end].copy_from_slice(&src[..header_end]);

        let mut plain = vec![0u8; src.len() - header_end];
        let plain_size =
            policy.asymmetric_decrypt(private_key, &src[header_end..], &mut plain)?;
        dst[header_end..header_end + plain_size].copy_from_slice(&plain[..plain_size]);

        // Signature sits at the end of the decrypted region
        let signature_size = verification_key.size();
        let signature_start = header_end + plain_size - signature_size;
        policy.asymmetric_verify_signature(
            &verification_key,
            &dst[..signature_start],
            &dst[signature_start..signature_start + signature_size],
        )?;

        let key_size = own_cert
            .public_key()
            .map(|k| k.size())
            .unwrap_or_else(|_| verification_key.size());
        let body_end = self.verified_padding_start(&dst, key_size, signature_start)?;
        let data = Self::patch_size_and_truncate(dst, body_end)?;
        Ok(MessageChunk { data })
    }

    // The MSG direction of the receive path, keyed by the token id in the
    // chunk's own header so retained tokens keep working.
    fn remove_symmetric_security(
        &self,
        src: &[u8],
        token_id: u32,
        header_end: usize,
    ) -> Result<MessageChunk, Error> {
        let signature_size = self.security_policy.symmetric_signature_size();
        let keys = self.remote_keys(token_id)?;
        let (verification_key, decryption_key, iv) = (&keys.0, &keys.1, &keys.2);

        let dst = match self.security_mode {
            MessageSecurityMode::Sign => {
                let mut dst = src.to_vec();
                let signed_end = src.len() - signature_size;
                self.security_policy.symmetric_verify_signature(
                    verification_key,
                    &src[..signed_end],
                    &src[signed_end..],
                )?;
                dst.truncate(signed_end);
                Self::patch_message_size(&mut dst, signed_end)?;
                return Ok(MessageChunk { data: dst });
            }
            MessageSecurityMode::SignAndEncrypt => {
                let mut dst = vec![0u8; src.len()];
                dst[..header_end].copy_from_slice(&src[..header_end]);

                let cipher = &src[header_end..];
                let mut plain = vec![0u8; cipher.len() + 16];
                let plain_size = self.security_policy.symmetric_decrypt(
                    decryption_key,
                    iv,
                    cipher,
                    &mut plain,
                )?;
                dst[header_end..header_end + plain_size]
                    .copy_from_slice(&plain[..plain_size]);

                let signature_start = header_end + plain_size - signature_size;
                self.security_policy.symmetric_verify_signature(
                    verification_key,
                    &dst[..signature_start],
                    &dst[signature_start..signature_start + signature_size],
                )?;

                let body_end = self.verified_padding_start(
                    &dst,
                    decryption_key.key_length(),
                    signature_start,
                )?;
                Self::patch_size_and_truncate(dst, body_end)?
            }
            _ => {
                return Err(Error::new(
                    StatusCode::BadSecurityChecksFailed,
                    "Invalid security mode",
                ));
            }
        };
        Ok(MessageChunk { data: dst })
    }

    // Check the padding run ending at `padding_end` and return where it
    // starts, i.e. where the real body ends.
    fn verified_padding_start(
        &self,
        data: &[u8],
        key_size: usize,
        padding_end: usize,
    ) -> Result<usize, Error> {
        let (padding_len, length_bytes) = if key_size > 256 {
            let low = data[padding_end - 2] as usize;
            let high = data[padding_end - 1] as usize;
            ((high << 8) + low, 2)
        } else {
            (data[padding_end - 1] as usize, 1)
        };
        let start = padding_end - padding_len - length_bytes;
        let fill_byte = data[padding_end - length_bytes];
        for (i, b) in data[start..padding_end - length_bytes].iter().enumerate() {
            if *b != fill_byte {
                return Err(Error::new(
                    StatusCode::BadSecurityChecksFailed,
                    format!("Padding byte at {} is corrupt", start + i),
                ));
            }
        }
        Ok(start)
    }
}
