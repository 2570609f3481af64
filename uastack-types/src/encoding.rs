// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The binary encoding layer: the encode/decode traits, the limits applied
//! while decoding untrusted input, and the little-endian primitive helpers
//! everything else is built from.

use std::{
    error::Error as StdError,
    fmt,
    io::{Cursor, Read, Write},
    sync::atomic::{AtomicU64, Ordering},
};

use byteorder::{ByteOrder, LittleEndian};
use chrono::Duration;
use log::error;

use crate::{constants, status_code::StatusCode, Context};

/// Result alias used throughout the codec.
pub type EncodingResult<T> = std::result::Result<T, Error>;

/// An error carrying an OPC UA status code, an underlying cause, and, when
/// known, the request the error belongs to. The request context lets the
/// transport turn a mid-message failure into a service fault instead of
/// tearing the channel down.
#[derive(Debug)]
pub struct Error {
    status: StatusCode,
    request_id: Option<u32>,
    request_handle: Option<u32>,
    cause: Box<dyn StdError + Send + Sync>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.cause)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}

impl Error {
    /// An error with an explicit status code.
    pub fn new(status: StatusCode, cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            status,
            request_id: None,
            request_handle: None,
            cause: cause.into(),
        }
    }

    /// A `BadDecodingError`.
    pub fn decoding(cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(StatusCode::BadDecodingError, cause)
    }

    /// A `BadEncodingError`.
    pub fn encoding(cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(StatusCode::BadEncodingError, cause)
    }

    /// Attach both halves of the request context.
    pub fn with_context(mut self, request_id: Option<u32>, request_handle: Option<u32>) -> Self {
        self.request_id = request_id;
        self.request_handle = request_handle;
        self
    }

    /// Attach the transport request id.
    pub fn with_request_id(mut self, id: u32) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Attach the request handle.
    pub fn with_request_handle(mut self, handle: u32) -> Self {
        self.request_handle = Some(handle);
        self
    }

    /// Attach the request handle when one is known.
    pub fn maybe_with_request_handle(self, handle: Option<u32>) -> Self {
        match handle {
            Some(handle) => self.with_request_handle(handle),
            None => self,
        }
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Request id and handle together, when both are known.
    pub fn full_context(&self) -> Option<(u32, u32)> {
        self.request_id.zip(self.request_handle)
    }
}

impl From<Error> for StatusCode {
    fn from(value: Error) -> Self {
        error!("{value}");
        value.status
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        value.status.into()
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::decoding(value)
    }
}

impl From<StatusCode> for Error {
    fn from(value: StatusCode) -> Self {
        Error::new(value, std::io::Error::from(value))
    }
}

/// Tracks how deep the decoder has recursed into nested variants and
/// extension objects, so crafted input cannot blow the stack.
#[derive(Debug)]
pub struct DepthGauge {
    max_depth: u64,
    current_depth: AtomicU64,
}

impl DepthGauge {
    /// A gauge allowing `max_depth` levels.
    pub fn new(max_depth: u64) -> Self {
        Self {
            max_depth,
            current_depth: AtomicU64::new(0),
        }
    }

    /// A gauge allowing a single level.
    pub fn minimal() -> Self {
        Self::new(1)
    }

    /// The configured maximum.
    pub fn max_depth(&self) -> u64 {
        self.max_depth
    }
}

impl Default for DepthGauge {
    fn default() -> Self {
        Self::new(constants::MAX_DECODING_DEPTH)
    }
}

impl Clone for DepthGauge {
    fn clone(&self) -> Self {
        // A clone starts at depth zero; the counter tracks one decode pass
        Self::new(self.max_depth)
    }
}

/// One level of decoder recursion. Dropping the lock releases the level, so
/// unwinding on error keeps the gauge balanced.
#[derive(Debug)]
pub struct DepthLock<'a> {
    gauge: &'a DepthGauge,
}

impl Drop for DepthLock<'_> {
    fn drop(&mut self) {
        self.gauge.current_depth.fetch_sub(1, Ordering::Release);
    }
}

impl<'a> DepthLock<'a> {
    /// Take a level from the gauge, failing with `BadDecodingError` when the
    /// maximum is hit.
    pub fn obtain(gauge: &'a DepthGauge) -> EncodingResult<DepthLock<'a>> {
        let before = gauge.current_depth.fetch_add(1, Ordering::Acquire);
        // The lock exists already so the drop rebalances even on failure
        let lock = DepthLock { gauge };
        if before >= gauge.max_depth {
            Err(Error::decoding("Maximum decoding depth exceeded"))
        } else {
            Ok(lock)
        }
    }
}

/// Limits applied while decoding. Every limit exists to bound what a peer
/// can make this process allocate.
#[derive(Clone, Debug)]
pub struct DecodingOptions {
    /// Clock offset added by clients that compensate for server time skew.
    pub client_offset: Duration,
    /// Largest reassembled message, 0 for unlimited.
    pub max_message_size: usize,
    /// Largest chunk count per message, 0 for unlimited.
    pub max_chunk_count: usize,
    /// Largest string in bytes.
    pub max_string_length: usize,
    /// Largest byte string in bytes.
    pub max_byte_string_length: usize,
    /// Largest array element count.
    pub max_array_length: usize,
    /// Recursion gauge for nested structures.
    pub decoding_depth_gauge: DepthGauge,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        DecodingOptions {
            client_offset: Duration::zero(),
            max_message_size: constants::MAX_MESSAGE_SIZE,
            max_chunk_count: constants::MAX_CHUNK_COUNT,
            max_string_length: constants::MAX_STRING_LENGTH,
            max_byte_string_length: constants::MAX_BYTE_STRING_LENGTH,
            max_array_length: constants::MAX_ARRAY_LENGTH,
            decoding_depth_gauge: DepthGauge::default(),
        }
    }
}

impl DecodingOptions {
    /// Tight limits for decoding small embedded payloads such as identity
    /// tokens.
    pub fn minimal() -> Self {
        DecodingOptions {
            max_string_length: 8192,
            max_byte_string_length: 8192,
            max_array_length: 8192,
            decoding_depth_gauge: DepthGauge::minimal(),
            ..Default::default()
        }
    }

    /// Defaults for tests.
    pub fn test() -> Self {
        Self::default()
    }

    /// Take one level of decoder recursion.
    pub fn depth_lock(&self) -> EncodingResult<DepthLock<'_>> {
        DepthLock::obtain(&self.decoding_depth_gauge)
    }
}

/// Types that encode to OPC UA binary.
///
/// `byte_len` must agree exactly with what `encode` writes; the chunker
/// sizes buffers from it before encoding.
pub trait BinaryEncodable {
    /// The exact encoded size in bytes.
    #[allow(unused)]
    fn byte_len(&self, ctx: &Context<'_>) -> usize;

    /// Write the value to the stream.
    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()>;

    /// Encode into a fresh vector. Handy in tests; prefer reusing buffers
    /// elsewhere.
    fn encode_to_vec(&self, ctx: &Context<'_>) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::with_capacity(self.byte_len(ctx)));
        let _ = self.encode(&mut buffer, ctx);
        buffer.into_inner()
    }
}

/// Types that decode from OPC UA binary, enforcing the limits in the
/// context as they go. Decoders never read past the declared bounds of the
/// value being decoded.
pub trait BinaryDecodable: Sized {
    /// Read a value from the stream.
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self>;
}

/// Encoding for types that can never contain custom types, usable by the
/// transport before any context exists.
pub trait SimpleBinaryEncodable {
    /// The exact encoded size in bytes.
    #[allow(unused)]
    fn byte_len(&self) -> usize;

    /// Write the value to the stream.
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()>;

    /// Encode into a fresh vector.
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::with_capacity(self.byte_len()));
        let _ = self.encode(&mut buffer);
        buffer.into_inner()
    }
}

/// Decoding counterpart of [`SimpleBinaryEncodable`].
pub trait SimpleBinaryDecodable: Sized {
    /// Read a value from the stream.
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self>;
}

// Every simple type is also a full codec type.
impl<T: SimpleBinaryEncodable> BinaryEncodable for T {
    fn byte_len(&self, _ctx: &Context<'_>) -> usize {
        SimpleBinaryEncodable::byte_len(self)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, _ctx: &Context<'_>) -> EncodingResult<()> {
        SimpleBinaryEncodable::encode(self, stream)
    }
}

impl<T: SimpleBinaryDecodable> BinaryDecodable for T {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        SimpleBinaryDecodable::decode(stream, ctx.options())
    }
}

/// Map an io write result into the codec error type.
pub fn process_encode_io_result(result: std::io::Result<()>) -> EncodingResult<()> {
    result.map_err(Error::encoding)
}

/// Map an io read result into the codec error type.
pub fn process_decode_io_result<T: fmt::Debug>(result: std::io::Result<T>) -> EncodingResult<T> {
    result.map_err(Error::decoding)
}

// The primitive helpers. Each multi-byte type gets a read_x/write_x pair
// over its little-endian form, and the matching Simple* codec impls.
macro_rules! primitive_codec {
    ($( ($t:ty, $len:expr, $read_fn:ident, $write_fn:ident, $be_read:ident, $be_write:ident), )*) => {
        $(
            /// Write the value in its little-endian form.
            pub fn $write_fn<V, W: Write + ?Sized>(stream: &mut W, value: V) -> EncodingResult<()>
            where
                V: Into<$t>,
            {
                let mut buf = [0u8; $len];
                LittleEndian::$be_write(&mut buf, value.into());
                process_encode_io_result(stream.write_all(&buf))
            }

            /// Read the value from its little-endian form.
            pub fn $read_fn<R: Read + ?Sized>(stream: &mut R) -> EncodingResult<$t> {
                let mut buf = [0u8; $len];
                process_decode_io_result(stream.read_exact(&mut buf))?;
                Ok(LittleEndian::$be_read(&buf))
            }

            impl SimpleBinaryEncodable for $t {
                fn byte_len(&self) -> usize {
                    $len
                }
                fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
                    $write_fn(stream, *self)
                }
            }

            impl SimpleBinaryDecodable for $t {
                fn decode<S: Read + ?Sized>(
                    stream: &mut S,
                    _: &DecodingOptions,
                ) -> EncodingResult<Self> {
                    $read_fn(stream)
                }
            }
        )*
    };
}

primitive_codec! {
    (i16, 2, read_i16, write_i16, read_i16, write_i16),
    (u16, 2, read_u16, write_u16, read_u16, write_u16),
    (i32, 4, read_i32, write_i32, read_i32, write_i32),
    (u32, 4, read_u32, write_u32, read_u32, write_u32),
    (i64, 8, read_i64, write_i64, read_i64, write_i64),
    (u64, 8, read_u64, write_u64, read_u64, write_u64),
    (f32, 4, read_f32, write_f32, read_f32, write_f32),
    (f64, 8, read_f64, write_f64, read_f64, write_f64),
}

/// Write a single byte.
pub fn write_u8<V: Into<u8>, W: Write + ?Sized>(stream: &mut W, value: V) -> EncodingResult<()> {
    process_encode_io_result(stream.write_all(&[value.into()]))
}

/// Read a single byte.
pub fn read_u8<R: Read + ?Sized>(stream: &mut R) -> EncodingResult<u8> {
    let mut buf = [0u8; 1];
    process_decode_io_result(stream.read_exact(&mut buf))?;
    Ok(buf[0])
}

impl SimpleBinaryEncodable for u8 {
    fn byte_len(&self) -> usize {
        1
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, *self)
    }
}

impl SimpleBinaryDecodable for u8 {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        read_u8(stream)
    }
}

impl SimpleBinaryEncodable for i8 {
    fn byte_len(&self) -> usize {
        1
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, *self as u8)
    }
}

impl SimpleBinaryDecodable for i8 {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(read_u8(stream)? as i8)
    }
}

impl SimpleBinaryEncodable for bool {
    fn byte_len(&self) -> usize {
        1
    }
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u8(stream, u8::from(*self))
    }
}

impl SimpleBinaryDecodable for bool {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(read_u8(stream)? == 1)
    }
}

// Arrays are length-prefixed, with -1 standing for the null array.
impl<T: BinaryEncodable> BinaryEncodable for Option<Vec<T>> {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        4 + self
            .iter()
            .flatten()
            .map(|v| v.byte_len(ctx))
            .sum::<usize>()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        match self {
            None => write_i32(stream, -1),
            Some(values) => {
                write_i32(stream, values.len() as i32)?;
                values.iter().try_for_each(|v| v.encode(stream, ctx))
            }
        }
    }
}

impl<T: BinaryDecodable> BinaryDecodable for Option<Vec<T>> {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        match len {
            -1 => Ok(None),
            n if n < -1 => Err(Error::decoding(format!("Bad array length {n}"))),
            n if n as usize > ctx.options().max_array_length => Err(Error::decoding(format!(
                "Array of {} elements exceeds the {} element limit",
                n,
                ctx.options().max_array_length
            ))),
            n => {
                let mut values = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    values.push(T::decode(stream, ctx)?);
                }
                Ok(Some(values))
            }
        }
    }
}

/// Write `count` copies of one byte, used for message padding.
pub fn write_bytes<W: Write + ?Sized>(
    stream: &mut W,
    value: u8,
    count: usize,
) -> EncodingResult<usize> {
    for _ in 0..count {
        write_u8(stream, value)?;
    }
    Ok(count)
}

/// Fill the buffer from the stream.
pub fn read_bytes<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> EncodingResult<usize> {
    process_decode_io_result(stream.read_exact(buf))?;
    Ok(buf.len())
}

/// Discard `bytes` bytes from the stream.
pub fn skip_bytes<R: Read + ?Sized>(stream: &mut R, bytes: u64) -> EncodingResult<()> {
    std::io::copy(&mut stream.take(bytes), &mut std::io::sink())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_gauge_releases_on_drop() {
        let gauge = DepthGauge::new(2);
        let a = DepthLock::obtain(&gauge).unwrap();
        let _b = DepthLock::obtain(&gauge).unwrap();
        assert!(DepthLock::obtain(&gauge).is_err());
        drop(a);
        // A level came back, including the one the failed attempt took
        assert!(DepthLock::obtain(&gauge).is_ok());
    }

    #[test]
    fn primitive_round_trips() {
        use std::io::Cursor;
        let mut buf = Cursor::new(Vec::new());
        write_u32(&mut buf, 0xdead_beefu32).unwrap();
        write_i16(&mut buf, -7i16).unwrap();
        write_f64(&mut buf, 0.25f64).unwrap();
        buf.set_position(0);
        assert_eq!(read_u32(&mut buf).unwrap(), 0xdead_beef);
        assert_eq!(read_i16(&mut buf).unwrap(), -7);
        assert_eq!(read_f64(&mut buf).unwrap(), 0.25);
    }
}
