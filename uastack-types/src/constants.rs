// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Default limits enforced by the codec and transports. All of these can be
//! overridden through [`crate::DecodingOptions`] or transport configuration.

/// Maximum size of a reassembled message in bytes.
pub const MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;
/// Maximum number of chunks in a single message.
pub const MAX_CHUNK_COUNT: usize = 64;
/// Maximum length in bytes of a decoded string.
pub const MAX_STRING_LENGTH: usize = 65535;
/// Maximum length in bytes of a decoded byte string.
pub const MAX_BYTE_STRING_LENGTH: usize = 65535;
/// Maximum number of elements in a decoded array.
pub const MAX_ARRAY_LENGTH: usize = 65535;
/// Maximum recursion depth when decoding nested variants / extension objects.
pub const MAX_DECODING_DEPTH: u64 = 10;
/// Maximum length in bytes of a DER certificate carried in a security header.
pub const MAX_CERTIFICATE_LENGTH: usize = 32767;

/// Default receive buffer size negotiated during HELLO.
pub const RECEIVE_BUFFER_SIZE: usize = 65536;
/// Default send buffer size negotiated during HELLO.
pub const SEND_BUFFER_SIZE: usize = 65536;
/// Smallest chunk size a peer is allowed to negotiate, from part 6.
pub const MIN_CHUNK_SIZE: usize = 8196;

/// The default opc.tcp port.
pub const DEFAULT_OPC_UA_SERVER_PORT: u16 = 4840;
