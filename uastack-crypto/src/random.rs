// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Cryptographically strong random data, used for nonces and session
//! authentication tokens.

use rand::RngCore;

use uastack_types::ByteString;

/// Fill the slice with random bytes.
pub fn bytes(buf: &mut [u8]) {
    rand::thread_rng().fill_bytes(buf);
}

/// A byte string of `len` random bytes.
pub fn byte_string(len: usize) -> ByteString {
    let mut buf = vec![0u8; len];
    bytes(&mut buf);
    ByteString::from(buf)
}
