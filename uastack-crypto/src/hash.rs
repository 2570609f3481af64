// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The P_SHA pseudo-random function used for secure channel key derivation,
//! and HMAC helpers for symmetric message signatures.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use uastack_types::{Error, StatusCode};

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Size in bytes of a SHA-1 digest.
pub const SHA1_SIZE: usize = 20;
/// Size in bytes of a SHA-256 digest.
pub const SHA256_SIZE: usize = 32;

macro_rules! p_sha_impl {
    ($name:ident, $mac:ty, $digest_size:expr) => {
        /// The P_SHA pseudo-random function from part 6 6.7.5: an HMAC chain
        /// over `A(i) || seed` with `A(0) = seed`, producing `length` bytes.
        pub fn $name(secret: &[u8], seed: &[u8], length: usize) -> Vec<u8> {
            let mut result = Vec::with_capacity(length + $digest_size);
            // A(1)
            let mut a = hmac::<$mac>(secret, &[seed]);
            while result.len() < length {
                result.extend_from_slice(&hmac::<$mac>(secret, &[&a, seed]));
                a = hmac::<$mac>(secret, &[&a]);
            }
            result.truncate(length);
            result
        }
    };
}

p_sha_impl!(p_sha1, HmacSha1, SHA1_SIZE);
p_sha_impl!(p_sha256, HmacSha256, SHA256_SIZE);

fn hmac<M: Mac + hmac::digest::KeyInit>(key: &[u8], data: &[&[u8]]) -> Vec<u8> {
    let mut mac = <M as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    for d in data {
        mac.update(d);
    }
    mac.finalize().into_bytes().to_vec()
}

/// HMAC-SHA1 sign `data` into `signature`, which must be 20 bytes.
pub fn hmac_sha1(key: &[u8], data: &[u8], signature: &mut [u8]) -> Result<(), Error> {
    if signature.len() != SHA1_SIZE {
        return Err(Error::new(
            StatusCode::BadSecurityChecksFailed,
            format!("Signature buffer is {} bytes, expected 20", signature.len()),
        ));
    }
    signature.copy_from_slice(&hmac::<HmacSha1>(key, &[data]));
    Ok(())
}

/// Verify an HMAC-SHA1 signature.
pub fn verify_hmac_sha1(key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let mut mac = match HmacSha1::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(data);
    mac.verify_slice(signature).is_ok()
}

/// HMAC-SHA256 sign `data` into `signature`, which must be 32 bytes.
pub fn hmac_sha256(key: &[u8], data: &[u8], signature: &mut [u8]) -> Result<(), Error> {
    if signature.len() != SHA256_SIZE {
        return Err(Error::new(
            StatusCode::BadSecurityChecksFailed,
            format!("Signature buffer is {} bytes, expected 32", signature.len()),
        ));
    }
    signature.copy_from_slice(&hmac::<HmacSha256>(key, &[data]));
    Ok(())
}

/// Verify an HMAC-SHA256 signature.
pub fn verify_hmac_sha256(key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(data);
    mac.verify_slice(signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p_sha_lengths() {
        let secret = b"secret";
        let seed = b"seed";
        for len in [1usize, 16, 20, 32, 48, 100] {
            assert_eq!(p_sha1(secret, seed, len).len(), len);
            assert_eq!(p_sha256(secret, seed, len).len(), len);
        }
    }

    #[test]
    fn p_sha_deterministic_prefix() {
        // Taking a longer output must not change the prefix.
        let a = p_sha256(b"s", b"x", 16);
        let b = p_sha256(b"s", b"x", 64);
        assert_eq!(a, b[..16]);
    }

    #[test]
    fn hmac_round_trip() {
        let key = b"0123456789abcdef";
        let mut sig = [0u8; SHA256_SIZE];
        hmac_sha256(key, b"payload", &mut sig).unwrap();
        assert!(verify_hmac_sha256(key, b"payload", &sig));
        assert!(!verify_hmac_sha256(key, b"tampered", &sig));
    }
}
