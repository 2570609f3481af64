// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! AES-CBC keys for symmetric message security.

use aes::cipher::{
    block_padding::NoPadding, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut,
    KeyIvInit,
};

use uastack_types::{Error, StatusCode};

use crate::SecurityPolicy;

/// AES block and IV size in bytes, common to both key lengths.
pub const AES_BLOCK_SIZE: usize = 16;

/// A derived symmetric encryption key. Whether it runs AES-128 or AES-256
/// follows from the security policy it was derived for.
#[derive(Debug, Clone)]
pub struct AesKey {
    policy: SecurityPolicy,
    key: Vec<u8>,
}

// One encrypt/decrypt pair per cipher width.
macro_rules! cbc_ops {
    ($enc_fn:ident, $dec_fn:ident, $cipher:ty) => {
        fn $enc_fn(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> Result<usize, Error> {
            self.check_buffers(src, iv, dst)?;
            cbc::Encryptor::<$cipher>::new(
                GenericArray::from_slice(&self.key),
                GenericArray::from_slice(iv),
            )
            .encrypt_padded_b2b_mut::<NoPadding>(src, dst)
            .map_err(|e| Error::new(StatusCode::BadUnexpectedError, e.to_string()))?;
            Ok(src.len())
        }

        fn $dec_fn(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> Result<usize, Error> {
            self.check_buffers(src, iv, dst)?;
            cbc::Decryptor::<$cipher>::new(
                GenericArray::from_slice(&self.key),
                GenericArray::from_slice(iv),
            )
            .decrypt_padded_b2b_mut::<NoPadding>(src, dst)
            .map_err(|e| Error::new(StatusCode::BadUnexpectedError, e.to_string()))?;
            Ok(src.len())
        }
    };
}

impl AesKey {
    /// Wrap derived key material for the given policy.
    pub fn new(policy: SecurityPolicy, key: &[u8]) -> AesKey {
        AesKey {
            policy,
            key: key.to_vec(),
        }
    }

    /// The raw key bytes.
    pub fn value(&self) -> &[u8] {
        &self.key
    }

    /// Cipher block size; also the IV length.
    pub fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    /// IV length expected by encrypt and decrypt.
    pub fn iv_length(&self) -> usize {
        AES_BLOCK_SIZE
    }

    /// Key length in bytes for the policy.
    pub fn key_length(&self) -> usize {
        self.policy.derived_encryption_key_size()
    }

    // The cipher works on whole blocks into a caller buffer; anything off
    // is a bug upstream in the padding logic, not a protocol error.
    fn check_buffers(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> Result<(), Error> {
        let problem = if src.len() % AES_BLOCK_SIZE != 0 {
            Some(format!("source of {} bytes is not block aligned", src.len()))
        } else if iv.len() != self.iv_length() {
            Some(format!("iv of {} bytes has the wrong length", iv.len()))
        } else if dst.len() < src.len() + AES_BLOCK_SIZE {
            Some(format!("destination of {} bytes is too small", dst.len()))
        } else {
            None
        };
        match problem {
            Some(problem) => Err(Error::new(StatusCode::BadUnexpectedError, problem)),
            None => Ok(()),
        }
    }

    cbc_ops!(encrypt_128, decrypt_128, aes::Aes128);
    cbc_ops!(encrypt_256, decrypt_256, aes::Aes256);

    /// Encrypt `src` into `dst`, returning the cipher text length.
    pub fn encrypt(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> Result<usize, Error> {
        match self.key_length() {
            16 => self.encrypt_128(src, iv, dst),
            32 => self.encrypt_256(src, iv, dst),
            _ => Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                "Policy has no symmetric cipher",
            )),
        }
    }

    /// Decrypt `src` into `dst`, returning the plain text length.
    pub fn decrypt(&self, src: &[u8], iv: &[u8], dst: &mut [u8]) -> Result<usize, Error> {
        match self.key_length() {
            16 => self.decrypt_128(src, iv, dst),
            32 => self.decrypt_256(src, iv, dst),
            _ => Err(Error::new(
                StatusCode::BadSecurityPolicyRejected,
                "Policy has no symmetric cipher",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbc_round_trip_both_widths() {
        for (policy, key_len) in [
            (SecurityPolicy::Aes128Sha256RsaOaep, 16usize),
            (SecurityPolicy::Basic256Sha256, 32),
        ] {
            let key = AesKey::new(policy, &vec![7u8; key_len]);
            let iv = [3u8; AES_BLOCK_SIZE];
            let plain = [0x5au8; 48];
            let mut cipher = vec![0u8; plain.len() + AES_BLOCK_SIZE];
            let n = key.encrypt(&plain, &iv, &mut cipher).unwrap();
            assert_eq!(n, plain.len());
            assert_ne!(&cipher[..n], &plain[..]);

            let mut out = vec![0u8; plain.len() + AES_BLOCK_SIZE];
            let n = key.decrypt(&cipher[..n], &iv, &mut out).unwrap();
            assert_eq!(&out[..n], &plain[..]);
        }
    }

    #[test]
    fn misaligned_input_rejected() {
        let key = AesKey::new(SecurityPolicy::Basic256Sha256, &[1u8; 32]);
        let iv = [0u8; AES_BLOCK_SIZE];
        let mut dst = vec![0u8; 64];
        assert!(key.encrypt(&[1u8; 17], &iv, &mut dst).is_err());
        assert!(key.encrypt(&[1u8; 16], &[0u8; 8], &mut dst).is_err());
    }
}
