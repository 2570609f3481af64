// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! RSA key wrappers. The padding and hash used for each operation is chosen
//! by the security policy.

use log::error;
use rsa::{
    pkcs1v15,
    pkcs8::{DecodePrivateKey, EncodePrivateKey},
    pss,
    signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier},
    traits::PublicKeyParts,
    Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey,
};
use sha1::Sha1;
use sha2::Sha256;
use uastack_types::{Error, StatusCode};

/// The padding scheme for asymmetric encryption, determined by the
/// security policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RsaPadding {
    /// PKCS#1 v1.5.
    Pkcs1,
    /// OAEP with SHA-1.
    OaepSha1,
    /// OAEP with SHA-256.
    OaepSha256,
}

impl RsaPadding {
    // Bytes of a plaintext block lost to the padding.
    fn overhead(&self) -> usize {
        match self {
            RsaPadding::Pkcs1 => 11,
            RsaPadding::OaepSha1 => 42,
            RsaPadding::OaepSha256 => 66,
        }
    }

    fn to_oaep(self) -> Oaep {
        match self {
            RsaPadding::OaepSha1 => Oaep::new::<Sha1>(),
            RsaPadding::OaepSha256 => Oaep::new::<Sha256>(),
            RsaPadding::Pkcs1 => unreachable!("PKCS1 is not an OAEP padding"),
        }
    }
}

/// The hash and padding used for an asymmetric signature.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RsaSignaturePadding {
    /// PKCS#1 v1.5 with SHA-1.
    Pkcs1Sha1,
    /// PKCS#1 v1.5 with SHA-256.
    Pkcs1Sha256,
    /// PSS with SHA-256.
    PssSha256,
}

/// Functions shared by keys of both directions.
pub trait KeySize {
    /// Key size in bytes, which is also the size of a signature or a single
    /// cipher text block.
    fn size(&self) -> usize {
        self.bit_length() / 8
    }

    /// Key size in bits.
    fn bit_length(&self) -> usize;

    /// Size in bytes of the plain text that fits in one encrypted block
    /// under the given padding.
    fn plain_text_block_size(&self, padding: RsaPadding) -> usize {
        self.size() - padding.overhead()
    }

    /// Size in bytes of the cipher text produced for `src_len` bytes of
    /// plain text under the given padding.
    fn calculate_cipher_text_size(&self, src_len: usize, padding: RsaPadding) -> usize {
        let plain_block = self.plain_text_block_size(padding);
        src_len.div_ceil(plain_block) * self.size()
    }
}

/// An RSA private key.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't print the key
        write!(f, "PrivateKey({} bits)", self.bit_length())
    }
}

impl KeySize for PrivateKey {
    fn bit_length(&self) -> usize {
        self.0.size() * 8
    }
}

impl PrivateKey {
    /// Generate a new private key with the given bit length.
    pub fn new(bit_length: usize) -> Result<PrivateKey, Error> {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, bit_length)
            .map(PrivateKey)
            .map_err(|e| Error::new(StatusCode::BadUnexpectedError, e.to_string()))
    }

    /// Load a private key from PKCS#8 DER.
    pub fn from_der(der: &[u8]) -> Result<PrivateKey, Error> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map(PrivateKey)
            .map_err(|e| Error::new(StatusCode::BadSecurityChecksFailed, e.to_string()))
    }

    /// Load a private key from PKCS#8 PEM text.
    pub fn from_pem(pem: &str) -> Result<PrivateKey, Error> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .map(PrivateKey)
            .map_err(|e| Error::new(StatusCode::BadSecurityChecksFailed, e.to_string()))
    }

    /// Export the key as PKCS#8 DER.
    pub fn to_der(&self) -> Result<Vec<u8>, Error> {
        self.0
            .to_pkcs8_der()
            .map(|d| d.as_bytes().to_vec())
            .map_err(|e| Error::new(StatusCode::BadUnexpectedError, e.to_string()))
    }

    /// The corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }

    /// Access the inner key, for certificate building.
    pub fn inner(&self) -> &RsaPrivateKey {
        &self.0
    }

    /// Sign `data` into `signature`, which must be exactly key-size bytes.
    pub fn sign(
        &self,
        data: &[u8],
        signature: &mut [u8],
        padding: RsaSignaturePadding,
    ) -> Result<usize, Error> {
        if signature.len() != self.size() {
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                format!(
                    "Signature buffer is {} bytes, expected {}",
                    signature.len(),
                    self.size()
                ),
            ));
        }
        let sig = match padding {
            RsaSignaturePadding::Pkcs1Sha1 => {
                let key = pkcs1v15::SigningKey::<Sha1>::new(self.0.clone());
                key.sign(data).to_vec()
            }
            RsaSignaturePadding::Pkcs1Sha256 => {
                let key = pkcs1v15::SigningKey::<Sha256>::new(self.0.clone());
                key.sign(data).to_vec()
            }
            RsaSignaturePadding::PssSha256 => {
                let key = pss::BlindedSigningKey::<Sha256>::new(self.0.clone());
                let mut rng = rand::thread_rng();
                key.sign_with_rng(&mut rng, data).to_vec()
            }
        };
        signature.copy_from_slice(&sig);
        Ok(sig.len())
    }

    /// Decrypt `src` block by block into `dst`, returning the number of
    /// plain text bytes produced.
    pub fn private_decrypt(
        &self,
        src: &[u8],
        dst: &mut [u8],
        padding: RsaPadding,
    ) -> Result<usize, Error> {
        let cipher_block = self.size();
        if src.len() % cipher_block != 0 {
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "Cipher text is not a multiple of the key size",
            ));
        }
        let mut out = 0;
        for block in src.chunks(cipher_block) {
            let plain = match padding {
                RsaPadding::Pkcs1 => self.0.decrypt(Pkcs1v15Encrypt, block),
                _ => self.0.decrypt(padding.to_oaep(), block),
            }
            .map_err(|e| {
                error!("Asymmetric decryption failed: {e}");
                Error::new(StatusCode::BadSecurityChecksFailed, e.to_string())
            })?;
            dst[out..out + plain.len()].copy_from_slice(&plain);
            out += plain.len();
        }
        Ok(out)
    }
}

/// An RSA public key, typically extracted from an X509 certificate.
#[derive(Debug, Clone)]
pub struct PublicKey(pub(crate) RsaPublicKey);

impl KeySize for PublicKey {
    fn bit_length(&self) -> usize {
        self.0.size() * 8
    }
}

impl PublicKey {
    /// Verify a signature over `data`.
    pub fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        padding: RsaSignaturePadding,
    ) -> Result<(), Error> {
        let valid = match padding {
            RsaSignaturePadding::Pkcs1Sha1 => pkcs1v15::Signature::try_from(signature)
                .map(|sig| {
                    pkcs1v15::VerifyingKey::<Sha1>::new(self.0.clone())
                        .verify(data, &sig)
                        .is_ok()
                })
                .unwrap_or(false),
            RsaSignaturePadding::Pkcs1Sha256 => pkcs1v15::Signature::try_from(signature)
                .map(|sig| {
                    pkcs1v15::VerifyingKey::<Sha256>::new(self.0.clone())
                        .verify(data, &sig)
                        .is_ok()
                })
                .unwrap_or(false),
            RsaSignaturePadding::PssSha256 => pss::Signature::try_from(signature)
                .map(|sig| {
                    pss::VerifyingKey::<Sha256>::new(self.0.clone())
                        .verify(data, &sig)
                        .is_ok()
                })
                .unwrap_or(false),
        };
        if valid {
            Ok(())
        } else {
            Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "Signature verification failed",
            ))
        }
    }

    /// Encrypt `src` block by block into `dst`, returning the number of
    /// cipher text bytes produced.
    pub fn public_encrypt(
        &self,
        src: &[u8],
        dst: &mut [u8],
        padding: RsaPadding,
    ) -> Result<usize, Error> {
        let plain_block = self.plain_text_block_size(padding);
        let mut rng = rand::thread_rng();
        let mut out = 0;
        for block in src.chunks(plain_block) {
            let cipher = match padding {
                RsaPadding::Pkcs1 => self.0.encrypt(&mut rng, Pkcs1v15Encrypt, block),
                _ => self.0.encrypt(&mut rng, padding.to_oaep(), block),
            }
            .map_err(|e| Error::new(StatusCode::BadSecurityChecksFailed, e.to_string()))?;
            dst[out..out + cipher.len()].copy_from_slice(&cipher);
            out += cipher.len();
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> PrivateKey {
        PrivateKey::new(2048).unwrap()
    }

    #[test]
    fn sign_verify() {
        let key = test_key();
        let public = key.public_key();
        let mut signature = vec![0u8; key.size()];
        for padding in [
            RsaSignaturePadding::Pkcs1Sha1,
            RsaSignaturePadding::Pkcs1Sha256,
            RsaSignaturePadding::PssSha256,
        ] {
            key.sign(b"message", &mut signature, padding).unwrap();
            public.verify(b"message", &signature, padding).unwrap();
            assert!(public.verify(b"other", &signature, padding).is_err());
        }
    }

    #[test]
    fn encrypt_decrypt() {
        let key = test_key();
        let public = key.public_key();
        // Two blocks worth of data
        let plain = vec![7u8; 300];
        for padding in [RsaPadding::Pkcs1, RsaPadding::OaepSha1, RsaPadding::OaepSha256] {
            let cipher_size = public.calculate_cipher_text_size(plain.len(), padding);
            let mut cipher = vec![0u8; cipher_size];
            let written = public.public_encrypt(&plain, &mut cipher, padding).unwrap();
            assert_eq!(written, cipher_size);
            let mut decrypted = vec![0u8; cipher_size];
            let len = key.private_decrypt(&cipher, &mut decrypted, padding).unwrap();
            assert_eq!(&decrypted[..len], &plain[..]);
        }
    }
}
