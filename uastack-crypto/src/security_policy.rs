// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The [`SecurityPolicy`] type and its algorithm suites.
//!
//! The policy is stateless; per-channel key material lives on the secure
//! channel, which calls back into the policy for every operation.

use std::{fmt, str::FromStr};

use log::error;

use uastack_types::{ByteString, Error, SignatureData, StatusCode, UAString};

use crate::{
    aeskey::AesKey,
    hash,
    pkey::{KeySize, PrivateKey, PublicKey, RsaPadding, RsaSignaturePadding},
    random,
    x509::X509,
};

/// Security policy URI prefix.
const SECURITY_POLICY_URI_PREFIX: &str = "http://opcfoundation.org/UA/SecurityPolicy#";

const URI_NONE: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";
const URI_BASIC_128_RSA_15: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15";
const URI_BASIC_256: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic256";
const URI_BASIC_256_SHA_256: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";
const URI_AES_128_SHA_256_RSA_OAEP: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep";
const URI_AES_256_SHA_256_RSA_PSS: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss";

// Signature algorithm URIs used in SignatureData
const ALG_RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
const ALG_RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
const ALG_RSA_PSS_SHA256: &str = "http://opcfoundation.org/UA/security/rsa-pss-sha2-256";

/// A security policy, naming the suite of algorithms used to secure a
/// channel. The `None` policy is the identity: signatures are empty and
/// encryption is a pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityPolicy {
    /// An unrecognized policy uri.
    Unknown,
    /// No security.
    None,
    /// AES-128-CBC, HMAC-SHA1, RSA-PKCS15. Deprecated by the standard but
    /// still widely deployed.
    Basic128Rsa15,
    /// AES-256-CBC, HMAC-SHA1, RSA-OAEP. Deprecated by the standard.
    Basic256,
    /// AES-256-CBC, HMAC-SHA256, RSA-OAEP.
    Basic256Sha256,
    /// AES-128-CBC, HMAC-SHA256, RSA-OAEP.
    Aes128Sha256RsaOaep,
    /// AES-256-CBC, HMAC-SHA256, RSA-OAEP-SHA256 and PSS signatures.
    Aes256Sha256RsaPss,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for SecurityPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "None" => SecurityPolicy::None,
            "Basic128Rsa15" => SecurityPolicy::Basic128Rsa15,
            "Basic256" => SecurityPolicy::Basic256,
            "Basic256Sha256" => SecurityPolicy::Basic256Sha256,
            "Aes128-Sha256-RsaOaep" => SecurityPolicy::Aes128Sha256RsaOaep,
            "Aes256-Sha256-RsaPss" => SecurityPolicy::Aes256Sha256RsaPss,
            _ => {
                error!("Specified security policy \"{}\" is not recognized", s);
                SecurityPolicy::Unknown
            }
        })
    }
}

impl SecurityPolicy {
    /// Look up a policy from its uri.
    pub fn from_uri(uri: &str) -> SecurityPolicy {
        match uri {
            URI_NONE => SecurityPolicy::None,
            URI_BASIC_128_RSA_15 => SecurityPolicy::Basic128Rsa15,
            URI_BASIC_256 => SecurityPolicy::Basic256,
            URI_BASIC_256_SHA_256 => SecurityPolicy::Basic256Sha256,
            URI_AES_128_SHA_256_RSA_OAEP => SecurityPolicy::Aes128Sha256RsaOaep,
            URI_AES_256_SHA_256_RSA_PSS => SecurityPolicy::Aes256Sha256RsaPss,
            _ => {
                error!(
                    "Specified security policy uri \"{}\" is not recognized",
                    uri
                );
                SecurityPolicy::Unknown
            }
        }
    }

    /// The uri of the policy.
    pub fn to_uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => URI_NONE,
            SecurityPolicy::Basic128Rsa15 => URI_BASIC_128_RSA_15,
            SecurityPolicy::Basic256 => URI_BASIC_256,
            SecurityPolicy::Basic256Sha256 => URI_BASIC_256_SHA_256,
            SecurityPolicy::Aes128Sha256RsaOaep => URI_AES_128_SHA_256_RSA_OAEP,
            SecurityPolicy::Aes256Sha256RsaPss => URI_AES_256_SHA_256_RSA_PSS,
            SecurityPolicy::Unknown => {
                panic!("Shouldn't be turning an unknown policy into a uri")
            }
        }
    }

    /// The short name of the policy, the uri fragment.
    pub fn to_str(&self) -> &'static str {
        match self {
            SecurityPolicy::Unknown => "Unknown",
            other => other
                .to_uri()
                .strip_prefix(SECURITY_POLICY_URI_PREFIX)
                .unwrap_or("Unknown"),
        }
    }

    /// `true` for every policy the stack can actually secure a channel with.
    pub fn is_supported(&self) -> bool {
        !matches!(self, SecurityPolicy::Unknown)
    }

    /// `true` for policies deprecated by the standard.
    pub fn is_deprecated(&self) -> bool {
        matches!(
            self,
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256
        )
    }

    /// Size in bytes of a symmetric message signature.
    pub fn symmetric_signature_size(&self) -> usize {
        match self {
            SecurityPolicy::None => 0,
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => hash::SHA1_SIZE,
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => hash::SHA256_SIZE,
            SecurityPolicy::Unknown => 0,
        }
    }

    /// Length in bytes of the derived symmetric signing key.
    pub fn derived_signature_key_size(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 => 16,
            SecurityPolicy::Basic256 => 24,
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => 32,
            _ => 0,
        }
    }

    /// Length in bytes of the derived symmetric encryption key.
    pub fn derived_encryption_key_size(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Aes128Sha256RsaOaep => 16,
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes256Sha256RsaPss => 32,
            _ => 0,
        }
    }

    /// The nonce length for the secure channel handshake, which equals the
    /// symmetric key length. For the None policy a 32 byte nonce is still
    /// used for session signatures.
    pub fn secure_channel_nonce_length(&self) -> usize {
        match self {
            SecurityPolicy::Basic128Rsa15 => 16,
            SecurityPolicy::Unknown => 0,
            _ => 32,
        }
    }

    /// Plain text block size of the symmetric cipher.
    pub fn plain_block_size(&self) -> usize {
        match self {
            SecurityPolicy::None | SecurityPolicy::Unknown => 0,
            _ => 16,
        }
    }

    /// The padding used for asymmetric encryption under this policy.
    pub fn asymmetric_encryption_padding(&self) -> RsaPadding {
        match self {
            SecurityPolicy::Basic128Rsa15 => RsaPadding::Pkcs1,
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep => RsaPadding::OaepSha1,
            SecurityPolicy::Aes256Sha256RsaPss => RsaPadding::OaepSha256,
            _ => RsaPadding::Pkcs1,
        }
    }

    fn asymmetric_signature_padding(&self) -> RsaSignaturePadding {
        match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                RsaSignaturePadding::Pkcs1Sha1
            }
            SecurityPolicy::Basic256Sha256 | SecurityPolicy::Aes128Sha256RsaOaep => {
                RsaSignaturePadding::Pkcs1Sha256
            }
            SecurityPolicy::Aes256Sha256RsaPss => RsaSignaturePadding::PssSha256,
            _ => RsaSignaturePadding::Pkcs1Sha1,
        }
    }

    /// The uri of the asymmetric signature algorithm, carried in
    /// SignatureData structures.
    pub fn asymmetric_signature_algorithm(&self) -> &'static str {
        match self.asymmetric_signature_padding() {
            RsaSignaturePadding::Pkcs1Sha1 => ALG_RSA_SHA1,
            RsaSignaturePadding::Pkcs1Sha256 => ALG_RSA_SHA256,
            RsaSignaturePadding::PssSha256 => ALG_RSA_PSS_SHA256,
        }
    }

    /// Generate a nonce of the length this policy requires.
    pub fn random_nonce(&self) -> ByteString {
        match self.secure_channel_nonce_length() {
            0 => ByteString::null(),
            len => random::byte_string(len),
        }
    }

    /// Part 6, 6.7.5: derive the secure channel keys from the two nonces
    /// with the policy's pseudo-random function. The secret is the remote
    /// nonce and the seed the local nonce for our own keys, and vice versa
    /// for the remote keys.
    ///
    /// Returns (signing key, encryption key, IV).
    pub fn make_secure_channel_keys(
        &self,
        secret: &[u8],
        seed: &[u8],
    ) -> (Vec<u8>, AesKey, Vec<u8>) {
        // Work out the length of stuff
        let signing_key_length = self.derived_signature_key_size();
        let (encrypting_key_length, encrypting_block_size) = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Aes128Sha256RsaOaep => (16, 16),
            SecurityPolicy::Basic256
            | SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes256Sha256RsaPss => (32, 16),
            _ => {
                panic!("Invalid policy");
            }
        };

        let prf = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => hash::p_sha1,
            _ => hash::p_sha256,
        };

        let bytes = prf(
            secret,
            seed,
            signing_key_length + encrypting_key_length + encrypting_block_size,
        );
        let signing_key = bytes[..signing_key_length].to_vec();
        let encrypting_key =
            &bytes[signing_key_length..signing_key_length + encrypting_key_length];
        let iv = bytes[signing_key_length + encrypting_key_length..].to_vec();
        (signing_key, AesKey::new(*self, encrypting_key), iv)
    }

    /// Sign `data` with the symmetric signing key into `signature`.
    pub fn symmetric_sign(
        &self,
        key: &[u8],
        data: &[u8],
        signature: &mut [u8],
    ) -> Result<(), StatusCode> {
        let result = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                hash::hmac_sha1(key, data, signature)
            }
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => hash::hmac_sha256(key, data, signature),
            _ => {
                return Err(StatusCode::BadSecurityPolicyRejected);
            }
        };
        result.map_err(|e| e.status())
    }

    /// Verify a symmetric signature over `data`.
    pub fn symmetric_verify_signature(
        &self,
        key: &[u8],
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Error> {
        let verified = match self {
            SecurityPolicy::Basic128Rsa15 | SecurityPolicy::Basic256 => {
                hash::verify_hmac_sha1(key, data, signature)
            }
            SecurityPolicy::Basic256Sha256
            | SecurityPolicy::Aes128Sha256RsaOaep
            | SecurityPolicy::Aes256Sha256RsaPss => hash::verify_hmac_sha256(key, data, signature),
            _ => false,
        };
        if verified {
            Ok(())
        } else {
            Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "Signature invalid or corrupt data",
            ))
        }
    }

    /// Encrypt with the symmetric cipher.
    pub fn symmetric_encrypt(
        &self,
        key: &AesKey,
        iv: &[u8],
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        key.encrypt(src, iv, dst).map_err(|e| e.status())
    }

    /// Decrypt with the symmetric cipher.
    pub fn symmetric_decrypt(
        &self,
        key: &AesKey,
        iv: &[u8],
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        key.decrypt(src, iv, dst).map_err(|e| e.status())
    }

    /// Sign `data` with the private key using this policy's asymmetric
    /// signature algorithm.
    pub fn asymmetric_sign(
        &self,
        signing_key: &PrivateKey,
        data: &[u8],
        signature: &mut [u8],
    ) -> Result<(), StatusCode> {
        signing_key
            .sign(data, signature, self.asymmetric_signature_padding())
            .map(|_| ())
            .map_err(|e| e.status())
    }

    /// Verify an asymmetric signature over `data`.
    pub fn asymmetric_verify_signature(
        &self,
        verification_key: &PublicKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Error> {
        verification_key.verify(data, signature, self.asymmetric_signature_padding())
    }

    /// Encrypt `src` with the remote public key.
    pub fn asymmetric_encrypt(
        &self,
        encryption_key: &PublicKey,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        encryption_key
            .public_encrypt(src, dst, self.asymmetric_encryption_padding())
            .map_err(|e| e.status())
    }

    /// Decrypt `src` with our private key.
    pub fn asymmetric_decrypt(
        &self,
        decryption_key: &PrivateKey,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, StatusCode> {
        decryption_key
            .private_decrypt(src, dst, self.asymmetric_encryption_padding())
            .map_err(|e| e.status())
    }
}

/// Create a SignatureData over `cert_data || nonce` with the given key, as
/// used in CreateSession / ActivateSession handshakes.
pub fn create_signature_data(
    signing_key: &PrivateKey,
    security_policy: SecurityPolicy,
    contained_cert: &ByteString,
    nonce: &ByteString,
) -> Result<SignatureData, StatusCode> {
    if security_policy == SecurityPolicy::None {
        return Ok(SignatureData::null());
    }
    let mut data = Vec::with_capacity(contained_cert.as_ref().len() + nonce.as_ref().len());
    data.extend_from_slice(contained_cert.as_ref());
    data.extend_from_slice(nonce.as_ref());

    let mut signature = vec![0u8; signing_key.size()];
    security_policy.asymmetric_sign(signing_key, &data, &mut signature)?;
    Ok(SignatureData {
        algorithm: UAString::from(security_policy.asymmetric_signature_algorithm()),
        signature: ByteString::from(signature),
    })
}

/// Verify a SignatureData produced by [`create_signature_data`] on the
/// other side of the handshake.
pub fn verify_signature_data(
    signature: &SignatureData,
    security_policy: SecurityPolicy,
    signing_cert: &X509,
    contained_cert: &X509,
    nonce: &[u8],
) -> Result<(), Error> {
    let verification_key = signing_cert
        .public_key()
        .map_err(|e| Error::new(e, "Signing certificate has no usable public key"))?;
    let mut data =
        Vec::with_capacity(contained_cert.as_der().len() + nonce.len());
    data.extend_from_slice(contained_cert.as_der());
    data.extend_from_slice(nonce);
    security_policy.asymmetric_verify_signature(
        &verification_key,
        &data,
        signature.signature.as_ref(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trip() {
        for policy in [
            SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            assert_eq!(SecurityPolicy::from_uri(policy.to_uri()), policy);
        }
        assert_eq!(
            SecurityPolicy::from_uri("http://example.com/bogus"),
            SecurityPolicy::Unknown
        );
    }

    #[test]
    fn derived_keys_match_both_sides() {
        let policy = SecurityPolicy::Basic256Sha256;
        let client_nonce = vec![1u8; 32];
        let server_nonce = vec![2u8; 32];
        // Client keys derived by the client must equal client keys derived
        // by the server: same (secret, seed) ordering on both sides.
        let a = policy.make_secure_channel_keys(&server_nonce, &client_nonce);
        let b = policy.make_secure_channel_keys(&server_nonce, &client_nonce);
        assert_eq!(a.0, b.0);
        assert_eq!(a.1.value(), b.1.value());
        assert_eq!(a.2, b.2);
        assert_eq!(a.0.len(), 32);
        assert_eq!(a.1.value().len(), 32);
        assert_eq!(a.2.len(), 16);
    }

    #[test]
    fn symmetric_sign_and_verify() {
        let policy = SecurityPolicy::Basic256Sha256;
        let key = vec![5u8; 32];
        let mut signature = vec![0u8; policy.symmetric_signature_size()];
        policy.symmetric_sign(&key, b"data", &mut signature).unwrap();
        policy
            .symmetric_verify_signature(&key, b"data", &signature)
            .unwrap();
        assert!(policy
            .symmetric_verify_signature(&key, b"tampered", &signature)
            .is_err());
    }
}
