// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Cryptography for the OPC UA stack: the [`SecurityPolicy`] abstraction over
//! signing, encryption and key derivation, certificate handling, and the
//! in-memory certificate store with OPC UA verification semantics.
//!
//! Built on the pure-Rust crypto stack (`rsa`, `sha1`/`sha2`, `hmac`, `aes`).

mod aeskey;
mod certificate_store;
mod hash;
mod pkey;
pub mod random;
mod security_policy;
mod x509;

pub use aeskey::AesKey;
pub use certificate_store::CertificateStore;
pub use hash::{p_sha1, p_sha256};
pub use pkey::{KeySize, PrivateKey, PublicKey, RsaPadding, RsaSignaturePadding};
pub use security_policy::{
    create_signature_data, verify_signature_data, SecurityPolicy,
};
pub use x509::{Thumbprint, X509};
