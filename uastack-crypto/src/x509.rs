// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! X509 certificate wrapper over DER data.

use sha1::{Digest, Sha1};
use x509_cert::{
    der::{Decode, Encode},
    Certificate,
};

use uastack_types::{ByteString, DateTime, StatusCode};

use crate::pkey::PublicKey;

/// SHA-1 thumbprint of a DER certificate, used on the wire to identify the
/// receiver certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Thumbprint {
    value: [u8; Thumbprint::THUMBPRINT_SIZE],
}

impl Thumbprint {
    /// Size in bytes of a thumbprint.
    pub const THUMBPRINT_SIZE: usize = 20;

    /// Compute the thumbprint of the given DER data.
    pub fn new(der: &[u8]) -> Thumbprint {
        let digest = Sha1::digest(der);
        let mut value = [0u8; Self::THUMBPRINT_SIZE];
        value.copy_from_slice(&digest);
        Thumbprint { value }
    }

    /// The raw thumbprint bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The thumbprint as a byte string for security headers.
    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(self.value.to_vec())
    }
}

/// An X509 certificate: the raw DER plus the parsed structure.
#[derive(Debug, Clone)]
pub struct X509 {
    der: Vec<u8>,
    cert: Certificate,
}

impl X509 {
    /// Parse a certificate from DER bytes.
    pub fn from_der(der: &[u8]) -> Result<X509, StatusCode> {
        let cert = Certificate::from_der(der).map_err(|_| StatusCode::BadCertificateInvalid)?;
        Ok(X509 {
            der: der.to_vec(),
            cert,
        })
    }

    /// Parse a certificate from a byte string as carried in security headers.
    pub fn from_byte_string(data: &ByteString) -> Result<X509, StatusCode> {
        if data.is_null() {
            Err(StatusCode::BadCertificateInvalid)
        } else {
            Self::from_der(data.as_ref())
        }
    }

    /// The DER bytes of the certificate.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// The certificate as a byte string for the wire.
    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(self.der.clone())
    }

    /// The SHA-1 thumbprint of the certificate.
    pub fn thumbprint(&self) -> Thumbprint {
        Thumbprint::new(&self.der)
    }

    /// The RSA public key of the certificate.
    pub fn public_key(&self) -> Result<PublicKey, StatusCode> {
        let spki_der = self
            .cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|_| StatusCode::BadCertificateInvalid)?;
        use rsa::pkcs8::DecodePublicKey;
        rsa::RsaPublicKey::from_public_key_der(&spki_der)
            .map(PublicKey)
            .map_err(|_| StatusCode::BadCertificateInvalid)
    }

    /// The subject name, as text.
    pub fn subject(&self) -> String {
        self.cert.tbs_certificate.subject.to_string()
    }

    /// The issuer name, as text.
    pub fn issuer(&self) -> String {
        self.cert.tbs_certificate.issuer.to_string()
    }

    /// Whether the certificate is self-signed, judged by name only.
    pub fn is_self_signed(&self) -> bool {
        self.cert.tbs_certificate.subject == self.cert.tbs_certificate.issuer
    }

    /// Check the certificate validity window against `now`, returning the
    /// status code mandated for out of window certificates.
    pub fn is_time_valid(&self, now: &DateTime) -> Result<(), StatusCode> {
        let validity = &self.cert.tbs_certificate.validity;
        let not_before = validity.not_before.to_unix_duration().as_secs() as i64;
        let not_after = validity.not_after.to_unix_duration().as_secs() as i64;
        let now: chrono::DateTime<chrono::Utc> = (*now).into();
        let now = now.timestamp();
        if now < not_before || now > not_after {
            Err(StatusCode::BadCertificateTimeInvalid)
        } else {
            Ok(())
        }
    }
}

impl PartialEq for X509 {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}
