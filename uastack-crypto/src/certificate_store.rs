// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! An in-memory certificate store with OPC UA verification semantics.
//!
//! The store holds the application's own certificate and key, a trust list,
//! an issuer list, and revocation information. Folder-backed reloading is
//! a host concern and lives outside this crate; the store only implements
//! the verification contract.

use std::collections::HashSet;

use log::{error, warn};

use uastack_types::{DateTime, Error, StatusCode};

use crate::{pkey::PrivateKey, x509::X509, SecurityPolicy, Thumbprint};

/// Holds trust information and the application's own certificate and key.
pub struct CertificateStore {
    own_cert: Option<X509>,
    own_pkey: Option<PrivateKey>,
    /// Certificates trusted directly.
    trusted: Vec<X509>,
    /// Issuer certificates, trusted only for chain building.
    issuers: Vec<X509>,
    /// Thumbprints of revoked certificates, the flattened form of the CRLs.
    revoked: HashSet<Thumbprint>,
    /// Issuers for which a CRL has been provided. Certificates issued by an
    /// issuer without one fail with `BadCertificateRevocationUnknown`.
    issuers_with_crl: HashSet<Thumbprint>,
    /// Skip all checks and trust any certificate. For testing.
    trust_all: bool,
}

impl CertificateStore {
    /// Create an empty store.
    pub fn new() -> CertificateStore {
        CertificateStore {
            own_cert: None,
            own_pkey: None,
            trusted: Vec::new(),
            issuers: Vec::new(),
            revoked: HashSet::new(),
            issuers_with_crl: HashSet::new(),
            trust_all: false,
        }
    }

    /// Create a store that trusts every certificate. For testing only.
    pub fn new_trust_all() -> CertificateStore {
        CertificateStore {
            trust_all: true,
            ..CertificateStore::new()
        }
    }

    /// Set the application's own certificate and private key.
    pub fn set_own_certificate(&mut self, cert: X509, pkey: PrivateKey) {
        self.own_cert = Some(cert);
        self.own_pkey = Some(pkey);
    }

    /// Read the application's own certificate.
    pub fn read_own_cert(&self) -> Result<X509, Error> {
        self.own_cert.clone().ok_or_else(|| {
            Error::new(
                StatusCode::BadConfigurationError,
                "No application certificate is configured",
            )
        })
    }

    /// Read the application's own private key.
    pub fn read_own_pkey(&self) -> Result<PrivateKey, Error> {
        self.own_pkey.clone().ok_or_else(|| {
            Error::new(
                StatusCode::BadConfigurationError,
                "No application private key is configured",
            )
        })
    }

    /// Add a certificate to the trust list.
    pub fn add_trusted(&mut self, cert: X509) {
        self.trusted.push(cert);
    }

    /// Add an issuer certificate, optionally with revocation information.
    pub fn add_issuer(&mut self, cert: X509, has_crl: bool) {
        if has_crl {
            self.issuers_with_crl.insert(cert.thumbprint());
        }
        self.issuers.push(cert);
    }

    /// Mark a certificate as revoked, i.e. it appears on a CRL.
    pub fn revoke(&mut self, cert: &X509) {
        let issuer_thumbprint = self
            .issuers
            .iter()
            .find(|i| i.subject() == cert.issuer())
            .map(|i| i.thumbprint());
        if let Some(tp) = issuer_thumbprint {
            self.issuers_with_crl.insert(tp);
        }
        self.revoked.insert(cert.thumbprint());
    }

    /// Verify a peer application instance certificate the way part 4
    /// requires, producing the exact status code for each failure class:
    ///
    /// - outside its validity window: `BadCertificateTimeInvalid`
    /// - on a revocation list: `BadCertificateRevoked`
    /// - chain not anchored in the trust list: `BadCertificateUntrusted`
    /// - issuer known but revocation status unknowable:
    ///   `BadCertificateRevocationUnknown`
    pub fn validate_or_reject_application_instance_cert(
        &self,
        cert: &X509,
        security_policy: SecurityPolicy,
        _hostname: Option<&str>,
        _application_uri: Option<&str>,
    ) -> Result<(), StatusCode> {
        if security_policy == SecurityPolicy::None {
            return Ok(());
        }
        if self.trust_all {
            warn!("Certificate check bypassed, the store trusts all certificates");
            return Ok(());
        }

        cert.is_time_valid(&DateTime::now())?;

        if self.revoked.contains(&cert.thumbprint()) {
            error!("Certificate {} is revoked", cert.subject());
            return Err(StatusCode::BadCertificateRevoked);
        }

        let thumbprint = cert.thumbprint();
        let directly_trusted = self.trusted.iter().any(|t| t.thumbprint() == thumbprint);
        let issuer = self
            .issuers
            .iter()
            .chain(self.trusted.iter())
            .find(|i| i.subject() == cert.issuer() && !cert.is_self_signed());

        if !directly_trusted {
            // A chained certificate is acceptable if its issuer is trusted.
            let issuer_trusted = issuer.is_some_and(|i| {
                let tp = i.thumbprint();
                self.trusted.iter().any(|t| t.thumbprint() == tp)
            });
            if !issuer_trusted {
                error!("Certificate {} is not trusted", cert.subject());
                return Err(StatusCode::BadCertificateUntrusted);
            }
        }

        // Revocation must be checkable for chained certificates.
        if let Some(issuer) = issuer {
            if !self.issuers_with_crl.contains(&issuer.thumbprint()) {
                error!(
                    "No revocation information for the issuer of {}",
                    cert.subject()
                );
                return Err(StatusCode::BadCertificateRevocationUnknown);
            }
        }

        Ok(())
    }
}

impl Default for CertificateStore {
    fn default() -> Self {
        CertificateStore::new()
    }
}
