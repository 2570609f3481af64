// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! User authentication for ActivateSession.

use std::collections::HashMap;

use log::error;

use uastack_crypto::X509;
use uastack_types::StatusCode;

use crate::identity_token::IdentityToken;

/// An opaque token identifying an authenticated user within the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserToken(pub String);

impl UserToken {
    /// The token of the anonymous user.
    pub fn anonymous() -> UserToken {
        UserToken("anonymous".to_string())
    }
}

/// Validates identity tokens and maps them to user tokens. Implementations
/// decide which identities exist and what they may do.
pub trait AuthManager: Send + Sync {
    /// Authenticate an anonymous activation.
    fn authenticate_anonymous(&self) -> Result<UserToken, StatusCode> {
        Ok(UserToken::anonymous())
    }

    /// Authenticate a user name and plaintext password.
    fn authenticate_username(&self, user: &str, password: &[u8]) -> Result<UserToken, StatusCode>;

    /// Authenticate an X509 user certificate.
    fn authenticate_x509(&self, certificate: &X509) -> Result<UserToken, StatusCode>;

    /// Authenticate an externally issued token.
    fn authenticate_issued(&self, _token_data: &[u8]) -> Result<UserToken, StatusCode> {
        Err(StatusCode::BadIdentityTokenRejected)
    }

    /// Authenticate a parsed identity token.
    fn authenticate(&self, token: &IdentityToken) -> Result<UserToken, StatusCode> {
        match token {
            IdentityToken::None | IdentityToken::Anonymous(_) => self.authenticate_anonymous(),
            IdentityToken::UserName(token) => {
                if !token.encryption_algorithm.is_null() {
                    // Encrypted passwords require the channel certificate
                    // machinery of the secured endpoints; the sample
                    // authenticator only accepts plaintext over a secured or
                    // local channel.
                    error!("Rejecting password with unsupported encryption algorithm");
                    return Err(StatusCode::BadIdentityTokenRejected);
                }
                self.authenticate_username(token.user_name.as_ref(), token.password.as_ref())
            }
            IdentityToken::X509(token) => {
                let cert = X509::from_byte_string(&token.certificate_data)
                    .map_err(|_| StatusCode::BadIdentityTokenInvalid)?;
                self.authenticate_x509(&cert)
            }
            IdentityToken::Issued(token) => self.authenticate_issued(token.token_data.as_ref()),
        }
    }
}

/// An authenticator with a static user set. Allows anonymous access when
/// constructed with `allow_anonymous`.
pub struct DefaultAuthenticator {
    users: HashMap<String, String>,
    allow_anonymous: bool,
}

impl DefaultAuthenticator {
    /// Create a new authenticator with the given user/password pairs.
    pub fn new(users: HashMap<String, String>, allow_anonymous: bool) -> Self {
        Self {
            users,
            allow_anonymous,
        }
    }

    /// An authenticator that only allows anonymous access.
    pub fn anonymous_only() -> Self {
        Self::new(HashMap::new(), true)
    }
}

impl AuthManager for DefaultAuthenticator {
    fn authenticate_anonymous(&self) -> Result<UserToken, StatusCode> {
        if self.allow_anonymous {
            Ok(UserToken::anonymous())
        } else {
            Err(StatusCode::BadIdentityTokenRejected)
        }
    }

    fn authenticate_username(&self, user: &str, password: &[u8]) -> Result<UserToken, StatusCode> {
        match self.users.get(user) {
            Some(expected) if expected.as_bytes() == password => Ok(UserToken(user.to_string())),
            _ => Err(StatusCode::BadUserAccessDenied),
        }
    }

    fn authenticate_x509(&self, _certificate: &X509) -> Result<UserToken, StatusCode> {
        Err(StatusCode::BadIdentityTokenRejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_auth() {
        let mut users = HashMap::new();
        users.insert("sample".to_string(), "sample1".to_string());
        let auth = DefaultAuthenticator::new(users, false);

        assert!(auth.authenticate_username("sample", b"sample1").is_ok());
        assert_eq!(
            auth.authenticate_username("sample", b"wrong").unwrap_err(),
            StatusCode::BadUserAccessDenied
        );
        assert_eq!(
            auth.authenticate_anonymous().unwrap_err(),
            StatusCode::BadIdentityTokenRejected
        );
    }
}
