// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Parsing of the user identity token carried by ActivateSession.

use uastack_types::{
    AnonymousIdentityToken, Context, ExtensionObject, IssuedIdentityToken, ObjectId, StatusCode,
    UserNameIdentityToken, X509IdentityToken,
};

/// The parsed identity token of an activated session.
#[derive(Debug)]
pub enum IdentityToken {
    /// No token was supplied; treated as anonymous.
    None,
    /// Anonymous access.
    Anonymous(AnonymousIdentityToken),
    /// User name and password.
    UserName(UserNameIdentityToken),
    /// X509 certificate.
    X509(X509IdentityToken),
    /// Token issued by an external authority.
    Issued(IssuedIdentityToken),
}

impl IdentityToken {
    /// Parse the extension object of an ActivateSession request. An empty
    /// object means anonymous access.
    pub fn parse(
        token: &ExtensionObject,
        ctx: &Context<'_>,
    ) -> Result<IdentityToken, StatusCode> {
        if token.is_null() || token.body.is_none() {
            return Ok(IdentityToken::None);
        }
        let object_id = token
            .node_id
            .as_object_id()
            .map_err(|_| StatusCode::BadIdentityTokenInvalid)?;
        let token = match object_id {
            ObjectId::AnonymousIdentityToken_Encoding_DefaultBinary => {
                IdentityToken::Anonymous(token.decode_inner(ctx).map_err(to_invalid)?)
            }
            ObjectId::UserNameIdentityToken_Encoding_DefaultBinary => {
                IdentityToken::UserName(token.decode_inner(ctx).map_err(to_invalid)?)
            }
            ObjectId::X509IdentityToken_Encoding_DefaultBinary => {
                IdentityToken::X509(token.decode_inner(ctx).map_err(to_invalid)?)
            }
            ObjectId::IssuedIdentityToken_Encoding_DefaultBinary => {
                IdentityToken::Issued(token.decode_inner(ctx).map_err(to_invalid)?)
            }
            _ => return Err(StatusCode::BadIdentityTokenInvalid),
        };
        Ok(token)
    }
}

fn to_invalid(e: uastack_types::Error) -> StatusCode {
    log::error!("Failed to decode identity token: {e}");
    StatusCode::BadIdentityTokenInvalid
}
