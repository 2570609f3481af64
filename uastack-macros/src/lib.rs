//! Derive macros for the OPC UA binary encoding traits.
//!
//! These are consumed by the types crate (and anything defining custom
//! structures) through a local `mod opcua` alias, so the generated code
//! refers to `opcua::types::...` regardless of which crate it lands in.

mod binary;
mod enums;
mod utils;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derive `BinaryEncodable` for a struct, encoding each field in
/// declaration order.
#[proc_macro_derive(BinaryEncodable)]
pub fn derive_binary_encodable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    binary::generate_encode_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `BinaryDecodable` for a struct, decoding each field in
/// declaration order.
#[proc_macro_derive(BinaryDecodable)]
pub fn derive_binary_decodable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    binary::generate_decode_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive binary encoding for a fieldless enum with an explicit integer
/// repr. The enum is encoded as its repr type, and decoding an unknown
/// discriminant fails with `BadDecodingError`.
#[proc_macro_derive(UaEnum)]
pub fn derive_ua_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    enums::generate_ua_enum_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
