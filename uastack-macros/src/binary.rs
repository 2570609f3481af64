use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use crate::utils::StructItem;

pub fn generate_encode_impl(input: DeriveInput) -> syn::Result<TokenStream> {
    let strct = StructItem::from_input(input)?;

    let mut byte_len_body = quote! {};
    let mut encode_body = quote! {};
    for ident in &strct.fields {
        byte_len_body.extend(quote! {
            size += opcua::types::BinaryEncodable::byte_len(&self.#ident, ctx);
        });
        encode_body.extend(quote! {
            opcua::types::BinaryEncodable::encode(&self.#ident, stream, ctx)?;
        });
    }

    let ident = strct.ident;
    Ok(quote! {
        impl opcua::types::BinaryEncodable for #ident {
            #[allow(unused)]
            fn byte_len(&self, ctx: &opcua::types::Context<'_>) -> usize {
                let mut size = 0usize;
                #byte_len_body
                size
            }
            #[allow(unused)]
            fn encode<S: std::io::Write + ?Sized>(
                &self,
                stream: &mut S,
                ctx: &opcua::types::Context<'_>,
            ) -> opcua::types::EncodingResult<()> {
                #encode_body
                Ok(())
            }
        }
    })
}

pub fn generate_decode_impl(input: DeriveInput) -> syn::Result<TokenStream> {
    let strct = StructItem::from_input(input)?;

    let mut decode_body = quote! {};
    let mut build_body = quote! {};
    for ident in &strct.fields {
        decode_body.extend(quote! {
            let #ident = opcua::types::BinaryDecodable::decode(stream, ctx)?;
        });
        build_body.extend(quote! {
            #ident,
        });
    }

    let ident = strct.ident;
    Ok(quote! {
        impl opcua::types::BinaryDecodable for #ident {
            #[allow(unused)]
            fn decode<S: std::io::Read + ?Sized>(
                stream: &mut S,
                ctx: &opcua::types::Context<'_>,
            ) -> opcua::types::EncodingResult<Self> {
                #decode_body
                Ok(Self {
                    #build_body
                })
            }
        }
    })
}
