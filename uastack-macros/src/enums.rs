use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Expr, Ident, Type};

struct EnumItem {
    ident: Ident,
    repr: Type,
    variants: Vec<(Ident, Expr)>,
}

fn parse_enum(input: DeriveInput) -> syn::Result<EnumItem> {
    let Data::Enum(data) = input.data else {
        return Err(syn::Error::new_spanned(
            input.ident,
            "UaEnum can only be derived for enums",
        ));
    };

    let mut repr = None;
    for attr in &input.attrs {
        if attr.path().is_ident("repr") {
            repr = Some(attr.parse_args::<Type>()?);
        }
    }
    let Some(repr) = repr else {
        return Err(syn::Error::new_spanned(
            input.ident,
            "UaEnum requires an explicit #[repr(..)] attribute",
        ));
    };

    let mut variants = Vec::with_capacity(data.variants.len());
    for variant in data.variants {
        let Some((_, value)) = variant.discriminant else {
            return Err(syn::Error::new_spanned(
                variant.ident,
                "UaEnum variants must have explicit discriminants",
            ));
        };
        variants.push((variant.ident, value));
    }

    Ok(EnumItem {
        ident: input.ident,
        repr,
        variants,
    })
}

pub fn generate_ua_enum_impl(input: DeriveInput) -> syn::Result<TokenStream> {
    let item = parse_enum(input)?;
    let ident = item.ident;
    let repr = item.repr;

    let mut try_from_arms = quote! {};
    for (variant, value) in &item.variants {
        try_from_arms.extend(quote! {
            #value => Ok(Self::#variant),
        });
    }

    let name = ident.to_string();
    Ok(quote! {
        impl TryFrom<#repr> for #ident {
            type Error = opcua::types::Error;
            fn try_from(value: #repr) -> Result<Self, Self::Error> {
                match value {
                    #try_from_arms
                    r => Err(opcua::types::Error::decoding(format!(
                        "Invalid {} discriminant: {}", #name, r
                    ))),
                }
            }
        }

        impl opcua::types::BinaryEncodable for #ident {
            fn byte_len(&self, _ctx: &opcua::types::Context<'_>) -> usize {
                std::mem::size_of::<#repr>()
            }
            fn encode<S: std::io::Write + ?Sized>(
                &self,
                stream: &mut S,
                ctx: &opcua::types::Context<'_>,
            ) -> opcua::types::EncodingResult<()> {
                opcua::types::BinaryEncodable::encode(&(*self as #repr), stream, ctx)
            }
        }

        impl opcua::types::BinaryDecodable for #ident {
            fn decode<S: std::io::Read + ?Sized>(
                stream: &mut S,
                ctx: &opcua::types::Context<'_>,
            ) -> opcua::types::EncodingResult<Self> {
                let value: #repr = opcua::types::BinaryDecodable::decode(stream, ctx)?;
                Self::try_from(value)
            }
        }
    })
}
