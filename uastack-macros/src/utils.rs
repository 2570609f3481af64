use syn::{Data, DataStruct, DeriveInput, Fields, Ident};

pub struct StructItem {
    pub ident: Ident,
    pub fields: Vec<Ident>,
}

impl StructItem {
    pub fn from_input(input: DeriveInput) -> syn::Result<Self> {
        let Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) = input.data
        else {
            return Err(syn::Error::new_spanned(
                input.ident,
                "derive only supports structs with named fields",
            ));
        };

        Ok(Self {
            ident: input.ident,
            fields: fields
                .named
                .into_iter()
                .map(|f| f.ident.expect("named field without ident"))
                .collect(),
        })
    }
}
