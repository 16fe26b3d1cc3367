use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Generates `from_bytes`, decoding a unary JSON response body into `Self`.
///
/// Decode failures surface as `Error::Serialization` with the raw body attached.
#[proc_macro_derive(FromBytes)]
pub fn derive_from_bytes(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            pub fn from_bytes(bytes: ::bytes::Bytes) -> crate::Result<Self> {
                ::serde_json::from_slice(&bytes)
                    .map_err(|e| crate::Error::decode_failure(e, &bytes))
            }
        }
    };
    TokenStream::from(expanded)
}

/// Implements `StreamRecord` for a streamed response that carries a `done: bool` field.
#[proc_macro_derive(StreamRecord)]
pub fn derive_stream_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let has_done = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields
                .named
                .iter()
                .any(|f| f.ident.as_ref().is_some_and(|i| i == "done")),
            _ => false,
        },
        _ => false,
    };

    if !has_done {
        return syn::Error::new_spanned(
            name,
            "StreamRecord can only be derived for structs with a named `done: bool` field",
        )
        .to_compile_error()
        .into();
    }

    let expanded = quote! {
        impl #impl_generics crate::parser::StreamRecord for #name #ty_generics #where_clause {
            fn is_done(&self) -> bool {
                self.done
            }
        }
    };
    TokenStream::from(expanded)
}
