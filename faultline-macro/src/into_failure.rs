use darling::ast::Data;
use darling::util::Ignored;
use darling::{FromDeriveInput, FromVariant};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Expr, Generics, Ident};

#[derive(FromDeriveInput)]
#[darling(attributes(failure), supports(struct_any, enum_any))]
struct FailureInput {
    ident: Ident,
    generics: Generics,
    data: Data<FailureVariant, Ignored>,
    kind: Option<Expr>,
    status: Option<u16>,
}

#[derive(FromVariant)]
#[darling(attributes(failure))]
struct FailureVariant {
    ident: Ident,
    kind: Option<Expr>,
    status: Option<u16>,
}

pub fn derive_into_failure(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let parsed = match FailureInput::from_derive_input(&input) {
        Ok(parsed) => parsed,
        Err(e) => return e.write_errors().into(),
    };

    match generate_from_impl(&parsed) {
        Ok(expanded) => expanded.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn generate_from_impl(input: &FailureInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(_) => {
            let kind = kind_tokens(input.kind.as_ref());
            let status = status_tokens(name, input.status)?;
            quote! {
                let kind: &'static ::faultline::failure::FailureKind = #kind;
                let status: ::std::option::Option<u16> = #status;
            }
        }
        Data::Enum(variants) => {
            let arms = variants
                .iter()
                .map(|variant| {
                    let ident = &variant.ident;
                    let kind = kind_tokens(variant.kind.as_ref().or(input.kind.as_ref()));
                    let status = status_tokens(ident, variant.status.or(input.status))?;
                    Ok(quote! {
                        #name::#ident { .. } => (#kind, #status),
                    })
                })
                .collect::<syn::Result<Vec<_>>>()?;

            quote! {
                let (kind, status): (
                    &'static ::faultline::failure::FailureKind,
                    ::std::option::Option<u16>,
                ) = match &error {
                    #(#arms)*
                };
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::convert::From<#name #ty_generics> for ::faultline::Failure #where_clause {
            #[track_caller]
            fn from(error: #name #ty_generics) -> Self {
                #body
                let failure = ::faultline::Failure::from_error(kind, error);
                match status.and_then(|code| ::faultline::StatusCode::from_u16(code).ok()) {
                    ::std::option::Option::Some(code) => failure.with_status(code),
                    ::std::option::Option::None => failure,
                }
            }
        }
    })
}

fn kind_tokens(kind: Option<&Expr>) -> TokenStream2 {
    match kind {
        Some(kind) => quote!(&#kind),
        None => quote!(&::faultline::failure::kind::GENERIC),
    }
}

fn status_tokens(span: &Ident, status: Option<u16>) -> syn::Result<TokenStream2> {
    match status {
        Some(code) if (100..=999).contains(&code) => Ok(quote!(::std::option::Option::Some(#code))),
        Some(code) => Err(syn::Error::new(
            span.span(),
            format!("#[failure(status = {})] is not a valid HTTP status code", code),
        )),
        None => Ok(quote!(::std::option::Option::None)),
    }
}
