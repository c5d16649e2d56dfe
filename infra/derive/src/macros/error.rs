use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Ident, Type, spanned::Spanned};

struct SourceField {
    ty: Type,
    /// `true` when the variant is exactly `{ source, context }` and can be built from the source.
    convertible: bool,
}

struct VariantInfo {
    ident: Ident,
    source: Option<SourceField>,
    internal: bool,
}

pub(crate) fn expand_derive(input: DeriveInput) -> TokenStream {
    match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(input.span(), "#[qobs_error] can only be applied to enums"));
    };

    let mut variants = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        let Fields::Named(fields) = &variant.fields else {
            return Err(syn::Error::new(
                variant.span(),
                "#[qobs_error] variants must use named fields (`Variant { .., context }`)",
            ));
        };

        let context = fields
            .named
            .iter()
            .find(|f| f.ident.as_ref().is_some_and(|i| i == "context"))
            .ok_or_else(|| {
                syn::Error::new(
                    variant.span(),
                    "#[qobs_error] variants need a `context: Option<Cow<'static, str>>` field",
                )
            })?;
        if !is_option(&context.ty) {
            return Err(syn::Error::new(
                context.ty.span(),
                "`context` must be of type `Option<Cow<'static, str>>`",
            ));
        }

        let source = fields
            .named
            .iter()
            .find(|f| {
                f.ident.as_ref().is_some_and(|i| i == "source")
                    || f.attrs.iter().any(|a| a.path().is_ident("source"))
            })
            .map(|f| {
                let has_from = f.attrs.iter().any(|a| a.path().is_ident("from"));
                let named_source = f.ident.as_ref().is_some_and(|i| i == "source");
                SourceField {
                    ty: f.ty.clone(),
                    convertible: fields.named.len() == 2 && named_source && !has_from,
                }
            });

        let internal = variant.ident == "Internal"
            && fields.named.len() == 2
            && fields.named.iter().any(|f| f.ident.as_ref().is_some_and(|i| i == "message"));

        variants.push(VariantInfo { ident: variant.ident.clone(), source, internal });
    }

    let name = &input.ident;
    let vis = &input.vis;
    let ext = format_ident!("{}Ext", name);

    let set_arms = variants.iter().map(|v| {
        let ident = &v.ident;
        quote! { Self::#ident { context, .. } => *context = ::core::option::Option::Some(value), }
    });

    let get_arms = variants.iter().map(|v| {
        let ident = &v.ident;
        quote! { Self::#ident { context, .. } => context.as_deref(), }
    });

    let mut seen = FxHashSet::default();
    let mut source_impls = Vec::new();
    for variant in &variants {
        let Some(source) = &variant.source else { continue };
        if !source.convertible {
            continue;
        }
        let ty = &source.ty;
        if !seen.insert(quote!(#ty).to_string()) {
            continue;
        }
        let ident = &variant.ident;
        source_impls.push(quote! {
            impl ::core::convert::From<#ty> for #name {
                fn from(source: #ty) -> Self {
                    Self::#ident { source, context: ::core::option::Option::None }
                }
            }

            impl<T> #ext<T> for ::core::result::Result<T, #ty> {
                fn context(
                    self,
                    context: impl ::core::convert::Into<::std::borrow::Cow<'static, str>>,
                ) -> ::core::result::Result<T, #name> {
                    let context = context.into();
                    self.map_err(|source| #name::#ident {
                        source,
                        context: ::core::option::Option::Some(context),
                    })
                }
            }
        });
    }

    let internal_impls = variants.iter().any(|v| v.internal).then(|| {
        quote! {
            impl ::core::convert::From<&'static str> for #name {
                fn from(message: &'static str) -> Self {
                    Self::Internal {
                        message: message.into(),
                        context: ::core::option::Option::None,
                    }
                }
            }

            impl ::core::convert::From<::std::string::String> for #name {
                fn from(message: ::std::string::String) -> Self {
                    Self::Internal {
                        message: message.into(),
                        context: ::core::option::Option::None,
                    }
                }
            }
        }
    });

    Ok(quote! {
        #[derive(::core::fmt::Debug, ::thiserror::Error)]
        #input

        /// Result type bound to this module's error enum.
        #vis type Result<T, E = #name> = ::core::result::Result<T, E>;

        #[allow(dead_code, clippy::ref_option)]
        fn format_context(
            context: &::core::option::Option<::std::borrow::Cow<'static, str>>,
        ) -> ::std::string::String {
            context.as_ref().map_or_else(::std::string::String::new, |c| ::std::format!(" ({c})"))
        }

        impl #name {
            /// Replaces the context attached to this error.
            #[allow(dead_code)]
            #vis fn set_context(&mut self, value: ::std::borrow::Cow<'static, str>) {
                match self {
                    #(#set_arms)*
                }
            }

            /// Returns the context attached to this error, if any.
            #[allow(dead_code)]
            #[must_use]
            #vis fn context_message(&self) -> ::core::option::Option<&str> {
                match self {
                    #(#get_arms)*
                }
            }
        }

        /// Adds `.context(..)` to results that convert into this error.
        #vis trait #ext<T> {
            /// Attaches a human readable context to the error.
            ///
            /// # Errors
            /// Returns the original error wrapped with the given context.
            fn context(
                self,
                context: impl ::core::convert::Into<::std::borrow::Cow<'static, str>>,
            ) -> ::core::result::Result<T, #name>;
        }

        impl<T> #ext<T> for ::core::result::Result<T, #name> {
            fn context(
                self,
                context: impl ::core::convert::Into<::std::borrow::Cow<'static, str>>,
            ) -> ::core::result::Result<T, #name> {
                let context = context.into();
                self.map_err(|mut err| {
                    err.set_context(context);
                    err
                })
            }
        }

        #(#source_impls)*

        #internal_impls
    })
}

fn is_option(ty: &Type) -> bool {
    let Type::Path(path) = ty else { return false };
    path.path.segments.last().is_some_and(|s| s.ident == "Option")
}
