// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `#[logged_test]` wraps a test in a [`dfs_test_utils::TestLoggerGuard`].
//!
//! The wrapped body sees a `logger` binding and every `tracing` event emitted
//! on the test thread lands in the test's log file.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, ItemFn, ReturnType, Type};

#[proc_macro_attribute]
pub fn logged_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            Span::call_site(),
            "#[logged_test] does not accept arguments",
        )
        .to_compile_error()
        .into();
    }

    let mut input = parse_macro_input!(item as ItemFn);

    if let Some(async_token) = &input.sig.asyncness {
        return syn::Error::new(
            async_token.span(),
            "#[logged_test] cannot be applied to async functions",
        )
        .to_compile_error()
        .into();
    }
    if !input.sig.inputs.is_empty() {
        return syn::Error::new(
            input.sig.ident.span(),
            "#[logged_test] can only be applied to functions without parameters",
        )
        .to_compile_error()
        .into();
    }

    input.attrs.retain(|attr| !attr.path().is_ident("logged_test"));

    let fn_ident = &input.sig.ident;
    let fn_name = fn_ident.to_string();
    let visibility = &input.vis;
    let generics = &input.sig.generics;
    let (returns_result, return_tokens) = classify_return(&input.sig.output);
    let finish = finish_body(returns_result);
    let block = &input.block;
    let other_attrs = &input.attrs;

    let expanded = quote! {
        #[::core::prelude::v1::test]
        #(#other_attrs)*
        #visibility fn #fn_ident #generics () #return_tokens {
            let mut __guard = ::dfs_test_utils::TestLoggerGuard::new(#fn_name)
                .expect("failed to create TestLogger");
            let mut logger = __guard.logger();
            let _ = &mut logger;

            let inner_result = { #block };
            drop(logger);
            #finish
        }
    };

    expanded.into()
}

fn classify_return(output: &ReturnType) -> (bool, TokenStream2) {
    match output {
        ReturnType::Default => (false, quote! {}),
        ReturnType::Type(arrow, ty) => (is_result_type(ty), quote! { #arrow #ty }),
    }
}

fn is_result_type(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Result"),
        _ => false,
    }
}

fn finish_body(returns_result: bool) -> TokenStream2 {
    if returns_result {
        quote! {
            match inner_result {
                ::std::result::Result::Ok(value) => {
                    if let Err(e) = __guard.finish_success() {
                        panic!("failed to finalize TestLogger: {}", e);
                    }
                    ::std::result::Result::Ok(value)
                }
                ::std::result::Result::Err(err) => {
                    let __err_msg = format!("{}", err);
                    if let Err(e) = __guard.finish_failure(&__err_msg) {
                        eprintln!("failed to finalize TestLogger after error: {}", e);
                    }
                    ::std::result::Result::Err(err)
                }
            }
        }
    } else {
        quote! {
            let value = inner_result;
            if let Err(e) = __guard.finish_success() {
                panic!("failed to finalize TestLogger: {}", e);
            }
            value
        }
    }
}
