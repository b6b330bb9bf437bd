use darling::ast::NestedMeta;
use darling::FromMeta;
use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;
use syn::{FnArg, ItemFn, ReturnType, Type};

use crate::common::{format_error_span, to_camel_case};

/// Options accepted by `#[job(...)]`
#[derive(Debug, Default, FromMeta)]
pub struct JobOptions {
    /// Name the function is registered under; defaults to the Rust name
    #[darling(default)]
    name: Option<String>,
    /// Name of the generated handler struct; defaults to `<CamelName>Job`
    #[darling(default)]
    handler: Option<String>,
}

/// Parse the attribute arguments into options
pub fn parse_job_args(args: TokenStream) -> Result<JobOptions, TokenStream> {
    if args.is_empty() {
        return Ok(JobOptions::default());
    }
    let items = NestedMeta::parse_meta_list(args).map_err(|e| e.to_compile_error())?;
    JobOptions::from_list(&items).map_err(|e| e.write_errors())
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Default => false,
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(path) => path
                .path
                .segments
                .last()
                .map(|segment| segment.ident == "Result")
                .unwrap_or(false),
            _ => false,
        },
    }
}

/// Expand `#[job]` on a free function
pub fn expand_job(options: JobOptions, item: ItemFn) -> TokenStream {
    let sig = &item.sig;

    if !sig.generics.params.is_empty() {
        return format_error_span(&sig.generics, "#[job] functions cannot be generic");
    }
    if sig.inputs.len() > 1 {
        return format_error_span(
            &sig.inputs,
            "#[job] functions take at most one argument; bundle inputs into a struct",
        );
    }

    let fn_ident = &sig.ident;
    let vis = &item.vis;
    let job_name = options.name.unwrap_or_else(|| fn_ident.to_string());
    let handler_ident = Ident::new(
        &options
            .handler
            .unwrap_or_else(|| format!("{}Job", to_camel_case(&fn_ident.to_string()))),
        Span::call_site(),
    );

    // Decode the single argument, or ignore the wire arguments entirely
    let (decode, call_args) = match sig.inputs.first() {
        None => (quote! { let _ = args; }, quote! {}),
        Some(FnArg::Receiver(receiver)) => {
            return format_error_span(receiver, "#[job] cannot be applied to methods");
        }
        Some(FnArg::Typed(typed)) => {
            let ty = &typed.ty;
            (
                quote! {
                    let input: #ty = ::flock_api::function::decode_args(#job_name, args)?;
                },
                quote! { input },
            )
        }
    };

    let invoke = if sig.asyncness.is_some() {
        quote! { #fn_ident(#call_args).await }
    } else {
        quote! { #fn_ident(#call_args) }
    };

    let finish = if returns_result(&sig.output) {
        quote! {
            let output = output.map_err(|e| e.to_string())?;
            ::flock_api::function::encode_output(#job_name, output)
        }
    } else {
        quote! {
            ::flock_api::function::encode_output(#job_name, output)
        }
    };

    quote! {
        #item

        #[doc = concat!("Job handler running `", stringify!(#fn_ident), "` under the name `", #job_name, "`.")]
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #handler_ident;

        #[::flock_api::__async_trait]
        impl ::flock_api::JobFunction for #handler_ident {
            fn name(&self) -> &str {
                #job_name
            }

            async fn call(
                &self,
                args: ::flock_api::__Value,
            ) -> ::std::result::Result<::flock_api::__Value, ::std::string::String> {
                #decode
                let output = #invoke;
                #finish
            }
        }
    }
}
