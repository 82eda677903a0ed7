//! The `#[handcam::main]` attribute.
//!
//! `handcam` re-exports everything in here. Depend on that crate instead of this one.

use proc_macro::{Span, TokenStream};
use quote::quote;
use syn::{parse::Error, ItemFn};

/// Wraps `fn main` so that it runs next to the window event loop.
///
/// The generated entry point installs the logger, then hands the annotated function to
/// `handcam::run`. That function owns the main thread for the event loop and runs `main` on a
/// thread of its own.
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    expand_main(args, item.clone()).unwrap_or_else(|err| {
        // The function is emitted unchanged next to the error.
        let mut tokens = item;
        tokens.extend(TokenStream::from(err.to_compile_error()));
        tokens
    })
}

fn expand_main(args: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    if !args.is_empty() {
        let msg = "`#[handcam::main]` takes no arguments";
        return Err(Error::new(Span::call_site().into(), msg));
    }

    let entry = syn::parse::<ItemFn>(item)?;
    let sig = &entry.sig;
    let problem = if sig.ident != "main" {
        Some("`#[handcam::main]` only goes on `fn main`")
    } else if sig.asyncness.is_some() {
        Some("`#[handcam::main]` entry points cannot be `async`")
    } else {
        None
    };
    if let Some(msg) = problem {
        return Err(Error::new(sig.ident.span(), msg));
    }

    Ok(quote! {
        fn main() {
            #entry

            ::handcam::init_logger!();
            ::handcam::run(main);
        }
    }
    .into())
}
