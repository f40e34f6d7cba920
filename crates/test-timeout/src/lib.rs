//! `#[timeout]` for synchronous tests that drive background threads.
//!
//! The test body runs on a helper thread; the harness thread waits on a
//! channel for at most the configured budget. A body that never returns
//! (for example a light loop that ignores `stop()`) fails the test instead of
//! hanging the whole run.
//!
//! ```ignore
//! #[test_timeout::timeout]            // 30 seconds
//! #[test_timeout::timeout(secs = 10)]
//! #[test_timeout::timeout(ms = 2500)]
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, Attribute, Ident, ItemFn, LitInt, Token};

const DEFAULT_BUDGET_MS: u64 = 30_000;

struct Budget {
    millis: u64,
}

impl Parse for Budget {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            return Ok(Budget {
                millis: DEFAULT_BUDGET_MS,
            });
        }

        let unit: Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        let value: LitInt = input.parse()?;
        let amount: u64 = value.base10_parse()?;
        if amount == 0 {
            return Err(syn::Error::new_spanned(value, "timeout must be greater than zero"));
        }

        let millis = match unit.to_string().as_str() {
            "secs" => amount.saturating_mul(1_000),
            "ms" => amount,
            other => {
                return Err(syn::Error::new_spanned(
                    unit,
                    format!("unknown timeout unit `{other}`, expected `secs` or `ms`"),
                ))
            }
        };
        if !input.is_empty() {
            return Err(input.error("unexpected tokens after timeout budget"));
        }
        Ok(Budget { millis })
    }
}

#[proc_macro_attribute]
pub fn timeout(attr: TokenStream, item: TokenStream) -> TokenStream {
    let Budget { millis } = parse_macro_input!(attr as Budget);

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = parse_macro_input!(item as ItemFn);

    if sig.asyncness.is_some() {
        return syn::Error::new_spanned(
            &sig.ident,
            "timeout expects a synchronous test function",
        )
        .to_compile_error()
        .into();
    }

    let name = sig.ident.to_string();
    let filtered_attrs: Vec<Attribute> = attrs
        .into_iter()
        .filter(|attr| !attr.path().is_ident("test"))
        .collect();

    TokenStream::from(quote! {
        #[test]
        #(#filtered_attrs)*
        #vis #sig {
            let budget = ::std::time::Duration::from_millis(#millis);
            let (sender, receiver) = ::std::sync::mpsc::channel();
            ::std::thread::Builder::new()
                .name(::std::format!("{}-body", #name))
                .spawn(move || {
                    let result = ::std::panic::catch_unwind(
                        ::std::panic::AssertUnwindSafe(|| #block),
                    );
                    let _ = sender.send(result);
                })
                .expect("spawn test body thread");
            match receiver.recv_timeout(budget) {
                Ok(Ok(_)) => {}
                Ok(Err(payload)) => ::std::panic::resume_unwind(payload),
                Err(::std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    panic!("test `{}` exceeded its {:?} budget", #name, budget)
                }
                Err(::std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    panic!("test `{}` body thread exited without reporting", #name)
                }
            }
        }
    })
}
