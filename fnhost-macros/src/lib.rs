//! Procedural macros for fnhost handler libraries.
//!
//! `#[handler]` turns a plain function into the pair of C-ABI symbols the
//! runtime resolves by name:
//!
//! ```ignore
//! use fnhost_sdk::{respond, json, Event, Value};
//!
//! #[fnhost_macros::handler]
//! pub fn handler(event: Event) -> Result<Value, String> {
//!     Ok(respond(200, json!({ "seen": event.path })))
//! }
//! ```
//!
//! expands to an exported `handler` and `handler_free`. The export name is
//! the function name, so `FUNCTION_HANDLER=app.handler` selects it.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, ItemFn};

#[proc_macro_attribute]
pub fn handler(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut func = parse_macro_input!(input as ItemFn);

    if !args.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[handler] takes no arguments",
        )
        .to_compile_error()
        .into();
    }
    if func.sig.asyncness.is_some() {
        return syn::Error::new_spanned(&func.sig, "handlers must be synchronous")
            .to_compile_error()
            .into();
    }

    let export_name = func.sig.ident.clone();
    let free_name = format_ident!("{}_free", export_name);
    let inner_name = format_ident!("__fnhost_{}", export_name);
    func.sig.ident = inner_name.clone();
    func.vis = syn::Visibility::Inherited;

    let expanded = quote! {
        #func

        /// Exported entry point (CBOR `Event` in, CBOR `Outcome` out).
        ///
        /// # Safety
        ///
        /// `req` must describe a readable byte slice. The returned buffer
        /// must be released with the matching `_free` symbol.
        #[no_mangle]
        pub unsafe extern "C" fn #export_name(req: fnhost_sdk::FnSlice) -> fnhost_sdk::FnOwned {
            use fnhost_sdk::Outcome;

            // Panics must not unwind across the FFI boundary.
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                if req.ptr.is_null() && req.len != 0 {
                    return Outcome::Err("null request pointer with non-zero length".to_string());
                }
                let bytes = if req.len == 0 {
                    &[][..]
                } else {
                    std::slice::from_raw_parts(req.ptr, req.len)
                };
                let event = match fnhost_sdk::decode_event(bytes) {
                    Ok(event) => event,
                    Err(e) => return Outcome::Err(e.to_string()),
                };
                match #inner_name(event) {
                    Ok(value) => Outcome::Ok(value),
                    Err(e) => Outcome::Err(e.to_string()),
                }
            }))
            .unwrap_or_else(|panic| {
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                Outcome::Err(format!("handler panicked: {}", message))
            });

            let bytes = fnhost_sdk::encode_outcome(&outcome).unwrap_or_default();
            fnhost_sdk::FnOwned::from_vec(bytes)
        }

        /// Release a buffer returned by the entry point.
        ///
        /// # Safety
        ///
        /// `buf` must come from this library's entry point, exactly once.
        #[no_mangle]
        pub unsafe extern "C" fn #free_name(buf: fnhost_sdk::FnOwned) {
            drop(buf.reclaim());
        }
    };

    expanded.into()
}
