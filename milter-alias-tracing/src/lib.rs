extern crate proc_macro;

use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use syn::{ItemFn, Stmt, parse::Parse, parse_macro_input, parse_quote};

/// Unit used when reporting how long a traced function ran for.
#[derive(PartialEq, Eq, Clone, Copy, Default)]
enum Precision {
    #[default]
    Nanos,
    Micros,
    Millis,
    Seconds,
}

impl Precision {
    /// An expression turning a `Duration` into the reported `elapsed` field.
    fn formatter(self) -> syn::Expr {
        match self {
            Self::Nanos => parse_quote!(|d: std::time::Duration| format!("{}ns", d.as_nanos())),
            Self::Micros => parse_quote!(|d: std::time::Duration| format!("{}us", d.as_micros())),
            Self::Millis => parse_quote!(|d: std::time::Duration| format!("{}ms", d.as_millis())),
            Self::Seconds => parse_quote!(|d: std::time::Duration| format!("{}s", d.as_secs())),
        }
    }
}

impl TryFrom<&str> for Precision {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "ns" | "nanos" | "nanoseconds" => Ok(Self::Nanos),
            "us" | "micros" | "microseconds" => Ok(Self::Micros),
            "ms" | "millis" | "milliseconds" => Ok(Self::Millis),
            "s" | "secs" | "seconds" => Ok(Self::Seconds),
            other => Err(format!("unknown precision `{other}`")),
        }
    }
}

impl Parse for Precision {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        if !input.peek(syn::token::Paren) {
            return Ok(Self::default());
        }

        let content;
        let _ = syn::parenthesized!(content in input);
        let _ = content.parse::<keywords::precision>()?;
        let _ = content.parse::<syn::Token![=]>()?;
        let literal = content.parse::<syn::LitStr>()?;

        Self::try_from(literal.value().as_str())
            .map_err(|message| syn::Error::new(literal.span(), message))
    }
}

mod keywords {
    syn::custom_keyword!(timing);
    syn::custom_keyword!(precision);
    syn::custom_keyword!(instrument);
}

#[derive(Default)]
struct Attributes {
    timing: Option<Precision>,
    instrument: Option<TokenStream>,
    unrecognised: Vec<syn::Error>,
}

impl Attributes {
    /// Unknown arguments are reported as deprecation warnings rather than
    /// hard errors, so a typo never breaks the build.
    fn warnings(&self) -> TokenStream {
        let warnings = self.unrecognised.iter().map(|err| {
            let msg = syn::LitStr::new(&format!("traced: ignoring input, {err}"), err.span());

            quote_spanned! {err.span()=>
                #[warn(deprecated)]
                {
                    #[deprecated(since = "not actually deprecated", note = #msg)]
                    const TRACED_WARNING: () = ();
                    let _ = TRACED_WARNING;
                }
            }
        });

        quote! { { #(#warnings)* } }
    }
}

impl Parse for Attributes {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let mut attributes = Self::default();

        while !input.is_empty() {
            let lookahead = input.lookahead1();
            if lookahead.peek(keywords::timing) {
                if attributes.timing.is_some() {
                    return Err(input.error("`timing` may only be given once"));
                }

                let _ = input.parse::<keywords::timing>()?;
                attributes.timing = Some(input.parse()?);
            } else if lookahead.peek(keywords::instrument) {
                if attributes.instrument.is_some() {
                    return Err(input.error("`instrument` may only be given once"));
                }

                let _ = input.parse::<keywords::instrument>()?;
                attributes.instrument = Some(if input.peek(syn::token::Paren) {
                    let content;
                    let _ = syn::parenthesized!(content in input);
                    content.parse()?
                } else {
                    TokenStream::new()
                });
            } else if lookahead.peek(syn::Token![,]) {
                let _ = input.parse::<syn::Token![,]>()?;
            } else {
                attributes.unrecognised.push(lookahead.error());
                let _ = input.parse::<proc_macro2::TokenTree>();
            }
        }

        Ok(attributes)
    }
}

/// Emits `trace` events when the attributed function is entered and when it
/// returns.
///
/// ```ignore
/// #[traced(instrument(level = tracing::Level::DEBUG, skip(self)), timing(precision = "ms"))]
/// async fn search(&self, base: &str) -> Result<(), Error> { ... }
/// ```
///
/// - `instrument(...)` forwards its arguments to `#[tracing::instrument]`.
/// - `timing` adds an `elapsed` field to the exit event, in nanoseconds
///   unless a `precision` of `"us"`, `"ms"` or `"s"` is given.
///
/// The expansion refers to `tracing::` by path, so the calling crate must
/// depend on `tracing`.
///
/// # Panics
///
/// When applied to anything other than a function.
#[proc_macro_attribute]
pub fn traced(
    args: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let args = parse_macro_input!(args as Attributes);
    let warnings = args.warnings();

    let mut item_fn = parse_macro_input!(item as ItemFn);

    item_fn
        .attrs
        .push(parse_quote! { #[allow(clippy::items_after_statements)] });

    if let Some(fields) = &args.instrument {
        item_fn
            .attrs
            .push(parse_quote! { #[tracing::instrument(#fields)] });
    }

    let name = item_fn.sig.ident.to_string();
    let on_exit: Stmt = match args.timing {
        None => parse_quote! { tracing::trace!(function = #name, "exit"); },
        Some(precision) => {
            let formatter = precision.formatter();
            parse_quote! {
                tracing::trace!(
                    function = #name,
                    elapsed = %(#formatter)(self.started.elapsed()),
                    "exit"
                );
            }
        }
    };

    let guard: Vec<Stmt> = parse_quote! {
        #[allow(dead_code)]
        struct __Traced {
            started: std::time::Instant,
        }

        impl __Traced {
            fn enter() -> Self {
                #warnings

                tracing::trace!(function = #name, "enter");
                Self {
                    started: std::time::Instant::now(),
                }
            }
        }

        impl std::ops::Drop for __Traced {
            fn drop(&mut self) {
                #on_exit
            }
        }

        let __traced = __Traced::enter();
    };

    item_fn.block.stmts.splice(0..0, guard);

    proc_macro::TokenStream::from(quote! { #item_fn })
}
