use proc_macro::TokenStream;
use quote::quote;
use syn::parse::Nothing;
use syn::{ItemFn, parse_macro_input};

/// Turns `async fn name(ctx: &mut Context) -> Result<(), HandlerError>` into a
/// constructor `fn name() -> impl jim::Handler`.
///
/// The handler reports the function name from `Handler::name`.
///
/// ```rust,ignore
/// #[jim::handler]
/// async fn ping(ctx: &mut Context) -> Result<(), HandlerError> {
///     ctx.string(200, "pong");
///     Ok(())
/// }
///
/// engine.get("/ping", ping());
/// ```
#[proc_macro_attribute]
pub fn handler(args: TokenStream, input: TokenStream) -> TokenStream {
    parse_macro_input!(args as Nothing);
    let function = parse_macro_input!(input as ItemFn);
    if let Err(err) = validate(&function) {
        return TokenStream::from(err.to_compile_error());
    }

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = function;
    let name = &sig.ident;
    let inputs = &sig.inputs;
    let output = &sig.output;

    let generated = quote! {
        #(#attrs)*
        #vis fn #name() -> impl ::jim::Handler + 'static {
            async fn inner(#inputs) #output #block

            ::jim::handler_fn(|ctx| ::std::boxed::Box::pin(inner(ctx))).named(stringify!(#name))
        }
    };
    TokenStream::from(generated)
}

fn validate(function: &ItemFn) -> syn::Result<()> {
    let sig = &function.sig;
    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[handler] can only be applied to async functions.",
        ));
    }
    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "#[handler] functions cannot be generic.",
        ));
    }
    if sig.inputs.len() != 1 {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "#[handler] functions take exactly one `&mut Context` argument.",
        ));
    }
    Ok(())
}
