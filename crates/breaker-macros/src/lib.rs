// breaker-macros: declared-method tables for breaker
//
// Provides the #[reflect] attribute, which turns an inherent impl block
// into a `breaker::Reflected` implementation declaring every method in it,
// private ones included.
//
// Example:
// ```
// #[reflect(extends = Shape)]
// impl Circle {
//     pub fn area(&self) -> f64 { .. }
//     fn scale(&mut self, factor: f64) { .. }
//     #[reflect(skip)]
//     fn internal(&self) { .. }
// }
// ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemImpl};

mod reflect;

/// Declares every method of an inherent `impl` block for reflection.
///
/// Generates an implementation of `breaker::Reflected` for the impl's self
/// type. Each method is declared with:
/// - its Rust name (or `#[reflect(name = "...")]`)
/// - its visibility: `pub` is public, `pub(crate)`/`pub(super)`/`pub(in ..)`
///   is package, no modifier or `pub(self)` is private, `#[reflect(protected)]`
///   is protected
/// - one parameter type per argument, in primitive form for scalar types
///   (`i32`, `bool`, `f64`, ...) and reference form otherwise
/// - its return type; methods returning `Result<T, E>` are fallible and
///   their `Err` surfaces as an invocation failure
///
/// Methods taking `&self` or `&mut self` become instance methods, methods
/// without a receiver become static methods. `#[reflect(skip)]` leaves a
/// method out.
///
/// Arguments: `#[reflect(extends = Path)]` records a superclass.
///
/// # Example
///
/// ```ignore
/// #[reflect]
/// impl Account {
///     fn audit(&self) -> String {
///         format!("balance={}", self.balance)
///     }
/// }
///
/// registry.register::<Account>();
/// ```
#[proc_macro_attribute]
pub fn reflect(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = reflect::ReflectArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(meta));
    parse_macro_input!(attr with parser);

    let input = parse_macro_input!(item as ItemImpl);
    reflect::expand_reflect(args, input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
