//! The `#[service]` attribute: turns a module of plain async functions into a
//! `soap-service` metadata table. Rust has no runtime reflection, so where a
//! hosted service would normally discover its operations by inspecting the
//! class at startup, this macro computes the same `ServiceDescription` once, at
//! compile time, from the annotated module's function signatures.

mod codegen;
mod parser;

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemMod};

/// Builds a `contract_description()`/`service_description()` pair for every
/// `pub async fn` in the annotated module, bound under the given SOAP action
/// namespace. Each function becomes one operation: its parameters (by
/// declaration order) are the operation's `Direction::In` arguments, and its
/// return type must be `Result<T, E>` — `T` the response type, or `()` for a
/// one-way operation.
///
/// ```ignore
/// #[soap_service::service(
///     namespace = "http://example.com/calculator",
///     service_name = "Calculator",
///     port_name = "CalculatorPort",
///     bind_path = "/calculator"
/// )]
/// mod calculator {
///     pub async fn add(a: i32, b: i32) -> Result<i32, String> {
///         Ok(a + b)
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn service(args: TokenStream, input: TokenStream) -> TokenStream {
    let config = match parser::parse_service_attributes(args.into()) {
        Ok(config) => config,
        Err(e) => return e.to_compile_error().into(),
    };

    let mut module = parse_macro_input!(input as ItemMod);

    let operations = match parser::extract_soap_operations(&module) {
        Ok(ops) => ops,
        Err(e) => return e.to_compile_error().into(),
    };
    let known_types_map = match parser::collect_known_types(&module) {
        Ok(map) => map,
        Err(e) => return e.to_compile_error().into(),
    };
    let response_fields_map = parser::collect_all_response_fields(&module);
    parser::strip_soap_attrs(&mut module);

    match codegen::expand_service_module(module, &config, &operations, &known_types_map, &response_fields_map) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}
