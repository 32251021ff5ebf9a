//! Parse and validate async operation functions.

use std::collections::{HashMap, HashSet};
use syn::{
    Attribute, Error, Fields, FnArg, GenericArgument, Ident, Item, ItemFn, ItemMod, ItemStruct,
    Lit, Meta, Pat, PathArguments, Result, ReturnType, Type, TypePath, TypeTuple, Visibility,
};

/// One positional, `Direction::In` parameter of a SOAP operation function.
#[derive(Debug, Clone)]
pub struct SoapParam {
    pub name: Ident,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct SoapOperation {
    pub name: String,
    pub function_name: Ident,
    pub params: Vec<SoapParam>,
    /// `None` for a one-way operation (`Result<(), E>`).
    pub response_type: Option<Type>,
    /// Explicit `#[soap(action = "...")]` override, if the function declared one
    /// (spec §4.3: "its SOAP action is either explicit or derived").
    pub action_override: Option<String>,
}

pub fn extract_soap_operations(module: &ItemMod) -> Result<Vec<SoapOperation>> {
    let mut operations = Vec::new();

    if let Some((_, items)) = &module.content {
        for item in items {
            if let Item::Fn(func) = item {
                if is_valid_soap_function(func)? {
                    let operation = parse_soap_function(func)?;
                    operations.push(operation);
                }
            }
        }
    }

    Ok(operations)
}

/// Removes the `#[soap(...)]` helper attribute from every function and struct (and
/// struct field) in the module so the re-emitted module doesn't carry an attribute
/// no downstream macro understands (this macro's own parse pass is the only
/// consumer of it).
pub fn strip_soap_attrs(module: &mut ItemMod) {
    if let Some((_, items)) = &mut module.content {
        for item in items.iter_mut() {
            match item {
                Item::Fn(func) => {
                    func.attrs.retain(|attr| !attr.path().is_ident("soap"));
                }
                Item::Struct(s) => {
                    s.attrs.retain(|attr| !attr.path().is_ident("soap"));
                    for field in s.fields.iter_mut() {
                        field.attrs.retain(|attr| !attr.path().is_ident("soap"));
                    }
                }
                _ => {}
            }
        }
    }
}

fn is_soap_attr(attr: &Attribute) -> bool {
    attr.path().is_ident("soap")
}

/// Collects each struct's declared `#[soap(known_type = "...")]` names (spec §4.3's
/// "a set of known types used for polymorphic deserialization"), keyed by struct
/// name. The attribute is repeatable: `#[soap(known_type = "A")] #[soap(known_type
/// = "B")]` declares both.
pub fn collect_known_types(module: &ItemMod) -> Result<HashMap<String, Vec<String>>> {
    let mut map = HashMap::new();
    if let Some((_, items)) = &module.content {
        for item in items {
            if let Item::Struct(s) = item {
                let mut known = Vec::new();
                for attr in &s.attrs {
                    if !is_soap_attr(attr) {
                        continue;
                    }
                    if let Meta::List(list) = &attr.meta {
                        list.parse_nested_meta(|meta| {
                            if meta.path.is_ident("known_type") {
                                let value = meta.value()?;
                                let lit: Lit = value.parse()?;
                                if let Lit::Str(lit_str) = lit {
                                    known.push(lit_str.value());
                                    Ok(())
                                } else {
                                    Err(meta.error("expected a string literal for `known_type`"))
                                }
                            } else {
                                Err(meta.error("unknown key in #[soap(...)]"))
                            }
                        })?;
                    }
                }
                if !known.is_empty() {
                    map.insert(s.ident.to_string(), known);
                }
            }
        }
    }
    Ok(map)
}

/// Breadth-first closure over `collect_known_types`'s map, starting from `root`:
/// `A` declaring `B` as a known type, and `B` declaring `C`, makes `C` reachable
/// from `A` too. Cycle-safe.
pub fn transitive_known_types(root: &str, map: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut queue: Vec<String> = map.get(root).cloned().unwrap_or_default();
    let mut result = Vec::new();
    while let Some(name) = queue.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        if let Some(next) = map.get(&name) {
            queue.extend(next.iter().cloned());
        }
        result.push(name);
    }
    result
}

/// What role a response-struct field plays in spec §4.4's response-building pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFieldRole {
    /// An `Out<T>`/`InOut<T>`-wrapped field, read back as an out-parameter value.
    OutOrInOut,
    /// A `#[soap(header)]`-marked field, emitted as a SOAP header instead of body.
    Header,
}

#[derive(Debug, Clone)]
pub struct ResponseField {
    pub field_name: Ident,
    /// The unwrapped `T` for `Out<T>`/`InOut<T>`, or the field's own type for `Header`.
    pub inner_ty: Type,
    pub role: ResponseFieldRole,
}

fn is_soap_header_attr(attr: &Attribute) -> bool {
    if !is_soap_attr(attr) {
        return false;
    }
    let mut is_header = false;
    if let Meta::List(list) = &attr.meta {
        let _ = list.parse_nested_meta(|meta| {
            if meta.path.is_ident("header") {
                is_header = true;
            }
            Ok(())
        });
    }
    is_header
}

/// Unwraps `Out<T>`/`InOut<T>` to `T`, or returns `None` if `ty` isn't one of those
/// wrapper types.
fn out_or_inout_inner_type(ty: &Type) -> Option<Type> {
    let Type::Path(TypePath { path, .. }) = ty else {
        return None;
    };
    let segment = path.segments.last()?;
    if segment.ident != "Out" && segment.ident != "InOut" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner.clone()),
        _ => None,
    }
}

/// Scans every struct in the module for `Out<T>`/`InOut<T>` and `#[soap(header)]`
/// marked fields, keyed by struct name. Used to generate `OperationDescription`'s
/// `out_readers`/`response_headers` for a response type (spec §4.4).
pub fn collect_all_response_fields(module: &ItemMod) -> HashMap<String, Vec<ResponseField>> {
    let mut map = HashMap::new();
    if let Some((_, items)) = &module.content {
        for item in items {
            if let Item::Struct(s) = item {
                let fields = response_fields_of(s);
                if !fields.is_empty() {
                    map.insert(s.ident.to_string(), fields);
                }
            }
        }
    }
    map
}

fn response_fields_of(s: &ItemStruct) -> Vec<ResponseField> {
    let Fields::Named(named) = &s.fields else {
        return Vec::new();
    };
    named
        .named
        .iter()
        .filter_map(|field| {
            let field_name = field.ident.clone()?;
            if let Some(inner_ty) = out_or_inout_inner_type(&field.ty) {
                return Some(ResponseField {
                    field_name,
                    inner_ty,
                    role: ResponseFieldRole::OutOrInOut,
                });
            }
            if field.attrs.iter().any(is_soap_header_attr) {
                return Some(ResponseField {
                    field_name,
                    inner_ty: field.ty.clone(),
                    role: ResponseFieldRole::Header,
                });
            }
            None
        })
        .collect()
}

fn parse_action_override(func: &ItemFn) -> Result<Option<String>> {
    for attr in &func.attrs {
        if !attr.path().is_ident("soap") {
            continue;
        }
        let mut action = None;
        if let Meta::List(list) = &attr.meta {
            list.parse_nested_meta(|meta| {
                if meta.path.is_ident("action") {
                    let value = meta.value()?;
                    let lit: Lit = value.parse()?;
                    if let Lit::Str(lit_str) = lit {
                        action = Some(lit_str.value());
                        Ok(())
                    } else {
                        Err(meta.error("expected a string literal for `action`"))
                    }
                } else {
                    Err(meta.error("unknown key in #[soap(...)]"))
                }
            })?;
        }
        return Ok(action);
    }
    Ok(None)
}

fn is_valid_soap_function(func: &ItemFn) -> Result<bool> {
    if !matches!(func.vis, Visibility::Public(_)) {
        return Ok(false);
    }
    if func.sig.asyncness.is_none() {
        return Ok(false);
    }
    Ok(true)
}

fn parse_soap_function(func: &ItemFn) -> Result<SoapOperation> {
    let function_name = func.sig.ident.clone();
    let name = generate_operation_name(&function_name);

    let params = extract_params(func)?;
    let response_type = extract_response_type(func)?;
    let action_override = parse_action_override(func)?;

    Ok(SoapOperation {
        name,
        function_name,
        params,
        response_type,
        action_override,
    })
}

/// Last path-segment identifier of a type, as an owned string (e.g. `Foo::Bar<T>`
/// -> `"Bar"`).
pub fn type_ident_name(ty: &Type) -> Option<String> {
    let Type::Path(TypePath { path, .. }) = ty else {
        return None;
    };
    path.segments.last().map(|s| s.ident.to_string())
}

/// Unwraps `Option<T>` to `T`, or returns `None` if `ty` isn't `Option<...>`.
pub fn option_inner_type(ty: &Type) -> Option<Type> {
    let Type::Path(TypePath { path, .. }) = ty else {
        return None;
    };
    let segment = path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner.clone()),
        _ => None,
    }
}

/// Converts a snake_case function name to a PascalCase operation name.
pub fn generate_operation_name(function_name: &Ident) -> String {
    let func_str = function_name.to_string();
    func_str
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect()
}

/// Extracts every parameter as a positional, in-only binding. Macro-generated
/// services only support `Direction::In` parameters bound by declaration order
/// (spec's Argument Binder Case A); `Out`/`InOut` and message-contract parameters
/// are available to hand-written `OperationDescription`s but not yet to this
/// attribute.
fn extract_params(func: &ItemFn) -> Result<Vec<SoapParam>> {
    func.sig
        .inputs
        .iter()
        .map(|arg| match arg {
            FnArg::Typed(pat_type) => match pat_type.pat.as_ref() {
                Pat::Ident(pat_ident) => Ok(SoapParam {
                    name: pat_ident.ident.clone(),
                    ty: (*pat_type.ty).clone(),
                }),
                other => Err(Error::new_spanned(
                    other,
                    "SOAP operation parameters must be simple identifiers",
                )),
            },
            FnArg::Receiver(_) => Err(Error::new_spanned(
                &func.sig,
                "SOAP operation functions cannot have self parameters",
            )),
        })
        .collect()
}

fn extract_response_type(func: &ItemFn) -> Result<Option<Type>> {
    let return_type = match &func.sig.output {
        ReturnType::Default => {
            return Err(Error::new_spanned(
                &func.sig,
                "SOAP operation functions must return Result<ResponseType, ErrorType>",
            ));
        }
        ReturnType::Type(_, ty) => ty,
    };

    if let Type::Path(TypePath { path, .. }) = return_type.as_ref() {
        if let Some(segment) = path.segments.last() {
            if segment.ident == "Result" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if args.args.len() == 2 {
                        let response_type = match &args.args[0] {
                            GenericArgument::Type(ty) => ty.clone(),
                            _ => {
                                return Err(Error::new_spanned(
                                    return_type,
                                    "Invalid Result type: first argument must be a type",
                                ));
                            }
                        };
                        if matches!(&response_type, Type::Tuple(TypeTuple { elems, .. }) if elems.is_empty())
                        {
                            return Ok(None);
                        }
                        return Ok(Some(response_type));
                    }
                }
            }
        }
    }

    Err(Error::new_spanned(
        return_type,
        "Function must return Result<ResponseType, ErrorType>",
    ))
}
