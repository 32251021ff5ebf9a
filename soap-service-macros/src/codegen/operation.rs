//! Builds the `soap_service::model::ServiceDescription` metadata table for an
//! annotated module: one generated item per operation function, replacing the
//! runtime reflection a hosted C# service would use with values computed once at
//! compile time (spec's build-time metadata table, `SPEC_FULL.md` §9).

use crate::parser::{
    option_inner_type, type_ident_name, transitive_known_types, generate_operation_name,
    ResponseField, ResponseFieldRole, ServiceConfig, SoapOperation,
};
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use std::collections::HashMap;
use syn::{Ident, ItemMod, Result, Type};

pub fn expand_service_module(
    mut module: ItemMod,
    config: &ServiceConfig,
    operations: &[SoapOperation],
    known_types_map: &HashMap<String, Vec<String>>,
    response_fields_map: &HashMap<String, Vec<ResponseField>>,
) -> Result<TokenStream2> {
    let namespace = &config.namespace;
    let service_name = &config.service_name;
    let bind_path = &config.bind_path;

    let operation_exprs: Vec<TokenStream2> = operations
        .iter()
        .map(|op| build_operation_expr(op, namespace, service_name, known_types_map, response_fields_map))
        .collect::<Result<Vec<_>>>()?;

    let generated = quote! {
        /// The SOAP action / addressing namespace this service's operations live under.
        pub const NAMESPACE: &str = #namespace;
        /// The HTTP path this service expects to be bound at.
        pub const BIND_PATH: &str = #bind_path;

        /// Builds this module's [`soap_service::model::ContractDescription`]. Called once,
        /// at endpoint construction; the result is immutable and shared across requests.
        pub fn contract_description() -> ::soap_service::model::ContractDescription {
            ::soap_service::model::ContractDescription {
                name: #service_name.to_string(),
                target_namespace: #namespace.to_string(),
                operations: vec![ #(#operation_exprs),* ],
            }
        }

        /// Builds the single-contract [`soap_service::model::ServiceDescription`] for this
        /// module. Fails only if two operations resolve to the same trimmed SOAP action.
        pub fn service_description() -> ::std::result::Result<::soap_service::model::ServiceDescription, ::soap_service::error::ModelError> {
            ::soap_service::model::ServiceDescription::new(vec![contract_description()])
        }
    };

    if let Some((_, ref mut items)) = module.content {
        let generated_items: syn::File = syn::parse2(generated)?;
        items.extend(generated_items.items);
    }

    Ok(quote! { #module })
}

/// Builds one `OperationDescription` value expression: its parameter table, its
/// type-erased invoke closure, and the response codec/action strings around it.
fn build_operation_expr(
    op: &SoapOperation,
    namespace: &str,
    service_name: &str,
    known_types_map: &HashMap<String, Vec<String>>,
    response_fields_map: &HashMap<String, Vec<ResponseField>>,
) -> Result<TokenStream2> {
    let op_name = &op.name;
    let function_name = &op.function_name;
    let is_one_way = op.response_type.is_none();

    let mut param_exprs = Vec::with_capacity(op.params.len());
    let mut binding_stmts = Vec::with_capacity(op.params.len());
    let mut call_args = Vec::with_capacity(op.params.len());

    for (index, param) in op.params.iter().enumerate() {
        let ty = &param.ty;
        let param_name = param.name.to_string();
        let binding: Ident = format_ident!("__arg_{}", index);

        param_exprs.push(quote! {
            ::soap_service::model::ParameterDescription {
                index: #index,
                name: #param_name.to_string(),
                namespace: Some(#namespace.to_string()),
                direction: ::soap_service::model::Direction::In,
                codec: ::soap_service::value::ParamCodec {
                    deserialize_data_contract: ::soap_service::value::decode_data_contract::<#ty>,
                    deserialize_xml_serializer: ::soap_service::value::decode_xml_serializer::<#ty>,
                    serialize_data_contract: ::soap_service::value::encode_data_contract::<#ty>,
                    default_value: ::soap_service::value::default_value_of::<#ty>,
                },
                is_request_context: false,
            }
        });

        binding_stmts.push(quote! {
            let #binding = *__args_iter
                .next()
                .ok_or_else(|| ::soap_service::error::InvocationError::User(
                    format!("missing argument `{}`", #param_name)
                ))?
                .downcast::<#ty>()
                .map_err(|_| ::soap_service::error::InvocationError::User(
                    format!("argument `{}` had an unexpected type", #param_name)
                ))?;
        });
        call_args.push(quote! { #binding });
    }

    let invoke_and_response = if let Some(response_type) = &op.response_type {
        quote! {
            let __invoke: ::soap_service::value::InvokeFn = ::std::sync::Arc::new(
                move |_instance, __args| {
                    Box::pin(async move {
                        let mut __args_iter = __args.into_iter();
                        #(#binding_stmts)*
                        match #function_name(#(#call_args),*).await {
                            Ok(value) => Ok(::soap_service::value::InvocationOutcome {
                                return_value: Some(Box::new(value) as ::soap_service::value::BoxAny),
                            }),
                            Err(err) => Err(::soap_service::error::InvocationError::User(err.to_string())),
                        }
                    })
                },
            );
            let __response_codec = Some(::soap_service::value::ParamCodec {
                deserialize_data_contract: ::soap_service::value::decode_data_contract::<#response_type>,
                deserialize_xml_serializer: ::soap_service::value::decode_xml_serializer::<#response_type>,
                serialize_data_contract: ::soap_service::value::encode_data_contract::<#response_type>,
                default_value: ::soap_service::value::default_value_of::<#response_type>,
            });
            (__invoke, __response_codec)
        }
    } else {
        quote! {
            let __invoke: ::soap_service::value::InvokeFn = ::std::sync::Arc::new(
                move |_instance, __args| {
                    Box::pin(async move {
                        let mut __args_iter = __args.into_iter();
                        #(#binding_stmts)*
                        match #function_name(#(#call_args),*).await {
                            Ok(()) => Ok(::soap_service::value::InvocationOutcome {
                                return_value: None,
                            }),
                            Err(err) => Err(::soap_service::error::InvocationError::User(err.to_string())),
                        }
                    })
                },
            );
            let __response_codec = None;
            (__invoke, __response_codec)
        }
    };

    // spec §4.3: "its SOAP action is either explicit or derived
    // `<contract-namespace>/<contract-name>/<operation-name>`".
    let soap_action = op
        .action_override
        .clone()
        .unwrap_or_else(|| format!("{namespace}/{service_name}/{op_name}"));
    let reply_action = if is_one_way {
        quote! { None }
    } else {
        let reply = format!("{namespace}/{service_name}/{op_name}Response");
        quote! { Some(#reply.to_string()) }
    };
    let response_element = format!("{op_name}Response");

    // spec §4.3: known types are declared on the *parameter's* struct and resolved
    // transitively; a macro-generated operation only has one candidate to root the
    // search at, its first declared parameter.
    let known_type_names: Vec<String> = op
        .params
        .first()
        .and_then(|p| type_ident_name(&p.ty))
        .map(|name| transitive_known_types(&name, known_types_map))
        .unwrap_or_default();
    let known_type_exprs = known_type_names.iter().map(|s| quote! { #s.to_string() });

    let (out_reader_exprs, response_header_exprs) = match &op.response_type {
        Some(response_type) => {
            let type_name = type_ident_name(response_type).unwrap_or_default();
            let fields = response_fields_map
                .get(&type_name)
                .cloned()
                .unwrap_or_default();
            build_response_field_exprs(&fields, response_type)
        }
        None => (Vec::new(), Vec::new()),
    };

    Ok(quote! {
        {
            let (__invoke, __response_codec) = { #invoke_and_response };
            ::soap_service::model::OperationDescription {
                name: #op_name.to_string(),
                soap_action: #soap_action.to_string(),
                reply_action: #reply_action,
                invoke: __invoke,
                parameters: vec![ #(#param_exprs),* ],
                is_one_way: #is_one_way,
                message_contract: None,
                message_contract_response: false,
                response_codec: __response_codec,
                response_element: #response_element.to_string(),
                response_namespace: #namespace.to_string(),
                format_style: ::soap_service::model::FormatStyle::Document,
                serializer: ::soap_service::model::Serializer::DataContract,
                known_types: vec![ #(#known_type_exprs),* ],
                out_readers: vec![ #(#out_reader_exprs),* ],
                response_headers: vec![ #(#response_header_exprs),* ],
            }
        }
    })
}

/// Builds the `OutReader`/`ResponseHeaderReader` expressions for a response type's
/// `Out<T>`/`InOut<T>` and `#[soap(header)]`-marked fields (spec §4.4 response
/// building). Each `read` closure captures nothing — only the response type and a
/// field identifier, both spliced as literal tokens — so it coerces directly to the
/// `fn` pointer the model requires.
fn build_response_field_exprs(
    fields: &[ResponseField],
    response_type: &Type,
) -> (Vec<TokenStream2>, Vec<TokenStream2>) {
    let mut out_readers = Vec::new();
    let mut response_headers = Vec::new();

    for field in fields {
        let field_ident = &field.field_name;
        let element_name = generate_operation_name(field_ident);

        match field.role {
            ResponseFieldRole::OutOrInOut => {
                out_readers.push(quote! {
                    ::soap_service::model::OutReader {
                        parameter_name: #element_name.to_string(),
                        read: |__resp: &::soap_service::value::BoxAny| -> ::std::result::Result<String, ::soap_service::error::BindingError> {
                            let __typed = __resp.downcast_ref::<#response_type>().ok_or_else(|| {
                                ::soap_service::error::BindingError::Serialize {
                                    parameter: #element_name.to_string(),
                                    source: "response object had an unexpected type".to_string(),
                                }
                            })?;
                            Ok(__typed.#field_ident.0.to_string())
                        },
                    }
                });
            }
            ResponseFieldRole::Header => {
                let read_body = if let Some(_inner) = option_inner_type(&field.inner_ty) {
                    quote! { Ok(__typed.#field_ident.as_ref().map(|v| v.to_string())) }
                } else {
                    quote! { Ok(Some(__typed.#field_ident.to_string())) }
                };
                response_headers.push(quote! {
                    ::soap_service::model::ResponseHeaderReader {
                        name: #element_name.to_string(),
                        namespace: None,
                        must_understand: false,
                        read: |__resp: &::soap_service::value::BoxAny| -> ::std::result::Result<Option<String>, ::soap_service::error::BindingError> {
                            let __typed = __resp.downcast_ref::<#response_type>().ok_or_else(|| {
                                ::soap_service::error::BindingError::Serialize {
                                    parameter: #element_name.to_string(),
                                    source: "response object had an unexpected type".to_string(),
                                }
                            })?;
                            #read_body
                        },
                    }
                });
            }
        }
    }

    (out_readers, response_headers)
}
