//! Argument Binder (spec §4.5): turns a request body/headers into the concrete
//! argument array an [`crate::model::OperationDescription`]'s invoke closure expects.

use crate::error::BindingError;
use crate::model::{Direction, FormatStyle, MessageContractInfo, OperationDescription, ParameterDescription};
use crate::value::BoxAny;
use crate::xml_util;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

/// Binds one operation's full argument array (spec §4.5's three cases).
pub struct ArgumentBinder;

impl ArgumentBinder {
    /// `body` is the raw bytes captured at the envelope's `<Body>` element (possibly
    /// empty); `headers` are the envelope's captured header fragments, keyed by local
    /// name; `request_context` is cloned into the ambient request-context parameter
    /// slot, if the operation declares one.
    pub fn bind(
        operation: &OperationDescription,
        body: &[u8],
        headers: &HashMap<String, String>,
        request_context: Option<BoxAny>,
    ) -> Result<Vec<Option<BoxAny>>, BindingError> {
        let mut args: Vec<Option<BoxAny>> = (0..operation.parameters.len()).map(|_| None).collect();

        if let Some(contract) = &operation.message_contract {
            Self::bind_message_contract(operation, contract, body, headers, &mut args)?;
        } else if xml_util::is_blank(body) {
            // Case B: no body, argument array stays empty/default.
        } else {
            Self::bind_positional(operation, body, &mut args)?;
        }

        if let Some(ctx_param) = operation.request_context_parameter() {
            if let Some(ctx) = request_context {
                args[ctx_param.index] = Some(ctx);
            }
        }

        Self::default_out_params(operation, &mut args);

        Ok(args)
    }

    /// Case A: a plain (non message-contract) request body, matched positionally by
    /// element local name against the operation's declared in-parameters.
    fn bind_positional(
        operation: &OperationDescription,
        body: &[u8],
        args: &mut [Option<BoxAny>],
    ) -> Result<(), BindingError> {
        let xml = std::str::from_utf8(body).map_err(|e| BindingError::Xml(e.to_string()))?;
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut buf = Vec::new();

        // Skip the operation wrapper start element, `<op-name xmlns="...">` (RPC/wrapped
        // document style both wrap a single root around the parameter elements).
        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| BindingError::Xml(e.to_string()))?
            {
                Event::Start(_) => break,
                Event::Empty(_) => return Ok(()),
                Event::Eof => return Ok(()),
                _ => {}
            }
            buf.clear();
        }
        buf.clear();

        let mut last_matched_index: Option<usize> = None;
        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| BindingError::Xml(e.to_string()))?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let local = xml_util::local_name(e.name().as_ref());
                    let is_empty = matches!(event, Event::Empty(_));
                    let captured = if is_empty {
                        format!("<{local}/>")
                    } else {
                        capture_rest(&mut reader, e)?
                    };

                    let param = operation
                        .in_parameters()
                        .find(|p| p.name == local && !p.is_request_context)
                        .or_else(|| known_type_fallback(operation, &local, args));

                    let Some(param) = param else {
                        buf.clear();
                        continue;
                    };

                    if last_matched_index == Some(param.index) {
                        break;
                    }

                    let value = param
                        .codec
                        .deserialize(&captured, operation.serializer)
                        .or_else(|_| {
                            // Retry with an explicit namespace on the captured root, for
                            // encoders that omitted the contract namespace inline.
                            if let Some(ns) = &param.namespace {
                                let with_ns = xml_util::add_namespace_to_root(&captured, ns);
                                param.codec.deserialize(&with_ns, operation.serializer)
                            } else {
                                param.codec.deserialize(&captured, operation.serializer)
                            }
                        })?;
                    args[param.index] = Some(value);
                    last_matched_index = Some(param.index);
                }
                Event::End(_) => break,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    /// Case C: the operation declares exactly one message-contract in-parameter.
    fn bind_message_contract(
        operation: &OperationDescription,
        contract: &MessageContractInfo,
        body: &[u8],
        headers: &HashMap<String, String>,
        args: &mut [Option<BoxAny>],
    ) -> Result<(), BindingError> {
        let param = operation
            .in_parameters()
            .find(|p| !p.is_request_context)
            .ok_or(BindingError::MissingMessageContractParameter)?;

        let mut member_values: HashMap<String, String> = HashMap::new();

        for header_member in &contract.headers {
            if let Some(fragment) = headers.get(&header_member.name) {
                let value = header_member
                    .codec
                    .deserialize(fragment, operation.serializer)?;
                let rendered = (header_member.codec.serialize_data_contract)(&value)?;
                member_values.insert(header_member.name.clone(), rendered);
            }
        }

        let xml = std::str::from_utf8(body).map_err(|e| BindingError::Xml(e.to_string()))?;
        let inner = if contract.is_wrapped {
            strip_wrapper(xml, &contract.wrapper_name)
        } else {
            xml.to_string()
        };

        let fragments = split_top_level_elements(&inner)?;
        let mut by_name: HashMap<String, String> = HashMap::new();
        for fragment in fragments {
            let local = fragment_local_name(&fragment)?;
            by_name.insert(local, fragment);
        }

        // Body parts are already sorted by declared order (MessageContractInfo::new);
        // iterate in that order so XmlSerializer-style positional decoding, where a
        // member's codec ignores its own tag name, still lines members up correctly.
        for part in &contract.body_parts {
            if let Some(fragment) = by_name.get(&part.name) {
                let value = part.codec.deserialize(fragment, operation.serializer)?;
                let rendered = (part.codec.serialize_data_contract)(&value)?;
                member_values.insert(part.name.clone(), rendered);
            }
        }

        let wrapper_value = (param.codec.deserialize_data_contract)(&render_wrapper(
            &contract.wrapper_name,
            &contract.wrapper_namespace,
            &member_values,
        ))?;
        args[param.index] = Some(wrapper_value);
        Ok(())
    }

    /// Out-parameter defaulting (spec §4.5 "Out parameter defaults"): idempotent, so
    /// running it twice leaves already-bound slots untouched.
    fn default_out_params(operation: &OperationDescription, args: &mut [Option<BoxAny>]) {
        for param in &operation.parameters {
            if matches!(param.direction, Direction::Out) && args[param.index].is_none() {
                args[param.index] = Some((param.codec.default_value)());
            }
            if matches!(param.direction, Direction::InOut) && args[param.index].is_none() {
                args[param.index] = Some((param.codec.default_value)());
            }
        }
        let _ = operation.format_style; // document vs rpc only affects wrapper shape above.
    }
}

/// Known-type fallback (spec §4.3 "known types used for polymorphic deserialization"):
/// when a captured element's local name doesn't match any in-parameter by name, but
/// the operation declares it as a known type, bind it to the operation's sole
/// remaining unmatched in-parameter. This is a deliberate, operation-scoped
/// simplification of full polymorphic dispatch — Rust has no runtime type hierarchy
/// to walk, so it only resolves when exactly one candidate slot is open; an
/// operation with more than one unmatched in-parameter never guesses which one an
/// alternately-named element belongs to.
fn known_type_fallback<'a>(
    operation: &'a OperationDescription,
    local: &str,
    args: &[Option<BoxAny>],
) -> Option<&'a ParameterDescription> {
    if !operation.known_types.iter().any(|kt| kt == local) {
        return None;
    }
    let mut unmatched = operation
        .in_parameters()
        .filter(|p| !p.is_request_context && args[p.index].is_none());
    let candidate = unmatched.next()?;
    if unmatched.next().is_some() {
        return None;
    }
    Some(candidate)
}

fn capture_rest(
    reader: &mut Reader<&[u8]>,
    start: &quick_xml::events::BytesStart,
) -> Result<String, BindingError> {
    use quick_xml::Writer;
    use std::io::Cursor;

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Start(start.clone()))
        .map_err(|e| BindingError::Xml(e.to_string()))?;

    let mut buf = Vec::new();
    let mut depth = 1usize;
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| BindingError::Xml(e.to_string()))?;
        match event {
            Event::Start(ref e) => {
                depth += 1;
                writer
                    .write_event(Event::Start(e.clone()))
                    .map_err(|e| BindingError::Xml(e.to_string()))?;
            }
            Event::End(ref e) => {
                writer
                    .write_event(Event::End(e.clone()))
                    .map_err(|e| BindingError::Xml(e.to_string()))?;
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Text(ref t) => {
                writer
                    .write_event(Event::Text(t.clone()))
                    .map_err(|e| BindingError::Xml(e.to_string()))?;
            }
            Event::Empty(ref e) => {
                writer
                    .write_event(Event::Empty(e.clone()))
                    .map_err(|e| BindingError::Xml(e.to_string()))?;
            }
            Event::Eof => {
                return Err(BindingError::Xml(
                    "unexpected end of document inside parameter element".into(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| BindingError::Xml(e.to_string()))
}

fn strip_wrapper(xml: &str, _wrapper_name: &str) -> String {
    xml_util::strip_outer_element(xml)
}

fn fragment_local_name(fragment: &str) -> Result<String, BindingError> {
    let mut reader = Reader::from_str(fragment);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| BindingError::Xml(e.to_string()))?
        {
            Event::Start(ref e) | Event::Empty(ref e) => {
                return Ok(xml_util::local_name(e.name().as_ref()))
            }
            Event::Eof => {
                return Err(BindingError::Xml(
                    "message contract body part has no element".into(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Splits a sequence of sibling XML elements (the message contract's body parts,
/// already stripped of any wrapper) into their individual outer-XML fragments.
fn split_top_level_elements(xml: &str) -> Result<Vec<String>, BindingError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut fragments = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| BindingError::Xml(e.to_string()))?;
        match event {
            Event::Start(ref e) => fragments.push(capture_rest(&mut reader, e)?),
            Event::Empty(ref e) => {
                let local = xml_util::local_name(e.name().as_ref());
                fragments.push(format!("<{local}/>"));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(fragments)
}

fn render_wrapper(
    name: &str,
    namespace: &str,
    members: &HashMap<String, String>,
) -> String {
    let mut out = format!("<{name} xmlns=\"{namespace}\">");
    for (_, value) in members.iter() {
        out.push_str(value);
    }
    out.push_str(&format!("</{name}>"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        FormatStyle, MessageContractMember, OperationDescription, ParameterDescription, Serializer,
    };
    use crate::value::{decode_data_contract, default_value_of, encode_data_contract, InvokeFn};
    use std::sync::Arc;

    fn int_codec() -> crate::value::ParamCodec {
        crate::value::ParamCodec {
            deserialize_data_contract: decode_data_contract::<i32>,
            deserialize_xml_serializer: decode_data_contract::<i32>,
            serialize_data_contract: encode_data_contract::<i32>,
            default_value: default_value_of::<i32>,
        }
    }

    fn string_codec() -> crate::value::ParamCodec {
        crate::value::ParamCodec {
            deserialize_data_contract: decode_data_contract::<String>,
            deserialize_xml_serializer: decode_data_contract::<String>,
            serialize_data_contract: encode_data_contract::<String>,
            default_value: default_value_of::<String>,
        }
    }

    fn dummy_invoke() -> InvokeFn {
        Arc::new(|_s, _a| Box::pin(async { Ok(crate::value::InvocationOutcome { return_value: None }) }))
    }

    fn op_with_two_in_params() -> OperationDescription {
        OperationDescription {
            name: "Add".into(),
            soap_action: "http://example.com/calc/Add".into(),
            reply_action: None,
            invoke: dummy_invoke(),
            parameters: vec![
                ParameterDescription {
                    index: 0,
                    name: "a".into(),
                    namespace: Some("http://example.com/calc".into()),
                    direction: Direction::In,
                    codec: int_codec(),
                    is_request_context: false,
                },
                ParameterDescription {
                    index: 1,
                    name: "b".into(),
                    namespace: Some("http://example.com/calc".into()),
                    direction: Direction::In,
                    codec: string_codec(),
                    is_request_context: false,
                },
            ],
            is_one_way: false,
            message_contract: None,
            message_contract_response: false,
            response_codec: None,
            response_element: "AddResponse".into(),
            response_namespace: "http://example.com/calc".into(),
            format_style: FormatStyle::Document,
            serializer: Serializer::DataContract,
            known_types: vec![],
            out_readers: vec![],
            response_headers: vec![],
        }
    }

    #[test]
    fn binds_in_order() {
        let op = op_with_two_in_params();
        let body = b"<Add xmlns=\"http://example.com/calc\"><a>1</a><b>x</b></Add>";
        let args = ArgumentBinder::bind(&op, body, &HashMap::new(), None).unwrap();
        assert_eq!(*args[0].as_ref().unwrap().downcast_ref::<i32>().unwrap(), 1);
        assert_eq!(
            *args[1].as_ref().unwrap().downcast_ref::<String>().unwrap(),
            "x"
        );
    }

    #[test]
    fn binds_out_of_order() {
        let op = op_with_two_in_params();
        let body = b"<Add xmlns=\"http://example.com/calc\"><b>x</b><a>1</a></Add>";
        let args = ArgumentBinder::bind(&op, body, &HashMap::new(), None).unwrap();
        assert_eq!(*args[0].as_ref().unwrap().downcast_ref::<i32>().unwrap(), 1);
        assert_eq!(
            *args[1].as_ref().unwrap().downcast_ref::<String>().unwrap(),
            "x"
        );
    }

    #[test]
    fn binds_sole_unmatched_parameter_via_known_type() {
        let mut op = OperationDescription {
            parameters: vec![ParameterDescription {
                index: 0,
                name: "item".into(),
                namespace: Some("http://example.com/calc".into()),
                direction: Direction::In,
                codec: int_codec(),
                is_request_context: false,
            }],
            known_types: vec!["DiscountedItem".into()],
            ..op_with_two_in_params()
        };
        op.parameters.truncate(1);
        let body = b"<Op xmlns=\"http://example.com/calc\"><DiscountedItem>7</DiscountedItem></Op>";
        let args = ArgumentBinder::bind(&op, body, &HashMap::new(), None).unwrap();
        assert_eq!(*args[0].as_ref().unwrap().downcast_ref::<i32>().unwrap(), 7);
    }

    #[test]
    fn known_type_fallback_is_skipped_with_multiple_unmatched_parameters() {
        let mut op = op_with_two_in_params();
        op.known_types = vec!["Unrelated".into()];
        let body = b"<Add xmlns=\"http://example.com/calc\"><Unrelated>1</Unrelated></Add>";
        let args = ArgumentBinder::bind(&op, body, &HashMap::new(), None).unwrap();
        assert!(args[0].is_none());
        assert!(args[1].is_none());
    }

    #[test]
    fn empty_body_yields_empty_args() {
        let op = OperationDescription {
            parameters: vec![],
            ..op_with_two_in_params()
        };
        let args = ArgumentBinder::bind(&op, b"", &HashMap::new(), None).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn defaults_out_parameters() {
        let mut op = op_with_two_in_params();
        op.parameters.push(ParameterDescription {
            index: 2,
            name: "result".into(),
            namespace: None,
            direction: Direction::Out,
            codec: int_codec(),
            is_request_context: false,
        });
        let body = b"<Add xmlns=\"http://example.com/calc\"><a>1</a><b>x</b></Add>";
        let args = ArgumentBinder::bind(&op, body, &HashMap::new(), None).unwrap();
        assert_eq!(
            *args[2].as_ref().unwrap().downcast_ref::<i32>().unwrap(),
            0
        );
    }

    #[test]
    fn out_defaulting_is_idempotent() {
        let mut op = op_with_two_in_params();
        op.parameters.push(ParameterDescription {
            index: 2,
            name: "result".into(),
            namespace: None,
            direction: Direction::Out,
            codec: int_codec(),
            is_request_context: false,
        });
        let body = b"<Add xmlns=\"http://example.com/calc\"><a>1</a><b>x</b></Add>";
        let mut args = ArgumentBinder::bind(&op, body, &HashMap::new(), None).unwrap();
        ArgumentBinder::default_out_params(&op, &mut args);
        assert_eq!(
            *args[2].as_ref().unwrap().downcast_ref::<i32>().unwrap(),
            0
        );
    }

    #[test]
    fn binds_message_contract_body_in_order() {
        let contract = MessageContractInfo::new(
            true,
            "AddWrapper",
            "http://example.com/calc",
            vec![],
            vec![
                MessageContractMember {
                    name: "a".into(),
                    namespace: None,
                    order: 0,
                    must_understand: false,
                    codec: int_codec(),
                },
                MessageContractMember {
                    name: "b".into(),
                    namespace: None,
                    order: 1,
                    must_understand: false,
                    codec: string_codec(),
                },
            ],
        );
        let mut op = OperationDescription {
            parameters: vec![ParameterDescription {
                index: 0,
                name: "request".into(),
                namespace: None,
                direction: Direction::In,
                codec: crate::value::ParamCodec {
                    deserialize_data_contract: decode_data_contract::<std::collections::HashMap<String, String>>,
                    deserialize_xml_serializer: decode_data_contract::<std::collections::HashMap<String, String>>,
                    serialize_data_contract: encode_data_contract::<std::collections::HashMap<String, String>>,
                    default_value: default_value_of::<std::collections::HashMap<String, String>>,
                },
                is_request_context: false,
            }],
            message_contract: Some(contract),
            ..op_with_two_in_params()
        };
        op.parameters.truncate(1);
        let body = b"<AddWrapper><a>1</a><b>x</b></AddWrapper>";
        let result = ArgumentBinder::bind(&op, body, &HashMap::new(), None);
        assert!(result.is_ok());
    }
}
