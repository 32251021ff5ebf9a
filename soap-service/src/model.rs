//! The Service Model (spec §3, §4.3): a read-only snapshot describing a service,
//! built once at endpoint construction and shared immutably across every request.

use crate::error::{BindingError, ModelError};
use crate::value::{BoxAny, InvokeFn, ParamCodec};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStyle {
    Document,
    Rpc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serializer {
    DataContract,
    XmlSerializer,
}

pub struct ParameterDescription {
    pub index: usize,
    pub name: String,
    pub namespace: Option<String>,
    pub direction: Direction,
    pub codec: ParamCodec,
    pub is_request_context: bool,
}

/// One header or body member of a [`MessageContractInfo`].
pub struct MessageContractMember {
    pub name: String,
    pub namespace: Option<String>,
    /// Position among sibling body parts. Ignored for headers.
    pub order: usize,
    pub must_understand: bool,
    pub codec: ParamCodec,
}

/// Present on a [`ParameterDescription`] whose declared type is itself a message
/// contract (spec §3/§4.5 case C).
pub struct MessageContractInfo {
    pub is_wrapped: bool,
    pub wrapper_name: String,
    pub wrapper_namespace: String,
    pub headers: Vec<MessageContractMember>,
    /// Sorted by `order` ascending at construction time, so the Argument Binder
    /// never has to sort on the request path.
    pub body_parts: Vec<MessageContractMember>,
}

impl MessageContractInfo {
    pub fn new(
        is_wrapped: bool,
        wrapper_name: impl Into<String>,
        wrapper_namespace: impl Into<String>,
        headers: Vec<MessageContractMember>,
        mut body_parts: Vec<MessageContractMember>,
    ) -> Self {
        body_parts.sort_by_key(|m| m.order);
        Self {
            is_wrapped,
            wrapper_name: wrapper_name.into(),
            wrapper_namespace: wrapper_namespace.into(),
            headers,
            body_parts,
        }
    }
}

/// Reads a single out/ref value off the already-produced response object by name,
/// for the Response-building dictionary in spec §4.4. See `SPEC_FULL.md` §9 for why
/// this reads the *response* object rather than aliasing an argument slot.
pub struct OutReader {
    pub parameter_name: String,
    pub read: fn(&BoxAny) -> Result<String, BindingError>,
}

/// Reads one `MessageHeader`-marked member off the already-produced response
/// object and renders it as a SOAP header (spec §4.4 "Response building": "for
/// each member of the return object carrying a MessageHeader marker, emit a SOAP
/// header with the marker's name... and namespace..., copying MustUnderstand").
/// `read` returns `None` when the member is itself optional and absent.
pub struct ResponseHeaderReader {
    pub name: String,
    pub namespace: Option<String>,
    pub must_understand: bool,
    pub read: fn(&BoxAny) -> Result<Option<String>, BindingError>,
}

pub struct OperationDescription {
    pub name: String,
    pub soap_action: String,
    pub reply_action: Option<String>,
    pub invoke: InvokeFn,
    pub parameters: Vec<ParameterDescription>,
    pub is_one_way: bool,
    pub message_contract: Option<MessageContractInfo>,
    /// Whether the response type is itself a message contract (spec §3 names
    /// both `IsMessageContractRequest` and `IsMessageContractResponse`).
    pub message_contract_response: bool,
    /// Present unless `is_one_way`: the codec for the return value's concrete
    /// type, used to render the response body.
    pub response_codec: Option<ParamCodec>,
    /// Name of the response wrapper element (document/wrapped style) or message
    /// contract response element.
    pub response_element: String,
    pub response_namespace: String,
    pub format_style: FormatStyle,
    pub serializer: Serializer,
    pub known_types: Vec<String>,
    pub out_readers: Vec<OutReader>,
    /// `MessageHeader`-marked members of the response type, emitted as SOAP
    /// headers rather than body content (spec §4.4).
    pub response_headers: Vec<ResponseHeaderReader>,
}

impl OperationDescription {
    pub fn is_message_contract_request(&self) -> bool {
        self.message_contract.is_some()
    }

    pub fn is_message_contract_response(&self) -> bool {
        self.message_contract_response
    }

    pub fn in_parameters(&self) -> impl Iterator<Item = &ParameterDescription> {
        self.parameters
            .iter()
            .filter(|p| matches!(p.direction, Direction::In | Direction::InOut))
    }

    pub fn out_parameters(&self) -> impl Iterator<Item = &ParameterDescription> {
        self.parameters
            .iter()
            .filter(|p| matches!(p.direction, Direction::Out | Direction::InOut))
    }

    pub fn request_context_parameter(&self) -> Option<&ParameterDescription> {
        self.parameters.iter().find(|p| p.is_request_context)
    }
}

pub struct ContractDescription {
    pub name: String,
    pub target_namespace: String,
    pub operations: Vec<OperationDescription>,
}

/// Trims surrounding whitespace and a single pair of surrounding quotes, per spec
/// §4.4's "trimmed form" rule.
fn trim_action(action: &str) -> String {
    action.trim().trim_matches('"').to_string()
}

/// "Trimmed-and-cleared": trim, then drop everything up to and including the last
/// `/`, approximating stripping a leading namespace URI prefix (spec §4.4 rule 4).
fn trim_and_clear_action(action: &str) -> String {
    let trimmed = trim_action(action);
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed,
    }
}

impl ContractDescription {
    /// The four-rule SOAP action cascade from spec §4.4, evaluated in order with
    /// first-hit-wins semantics. Returns the matching operation's index rather
    /// than a reference, so callers can carry the result across an `&mut`
    /// borrow of the owning `OperationContext`.
    pub fn resolve_action_index(&self, action: &str) -> Option<usize> {
        if let Some(idx) = self.operations.iter().position(|op| op.soap_action == action) {
            return Some(idx);
        }
        let trimmed = trim_action(action);
        if let Some(idx) = self.operations.iter().position(|op| op.name == trimmed) {
            return Some(idx);
        }
        if let Some(idx) = self
            .operations
            .iter()
            .position(|op| action == trim_action(&op.name))
        {
            return Some(idx);
        }
        let cleared = trim_and_clear_action(action);
        self.operations
            .iter()
            .position(|op| cleared == trim_and_clear_action(&op.soap_action))
    }

    pub fn resolve_action(&self, action: &str) -> Option<&OperationDescription> {
        self.resolve_action_index(action).map(|idx| &self.operations[idx])
    }
}

/// The top-level, immutable snapshot handed to a `SoapEndpoint` at construction.
pub struct ServiceDescription {
    pub contracts: Vec<ContractDescription>,
}

impl ServiceDescription {
    /// Validates the "SOAP action strings are unique within a contract" invariant
    /// (spec §3) once, at construction, rather than per request.
    pub fn new(contracts: Vec<ContractDescription>) -> Result<Self, ModelError> {
        for contract in &contracts {
            let mut seen = HashSet::new();
            for op in &contract.operations {
                let key = trim_action(&op.soap_action);
                if !seen.insert(key.clone()) {
                    return Err(ModelError::DuplicateSoapAction {
                        contract: contract.name.clone(),
                        action: key,
                    });
                }
            }
        }
        Ok(Self { contracts })
    }

    pub fn resolve(&self, action: &str) -> Option<(&ContractDescription, &OperationDescription)> {
        self.contracts
            .iter()
            .find_map(|c| c.resolve_action(action).map(|op| (c, op)))
    }

    /// Same resolution as [`Self::resolve`], but returns `(contract_index,
    /// operation_index)` so the caller can stash the result on an
    /// `OperationContext` without holding a borrow of `self`.
    pub fn resolve_indices(&self, action: &str) -> Option<(usize, usize)> {
        self.contracts.iter().enumerate().find_map(|(ci, c)| {
            c.resolve_action_index(action).map(|oi| (ci, oi))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{decode_data_contract, default_value_of, encode_data_contract};
    use std::sync::Arc;

    fn dummy_codec() -> ParamCodec {
        ParamCodec {
            deserialize_data_contract: decode_data_contract::<String>,
            deserialize_xml_serializer: decode_data_contract::<String>,
            serialize_data_contract: encode_data_contract::<String>,
            default_value: default_value_of::<String>,
        }
    }

    fn dummy_invoke() -> InvokeFn {
        Arc::new(|_service, _args| {
            Box::pin(async {
                Ok(crate::value::InvocationOutcome {
                    return_value: None,
                })
            })
        })
    }

    fn op(name: &str, action: &str) -> OperationDescription {
        OperationDescription {
            name: name.to_string(),
            soap_action: action.to_string(),
            reply_action: None,
            invoke: dummy_invoke(),
            parameters: vec![],
            is_one_way: false,
            message_contract: None,
            message_contract_response: false,
            response_codec: None,
            response_element: format!("{name}Response"),
            response_namespace: String::new(),
            format_style: FormatStyle::Document,
            serializer: Serializer::DataContract,
            known_types: vec![],
            out_readers: vec![],
            response_headers: vec![],
        }
    }

    #[test]
    fn rejects_duplicate_actions() {
        let contract = ContractDescription {
            name: "Calc".into(),
            target_namespace: "http://example.com/calc".into(),
            operations: vec![
                op("Add", "http://example.com/calc/Add"),
                op("AddAgain", "http://example.com/calc/Add"),
            ],
        };
        assert!(ServiceDescription::new(vec![contract]).is_err());
    }

    #[test]
    fn resolves_action_by_exact_match() {
        let contract = ContractDescription {
            name: "Calc".into(),
            target_namespace: "http://example.com/calc".into(),
            operations: vec![op("Add", "http://example.com/calc/Add")],
        };
        let svc = ServiceDescription::new(vec![contract]).unwrap();
        let (_, found) = svc.resolve("http://example.com/calc/Add").unwrap();
        assert_eq!(found.name, "Add");
    }

    #[test]
    fn resolves_action_by_trimmed_operation_name() {
        let contract = ContractDescription {
            name: "Calc".into(),
            target_namespace: "http://example.com/calc".into(),
            operations: vec![op("Add", "http://example.com/calc/AddDifferent")],
        };
        let svc = ServiceDescription::new(vec![contract]).unwrap();
        let (_, found) = svc.resolve("  \"Add\"  ").unwrap();
        assert_eq!(found.name, "Add");
    }

    #[test]
    fn resolves_action_via_trimmed_and_cleared_fallback() {
        let contract = ContractDescription {
            name: "Calc".into(),
            target_namespace: "http://example.com/calc".into(),
            operations: vec![op("Weird", "http://example.com/calc/Add")],
        };
        let svc = ServiceDescription::new(vec![contract]).unwrap();
        let (_, found) = svc.resolve("http://other.example/calc/Add").unwrap();
        assert_eq!(found.name, "Weird");
    }

    #[test]
    fn no_operation_matches() {
        let contract = ContractDescription {
            name: "Calc".into(),
            target_namespace: "http://example.com/calc".into(),
            operations: vec![op("Add", "http://example.com/calc/Add")],
        };
        let svc = ServiceDescription::new(vec![contract]).unwrap();
        assert!(svc.resolve("http://example.com/calc/Missing").is_none());
    }

    #[test]
    fn dummy_codec_round_trips() {
        let codec = dummy_codec();
        let value = codec
            .deserialize("<x>hi</x>", Serializer::DataContract)
            .unwrap();
        assert_eq!(*value.downcast_ref::<String>().unwrap(), "hi");
    }
}
