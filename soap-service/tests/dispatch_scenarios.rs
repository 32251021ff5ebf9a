//! End-to-end integration tests driving [`SoapEndpoint::route`] through the six
//! concrete scenarios and the filter/inspector ordering invariants of spec §8,
//! against a hand-built [`ServiceDescription`] (no `#[service]` macro involved,
//! so Out-parameter-free plain operations, one-way operations, and a panicking
//! operation can all be exercised directly).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use soap_service::dispatch::{Filter, Inspector, OperationContext};
use soap_service::error::DispatchError;
use soap_service::metadata::WsdlFileOptions;
use soap_service::model::{
    ContractDescription, Direction, FormatStyle, OperationDescription, ParameterDescription,
    Serializer, ServiceDescription,
};
use soap_service::router::{HttpMethod, RouterOutcome, RouterRequest};
use soap_service::value::{
    decode_data_contract, decode_xml_serializer, default_value_of, encode_data_contract,
    BoxAny, InvocationOutcome, InvokeFn, ParamCodec,
};
use soap_service::{
    EncoderSet, NoRequestContext, OperationDispatcher, SoapEndpoint, SoapEndpointOptions,
    UnitServiceFactory,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Serialize, Deserialize)]
struct OpResponse {
    #[serde(rename = "OpResult")]
    op_result: i32,
}

/// A response carrying both an out-parameter value and a `MessageHeader`-marked
/// member, neither of which belong in the body's normal serialized shape.
#[derive(Debug, Serialize, Deserialize)]
struct RichResponse {
    #[serde(rename = "OpResult")]
    op_result: i32,
    #[serde(skip)]
    extra: soap_service::value::Out<i32>,
    #[serde(skip)]
    warning: Option<String>,
}

fn i32_codec() -> ParamCodec {
    ParamCodec {
        deserialize_data_contract: decode_data_contract::<i32>,
        deserialize_xml_serializer: decode_xml_serializer::<i32>,
        serialize_data_contract: encode_data_contract::<i32>,
        default_value: default_value_of::<i32>,
    }
}

fn op_response_codec() -> ParamCodec {
    ParamCodec {
        deserialize_data_contract: decode_data_contract::<OpResponse>,
        deserialize_xml_serializer: decode_xml_serializer::<OpResponse>,
        serialize_data_contract: encode_data_contract::<OpResponse>,
        default_value: default_value_of::<OpResponse>,
    }
}

fn rich_response_codec() -> ParamCodec {
    ParamCodec {
        deserialize_data_contract: decode_data_contract::<RichResponse>,
        deserialize_xml_serializer: decode_xml_serializer::<RichResponse>,
        serialize_data_contract: encode_data_contract::<RichResponse>,
        default_value: default_value_of::<RichResponse>,
    }
}

fn rich_out_reader() -> soap_service::model::OutReader {
    soap_service::model::OutReader {
        parameter_name: "Extra".to_string(),
        read: |resp| {
            let typed = resp
                .downcast_ref::<RichResponse>()
                .ok_or_else(|| soap_service::error::BindingError::Serialize {
                    parameter: "Extra".to_string(),
                    source: "response object had an unexpected type".to_string(),
                })?;
            Ok(typed.extra.0.to_string())
        },
    }
}

fn rich_response_header() -> soap_service::model::ResponseHeaderReader {
    soap_service::model::ResponseHeaderReader {
        name: "Warning".to_string(),
        namespace: Some("http://ns".to_string()),
        must_understand: false,
        read: |resp| {
            let typed = resp
                .downcast_ref::<RichResponse>()
                .ok_or_else(|| soap_service::error::BindingError::Serialize {
                    parameter: "Warning".to_string(),
                    source: "response object had an unexpected type".to_string(),
                })?;
            Ok(typed.warning.clone())
        },
    }
}

fn echoing_invoke() -> InvokeFn {
    Arc::new(|_service, mut args| {
        Box::pin(async move {
            let n = *args.remove(0).downcast::<i32>().expect("i32 argument");
            Ok(InvocationOutcome {
                return_value: Some(Box::new(OpResponse { op_result: n })),
            })
        })
    })
}

fn oneway_invoke() -> InvokeFn {
    Arc::new(|_service, _args| {
        Box::pin(async move {
            Ok(InvocationOutcome {
                return_value: None,
            })
        })
    })
}

fn panicking_invoke() -> InvokeFn {
    Arc::new(|_service, _args| Box::pin(async move { panic!("boom: disk on fire") }))
}

fn rich_invoke() -> InvokeFn {
    Arc::new(|_service, _args| {
        Box::pin(async move {
            Ok(InvocationOutcome {
                return_value: Some(Box::new(RichResponse {
                    op_result: 3,
                    extra: soap_service::value::Out(42),
                    warning: Some("low-fuel".to_string()),
                })),
            })
        })
    })
}

fn build_service() -> ServiceDescription {
    let op = OperationDescription {
        name: "Op".into(),
        soap_action: "http://ns/Op".into(),
        reply_action: Some("http://ns/OpResponse".into()),
        invoke: echoing_invoke(),
        parameters: vec![ParameterDescription {
            index: 0,
            name: "n".into(),
            namespace: Some("http://ns".into()),
            direction: Direction::In,
            codec: i32_codec(),
            is_request_context: false,
        }],
        is_one_way: false,
        message_contract: None,
        message_contract_response: false,
        response_codec: Some(op_response_codec()),
        response_element: "OpResponse".into(),
        response_namespace: "http://ns".into(),
        format_style: FormatStyle::Document,
        serializer: Serializer::DataContract,
        known_types: vec![],
        out_readers: vec![],
        response_headers: vec![],
    };

    let oneway = OperationDescription {
        name: "Oneway".into(),
        soap_action: "http://ns/Oneway".into(),
        reply_action: None,
        invoke: oneway_invoke(),
        parameters: vec![],
        is_one_way: true,
        message_contract: None,
        message_contract_response: false,
        response_codec: None,
        response_element: "OnewayResponse".into(),
        response_namespace: "http://ns".into(),
        format_style: FormatStyle::Document,
        serializer: Serializer::DataContract,
        known_types: vec![],
        out_readers: vec![],
        response_headers: vec![],
    };

    let throws = OperationDescription {
        name: "Throws".into(),
        soap_action: "http://ns/Throws".into(),
        reply_action: Some("http://ns/ThrowsResponse".into()),
        invoke: panicking_invoke(),
        parameters: vec![],
        is_one_way: false,
        message_contract: None,
        message_contract_response: false,
        response_codec: Some(op_response_codec()),
        response_element: "ThrowsResponse".into(),
        response_namespace: "http://ns".into(),
        format_style: FormatStyle::Document,
        serializer: Serializer::DataContract,
        known_types: vec![],
        out_readers: vec![],
        response_headers: vec![],
    };

    let rich = OperationDescription {
        name: "Rich".into(),
        soap_action: "http://ns/Rich".into(),
        reply_action: Some("http://ns/RichResponse".into()),
        invoke: rich_invoke(),
        parameters: vec![],
        is_one_way: false,
        message_contract: None,
        message_contract_response: false,
        response_codec: Some(rich_response_codec()),
        response_element: "RichResponse".into(),
        response_namespace: "http://ns".into(),
        format_style: FormatStyle::Document,
        serializer: Serializer::DataContract,
        known_types: vec![],
        out_readers: vec![rich_out_reader()],
        response_headers: vec![rich_response_header()],
    };

    let contract = ContractDescription {
        name: "Calc".into(),
        target_namespace: "http://ns".into(),
        operations: vec![op, oneway, throws, rich],
    };

    ServiceDescription::new(vec![contract]).expect("unique actions")
}

/// Records `on_request`/`on_response` calls by name, so ordering tests can
/// assert the forward/reverse contract from spec §4.4/§8 across every exit path.
struct OrderFilter {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Filter for OrderFilter {
    async fn on_request(&self, _ctx: &mut OperationContext) -> Result<(), DispatchError> {
        self.log.lock().unwrap().push(format!("{}:request", self.name));
        Ok(())
    }

    async fn on_response(&self, _ctx: &mut OperationContext) {
        self.log.lock().unwrap().push(format!("{}:response", self.name));
    }
}

/// Records `after_receive_request`/`before_send_reply` calls by name, pairing
/// each with the correlation value it produced, so tests can assert inspectors
/// still run on the `NoOperation` fault path (spec §4.4/§8).
struct OrderInspector {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Inspector for OrderInspector {
    async fn after_receive_request(&self, _ctx: &OperationContext) -> BoxAny {
        self.log.lock().unwrap().push(format!("{}:after_receive", self.name));
        Box::new(self.name.to_string())
    }

    async fn before_send_reply(&self, _ctx: &mut OperationContext, correlation: BoxAny) {
        let value = *correlation.downcast::<String>().expect("correlation round-trips");
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:before_send({value})", self.name));
    }
}

fn build_endpoint(log: Arc<Mutex<Vec<String>>>, wsdl_file: Option<WsdlFileOptions>) -> SoapEndpoint {
    let service = Arc::new(build_service());
    let mut options = SoapEndpointOptions::new("/svc");
    if let Some(wsdl_file) = wsdl_file {
        options = options.wsdl_file(wsdl_file);
    }
    let dispatcher = OperationDispatcher {
        service: service.clone(),
        encoders: EncoderSet::default_soap11(),
        service_factory: Arc::new(UnitServiceFactory),
        request_context_factory: Arc::new(NoRequestContext),
        filters: vec![
            Arc::new(OrderFilter { name: "first", log: log.clone() }),
            Arc::new(OrderFilter { name: "second", log: log.clone() }),
        ],
        inspectors: vec![],
        model_binding_filters: vec![],
        action_filters: vec![],
        tuners: vec![],
    };
    SoapEndpoint::new(options, dispatcher)
}

fn envelope_with_body(body_inner: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>{body_inner}</soap:Body></soap:Envelope>"#
    )
    .into_bytes()
}

fn expect_response(outcome: RouterOutcome) -> soap_service::router::RouterResponse {
    match outcome {
        RouterOutcome::Response(resp) => resp,
        RouterOutcome::Forward => panic!("expected a response, endpoint forwarded the request"),
    }
}

/// Scenario 1: `GET /svc?wsdl` with HTTP and `HttpGetEnabled=true` returns a WSDL
/// document over `text/xml`.
#[tokio::test]
async fn wsdl_get_returns_generated_document() {
    let endpoint = build_endpoint(Arc::new(Mutex::new(Vec::new())), None);
    let outcome = endpoint
        .route(RouterRequest {
            path: "/svc",
            method: HttpMethod::Get,
            content_type: None,
            query: "wsdl",
            soap_action: None,
            is_https: false,
            body: b"",
        })
        .await;
    let resp = expect_response(outcome);
    assert_eq!(resp.status, 200);
    assert!(resp.body.starts_with(b"<?xml"));
    assert_eq!(resp.content_type, "text/xml;charset=UTF-8");
}

/// Scenario 2: a path-traversal attempt in `?xsd&name=` is rejected before any
/// file read is attempted, even though a file-based mapping is configured.
#[tokio::test]
async fn xsd_path_traversal_is_rejected_at_the_router() {
    let wsdl_file = WsdlFileOptions {
        schema_folder: Some("/tmp/does-not-matter".to_string()),
        ..Default::default()
    };
    let endpoint = build_endpoint(Arc::new(Mutex::new(Vec::new())), Some(wsdl_file));
    let outcome = endpoint
        .route(RouterRequest {
            path: "/svc",
            method: HttpMethod::Get,
            content_type: None,
            query: "xsd&name=..%2Fetc%2Fpasswd.xsd",
            soap_action: None,
            is_https: false,
            body: b"",
        })
        .await;
    let resp = expect_response(outcome);
    assert_eq!(resp.status, 400);
}

/// Scenario 3: a normal invocation returns the response envelope with HTTP 200.
#[tokio::test]
async fn successful_invocation_returns_response_envelope() {
    let endpoint = build_endpoint(Arc::new(Mutex::new(Vec::new())), None);
    let body = envelope_with_body(r#"<Op xmlns="http://ns"><n>3</n></Op>"#);
    let outcome = endpoint
        .route(RouterRequest {
            path: "/svc",
            method: HttpMethod::Post,
            content_type: Some("text/xml"),
            query: "",
            soap_action: Some("http://ns/Op"),
            is_https: false,
            body: &body,
        })
        .await;
    let resp = expect_response(outcome);
    assert_eq!(resp.status, 200);
    let text = String::from_utf8(resp.body).unwrap();
    assert!(text.contains("<OpResponse"));
    assert!(text.contains("<OpResult>3</OpResult>"));
    assert!(resp
        .headers
        .iter()
        .any(|(k, v)| k == "SOAPAction" && v == "http://ns/OpResponse"));
}

/// A response carrying an out-parameter value and a `MessageHeader`-marked member
/// drives `OperationDescription::out_readers`/`::response_headers` end-to-end
/// through `dispatch()`, rather than through either vector staying empty.
#[tokio::test]
async fn rich_response_includes_out_value_and_header() {
    let endpoint = build_endpoint(Arc::new(Mutex::new(Vec::new())), None);
    let body = envelope_with_body(r#"<Rich xmlns="http://ns"></Rich>"#);
    let outcome = endpoint
        .route(RouterRequest {
            path: "/svc",
            method: HttpMethod::Post,
            content_type: Some("text/xml"),
            query: "",
            soap_action: Some("http://ns/Rich"),
            is_https: false,
            body: &body,
        })
        .await;
    let resp = expect_response(outcome);
    assert_eq!(resp.status, 200);
    let text = String::from_utf8(resp.body).unwrap();
    assert!(text.contains("<Extra>42</Extra>"));
    assert!(text.contains("Warning"));
    assert!(text.contains("low-fuel"));
}

/// Scenario 4: an unresolvable SOAP action produces a `NoOperation` fault at
/// HTTP 500.
#[tokio::test]
async fn unknown_action_produces_no_operation_fault() {
    let endpoint = build_endpoint(Arc::new(Mutex::new(Vec::new())), None);
    let body = envelope_with_body(r#"<Missing xmlns="http://ns"></Missing>"#);
    let outcome = endpoint
        .route(RouterRequest {
            path: "/svc",
            method: HttpMethod::Post,
            content_type: Some("text/xml"),
            query: "",
            soap_action: Some("http://ns/Missing"),
            is_https: false,
            body: &body,
        })
        .await;
    let resp = expect_response(outcome);
    assert_eq!(resp.status, 500);
    let text = String::from_utf8(resp.body).unwrap();
    assert!(text.contains("soap:Client"));
    assert!(text.contains("http://ns/Missing"));
}

/// An unresolvable SOAP action still runs every inspector's
/// `AfterReceiveRequest`/`BeforeSendReply` pair, in declared/reverse order, with
/// each inspector's own correlation value round-tripping (spec §4.4's
/// `Filtered -> Resolved` transition runs inspectors strictly before operation
/// matching, and §8 requires this for "all inspector lists of length n" with no
/// carve-out for an action that fails to resolve).
#[tokio::test]
async fn inspectors_run_even_when_action_unresolved() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let service = Arc::new(build_service());
    let dispatcher = OperationDispatcher {
        service: service.clone(),
        encoders: EncoderSet::default_soap11(),
        service_factory: Arc::new(UnitServiceFactory),
        request_context_factory: Arc::new(NoRequestContext),
        filters: vec![],
        inspectors: vec![
            Arc::new(OrderInspector { name: "first", log: log.clone() }),
            Arc::new(OrderInspector { name: "second", log: log.clone() }),
        ],
        model_binding_filters: vec![],
        action_filters: vec![],
        tuners: vec![],
    };
    let endpoint = SoapEndpoint::new(SoapEndpointOptions::new("/svc"), dispatcher);

    let body = envelope_with_body(r#"<Missing xmlns="http://ns"></Missing>"#);
    let outcome = endpoint
        .route(RouterRequest {
            path: "/svc",
            method: HttpMethod::Post,
            content_type: Some("text/xml"),
            query: "",
            soap_action: Some("http://ns/Missing"),
            is_https: false,
            body: &body,
        })
        .await;
    let resp = expect_response(outcome);
    assert_eq!(resp.status, 500);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "first:after_receive".to_string(),
            "second:after_receive".to_string(),
            "second:before_send(second)".to_string(),
            "first:before_send(first)".to_string(),
        ]
    );
}

/// A malformed envelope fails before an operation is even resolved, but the
/// resulting fault still mirrors the request's own content-type rather than
/// falling back to the encoder's default (spec §4.6: "response content-type to
/// the *request's* content-type (SOAP fault mirrors the request encoding)").
#[tokio::test]
async fn fault_on_malformed_envelope_mirrors_request_content_type() {
    let endpoint = build_endpoint(Arc::new(Mutex::new(Vec::new())), None);
    let outcome = endpoint
        .route(RouterRequest {
            path: "/svc",
            method: HttpMethod::Post,
            content_type: Some("application/soap+xml; charset=utf-8"),
            query: "",
            soap_action: Some("http://ns/Op"),
            is_https: false,
            body: b"<not-a-soap-envelope></not-a-soap-envelope>",
        })
        .await;
    let resp = expect_response(outcome);
    assert_eq!(resp.status, 500);
    assert_eq!(resp.content_type, "application/soap+xml; charset=utf-8");
}

/// Scenario 5: a one-way operation yields HTTP 202 with an empty body, and both
/// filters still run on the request and response sides in the declared order.
#[tokio::test]
async fn one_way_operation_returns_202_with_empty_body() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let endpoint = build_endpoint(log.clone(), None);
    let body = envelope_with_body("");
    let outcome = endpoint
        .route(RouterRequest {
            path: "/svc",
            method: HttpMethod::Post,
            content_type: Some("text/xml"),
            query: "",
            soap_action: Some("http://ns/Oneway"),
            is_https: false,
            body: &body,
        })
        .await;
    let resp = expect_response(outcome);
    assert_eq!(resp.status, 202);
    assert!(resp.body.is_empty());
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "first:request".to_string(),
            "second:request".to_string(),
            "second:response".to_string(),
            "first:response".to_string(),
        ]
    );
}

/// Scenario 6: a panic inside the user method surfaces as a fault carrying the
/// inner message, with request/response filter ordering preserved.
#[tokio::test]
async fn invocation_panic_becomes_fault_with_inner_message() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let endpoint = build_endpoint(log.clone(), None);
    let body = envelope_with_body(r#"<Throws xmlns="http://ns"></Throws>"#);
    let outcome = endpoint
        .route(RouterRequest {
            path: "/svc",
            method: HttpMethod::Post,
            content_type: Some("text/xml"),
            query: "",
            soap_action: Some("http://ns/Throws"),
            is_https: false,
            body: &body,
        })
        .await;
    let resp = expect_response(outcome);
    assert_eq!(resp.status, 500);
    let text = String::from_utf8(resp.body).unwrap();
    assert!(text.contains("boom: disk on fire"));
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "first:request".to_string(),
            "second:request".to_string(),
            "second:response".to_string(),
            "first:response".to_string(),
        ]
    );
}

/// A request whose path doesn't match the configured endpoint path is forwarded
/// untouched; the core writes no response of its own (spec §8's first invariant).
#[tokio::test]
async fn mismatched_path_is_forwarded() {
    let endpoint = build_endpoint(Arc::new(Mutex::new(Vec::new())), None);
    let outcome = endpoint
        .route(RouterRequest {
            path: "/other",
            method: HttpMethod::Get,
            content_type: None,
            query: "wsdl",
            soap_action: None,
            is_https: false,
            body: b"",
        })
        .await;
    assert!(matches!(outcome, RouterOutcome::Forward));
}

/// GET is rejected with 403 when disabled for the current scheme.
#[tokio::test]
async fn get_disabled_on_scheme_returns_403() {
    let service = Arc::new(build_service());
    let dispatcher = OperationDispatcher {
        service: service.clone(),
        encoders: EncoderSet::default_soap11(),
        service_factory: Arc::new(UnitServiceFactory),
        request_context_factory: Arc::new(NoRequestContext),
        filters: vec![],
        inspectors: vec![],
        model_binding_filters: vec![],
        action_filters: vec![],
        tuners: vec![],
    };
    let endpoint = SoapEndpoint::new(
        SoapEndpointOptions::new("/svc").https_get_enabled(false),
        dispatcher,
    );
    let outcome = endpoint
        .route(RouterRequest {
            path: "/svc",
            method: HttpMethod::Get,
            content_type: None,
            query: "wsdl",
            soap_action: None,
            is_https: true,
            body: b"",
        })
        .await;
    let resp = expect_response(outcome);
    assert_eq!(resp.status, 403);
}
