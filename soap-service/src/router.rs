//! Endpoint Router (spec §4.1): matches the configured path, handles the GET
//! metadata branches, and forwards everything it doesn't own to the Operation
//! Dispatcher (or the next handler, for requests outside its path).

use crate::dispatch::{DispatchOutcome, OperationDispatcher};
use crate::metadata::{self, WsdlFileOptions};
use crate::model::ServiceDescription;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Other,
}

/// A host-agnostic view of an incoming HTTP request. Kept independent of any
/// particular web framework's request type so the router can be exercised without
/// pulling in `axum` (spec §1: "the HTTP server itself" is a non-goal).
pub struct RouterRequest<'a> {
    pub path: &'a str,
    pub method: HttpMethod,
    pub content_type: Option<&'a str>,
    /// The raw query string (no leading `?`), e.g. `"wsdl"` or `"xsd&name=types.xsd"`.
    pub query: &'a str,
    pub soap_action: Option<&'a str>,
    pub is_https: bool,
    pub body: &'a [u8],
}

pub struct RouterResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub content_type: String,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl RouterResponse {
    fn plain(status: u16, message: &str) -> Self {
        Self {
            status,
            reason: None,
            content_type: "text/plain".to_string(),
            body: message.as_bytes().to_vec(),
            headers: Vec::new(),
        }
    }

    fn xml(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            reason: None,
            content_type: "text/xml;charset=UTF-8".to_string(),
            body,
            headers: Vec::new(),
        }
    }
}

impl From<DispatchOutcome> for RouterResponse {
    /// The SOAPAction response header is always set, for both success and fault
    /// outcomes (spec §6: "`SOAPAction` is always set to the response envelope
    /// Action").
    fn from(outcome: DispatchOutcome) -> Self {
        let mut headers = outcome.headers;
        headers.push(("SOAPAction".to_string(), outcome.soap_action.clone()));
        Self {
            status: outcome.status,
            reason: outcome.reason,
            content_type: outcome.content_type,
            body: outcome.body,
            headers,
        }
    }
}

/// Either the request wasn't for this endpoint (forward to the next handler), or
/// here is the response the core produced for it.
pub enum RouterOutcome {
    Forward,
    Response(RouterResponse),
}

/// Configuration options (spec §6's enumerated option list).
pub struct SoapEndpointOptions {
    pub path: String,
    pub case_insensitive_path: bool,
    pub http_get_enabled: bool,
    pub https_get_enabled: bool,
    pub use_basic_authentication: bool,
    pub wsdl_file: Option<WsdlFileOptions>,
    /// §4.1 step 1: "an optional path-tuning hook that may rewrite a trailing
    /// segment of the request path" before the path comparison runs.
    pub path_tuner: Option<Box<dyn Fn(&str) -> String + Send + Sync>>,
}

impl SoapEndpointOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            case_insensitive_path: false,
            http_get_enabled: true,
            https_get_enabled: true,
            use_basic_authentication: false,
            wsdl_file: None,
            path_tuner: None,
        }
    }

    pub fn case_insensitive_path(mut self, value: bool) -> Self {
        self.case_insensitive_path = value;
        self
    }

    pub fn http_get_enabled(mut self, value: bool) -> Self {
        self.http_get_enabled = value;
        self
    }

    pub fn https_get_enabled(mut self, value: bool) -> Self {
        self.https_get_enabled = value;
        self
    }

    pub fn use_basic_authentication(mut self, value: bool) -> Self {
        self.use_basic_authentication = value;
        self
    }

    pub fn wsdl_file(mut self, options: WsdlFileOptions) -> Self {
        self.wsdl_file = Some(options);
        self
    }

    pub fn path_tuner(mut self, tuner: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.path_tuner = Some(Box::new(tuner));
        self
    }
}

/// The Endpoint Router plus the Operation Dispatcher it forwards matched requests
/// to (spec §4.1's router and §4.4's dispatcher are separate responsibilities, but
/// there is exactly one of each per bound path, so this crate's public entry point
/// combines them one-to-one).
pub struct SoapEndpoint {
    pub options: SoapEndpointOptions,
    pub service: Arc<ServiceDescription>,
    pub dispatcher: OperationDispatcher,
}

impl SoapEndpoint {
    pub fn new(options: SoapEndpointOptions, dispatcher: OperationDispatcher) -> Self {
        let service = dispatcher.service.clone();
        Self {
            options,
            service,
            dispatcher,
        }
    }

    /// Implements spec §4.1 steps 1-6.
    pub async fn route(&self, req: RouterRequest<'_>) -> RouterOutcome {
        let tuned_path = match &self.options.path_tuner {
            Some(tuner) => tuner(req.path),
            None => req.path.to_string(),
        };

        let path_matches = if self.options.case_insensitive_path {
            tuned_path.eq_ignore_ascii_case(&self.options.path)
        } else {
            tuned_path == self.options.path
        };
        if !path_matches {
            return RouterOutcome::Forward;
        }

        if req.method == HttpMethod::Get {
            let get_enabled = if req.is_https {
                self.options.https_get_enabled
            } else {
                self.options.http_get_enabled
            };
            if !get_enabled {
                return RouterOutcome::Response(RouterResponse::plain(403, "HTTP GET is disabled"));
            }

            let has_key = |key: &str| query_pairs(req.query).any(|(k, _)| k == key);

            if req.content_type.map(str::is_empty).unwrap_or(true) || has_key("wsdl") {
                let body = match &self.options.wsdl_file {
                    Some(file_opts) => metadata::read_wsdl_file(file_opts)
                        .unwrap_or_else(|_| self.generated_wsdl().into_bytes()),
                    None => self.generated_wsdl().into_bytes(),
                };
                return RouterOutcome::Response(RouterResponse::xml(200, body));
            }

            if has_key("xsd") {
                if let Some(file_opts) = &self.options.wsdl_file {
                    let name = query_pairs(req.query)
                        .find(|(k, _)| *k == "name")
                        .map(|(_, v)| v.to_string())
                        .unwrap_or_default();
                    return match metadata::read_xsd(file_opts, &name) {
                        Ok(body) => RouterOutcome::Response(RouterResponse::xml(200, body)),
                        Err(_) => RouterOutcome::Response(RouterResponse::plain(
                            400,
                            "invalid xsd name",
                        )),
                    };
                }
            }
        }

        // Spec §4.1 step 7 / §7: an unhandled error reaching this frame is logged
        // at critical severity and re-raised so host middleware can still observe
        // it, rather than swallowed here. Ordinary dispatch failures never reach
        // this branch — the Operation Dispatcher converts them into a fault
        // envelope internally — so a panic caught here means something went wrong
        // in the core itself, not in user code.
        let dispatch_result = AssertUnwindSafe(
            self.dispatcher
                .dispatch(req.content_type, req.soap_action, req.body),
        )
        .catch_unwind()
        .await;

        let outcome = match dispatch_result {
            Ok(outcome) => outcome,
            Err(panic) => {
                tracing::error!("unhandled error in SOAP dispatch pipeline; re-raising");
                std::panic::resume_unwind(panic);
            }
        };
        RouterOutcome::Response(outcome.into())
    }

    fn generated_wsdl(&self) -> String {
        metadata::generate_wsdl(
            &self.service,
            &self.options.path,
            self.dispatcher.encoders.default_encoder().soap_version()
                == crate::encoding::SoapVersion::Soap12,
            self.options.use_basic_authentication,
        )
    }
}

/// Splits a raw query string (`"a=1&b&c=2"`) into `(key, value)` pairs; a bare key
/// with no `=` yields an empty value, matching how `wsdl`/`xsd` appear as flags.
fn query_pairs(query: &str) -> impl Iterator<Item = (&str, &str)> {
    query.split('&').filter(|s| !s.is_empty()).map(|kv| {
        let mut parts = kv.splitn(2, '=');
        let key = parts.next().unwrap_or("");
        let value = parts.next().unwrap_or("");
        (key, value)
    })
}

#[cfg(feature = "runtime")]
mod axum_integration {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, Response};

    impl SoapEndpoint {
        /// Adapts an `axum`/`http` request into a [`RouterRequest`], dispatches it,
        /// and renders the outcome back into an `axum` response. `Forward` becomes a
        /// 404, since this method is meant to be mounted as a catch-all fallback for
        /// its configured path; embedders composing this endpoint into a larger
        /// router that already does path-based forwarding should call [`Self::route`]
        /// directly instead.
        pub async fn handle_http(&self, req: Request<Body>) -> Response<Body> {
            let method = match req.method().as_str() {
                "GET" => HttpMethod::Get,
                "POST" => HttpMethod::Post,
                "PUT" => HttpMethod::Put,
                _ => HttpMethod::Other,
            };
            let path = req.uri().path().to_string();
            let query = req.uri().query().unwrap_or("").to_string();
            let content_type = req
                .headers()
                .get(axum::http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let soap_action = req
                .headers()
                .get("SOAPAction")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let is_https = req.uri().scheme_str() == Some("https");

            let body_bytes = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    return Response::builder()
                        .status(400)
                        .body(Body::from(format!("failed to read request body: {err}")))
                        .expect("valid response");
                }
            };

            let outcome = self
                .route(RouterRequest {
                    path: &path,
                    method,
                    content_type: content_type.as_deref(),
                    query: &query,
                    soap_action: soap_action.as_deref(),
                    is_https,
                    body: &body_bytes,
                })
                .await;

            match outcome {
                RouterOutcome::Forward => Response::builder()
                    .status(404)
                    .body(Body::empty())
                    .expect("valid response"),
                RouterOutcome::Response(resp) => {
                    let mut builder = Response::builder().status(resp.status);
                    builder = builder.header(axum::http::header::CONTENT_TYPE, resp.content_type);
                    for (name, value) in &resp.headers {
                        builder = builder.header(name, value);
                    }
                    builder.body(Body::from(resp.body)).expect("valid response")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_splits_flags_and_values() {
        let pairs: Vec<_> = query_pairs("wsdl&name=types.xsd").collect();
        assert_eq!(pairs, vec![("wsdl", ""), ("name", "types.xsd")]);
    }
}
