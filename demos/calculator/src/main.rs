use soap_service::dispatch::OperationDispatcher;
use soap_service::service;
use soap_service::{EncoderSet, NoRequestContext, SoapEndpoint, SoapEndpointOptions, UnitServiceFactory};
use std::sync::Arc;

#[derive(Debug)]
pub struct ServiceError(pub String);

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ServiceError {}

#[service(
    namespace = "http://example.com/calculator",
    service_name = "CalculatorService",
    port_name = "CalculatorPort",
    bind_path = "/soap/calculator"
)]
mod calculator {
    use super::ServiceError;
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize, Serialize, Debug)]
    pub struct AddRequest {
        #[serde(rename = "Operand1")]
        pub a: i32,
        #[serde(rename = "Operand2")]
        pub b: i32,
    }

    #[derive(Deserialize, Serialize, Debug)]
    pub struct AddResponse {
        #[serde(rename = "Result")]
        pub sum: i32,
    }

    pub async fn add(req: AddRequest) -> Result<AddResponse, ServiceError> {
        if req.a == 0 && req.b == 0 {
            return Err(ServiceError("Cannot add two zeros".to_string()));
        }
        Ok(AddResponse { sum: req.a + req.b })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber_init();

    let service = Arc::new(calculator::service_description().expect("valid service description"));
    let dispatcher = OperationDispatcher {
        service: service.clone(),
        encoders: EncoderSet::default_soap11(),
        service_factory: Arc::new(UnitServiceFactory),
        request_context_factory: Arc::new(NoRequestContext),
        filters: Vec::new(),
        inspectors: Vec::new(),
        model_binding_filters: Vec::new(),
        action_filters: Vec::new(),
        tuners: Vec::new(),
    };
    let endpoint = Arc::new(SoapEndpoint::new(
        SoapEndpointOptions::new(calculator::BIND_PATH),
        dispatcher,
    ));

    let app = axum::Router::new()
        .fallback(move |req: axum::extract::Request| {
            let endpoint = endpoint.clone();
            async move { endpoint.handle_http(req).await }
        })
        .route("/health", axum::routing::get(|| async { "OK" }));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();

    println!("Calculator SOAP Service running on http://localhost:3000");
    println!("WSDL available at: http://localhost:3000{}?wsdl", calculator::BIND_PATH);

    axum::serve(listener, app).await.unwrap();
}

/// Demo-only, minimal `tracing` subscriber wiring so the dispatch pipeline's
/// structured logs (see `soap_service::dispatch`) land somewhere visible.
fn tracing_subscriber_init() {
    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::INFO)
            .finish(),
    );
}
