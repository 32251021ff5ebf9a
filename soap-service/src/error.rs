//! Error taxonomy for the dispatch pipeline (spec §7).
//!
//! Every variant resolves to a SOAP fault through [`crate::fault::FaultTransformer`];
//! nothing in this module writes a response directly.

use thiserror::Error;

/// Errors produced while selecting or running a [`crate::encoding::MessageEncoder`].
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("xml error: {0}")]
    Xml(String),
    #[error("the envelope does not use the expected SOAP version")]
    VersionMismatch,
    #[error("envelope exceeds the configured size limit")]
    TooLarge,
    #[error("malformed SOAP envelope: {0}")]
    Malformed(String),
    #[error("SOAP Header was not found within the configured prefetch window")]
    HeaderPrefetchExceeded,
}

/// Errors produced while binding the body/headers into a method argument list.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("xml error: {0}")]
    Xml(String),
    #[error("failed to deserialize parameter `{parameter}`: {source}")]
    Deserialize { parameter: String, source: String },
    #[error("failed to serialize out-parameter `{parameter}`: {source}")]
    Serialize { parameter: String, source: String },
    #[error("the body reader for this envelope has already been consumed")]
    BodyAlreadyConsumed,
    #[error("operation expects a message-contract parameter but none is declared")]
    MissingMessageContractParameter,
}

/// Errors produced while invoking the user's operation method.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("{0}")]
    User(String),
    #[error("operation invocation panicked: {0}")]
    Panicked(String),
}

/// The top-level error bucket the Operation Dispatcher routes through the Fault
/// Transformer (spec §7's taxonomy).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed SOAP envelope: {0}")]
    MalformedEnvelope(String),
    #[error("no operation matches SOAP action {action:?}")]
    NoOperation { action: String },
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("a filter rejected the request: {0}")]
    FilterRejection(String),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error("failed to write the response envelope: {0}")]
    ResponseWrite(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<EncoderError> for DispatchError {
    fn from(err: EncoderError) -> Self {
        match err {
            EncoderError::VersionMismatch => {
                DispatchError::MalformedEnvelope("SOAP version mismatch".into())
            }
            other => DispatchError::MalformedEnvelope(other.to_string()),
        }
    }
}

/// Canonical SOAP fault codes, shared by both the 1.1 `faultcode` and the 1.2
/// `Code/Value` rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    VersionMismatch,
    MustUnderstand,
    Client,
    Server,
}

impl FaultCode {
    /// SOAP 1.1 uses `Client`/`Server`; SOAP 1.2 uses `Sender`/`Receiver`.
    pub fn soap11_name(&self) -> &'static str {
        match self {
            FaultCode::VersionMismatch => "VersionMismatch",
            FaultCode::MustUnderstand => "MustUnderstand",
            FaultCode::Client => "Client",
            FaultCode::Server => "Server",
        }
    }

    pub fn soap12_name(&self) -> &'static str {
        match self {
            FaultCode::VersionMismatch => "VersionMismatch",
            FaultCode::MustUnderstand => "MustUnderstand",
            FaultCode::Client => "Sender",
            FaultCode::Server => "Receiver",
        }
    }
}

impl DispatchError {
    pub fn fault_code(&self) -> FaultCode {
        match self {
            DispatchError::MalformedEnvelope(msg) if msg.contains("version") => {
                FaultCode::VersionMismatch
            }
            DispatchError::MalformedEnvelope(_) => FaultCode::Client,
            DispatchError::NoOperation { .. } => FaultCode::Client,
            DispatchError::Binding(_) => FaultCode::Client,
            DispatchError::FilterRejection(_) => FaultCode::Server,
            DispatchError::Invocation(_) => FaultCode::Server,
            DispatchError::ResponseWrite(_) => FaultCode::Server,
            DispatchError::Internal(_) => FaultCode::Server,
        }
    }

    /// Default HTTP status code (spec §6: "500 for faults unless overridden").
    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Errors raised while building a [`crate::model::ServiceDescription`].
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("duplicate SOAP action `{action}` in contract `{contract}`")]
    DuplicateSoapAction { contract: String, action: String },
}
