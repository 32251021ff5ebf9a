//! A reflection-free SOAP 1.1/1.2 endpoint handler core.
//!
//! The service description is built once, ahead of time (by hand or by
//! [`soap_service_macros::service`]), into a [`model::ServiceDescription`]. Every
//! request that arrives afterwards flows through the same pipeline: the
//! [`router`] matches the configured path and handles metadata GETs, the
//! [`encoding`] module reads the envelope, the [`binder`] resolves it into
//! method arguments, [`dispatch::OperationDispatcher`] drives invocation and
//! response construction, and [`fault`] renders any error along the way into a
//! version-correct SOAP fault.

pub mod binder;
pub mod dispatch;
pub mod encoding;
pub mod error;
pub mod fault;
pub mod metadata;
pub mod model;
pub mod router;
pub mod service;
pub mod value;
pub mod xml_util;

pub use dispatch::{DispatchOutcome, OperationContext, OperationDispatcher};
pub use encoding::{EncoderSet, Envelope, OutboundEnvelope, SoapVersion};
pub use error::{BindingError, DispatchError, EncoderError, FaultCode, InvocationError, ModelError};
pub use model::{
    ContractDescription, Direction, FormatStyle, MessageContractInfo, OperationDescription,
    OutReader, ParameterDescription, ResponseHeaderReader, Serializer, ServiceDescription,
};
pub use router::{HttpMethod, RouterOutcome, RouterRequest, RouterResponse, SoapEndpoint, SoapEndpointOptions};
pub use service::{NoRequestContext, RequestContextFactory, ServiceFactory, UnitServiceFactory};
pub use value::{BoxAny, InOut, Out};

#[cfg(feature = "macros")]
pub use soap_service_macros::service;
