//! Type-erased argument plumbing between the generic dispatch pipeline and the
//! concrete, macro-generated invocation closures.
//!
//! Rust has no runtime reflection, so spec §9's "build-time metadata table" is
//! rendered here as a table of function pointers and boxed trait objects that the
//! `soap-service-macros::service` attribute generates once per operation, for that
//! operation's concrete parameter/return types. The dispatch pipeline never knows
//! those concrete types; it only ever moves `Box<dyn Any + Send>` values around.

use crate::error::{BindingError, InvocationError};
use crate::model::Serializer;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxAny = Box<dyn Any + Send>;
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Marks a SOAP `out` parameter. Bound and defaulted by the Argument Binder like any
/// other parameter slot, but never passed into the generated method call — see
/// `SPEC_FULL.md` §9 for why Rust renders C#'s `out` this way. Also used as a
/// response-struct field wrapper so the `service` macro can recognize an out value
/// to read back via `OperationDescription::out_readers`; `#[serde(transparent)]`
/// keeps the wire shape identical to the inner type.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Out<T>(pub T);

/// Marks a SOAP `ref`/`InOut` parameter; same response-struct role as [`Out`].
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct InOut<T>(pub T);

/// Per-parameter (de)serialization strategy, generated once at service-module
/// expansion time for that parameter's concrete declared type.
#[derive(Clone, Copy)]
pub struct ParamCodec {
    pub deserialize_data_contract: fn(&str) -> Result<BoxAny, BindingError>,
    pub deserialize_xml_serializer: fn(&str) -> Result<BoxAny, BindingError>,
    pub serialize_data_contract: fn(&BoxAny) -> Result<String, BindingError>,
    pub default_value: fn() -> BoxAny,
}

impl ParamCodec {
    pub fn deserialize(&self, xml: &str, serializer: Serializer) -> Result<BoxAny, BindingError> {
        match serializer {
            Serializer::DataContract => (self.deserialize_data_contract)(xml),
            Serializer::XmlSerializer => (self.deserialize_xml_serializer)(xml),
        }
    }
}

/// Generic `DataContract`-style decoder: `quick-xml`'s serde integration, matching
/// the teacher's `quick-xml` dependency.
pub fn decode_data_contract<T>(xml: &str) -> Result<BoxAny, BindingError>
where
    T: for<'de> serde::Deserialize<'de> + Send + 'static,
{
    quick_xml::de::from_str::<T>(xml)
        .map(|v| Box::new(v) as BoxAny)
        .map_err(|e| BindingError::Deserialize {
            parameter: std::any::type_name::<T>().to_string(),
            source: e.to_string(),
        })
}

/// Generic `XmlSerializer`-style decoder: `serde-xml-rs`, matching the teacher's
/// other XML dependency. Spec §3's `Serializer` enum maps directly onto these two
/// crates, one per variant.
pub fn decode_xml_serializer<T>(xml: &str) -> Result<BoxAny, BindingError>
where
    T: for<'de> serde::Deserialize<'de> + Send + 'static,
{
    serde_xml_rs::from_str::<T>(xml)
        .map(|v| Box::new(v) as BoxAny)
        .map_err(|e| BindingError::Deserialize {
            parameter: std::any::type_name::<T>().to_string(),
            source: e.to_string(),
        })
}

pub fn encode_data_contract<T>(value: &BoxAny) -> Result<String, BindingError>
where
    T: serde::Serialize + 'static,
{
    let typed = value
        .downcast_ref::<T>()
        .ok_or_else(|| BindingError::Serialize {
            parameter: std::any::type_name::<T>().to_string(),
            source: "argument slot held an unexpected type".to_string(),
        })?;
    quick_xml::se::to_string(typed).map_err(|e| BindingError::Serialize {
        parameter: std::any::type_name::<T>().to_string(),
        source: e.to_string(),
    })
}

pub fn default_value_of<T>() -> BoxAny
where
    T: Default + Send + 'static,
{
    Box::new(T::default())
}

/// The outcome of invoking an operation's generated method. Out/InOut parameter
/// values and `MessageHeader`-marked response members both live as fields on the
/// same boxed return object; `OperationDescription::out_readers` and
/// `::response_headers` read them back off `return_value` by field (see
/// `SPEC_FULL.md` §9 — this stands in for reflection over a response object's
/// fields, since Rust cannot alias the caller's argument slots).
pub struct InvocationOutcome {
    pub return_value: Option<BoxAny>,
}

/// The macro-generated "reference to the dispatch method" spec §3 names on
/// `OperationDescription`: a boxed closure that downcasts the service instance and
/// argument vector to their concrete types, calls the real method, and re-boxes the
/// result.
pub type InvokeFn = Arc<
    dyn Fn(BoxAny, Vec<BoxAny>) -> BoxFuture<'static, Result<InvocationOutcome, InvocationError>>
        + Send
        + Sync,
>;
