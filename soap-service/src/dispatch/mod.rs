//! Operation Dispatcher (spec §4.4): the state machine that drives one request from
//! envelope read through response write, plus the per-request context and the
//! filter/inspector/tuner traits that interpose on it.

mod context;
mod filters;
mod pipeline;

pub use context::OperationContext;
pub use filters::{ActionFilter, Filter, Inspector, ModelBindingFilter, OperationTuner};
pub use pipeline::{DispatchOutcome, OperationDispatcher};
