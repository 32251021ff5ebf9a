//! Filter/inspector/tuner traits implementing the ordering contract from spec
//! §4.4 and §5: request filters forward then response filters in reverse,
//! inspectors correlate a value across `AfterReceiveRequest`/`BeforeSendReply`,
//! and model-binding filters run before action filters, which run before tuners.

use crate::dispatch::context::OperationContext;
use crate::error::DispatchError;
use crate::value::BoxAny;
use async_trait::async_trait;

/// Runs once before dispatch and once (in reverse order) after the response (or
/// fault) envelope has been built, on every exit path.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Called in declared order, right after the envelope is read.
    async fn on_request(&self, ctx: &mut OperationContext) -> Result<(), DispatchError> {
        let _ = ctx;
        Ok(())
    }

    /// Called in the reverse of declared order, after the response (or fault)
    /// envelope exists, regardless of how the request completed.
    async fn on_response(&self, ctx: &mut OperationContext) {
        let _ = ctx;
    }
}

/// Observes request/response boundaries and correlates a value between the two
/// calls (spec §5's per-inspector correlation array, never a shared map).
#[async_trait]
pub trait Inspector: Send + Sync {
    async fn after_receive_request(&self, ctx: &OperationContext) -> BoxAny;

    async fn before_send_reply(&self, ctx: &mut OperationContext, correlation: BoxAny);
}

/// Runs after argument binding, before action filters (spec §4.4's
/// `Matched` state model-binding stage).
#[async_trait]
pub trait ModelBindingFilter: Send + Sync {
    async fn on_bound(&self, ctx: &mut OperationContext) -> Result<(), DispatchError>;
}

/// Runs after model-binding filters, before operation tuners.
#[async_trait]
pub trait ActionFilter: Send + Sync {
    async fn on_action(&self, ctx: &mut OperationContext) -> Result<(), DispatchError>;
}

/// Runs immediately before invocation, after action filters (spec §4.4's
/// "operation tuners" stage — the analog of a per-operation behavior hook).
#[async_trait]
pub trait OperationTuner: Send + Sync {
    async fn tune(&self, ctx: &mut OperationContext) -> Result<(), DispatchError>;
}
