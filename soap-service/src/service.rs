//! The ambient, request-scoped collaborators a hosted service needs but that the
//! dispatch pipeline has no reflection to discover on its own: obtaining a fresh
//! service instance, and feeding it the ambient request context / message headers
//! (spec §3's "Ownership" note and §4.4's "ambient-context mechanism").

use crate::encoding::Envelope;
use crate::value::BoxAny;
use async_trait::async_trait;
use std::collections::HashMap;

/// Produces a fresh, request-scoped service instance. The core never caches or
/// aliases this value across requests (spec §3).
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    async fn create(&self) -> BoxAny;

    /// If the service exposes a writable `MessageHeaders`-shaped slot, applies the
    /// envelope's captured header fragments to it before invocation. Default is a
    /// no-op; macro-generated factories override this only for services that
    /// declare such a slot.
    fn apply_message_headers(&self, _instance: &mut BoxAny, _headers: &HashMap<String, String>) {}
}

/// Builds the ambient request-context value bound into an operation's
/// request-context parameter, if it declares one (spec §4.5 Case A step 4).
pub trait RequestContextFactory: Send + Sync {
    fn create(&self, request: &Envelope) -> BoxAny;
}

/// A `RequestContextFactory` that supplies nothing; used when no operation in the
/// service declares an ambient request-context parameter.
pub struct NoRequestContext;

impl RequestContextFactory for NoRequestContext {
    fn create(&self, _request: &Envelope) -> BoxAny {
        Box::new(())
    }
}

/// A `ServiceFactory` for services with no instance state at all: free-function
/// operation modules (as `soap-service-macros::service` emits) invoke against a
/// unit instance that the generated `InvokeFn` closures simply ignore.
pub struct UnitServiceFactory;

#[async_trait]
impl ServiceFactory for UnitServiceFactory {
    async fn create(&self) -> BoxAny {
        Box::new(())
    }
}
