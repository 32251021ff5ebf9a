//! Operation Dispatcher (spec §4.4): the central state machine driving one
//! request from envelope read through response write.

use crate::binder::ArgumentBinder;
use crate::dispatch::context::OperationContext;
use crate::dispatch::filters::{ActionFilter, Filter, Inspector, ModelBindingFilter, OperationTuner};
use crate::encoding::{EncoderSet, MessageEncoder, OutboundEnvelope};
use crate::error::{DispatchError, InvocationError};
use crate::fault::FaultTransformer;
use crate::model::ServiceDescription;
use crate::service::{RequestContextFactory, ServiceFactory};
use crate::value::BoxAny;
use crate::xml_util;
use std::sync::Arc;

/// What the router writes back to the HTTP layer.
pub struct DispatchOutcome {
    pub status: u16,
    pub reason: Option<String>,
    pub content_type: String,
    pub soap_action: String,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

/// Applies a response envelope's [`crate::encoding::ResponseOverride`] (if any) to an
/// outcome already built from that envelope (spec §4.4/§4.6: "allow user-attached HTTP
/// response overrides on the envelope's properties to override status code, reason
/// phrase, and add headers", applied uniformly for success and fault paths). Filters'
/// `on_response` is the one hook that runs on every exit path after the envelope
/// exists, so it is where such an override is expected to be set.
fn apply_response_override(outcome: &mut DispatchOutcome, envelope: &OutboundEnvelope) {
    if let Some(over) = &envelope.properties.response_override {
        if let Some(status) = over.status {
            outcome.status = status;
        }
        if let Some(reason) = &over.reason {
            outcome.reason = Some(reason.clone());
        }
        outcome.headers.extend(over.headers.iter().cloned());
    }
}

pub struct OperationDispatcher {
    pub service: Arc<ServiceDescription>,
    pub encoders: EncoderSet,
    pub service_factory: Arc<dyn ServiceFactory>,
    pub request_context_factory: Arc<dyn RequestContextFactory>,
    pub filters: Vec<Arc<dyn Filter>>,
    pub inspectors: Vec<Arc<dyn Inspector>>,
    pub model_binding_filters: Vec<Arc<dyn ModelBindingFilter>>,
    pub action_filters: Vec<Arc<dyn ActionFilter>>,
    pub tuners: Vec<Arc<dyn OperationTuner>>,
}

impl OperationDispatcher {
    pub async fn dispatch(
        &self,
        content_type: Option<&str>,
        soap_action_header: Option<&str>,
        body: &[u8],
    ) -> DispatchOutcome {
        let encoder = self.encoders.select(content_type).clone();

        // Start -> EnvRead
        let envelope = match encoder.read(body) {
            Ok(env) => env,
            Err(err) => {
                let dispatch_err: DispatchError = err.into();
                return self.fault_outcome(&encoder, &dispatch_err, None, Default::default(), content_type);
            }
        };

        let mut ctx = OperationContext::new(
            envelope,
            self.service.clone(),
            content_type.unwrap_or(encoder.default_content_type()).to_string(),
        );

        // EnvRead -> Filtered: request filters in declared order.
        for filter in &self.filters {
            if let Err(err) = filter.on_request(&mut ctx).await {
                return self.faulting(&encoder, err, &mut ctx).await;
            }
        }

        // Filtered -> Resolved: determine the action string, then run inspectors
        // (spec §4.4: inspectors run in the Filtered -> Resolved transition,
        // strictly before operation matching, with no carve-out for an action
        // that ultimately fails to resolve).
        let action = soap_action_header
            .map(|s| s.to_string())
            .or_else(|| ctx.request.action.clone())
            .unwrap_or_default();

        let mut correlations = Vec::with_capacity(self.inspectors.len());
        for inspector in &self.inspectors {
            correlations.push(inspector.after_receive_request(&ctx).await);
        }

        let Some((contract_index, operation_index)) = self.service.resolve_indices(&action) else {
            let err = DispatchError::NoOperation { action };
            return self.faulting_with_inspectors(&encoder, err, &mut ctx, correlations).await;
        };
        ctx.set_resolved(contract_index, operation_index);

        // Resolved -> Matched: obtain service instance, bind arguments, run
        // model-binding/action filters and tuners, invoke.
        let is_one_way = ctx.operation().expect("resolved").is_one_way;
        let soap_action_reply = ctx
            .operation()
            .expect("resolved")
            .reply_action
            .clone()
            .unwrap_or_default();

        match self.invoke(&mut ctx).await {
            Ok(()) => {}
            Err(err) => return self.faulting_with_inspectors(&encoder, err, &mut ctx, correlations).await,
        }

        // Invoked -> Written (or immediate 202 for one-way).
        if is_one_way {
            self.run_inspectors_reverse(&mut ctx, correlations).await;
            return self.finish_one_way(&encoder, &mut ctx).await;
        }

        let outbound = self.build_response_envelope(&ctx, &soap_action_reply);
        ctx.response = Some(outbound);
        self.run_inspectors_reverse(&mut ctx, correlations).await;

        match encoder.write(ctx.response.as_ref().expect("response set")) {
            Ok(bytes) => {
                let mut outcome = DispatchOutcome {
                    status: 200,
                    reason: None,
                    content_type: ctx.content_type.clone(),
                    soap_action: soap_action_reply,
                    body: bytes,
                    headers: Vec::new(),
                };
                self.run_response_filters(&mut ctx).await;
                apply_response_override(&mut outcome, ctx.response.as_ref().expect("response set"));
                outcome
            }
            Err(err) => {
                let dispatch_err = DispatchError::ResponseWrite(err.to_string());
                self.faulting_after_response(&encoder, dispatch_err, &mut ctx).await
            }
        }
    }

    async fn invoke(&self, ctx: &mut OperationContext) -> Result<(), DispatchError> {
        let mut instance = self.service_factory.create().await;

        let mut body_bytes = ctx.request.take_body_bytes().unwrap_or_default();
        if ctx.request.is_empty {
            body_bytes = Vec::new();
        }

        let request_context = if ctx
            .operation()
            .expect("resolved")
            .request_context_parameter()
            .is_some()
        {
            Some(self.request_context_factory.create(&ctx.request))
        } else {
            None
        };

        let operation = ctx.operation().expect("resolved");
        let args = ArgumentBinder::bind(operation, &body_bytes, &ctx.request.headers, request_context)?;

        self.service_factory
            .apply_message_headers(&mut instance, &ctx.request.headers);

        ctx.service_instance = Some(instance);
        ctx.arguments = args;

        for filter in &self.model_binding_filters {
            filter.on_bound(ctx).await?;
        }
        for filter in &self.action_filters {
            filter.on_action(ctx).await?;
        }
        for tuner in &self.tuners {
            tuner.tune(ctx).await?;
        }

        let operation = ctx.operation().expect("resolved");
        let args: Vec<BoxAny> = ctx
            .arguments
            .drain(..)
            .map(|a| a.unwrap_or_else(|| Box::new(())))
            .collect();
        let instance = ctx.service_instance.take().expect("instance set above");

        let invoke = operation.invoke.clone();
        let join = tokio::spawn(async move { invoke(instance, args).await });
        let outcome = match join.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => return Err(DispatchError::Invocation(err)),
            Err(join_err) => {
                // Exception-unwrapping: a panic inside the user method surfaces as a
                // JoinError here; unwrap it to the same InvocationError the direct
                // error path uses (spec §4.6 "unwrap one layer"), downcasting the
                // panic payload so the fault carries the inner message rather than a
                // generic placeholder (spec §8 scenario 6).
                let message = if join_err.is_panic() {
                    let payload = join_err.into_panic();
                    if let Some(s) = payload.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = payload.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "operation method panicked".to_string()
                    }
                } else {
                    join_err.to_string()
                };
                return Err(DispatchError::Invocation(InvocationError::Panicked(message)));
            }
        };

        if let Some(return_value) = &outcome.return_value {
            for reader in &operation.out_readers {
                let value = (reader.read)(return_value).map_err(DispatchError::Binding)?;
                ctx.out_values.insert(reader.parameter_name.clone(), value);
            }
        }
        ctx.return_value = outcome.return_value;
        Ok(())
    }

    fn build_response_envelope(&self, ctx: &OperationContext, reply_action: &str) -> OutboundEnvelope {
        let operation = ctx.operation().expect("resolved");
        let mut envelope = OutboundEnvelope::empty();
        envelope.action = Some(reply_action.to_string());
        envelope.relates_to = ctx.request.message_id.clone();
        envelope.to = ctx.request.reply_to.clone();

        if let Some(return_value) = &ctx.return_value {
            for header in &operation.response_headers {
                if let Ok(Some(value)) = (header.read)(return_value) {
                    let ns = header
                        .namespace
                        .as_deref()
                        .unwrap_or(&operation.response_namespace);
                    envelope.header_elements.push(format!(
                        "<{name} xmlns=\"{ns}\" soap:mustUnderstand=\"{must_understand}\">{value}</{name}>",
                        name = header.name,
                        must_understand = if header.must_understand { "1" } else { "0" },
                        value = xml_util::escape(&value),
                    ));
                }
            }
        }

        let mut inner = String::new();
        if let (Some(codec), Some(return_value)) = (&operation.response_codec, &ctx.return_value) {
            if let Ok(serialized) = (codec.serialize_data_contract)(return_value) {
                inner.push_str(&xml_util::strip_outer_element(&serialized));
            }
        }
        for (name, value) in &ctx.out_values {
            inner.push_str(&format!("<{name}>{}</{name}>", xml_util::escape(value)));
        }

        envelope.body_xml = Some(format!(
            "<{name} xmlns=\"{ns}\">{inner}</{name}>",
            name = operation.response_element,
            ns = operation.response_namespace
        ));
        envelope
    }

    async fn run_inspectors_reverse(&self, ctx: &mut OperationContext, correlations: Vec<BoxAny>) {
        for (inspector, correlation) in self.inspectors.iter().rev().zip(correlations.into_iter().rev()) {
            inspector.before_send_reply(ctx, correlation).await;
        }
    }

    async fn run_response_filters(&self, ctx: &mut OperationContext) {
        for filter in self.filters.iter().rev() {
            filter.on_response(ctx).await;
        }
    }

    async fn finish_one_way(&self, _encoder: &Arc<dyn MessageEncoder>, ctx: &mut OperationContext) -> DispatchOutcome {
        let mut outcome = DispatchOutcome {
            status: 202,
            reason: None,
            content_type: ctx.content_type.clone(),
            soap_action: String::new(),
            body: Vec::new(),
            headers: Vec::new(),
        };
        self.run_response_filters(ctx).await;
        if let Some(response) = &ctx.response {
            apply_response_override(&mut outcome, response);
        }
        outcome
    }

    async fn faulting(
        &self,
        encoder: &Arc<dyn MessageEncoder>,
        err: DispatchError,
        ctx: &mut OperationContext,
    ) -> DispatchOutcome {
        self.faulting_with_inspectors(encoder, err, ctx, Vec::new()).await
    }

    async fn faulting_with_inspectors(
        &self,
        encoder: &Arc<dyn MessageEncoder>,
        err: DispatchError,
        ctx: &mut OperationContext,
        correlations: Vec<BoxAny>,
    ) -> DispatchOutcome {
        ctx.fault = Some(err);
        let fault_err = ctx.fault.as_ref().expect("just set");
        let properties = ctx.request.properties.clone();
        let outbound = FaultTransformer::transform(fault_err, encoder, Some(&ctx.request), properties);
        let status = ctx.fault.as_ref().expect("just set").http_status();
        ctx.response = Some(outbound);

        if !correlations.is_empty() {
            self.run_inspectors_reverse(ctx, correlations).await;
        }

        let body = encoder
            .write(ctx.response.as_ref().expect("just set"))
            .unwrap_or_default();
        let content_type = ctx.content_type.clone();
        self.run_response_filters(ctx).await;

        let mut outcome = DispatchOutcome {
            status,
            reason: None,
            content_type,
            soap_action: String::new(),
            body,
            headers: Vec::new(),
        };
        apply_response_override(&mut outcome, ctx.response.as_ref().expect("just set"));
        outcome
    }

    async fn faulting_after_response(
        &self,
        encoder: &Arc<dyn MessageEncoder>,
        err: DispatchError,
        ctx: &mut OperationContext,
    ) -> DispatchOutcome {
        self.faulting(encoder, err, ctx).await
    }

    fn fault_outcome(
        &self,
        encoder: &Arc<dyn MessageEncoder>,
        err: &DispatchError,
        request: Option<&crate::encoding::Envelope>,
        properties: crate::encoding::EnvelopeProperties,
        content_type: Option<&str>,
    ) -> DispatchOutcome {
        let outbound = FaultTransformer::transform(err, encoder, request, properties);
        let body = encoder.write(&outbound).unwrap_or_default();
        let mut outcome = DispatchOutcome {
            status: err.http_status(),
            reason: None,
            content_type: content_type
                .unwrap_or_else(|| encoder.default_content_type())
                .to_string(),
            soap_action: String::new(),
            body,
            headers: Vec::new(),
        };
        apply_response_override(&mut outcome, &outbound);
        outcome
    }
}
