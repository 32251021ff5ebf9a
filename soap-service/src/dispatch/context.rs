//! Per-request mutable state (spec §3's `OperationContext (runtime)`), owned
//! exclusively by the single task handling one request (spec §5).

use crate::encoding::{Envelope, OutboundEnvelope};
use crate::error::DispatchError;
use crate::model::{ContractDescription, OperationDescription, ServiceDescription};
use crate::value::BoxAny;
use std::collections::HashMap;
use std::sync::Arc;

pub struct OperationContext {
    pub request: Envelope,
    service: Arc<ServiceDescription>,
    /// Filled in once the Operation Dispatcher reaches its `Resolved`/`Matched`
    /// states (spec §4.4); `None` beforehand, so request filters that run before
    /// action resolution see no operation yet.
    resolved: Option<(usize, usize)>,
    pub service_instance: Option<BoxAny>,
    pub arguments: Vec<Option<BoxAny>>,
    pub return_value: Option<BoxAny>,
    /// Out/ref parameter values collected by name, for the response body writer
    /// (spec §4.4 "Response building").
    pub out_values: HashMap<String, String>,
    pub response: Option<OutboundEnvelope>,
    pub fault: Option<DispatchError>,
    pub content_type: String,
}

impl OperationContext {
    pub fn new(request: Envelope, service: Arc<ServiceDescription>, content_type: String) -> Self {
        Self {
            request,
            service,
            resolved: None,
            service_instance: None,
            arguments: Vec::new(),
            return_value: None,
            out_values: HashMap::new(),
            response: None,
            fault: None,
            content_type,
        }
    }

    pub fn set_resolved(&mut self, contract_index: usize, operation_index: usize) {
        self.resolved = Some((contract_index, operation_index));
    }

    pub fn contract(&self) -> Option<&ContractDescription> {
        self.resolved
            .map(|(contract_index, _)| &self.service.contracts[contract_index])
    }

    pub fn operation(&self) -> Option<&OperationDescription> {
        self.resolved
            .map(|(contract_index, operation_index)| {
                &self.service.contracts[contract_index].operations[operation_index]
            })
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }
}
