//! The runtime `Envelope` and `OutboundEnvelope` types (spec §3).
//!
//! Rust ergonomics split spec's single "Envelope (runtime)" concept in two: an
//! inbound [`Envelope`] produced by [`crate::encoding::MessageEncoder::read`], and an
//! outbound [`OutboundEnvelope`] consumed by
//! [`crate::encoding::MessageEncoder::write`]. Both carry the same addressing and
//! properties fields spec §3 names.

use crate::error::BindingError;
use std::collections::HashMap;

/// A side-channel HTTP response override a user's operation (or a fault) can attach
/// to the envelope it produces (spec §9's "dynamic HTTP response overrides").
#[derive(Debug, Clone, Default)]
pub struct ResponseOverride {
    pub status: Option<u16>,
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct EnvelopeProperties {
    pub response_override: Option<ResponseOverride>,
    pub extra: HashMap<String, String>,
}

/// A parsed inbound SOAP message.
pub struct Envelope {
    /// Captured header fragments keyed by local name (each value is the full
    /// `<LocalName>...</LocalName>` XML, to allow message-contract header members
    /// to re-deserialize their own content).
    pub headers: HashMap<String, String>,
    pub action: Option<String>,
    pub message_id: Option<String>,
    pub reply_to: Option<String>,
    pub relates_to: Option<String>,
    pub is_empty: bool,
    pub properties: EnvelopeProperties,
    body: Option<Vec<u8>>,
}

impl Envelope {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        headers: HashMap<String, String>,
        action: Option<String>,
        message_id: Option<String>,
        reply_to: Option<String>,
        relates_to: Option<String>,
        body: Option<Vec<u8>>,
    ) -> Self {
        let is_empty = body
            .as_deref()
            .map(crate::xml_util::is_blank)
            .unwrap_or(true);
        Self {
            headers,
            action,
            message_id,
            reply_to,
            relates_to,
            is_empty,
            properties: EnvelopeProperties::default(),
            body,
        }
    }

    /// Takes ownership of the body bytes, leaving `None` behind. The Argument
    /// Binder calls this at most once per request (spec §5: "`GetReaderAtBodyContents`
    /// must be invoked at most once per request").
    pub fn take_body_bytes(&mut self) -> Result<Vec<u8>, BindingError> {
        self.body.take().ok_or(BindingError::BodyAlreadyConsumed)
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

/// A message about to be written: a successful response or a fault.
pub struct OutboundEnvelope {
    pub action: Option<String>,
    pub relates_to: Option<String>,
    pub to: Option<String>,
    /// Fully-rendered `<Header>` child elements, ready to embed verbatim.
    pub header_elements: Vec<String>,
    /// Fully-rendered body content (the operation's response element, or a SOAP
    /// Fault element). `None` means an empty body (one-way acknowledgement).
    pub body_xml: Option<String>,
    pub properties: EnvelopeProperties,
}

impl OutboundEnvelope {
    pub fn empty() -> Self {
        Self {
            action: None,
            relates_to: None,
            to: None,
            header_elements: Vec::new(),
            body_xml: None,
            properties: EnvelopeProperties::default(),
        }
    }
}
