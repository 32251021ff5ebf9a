//! Fault Transformer (spec §4.6): renders any dispatch-time error into a version
//! correct SOAP fault envelope.

use crate::encoding::{AddressingVersion, EncoderOptions, Envelope, EnvelopeProperties, MessageEncoder, OutboundEnvelope, SoapVersion};
use crate::error::{DispatchError, FaultCode};
use crate::xml_util::escape;
use std::sync::Arc;

pub struct FaultTransformer;

impl FaultTransformer {
    /// Builds the outbound fault envelope. `request` supplies the WS-Addressing
    /// `RelatesTo`/`To` values to copy back (spec §4.6); `properties` carries any
    /// HTTP response override the caller already attached (e.g. from a user-thrown
    /// fault exception upstream of this transformer).
    pub fn transform(
        error: &DispatchError,
        encoder: &Arc<dyn MessageEncoder>,
        request: Option<&Envelope>,
        properties: EnvelopeProperties,
    ) -> OutboundEnvelope {
        let code = error.fault_code();
        let reason = error.to_string();

        let mut envelope = OutboundEnvelope::empty();
        envelope.properties = properties;

        if encoder.options().addressing == AddressingVersion::WsAddressing10 {
            if let Some(request) = request {
                envelope.relates_to = request.message_id.clone();
                envelope.to = request.reply_to.clone();
            }
            // Fault Action is intentionally left unset; see SPEC_FULL.md §9.
        }

        envelope.body_xml = Some(render_fault_body(encoder.options(), code, &reason));
        envelope
    }
}

fn render_fault_body(options: &EncoderOptions, code: FaultCode, reason: &str) -> String {
    match options.version {
        SoapVersion::Soap11 => format!(
            "<soap:Fault><faultcode>soap:{}</faultcode><faultstring>{}</faultstring></soap:Fault>",
            code.soap11_name(),
            escape(reason)
        ),
        SoapVersion::Soap12 => format!(
            "<soap:Fault><soap:Code><soap:Value>soap:{}</soap:Value></soap:Code><soap:Reason><soap:Text xml:lang=\"en\">{}</soap:Text></soap:Reason></soap:Fault>",
            code.soap12_name(),
            escape(reason)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Soap11Encoder;

    #[test]
    fn renders_soap11_fault_with_client_code() {
        let encoder: Arc<dyn MessageEncoder> = Arc::new(Soap11Encoder::new(EncoderOptions::soap11()));
        let error = DispatchError::NoOperation {
            action: "urn:missing".into(),
        };
        let envelope = FaultTransformer::transform(&error, &encoder, None, EnvelopeProperties::default());
        let body = envelope.body_xml.unwrap();
        assert!(body.contains("soap:Client"));
        assert!(body.contains("urn:missing"));
    }

    #[test]
    fn renders_soap12_fault_with_sender_code() {
        let encoder: Arc<dyn MessageEncoder> =
            Arc::new(crate::encoding::Soap12Encoder::new(EncoderOptions::soap12()));
        let error = DispatchError::NoOperation {
            action: "urn:missing".into(),
        };
        let envelope = FaultTransformer::transform(&error, &encoder, None, EnvelopeProperties::default());
        let body = envelope.body_xml.unwrap();
        assert!(body.contains("soap:Sender"));
    }

    #[test]
    fn copies_relates_to_and_reply_to_under_addressing() {
        let encoder: Arc<dyn MessageEncoder> = Arc::new(Soap11Encoder::new(
            EncoderOptions::soap11().with_addressing(AddressingVersion::WsAddressing10),
        ));
        let request = Envelope::new(
            Default::default(),
            None,
            Some("urn:uuid:abc".to_string()),
            Some("http://client.example/".to_string()),
            None,
            None,
        );
        let error = DispatchError::Internal("boom".into());
        let envelope = FaultTransformer::transform(&error, &encoder, Some(&request), EnvelopeProperties::default());
        assert_eq!(envelope.relates_to.as_deref(), Some("urn:uuid:abc"));
        assert_eq!(envelope.to.as_deref(), Some("http://client.example/"));
    }
}
