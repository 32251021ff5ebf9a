//! Message Encoder Set (spec §4.2): parses/serializes SOAP envelopes at a
//! negotiated version and selects an encoder by request content-type.

use crate::encoding::envelope::{Envelope, OutboundEnvelope};
use crate::encoding::version::{EncoderOptions, SoapVersion, WS_ADDRESSING_10_NS};
use crate::error::EncoderError;
use crate::xml_util;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::sync::Arc;

pub trait MessageEncoder: Send + Sync {
    fn options(&self) -> &EncoderOptions;

    fn soap_version(&self) -> SoapVersion {
        self.options().version
    }

    /// Whether this encoder should handle a request carrying the given
    /// `Content-Type` header value (spec §4.2 selection policy).
    fn content_type_matches(&self, content_type: &str) -> bool;

    fn default_content_type(&self) -> &'static str {
        self.options().version.default_content_type()
    }

    fn read(&self, body: &[u8]) -> Result<Envelope, EncoderError>;

    fn write(&self, envelope: &OutboundEnvelope) -> Result<Vec<u8>, EncoderError>;
}

/// Shared parse routine for both SOAP versions; only the expected envelope
/// namespace differs.
fn read_envelope(options: &EncoderOptions, body: &[u8]) -> Result<Envelope, EncoderError> {
    if body.len() > options.reader_limits.max_envelope_bytes {
        return Err(EncoderError::TooLarge);
    }
    let xml = std::str::from_utf8(body)
        .map_err(|e| EncoderError::Malformed(format!("body is not valid UTF-8: {e}")))?;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut headers: HashMap<String, String> = HashMap::new();
    let mut action = None;
    let mut message_id = None;
    let mut reply_to = None;
    let mut relates_to = None;
    let mut body_bytes: Option<Vec<u8>> = None;

    #[derive(PartialEq)]
    enum Stage {
        BeforeEnvelope,
        InEnvelope,
        InHeader,
    }
    let mut stage = Stage::BeforeEnvelope;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| EncoderError::Xml(e.to_string()))?;
        if body_bytes.is_none()
            && reader.buffer_position() as usize > options.reader_limits.header_prefetch_bytes
        {
            return Err(EncoderError::HeaderPrefetchExceeded);
        }
        match event {
            Event::Start(ref e) => {
                let local = xml_util::local_name(e.name().as_ref());
                match stage {
                    Stage::BeforeEnvelope => {
                        if local != "Envelope" {
                            return Err(EncoderError::Malformed(
                                "missing SOAP Envelope root element".into(),
                            ));
                        }
                        let declares_expected_ns = e.attributes().flatten().any(|attr| {
                            attr.value.as_ref() == options.version.envelope_namespace().as_bytes()
                        });
                        if !declares_expected_ns {
                            return Err(EncoderError::VersionMismatch);
                        }
                        stage = Stage::InEnvelope;
                    }
                    Stage::InEnvelope => {
                        if local == "Header" {
                            stage = Stage::InHeader;
                        } else if local == "Body" {
                            let start = reader.buffer_position() as usize;
                            let end = body_end_offset(&mut reader)?;
                            let start = start.min(body.len());
                            let end = end.min(body.len()).max(start);
                            body_bytes = Some(body[start..end].to_vec());
                            break;
                        }
                    }
                    Stage::InHeader => {
                        let captured = capture_element(&mut reader, e)?;
                        let text = xml_util::element_text(&captured);
                        match local.as_str() {
                            "Action" => action = Some(text.clone()),
                            "MessageID" => message_id = Some(text.clone()),
                            "ReplyTo" => {
                                reply_to = Some(
                                    xml_util::nested_text(&captured, "Address")
                                        .unwrap_or_else(|| text.clone()),
                                )
                            }
                            "RelatesTo" => relates_to = Some(text.clone()),
                            _ => {}
                        }
                        headers.insert(local, captured);
                    }
                }
            }
            Event::End(ref e) => {
                let local = xml_util::local_name(e.name().as_ref());
                if stage == Stage::InHeader && local == "Header" {
                    stage = Stage::InEnvelope;
                } else if stage == Stage::InEnvelope && local == "Envelope" {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    // A request without a SOAPAction HTTP header falls back to a header-derived
    // or body-derived action later in the Operation Dispatcher; here we only carry
    // whatever WS-Addressing header supplied it, if any.
    let _ = WS_ADDRESSING_10_NS;

    Ok(Envelope::new(
        headers,
        action,
        message_id,
        reply_to,
        relates_to,
        body_bytes,
    ))
}

/// Captures the outer XML (`<Local ...>...</Local>`) of the element whose start
/// event was just consumed, advancing `reader` past its matching end tag. Ported
/// from the teacher's `soap::envelope` capture loop.
fn capture_element(
    reader: &mut Reader<&[u8]>,
    start: &quick_xml::events::BytesStart,
) -> Result<String, EncoderError> {
    use quick_xml::Writer;
    use std::io::Cursor;

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Start(start.clone()))
        .map_err(|e| EncoderError::Xml(e.to_string()))?;

    let mut buf = Vec::new();
    let mut depth = 1usize;
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| EncoderError::Xml(e.to_string()))?;
        match event {
            Event::Start(ref e) => {
                depth += 1;
                writer
                    .write_event(Event::Start(e.clone()))
                    .map_err(|e| EncoderError::Xml(e.to_string()))?;
            }
            Event::End(ref e) => {
                writer
                    .write_event(Event::End(e.clone()))
                    .map_err(|e| EncoderError::Xml(e.to_string()))?;
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Text(ref t) => {
                writer
                    .write_event(Event::Text(t.clone()))
                    .map_err(|e| EncoderError::Xml(e.to_string()))?;
            }
            Event::CData(ref c) => {
                writer
                    .write_event(Event::CData(c.clone()))
                    .map_err(|e| EncoderError::Xml(e.to_string()))?;
            }
            Event::Empty(ref e) => {
                writer
                    .write_event(Event::Empty(e.clone()))
                    .map_err(|e| EncoderError::Xml(e.to_string()))?;
            }
            Event::Eof => {
                return Err(EncoderError::Malformed(
                    "unexpected end of document inside header element".into(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| EncoderError::Xml(e.to_string()))
}

/// Scans forward from just inside a consumed `<Body>` start tag to the byte
/// offset of its matching `</Body>`, tracking nesting depth the way
/// `capture_element` does. Unlike `capture_element` this doesn't re-serialize:
/// the body is handed on as the exact original bytes so the argument binder
/// re-parses the wire representation, not a `quick_xml::Writer` rewrite of it.
fn body_end_offset(reader: &mut Reader<&[u8]>) -> Result<usize, EncoderError> {
    let mut buf = Vec::new();
    let mut depth = 1usize;
    loop {
        let pos_before_event = reader.buffer_position() as usize;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| EncoderError::Xml(e.to_string()))?;
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(pos_before_event);
                }
            }
            Event::Eof => {
                return Err(EncoderError::Malformed(
                    "unexpected end of document inside Body element".into(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }
}

fn write_envelope(
    options: &EncoderOptions,
    tag_prefix: &str,
    envelope: &OutboundEnvelope,
) -> Result<Vec<u8>, EncoderError> {
    let ns = options.version.envelope_namespace();
    let mut out = String::new();
    if !options.write.omit_xml_declaration {
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    }
    out.push_str(&format!(
        "<{tag_prefix}:Envelope xmlns:{tag_prefix}=\"{ns}\">"
    ));

    let mut header_children = envelope.header_elements.clone();
    if options.addressing == crate::encoding::version::AddressingVersion::WsAddressing10 {
        if let Some(action) = &envelope.action {
            header_children.push(format!(
                "<a:Action xmlns:a=\"{WS_ADDRESSING_10_NS}\">{action}</a:Action>"
            ));
        }
        if let Some(relates_to) = &envelope.relates_to {
            header_children.push(format!(
                "<a:RelatesTo xmlns:a=\"{WS_ADDRESSING_10_NS}\">{relates_to}</a:RelatesTo>"
            ));
        }
        if let Some(to) = &envelope.to {
            header_children.push(format!("<a:To xmlns:a=\"{WS_ADDRESSING_10_NS}\">{to}</a:To>"));
        }
    }
    if !header_children.is_empty() {
        out.push_str(&format!("<{tag_prefix}:Header>"));
        for child in &header_children {
            out.push_str(child);
        }
        out.push_str(&format!("</{tag_prefix}:Header>"));
    }

    out.push_str(&format!("<{tag_prefix}:Body>"));
    if let Some(body) = &envelope.body_xml {
        out.push_str(body);
    }
    out.push_str(&format!("</{tag_prefix}:Body>"));
    out.push_str(&format!("</{tag_prefix}:Envelope>"));

    Ok(out.into_bytes())
}

pub struct Soap11Encoder {
    options: EncoderOptions,
}

impl Soap11Encoder {
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }
}

impl MessageEncoder for Soap11Encoder {
    fn options(&self) -> &EncoderOptions {
        &self.options
    }

    fn content_type_matches(&self, content_type: &str) -> bool {
        content_type
            .split(';')
            .next()
            .map(|mime| mime.trim().eq_ignore_ascii_case("text/xml"))
            .unwrap_or(false)
    }

    fn read(&self, body: &[u8]) -> Result<Envelope, EncoderError> {
        read_envelope(&self.options, body)
    }

    fn write(&self, envelope: &OutboundEnvelope) -> Result<Vec<u8>, EncoderError> {
        write_envelope(&self.options, "soap", envelope)
    }
}

pub struct Soap12Encoder {
    options: EncoderOptions,
}

impl Soap12Encoder {
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }
}

impl MessageEncoder for Soap12Encoder {
    fn options(&self) -> &EncoderOptions {
        &self.options
    }

    fn content_type_matches(&self, content_type: &str) -> bool {
        content_type
            .split(';')
            .next()
            .map(|mime| mime.trim().eq_ignore_ascii_case("application/soap+xml"))
            .unwrap_or(false)
    }

    fn read(&self, body: &[u8]) -> Result<Envelope, EncoderError> {
        read_envelope(&self.options, body)
    }

    fn write(&self, envelope: &OutboundEnvelope) -> Result<Vec<u8>, EncoderError> {
        write_envelope(&self.options, "env", envelope)
    }
}

/// Holds the endpoint's configured encoders in declared order; the first is the
/// default (spec §4.2).
pub struct EncoderSet {
    encoders: Vec<Arc<dyn MessageEncoder>>,
}

impl EncoderSet {
    pub fn new(encoders: Vec<Arc<dyn MessageEncoder>>) -> Self {
        assert!(!encoders.is_empty(), "an endpoint needs at least one encoder");
        Self { encoders }
    }

    pub fn default_soap11() -> Self {
        Self::new(vec![Arc::new(Soap11Encoder::new(EncoderOptions::soap11()))])
    }

    /// Iterates encoders in declared order; the first whose content-type predicate
    /// accepts `content_type` is chosen, else the first encoder (spec §4.2).
    pub fn select(&self, content_type: Option<&str>) -> &Arc<dyn MessageEncoder> {
        if let Some(content_type) = content_type {
            if let Some(found) = self
                .encoders
                .iter()
                .find(|e| e.content_type_matches(content_type))
            {
                return found;
            }
        }
        &self.encoders[0]
    }

    pub fn default_encoder(&self) -> &Arc<dyn MessageEncoder> {
        &self.encoders[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MessageEncoder>> {
        self.encoders.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_soap11_envelope_body() {
        let encoder = Soap11Encoder::new(EncoderOptions::soap11());
        let xml = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <Add xmlns="http://example.com/calc"><a>1</a><b>2</b></Add>
  </soap:Body>
</soap:Envelope>"#;
        let mut envelope = encoder.read(xml.as_bytes()).unwrap();
        assert!(!envelope.is_empty);
        let body = envelope.take_body_bytes().unwrap();
        let body_str = String::from_utf8(body).unwrap();
        assert!(body_str.contains("<Add"));
        assert!(!body_str.contains("</soap:Body>"));
        assert!(!body_str.contains("</soap:Envelope>"));
        assert!(envelope.take_body_bytes().is_err());
    }

    #[test]
    fn empty_body_is_reported_as_empty() {
        let encoder = Soap11Encoder::new(EncoderOptions::soap11());
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
<soap:Body></soap:Body></soap:Envelope>"#;
        let envelope = encoder.read(xml.as_bytes()).unwrap();
        assert!(envelope.is_empty);
    }

    #[test]
    fn rejects_envelope_whose_header_exceeds_the_prefetch_window() {
        let mut options = EncoderOptions::soap11();
        options.reader_limits.header_prefetch_bytes = 64;
        let encoder = Soap11Encoder::new(options);
        let padding = "x".repeat(200);
        let xml = format!(
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
<soap:Header><Padding>{padding}</Padding></soap:Header>
<soap:Body></soap:Body></soap:Envelope>"#
        );
        assert!(matches!(
            encoder.read(xml.as_bytes()),
            Err(EncoderError::HeaderPrefetchExceeded)
        ));
    }

    #[test]
    fn rejects_wrong_version_namespace() {
        let encoder = Soap11Encoder::new(EncoderOptions::soap11());
        let xml = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">
<env:Body></env:Body></env:Envelope>"#;
        assert!(matches!(
            encoder.read(xml.as_bytes()),
            Err(EncoderError::VersionMismatch)
        ));
    }

    #[test]
    fn selects_encoder_by_content_type() {
        let set = EncoderSet::new(vec![
            Arc::new(Soap11Encoder::new(EncoderOptions::soap11())),
            Arc::new(Soap12Encoder::new(EncoderOptions::soap12())),
        ]);
        assert_eq!(
            set.select(Some("application/soap+xml; charset=utf-8"))
                .soap_version(),
            SoapVersion::Soap12
        );
        assert_eq!(
            set.select(Some("text/xml; charset=utf-8")).soap_version(),
            SoapVersion::Soap11
        );
        assert_eq!(
            set.select(Some("application/weird")).soap_version(),
            SoapVersion::Soap11
        );
    }

    #[test]
    fn writes_envelope_with_body() {
        let encoder = Soap11Encoder::new(EncoderOptions::soap11());
        let mut env = OutboundEnvelope::empty();
        env.body_xml = Some("<AddResponse><AddResult>3</AddResult></AddResponse>".to_string());
        let bytes = encoder.write(&env).unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("<soap:Envelope"));
        assert!(xml.contains("<AddResponse>"));
    }
}
