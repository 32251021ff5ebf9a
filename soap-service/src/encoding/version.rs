//! SOAP/addressing version and wire-format options (spec §3 `EncoderOptions`).

pub const SOAP_11_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_12_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const WS_ADDRESSING_10_NS: &str = "http://www.w3.org/2005/08/addressing";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => SOAP_11_ENVELOPE_NS,
            SoapVersion::Soap12 => SOAP_12_ENVELOPE_NS,
        }
    }

    pub fn default_content_type(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "text/xml",
            SoapVersion::Soap12 => "application/soap+xml",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingVersion {
    None,
    WsAddressing10,
}

#[derive(Debug, Clone, Copy)]
pub struct WriteEncoding {
    pub omit_xml_declaration: bool,
    pub indent_xml: bool,
}

impl Default for WriteEncoding {
    fn default() -> Self {
        Self {
            omit_xml_declaration: false,
            indent_xml: false,
        }
    }
}

/// Reader-side bounds. `header_prefetch_bytes` mirrors spec §4.2's "64 KiB envelope
/// size window for header prefetch": `read_envelope` rejects the envelope if it
/// scans past this many bytes without having located `<Body>`. `max_envelope_bytes`
/// is a hard cap on the already-buffered body this crate will attempt to parse at all.
#[derive(Debug, Clone, Copy)]
pub struct ReaderLimits {
    pub header_prefetch_bytes: usize,
    pub max_envelope_bytes: usize,
}

impl Default for ReaderLimits {
    fn default() -> Self {
        Self {
            header_prefetch_bytes: 64 * 1024,
            max_envelope_bytes: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EncoderOptions {
    pub version: SoapVersion,
    pub addressing: AddressingVersion,
    pub write: WriteEncoding,
    pub reader_limits: ReaderLimits,
}

impl EncoderOptions {
    pub fn soap11() -> Self {
        Self {
            version: SoapVersion::Soap11,
            addressing: AddressingVersion::None,
            write: WriteEncoding::default(),
            reader_limits: ReaderLimits::default(),
        }
    }

    pub fn soap12() -> Self {
        Self {
            version: SoapVersion::Soap12,
            ..Self::soap11()
        }
    }

    pub fn with_addressing(mut self, addressing: AddressingVersion) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_write_encoding(mut self, write: WriteEncoding) -> Self {
        self.write = write;
        self
    }
}
