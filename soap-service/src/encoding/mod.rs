//! Message Encoder Set (spec §4.2).

mod encoder;
mod envelope;
mod version;

pub use encoder::{EncoderSet, MessageEncoder, Soap11Encoder, Soap12Encoder};
pub use envelope::{Envelope, EnvelopeProperties, OutboundEnvelope, ResponseOverride};
pub use version::{
    AddressingVersion, EncoderOptions, ReaderLimits, SoapVersion, WriteEncoding,
    SOAP_11_ENVELOPE_NS, SOAP_12_ENVELOPE_NS, WS_ADDRESSING_10_NS,
};
