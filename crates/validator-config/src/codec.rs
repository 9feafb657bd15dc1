//! Packet wire encoding.
//!
//! The validator never looks at wire bytes itself; it goes through a
//! [`Codec`] for certificates fetched from the network and for anchors read
//! from configuration. [`JsonCodec`] is the bundled implementation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ndn_name::Name;
use serde::{Deserialize, Serialize};

use crate::packet::{Certificate, CertificateError, Packet, PacketKind, SignatureInfo};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed packet encoding: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

pub trait Codec: Send + Sync {
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, wire: &[u8]) -> Result<Packet, CodecError>;

    fn decode_certificate(&self, wire: &[u8]) -> Result<Certificate, CodecError> {
        Ok(Certificate::from_packet(self.decode(wire)?)?)
    }
}

fn wire_from_base64(text: &str) -> Result<Vec<u8>, CodecError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

/// Decode a packet stored as base64 text. Whitespace is ignored.
pub fn packet_from_base64(codec: &dyn Codec, text: &str) -> Result<Packet, CodecError> {
    codec.decode(&wire_from_base64(text)?)
}

pub fn packet_to_base64(codec: &dyn Codec, packet: &Packet) -> Result<String, CodecError> {
    Ok(STANDARD.encode(codec.encode(packet)?))
}

/// Decode a certificate stored as base64 text, the format used for
/// `base64-string` anchors and anchor files. Whitespace is ignored.
pub fn certificate_from_base64(codec: &dyn Codec, text: &str) -> Result<Certificate, CodecError> {
    codec.decode_certificate(&wire_from_base64(text)?)
}

pub fn certificate_to_base64(codec: &dyn Codec, cert: &Certificate) -> Result<String, CodecError> {
    packet_to_base64(codec, cert.packet())
}

// ---------------------------------------------------------------------------
// JSON codec
// ---------------------------------------------------------------------------

/// JSON wire format with base64 binary fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[derive(Serialize, Deserialize)]
struct WirePacket {
    kind: PacketKind,
    name: Name,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature_info: Option<SignatureInfo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    signature_value: String,
}

impl Codec for JsonCodec {
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, CodecError> {
        let wire = WirePacket {
            kind: packet.kind(),
            name: packet.name().clone(),
            content: STANDARD.encode(packet.content()),
            signature_info: packet.signature_info().cloned(),
            signature_value: STANDARD.encode(packet.signature_value()),
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    fn decode(&self, wire: &[u8]) -> Result<Packet, CodecError> {
        let wire: WirePacket = serde_json::from_slice(wire)?;
        let mut packet = Packet::new(wire.kind, wire.name);
        packet.set_content(STANDARD.decode(wire.content)?);
        packet.set_signature_info(wire.signature_info);
        packet.set_signature_value(STANDARD.decode(wire.signature_value)?);
        Ok(packet)
    }
}
