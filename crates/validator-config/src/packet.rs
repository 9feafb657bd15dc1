use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use ndn_name::{Component, Name};
use serde::{Deserialize, Serialize};

/// Name under which DigestSha256-signed packets are attributed.
pub const DIGEST_SHA256_IDENTITY: &str = "/localhost/identity/digest-sha256";

/// The reserved signer name for DigestSha256 signatures.
pub fn digest_sha256_identity() -> Name {
    Name::from_components(["localhost", "identity", "digest-sha256"])
}

// ---------------------------------------------------------------------------
// Kinds and signature metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    Interest,
    Data,
}

impl PacketKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interest => "interest",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown packet kind '{0}' (expected data or interest)")]
pub struct UnknownPacketKind(pub String);

impl FromStr for PacketKind {
    type Err = UnknownPacketKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data" => Ok(Self::Data),
            "interest" => Ok(Self::Interest),
            _ => Err(UnknownPacketKind(s.to_string())),
        }
    }
}

/// Signature algorithm carried in a packet's signature info.
///
/// The serialized spelling matches the `sig-type` values accepted in
/// validator configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureType {
    #[serde(rename = "sha256")]
    DigestSha256,
    #[serde(rename = "rsa-sha256")]
    Sha256WithRsa,
    #[serde(rename = "ecdsa-sha256")]
    Sha256WithEcdsa,
    #[serde(rename = "hmac-sha256")]
    HmacWithSha256,
    #[serde(rename = "ed25519")]
    Ed25519,
}

impl SignatureType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DigestSha256 => "sha256",
            Self::Sha256WithRsa => "rsa-sha256",
            Self::Sha256WithEcdsa => "ecdsa-sha256",
            Self::HmacWithSha256 => "hmac-sha256",
            Self::Ed25519 => "ed25519",
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signature type '{0}'")]
pub struct UnknownSignatureType(pub String);

impl FromStr for SignatureType {
    type Err = UnknownSignatureType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::DigestSha256),
            "rsa-sha256" => Ok(Self::Sha256WithRsa),
            "ecdsa-sha256" => Ok(Self::Sha256WithEcdsa),
            "hmac-sha256" => Ok(Self::HmacWithSha256),
            "ed25519" => Ok(Self::Ed25519),
            _ => Err(UnknownSignatureType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature_type: SignatureType,
    /// Name of the signing key. DigestSha256 signatures usually omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_locator: Option<Name>,
}

impl SignatureInfo {
    pub fn new(signature_type: SignatureType, key_locator: Option<Name>) -> Self {
        Self {
            signature_type,
            key_locator,
        }
    }

    pub fn digest_sha256() -> Self {
        Self::new(SignatureType::DigestSha256, None)
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A signed Interest or Data packet.
///
/// The signed portion is computed on first use and cached; every setter that
/// touches a signed field drops the cache.
#[derive(Debug, Clone)]
pub struct Packet {
    kind: PacketKind,
    name: Name,
    content: Vec<u8>,
    signature_info: Option<SignatureInfo>,
    signature_value: Vec<u8>,
    signed_portion: OnceLock<Vec<u8>>,
}

#[derive(Serialize)]
struct SignedFields<'a> {
    kind: PacketKind,
    name: &'a Name,
    content: &'a [u8],
    signature_info: Option<&'a SignatureInfo>,
}

impl Packet {
    pub fn new(kind: PacketKind, name: Name) -> Self {
        Self {
            kind,
            name,
            content: Vec::new(),
            signature_info: None,
            signature_value: Vec::new(),
            signed_portion: OnceLock::new(),
        }
    }

    pub fn data(name: Name) -> Self {
        Self::new(PacketKind::Data, name)
    }

    pub fn interest(name: Name) -> Self {
        Self::new(PacketKind::Interest, name)
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.set_content(content);
        self
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn signature_info(&self) -> Option<&SignatureInfo> {
        self.signature_info.as_ref()
    }

    pub fn signature_type(&self) -> Option<SignatureType> {
        self.signature_info.as_ref().map(|s| s.signature_type)
    }

    pub fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    pub fn set_name(&mut self, name: Name) {
        self.name = name;
        self.signed_portion = OnceLock::new();
    }

    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.content = content.into();
        self.signed_portion = OnceLock::new();
    }

    pub fn set_signature_info(&mut self, info: Option<SignatureInfo>) {
        self.signature_info = info;
        self.signed_portion = OnceLock::new();
    }

    /// The signature value is not part of the signed portion, so the cache
    /// survives this setter.
    pub fn set_signature_value(&mut self, value: impl Into<Vec<u8>>) {
        self.signature_value = value.into();
    }

    /// Canonical bytes covered by the signature.
    pub fn signed_portion(&self) -> &[u8] {
        self.signed_portion.get_or_init(|| {
            let fields = SignedFields {
                kind: self.kind,
                name: &self.name,
                content: &self.content,
                signature_info: self.signature_info.as_ref(),
            };
            // Plain structs of strings and byte arrays always serialize.
            serde_json::to_vec(&fields).unwrap_or_default()
        })
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.content == other.content
            && self.signature_info == other.signature_info
            && self.signature_value == other.signature_value
    }
}

impl Eq for Packet {}

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate {0} is not a data packet")]
    NotData(Name),

    #[error("certificate {0} is not signed")]
    Unsigned(Name),

    #[error("'{0}' is not a certificate name (expected /<identity>/KEY/<key-id>/<issuer>/<version>)")]
    BadName(Name),

    #[error("certificate {0} carries no public key")]
    EmptyKey(Name),
}

/// A Data packet whose content is a public key, named
/// `/<identity>/KEY/<key-id>/<issuer>/<version>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    packet: Packet,
}

impl Certificate {
    pub const KEY_COMPONENT: &'static str = "KEY";

    pub fn from_packet(packet: Packet) -> Result<Self, CertificateError> {
        let name = packet.name();
        if packet.kind() != PacketKind::Data {
            return Err(CertificateError::NotData(name.clone()));
        }
        let key_marker = Component::from(Self::KEY_COMPONENT);
        if name.len() < 4 || name.get(name.len() - 4) != Some(&key_marker) {
            return Err(CertificateError::BadName(name.clone()));
        }
        if packet.signature_info().is_none() {
            return Err(CertificateError::Unsigned(name.clone()));
        }
        if packet.content().is_empty() {
            return Err(CertificateError::EmptyKey(name.clone()));
        }
        Ok(Self { packet })
    }

    pub fn name(&self) -> &Name {
        self.packet.name()
    }

    /// `/<identity>`
    pub fn identity(&self) -> Name {
        self.name().prefix(self.name().len() - 4)
    }

    /// `/<identity>/KEY/<key-id>`
    pub fn key_name(&self) -> Name {
        self.name().prefix(self.name().len() - 2)
    }

    pub fn public_key(&self) -> &[u8] {
        self.packet.content()
    }

    /// Key locator of the issuer that signed this certificate.
    pub fn issuer(&self) -> Option<&Name> {
        self.packet
            .signature_info()
            .and_then(|s| s.key_locator.as_ref())
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    fn signed(uri: &str) -> Packet {
        let mut p = Packet::data(name(uri)).with_content(vec![1, 2, 3]);
        p.set_signature_info(Some(SignatureInfo::new(
            SignatureType::Ed25519,
            Some(name("/issuer/KEY/k0")),
        )));
        p
    }

    #[test]
    fn signature_type_spellings() {
        for t in [
            SignatureType::DigestSha256,
            SignatureType::Sha256WithRsa,
            SignatureType::Sha256WithEcdsa,
            SignatureType::HmacWithSha256,
            SignatureType::Ed25519,
        ] {
            assert_eq!(t.as_str().parse::<SignatureType>().unwrap(), t);
        }
        assert!("md5".parse::<SignatureType>().is_err());
        assert_eq!("DATA".parse::<PacketKind>().unwrap(), PacketKind::Data);
    }

    #[test]
    fn setters_invalidate_signed_portion() {
        let mut p = signed("/a/b");
        let before = p.signed_portion().to_vec();

        p.set_signature_value(vec![9; 4]);
        assert_eq!(p.signed_portion(), before.as_slice());

        p.set_content(vec![4, 5, 6]);
        assert_ne!(p.signed_portion(), before.as_slice());

        let mut q = signed("/a/b");
        q.set_name(name("/a/c"));
        assert_ne!(q.signed_portion(), before.as_slice());
    }

    #[test]
    fn signature_info_is_signed() {
        let mut p = signed("/a");
        let before = p.signed_portion().to_vec();
        p.set_signature_info(Some(SignatureInfo::digest_sha256()));
        assert_ne!(p.signed_portion(), before.as_slice());
    }

    #[test]
    fn certificate_name_parts() {
        let cert = Certificate::from_packet(signed("/ndn/alice/KEY/k1/self/v1")).unwrap();
        assert_eq!(cert.identity(), name("/ndn/alice"));
        assert_eq!(cert.key_name(), name("/ndn/alice/KEY/k1"));
        assert_eq!(cert.public_key(), &[1, 2, 3]);
        assert_eq!(cert.issuer(), Some(&name("/issuer/KEY/k0")));
    }

    #[test]
    fn certificate_shape_is_checked() {
        assert!(matches!(
            Certificate::from_packet(signed("/ndn/alice/k1")),
            Err(CertificateError::BadName(_))
        ));
        assert!(matches!(
            Certificate::from_packet(Packet::data(name("/a/KEY/k/i/v")).with_content(vec![1])),
            Err(CertificateError::Unsigned(_))
        ));
        let mut interest = Packet::interest(name("/a/KEY/k/i/v")).with_content(vec![1]);
        interest.set_signature_info(Some(SignatureInfo::digest_sha256()));
        assert!(matches!(
            Certificate::from_packet(interest),
            Err(CertificateError::NotData(_))
        ));
    }
}
