//! Keys, certificates and signing helpers shared by unit tests.

use ed25519_dalek::{Signer, SigningKey};
use ndn_name::Name;
use sha2::{Digest, Sha256};

use crate::codec::{Codec, JsonCodec};
use crate::packet::{Certificate, Packet, SignatureInfo, SignatureType};

pub(crate) fn name(uri: &str) -> Name {
    uri.parse().unwrap()
}

/// An identity with one ed25519 key and its certificate.
pub(crate) struct TestIdentity {
    pub identity: Name,
    pub key_name: Name,
    pub signing_key: SigningKey,
    pub cert: Certificate,
}

impl TestIdentity {
    fn key_parts(identity: &str, seed: u8) -> (Name, Name, SigningKey) {
        let identity = name(identity);
        let signing_key = SigningKey::from_bytes(&[seed; 32]);
        let key_name = identity.clone().append("KEY").append(format!("k{seed}").as_str());
        (identity, key_name, signing_key)
    }

    pub fn self_signed(identity: &str, seed: u8) -> Self {
        let (identity, key_name, signing_key) = Self::key_parts(identity, seed);
        let cert = issue(&key_name, "self", &signing_key, &key_name, &signing_key);
        Self {
            identity,
            key_name,
            signing_key,
            cert,
        }
    }

    /// A new identity whose certificate is signed by `issuer`.
    pub fn issued_by(identity: &str, seed: u8, issuer: &TestIdentity) -> Self {
        let (identity, key_name, signing_key) = Self::key_parts(identity, seed);
        let cert = issue(
            &key_name,
            "issuer",
            &signing_key,
            &issuer.key_name,
            &issuer.signing_key,
        );
        Self {
            identity,
            key_name,
            signing_key,
            cert,
        }
    }

    pub fn sign(&self, packet: &mut Packet) {
        sign_with(packet, &self.key_name, &self.signing_key);
    }

    pub fn signed_data(&self, uri: &str) -> Packet {
        let mut packet = Packet::data(name(uri)).with_content(b"payload".to_vec());
        self.sign(&mut packet);
        packet
    }

    pub fn wire(&self) -> Vec<u8> {
        JsonCodec.encode(self.cert.packet()).unwrap()
    }
}

fn issue(
    key_name: &Name,
    issuer_tag: &str,
    subject_key: &SigningKey,
    issuer_key_name: &Name,
    issuer_key: &SigningKey,
) -> Certificate {
    let cert_name = key_name.clone().append(issuer_tag).append("v1");
    let mut packet =
        Packet::data(cert_name).with_content(subject_key.verifying_key().to_bytes().to_vec());
    sign_with(&mut packet, issuer_key_name, issuer_key);
    Certificate::from_packet(packet).unwrap()
}

pub(crate) fn sign_with(packet: &mut Packet, key_locator: &Name, key: &SigningKey) {
    packet.set_signature_info(Some(SignatureInfo::new(
        SignatureType::Ed25519,
        Some(key_locator.clone()),
    )));
    let signature = key.sign(packet.signed_portion());
    packet.set_signature_value(signature.to_bytes().to_vec());
}

pub(crate) fn sign_digest(packet: &mut Packet) {
    packet.set_signature_info(Some(SignatureInfo::digest_sha256()));
    let digest = Sha256::digest(packet.signed_portion());
    packet.set_signature_value(digest.to_vec());
}

pub(crate) fn digest_data(uri: &str) -> Packet {
    let mut packet = Packet::data(name(uri)).with_content(b"payload".to_vec());
    sign_digest(&mut packet);
    packet
}
