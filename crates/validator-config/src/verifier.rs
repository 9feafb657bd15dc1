use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::packet::SignatureType;

/// Checks a signature over a packet's signed portion.
pub trait SignatureVerifier: Send + Sync {
    /// `public_key` is ignored for DigestSha256.
    fn verify(
        &self,
        signed: &[u8],
        signature: &[u8],
        signature_type: SignatureType,
        public_key: &[u8],
    ) -> bool;
}

/// Verifies DigestSha256 and Ed25519 signatures. Other algorithms are
/// reported as unsupported and fail verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVerifier;

impl SignatureVerifier for DefaultVerifier {
    fn verify(
        &self,
        signed: &[u8],
        signature: &[u8],
        signature_type: SignatureType,
        public_key: &[u8],
    ) -> bool {
        match signature_type {
            SignatureType::DigestSha256 => Sha256::digest(signed).as_slice() == signature,
            SignatureType::Ed25519 => {
                let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
                    warn!(len = public_key.len(), "ed25519 public key has wrong length");
                    return false;
                };
                let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
                    warn!("invalid ed25519 public key");
                    return false;
                };
                let Ok(signature) = Signature::from_slice(signature) else {
                    return false;
                };
                key.verify_strict(signed, &signature).is_ok()
            }
            other => {
                warn!(signature_type = %other, "no verifier for signature type");
                false
            }
        }
    }
}
