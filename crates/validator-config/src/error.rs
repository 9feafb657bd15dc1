use std::path::PathBuf;

use ndn_name::Name;

use crate::packet::{PacketKind, SignatureType};

/// A configuration could not be loaded.
///
/// Loads are atomic: when any of these is returned the previously active
/// configuration is still in effect.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read validator configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{source_name}:{line}: {message}")]
    Syntax {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("invalid section in {source_name}: {message}")]
    Section {
        source_name: String,
        message: String,
    },

    #[error("cannot load trust anchor in {source_name}: {message}")]
    Anchor {
        source_name: String,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn section(source_name: &str, message: impl Into<String>) -> Self {
        Self::Section {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn anchor(source_name: &str, message: impl Into<String>) -> Self {
        Self::Anchor {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

/// Why a packet was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no {kind} rule matches {name}")]
    NoMatchingRule { kind: PacketKind, name: Name },

    #[error(
        "rule '{rule}' requires {expected} signature, packet has {}",
        .actual.map_or("no signature", SignatureType::as_str)
    )]
    WrongSignatureType {
        rule: String,
        expected: SignatureType,
        actual: Option<SignatureType>,
    },

    #[error("invalid key locator on {name}: {reason}")]
    InvalidKeyLocator { name: Name, reason: String },

    #[error("rule '{rule}' rejects {name}: {reason}")]
    PolicyViolation {
        rule: String,
        name: Name,
        reason: String,
    },

    #[error("certificate chain exceeds maximum depth {depth}")]
    ChainDepthExceeded { depth: usize },

    #[error("certificate chain loops back to {name}")]
    ChainLoop { name: Name },

    #[error("cannot retrieve certificate {name}: {reason}")]
    CertificateUnavailable { name: Name, reason: String },

    #[error("malformed certificate for {name}: {reason}")]
    MalformedCertificate { name: Name, reason: String },

    #[error("signature verification failed for {name}")]
    InvalidSignature { name: Name },
}

impl ValidationError {
    /// Stable machine-readable identifier, used in audit records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoMatchingRule { .. } => "no_matching_rule",
            Self::WrongSignatureType { .. } => "wrong_signature_type",
            Self::InvalidKeyLocator { .. } => "invalid_key_locator",
            Self::PolicyViolation { .. } => "policy_violation",
            Self::ChainDepthExceeded { .. } => "chain_depth_exceeded",
            Self::ChainLoop { .. } => "chain_loop",
            Self::CertificateUnavailable { .. } => "certificate_unavailable",
            Self::MalformedCertificate { .. } => "malformed_certificate",
            Self::InvalidSignature { .. } => "invalid_signature",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_signature_type_message_handles_unsigned() {
        let err = ValidationError::WrongSignatureType {
            rule: "r1".into(),
            expected: SignatureType::Ed25519,
            actual: None,
        };
        assert_eq!(
            err.to_string(),
            "rule 'r1' requires ed25519 signature, packet has no signature"
        );
        assert_eq!(err.code(), "wrong_signature_type");
    }

    #[test]
    fn syntax_error_points_at_line() {
        let err = ConfigError::Syntax {
            source_name: "policy.conf".into(),
            line: 7,
            message: "unmatched '}'".into(),
        };
        assert_eq!(err.to_string(), "policy.conf:7: unmatched '}'");
    }
}
