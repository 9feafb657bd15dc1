//! Evaluation of rule filters and checkers against a packet.

use ndn_name::Name;
use tracing::trace;

use crate::error::ValidationError;
use crate::packet::{digest_sha256_identity, SignatureInfo, SignatureType};
use crate::schema::{Checker, Filter, KeyLocatorConstraint, Rule};

impl Filter {
    pub fn matches(&self, packet_name: &Name) -> bool {
        match self {
            Self::Relation { name, relation } => relation.holds(name, packet_name),
            Self::Regex(regex) => regex.is_match(packet_name),
        }
    }
}

impl Rule {
    pub fn matches(&self, packet_name: &Name) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(packet_name))
    }

    /// Run the checkers in order. The first that accepts yields the signer
    /// name to chase; if none does, the last rejection is returned.
    pub fn check(
        &self,
        packet_name: &Name,
        signature: Option<&SignatureInfo>,
    ) -> Result<Name, ValidationError> {
        let mut last_err = None;
        for checker in &self.checkers {
            match checker.check(&self.id, packet_name, signature) {
                Ok(signer) => {
                    trace!(rule = %self.id, signer = %signer, "checker accepted packet");
                    return Ok(signer);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| ValidationError::PolicyViolation {
            rule: self.id.clone(),
            name: packet_name.clone(),
            reason: "rule has no checkers".to_string(),
        }))
    }
}

/// The name a signature claims to come from.
fn signer_name(packet_name: &Name, signature: &SignatureInfo) -> Result<Name, ValidationError> {
    match (&signature.key_locator, signature.signature_type) {
        (Some(locator), _) => Ok(locator.clone()),
        (None, SignatureType::DigestSha256) => Ok(digest_sha256_identity()),
        (None, _) => Err(ValidationError::InvalidKeyLocator {
            name: packet_name.clone(),
            reason: "signature carries no key locator".to_string(),
        }),
    }
}

impl Checker {
    /// On success returns the signer name the chain must be built from.
    pub fn check(
        &self,
        rule_id: &str,
        packet_name: &Name,
        signature: Option<&SignatureInfo>,
    ) -> Result<Name, ValidationError> {
        let expected = self.sig_type();
        let signature = match signature {
            Some(sig) if sig.signature_type == expected => sig,
            other => {
                return Err(ValidationError::WrongSignatureType {
                    rule: rule_id.to_string(),
                    expected,
                    actual: other.map(|s| s.signature_type),
                })
            }
        };
        let signer = signer_name(packet_name, signature)?;

        let violation = |reason: String| ValidationError::PolicyViolation {
            rule: rule_id.to_string(),
            name: packet_name.clone(),
            reason,
        };

        match self {
            Self::Hierarchical { key_pattern, .. } => {
                let identity = key_pattern
                    .match_name(&signer)
                    .and_then(|caps| caps.get(1).cloned())
                    .unwrap_or_else(|| signer.clone());
                if !identity.is_prefix_of(packet_name) {
                    return Err(violation(format!(
                        "signer identity {identity} is not a prefix of the packet name"
                    )));
                }
            }
            Self::Customized {
                key_locator: None, ..
            } => {}
            Self::Customized {
                key_locator: Some(constraint),
                ..
            } => constraint
                .check(&signer, packet_name)
                .map_err(violation)?,
        }
        Ok(signer)
    }
}

impl KeyLocatorConstraint {
    fn check(&self, signer: &Name, packet_name: &Name) -> Result<(), String> {
        match self {
            Self::Relation { name, relation } => {
                if relation.holds(name, signer) {
                    Ok(())
                } else {
                    Err(format!("key locator {signer} is not {relation} {name}"))
                }
            }
            Self::Regex(regex) => {
                if regex.is_match(signer) {
                    Ok(())
                } else {
                    Err(format!("key locator {signer} does not match {regex}"))
                }
            }
            Self::Hyper {
                key_regex,
                key_expand,
                relation,
                packet_regex,
                packet_expand,
            } => {
                let key_caps = key_regex
                    .match_name(signer)
                    .ok_or_else(|| format!("key locator {signer} does not match {key_regex}"))?;
                let packet_caps = packet_regex
                    .match_name(packet_name)
                    .ok_or_else(|| format!("packet name does not match {packet_regex}"))?;
                let key_side = key_caps
                    .expand(key_expand)
                    .map_err(|e| format!("cannot expand key locator: {e}"))?;
                let packet_side = packet_caps
                    .expand(packet_expand)
                    .map_err(|e| format!("cannot expand packet name: {e}"))?;
                if relation.holds(&key_side, &packet_side) {
                    Ok(())
                } else {
                    Err(format!("{key_side} is not {relation} {packet_side}"))
                }
            }
        }
    }
}
