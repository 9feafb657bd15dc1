use std::collections::HashSet;
use std::sync::Arc;

use ndn_name::Name;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::decision::PolicyDecision;
use crate::error::ValidationError;
use crate::face::{Face, FaceResponse, Interest};
use crate::packet::{digest_sha256_identity, Certificate, Packet, SignatureType};
use crate::policy::{PolicyConfiguration, ValidationPolicy};
use crate::verifier::SignatureVerifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorOptions {
    /// Maximum number of certificates fetched for one packet.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Extra attempts after a certificate Interest times out.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
}

fn default_max_depth() -> usize {
    25
}

fn default_fetch_retries() -> u32 {
    3
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            fetch_retries: default_fetch_retries(),
        }
    }
}

/// Progress of one validation: the certificates fetched so far, ordered
/// from the packet's signer upwards.
#[derive(Debug, Default)]
struct ValidationState {
    chain: Vec<Certificate>,
    visited: HashSet<Name>,
}

/// Validates packets against a [`ValidationPolicy`], fetching missing
/// certificates through a [`Face`].
#[derive(Clone)]
pub struct Validator {
    policy: Arc<ValidationPolicy>,
    face: Arc<dyn Face>,
    verifier: Arc<dyn SignatureVerifier>,
    options: ValidatorOptions,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Validator {
    pub fn new(
        policy: Arc<ValidationPolicy>,
        face: Arc<dyn Face>,
        verifier: Arc<dyn SignatureVerifier>,
        options: ValidatorOptions,
    ) -> Self {
        Self {
            policy,
            face,
            verifier,
            options,
        }
    }

    pub fn policy(&self) -> &Arc<ValidationPolicy> {
        &self.policy
    }

    pub fn options(&self) -> ValidatorOptions {
        self.options
    }

    /// Validate `packet` against the configuration active right now.
    pub async fn validate(&self, packet: &Packet) -> Result<(), ValidationError> {
        let config = self.policy.snapshot();
        let result = self.validate_with_config(&config, packet).await;
        match &result {
            Ok(()) => info!(name = %packet.name(), kind = %packet.kind(), "packet validated"),
            Err(err) => info!(
                name = %packet.name(),
                kind = %packet.kind(),
                code = err.code(),
                error = %err,
                "packet rejected"
            ),
        }
        result
    }

    /// Validate in a background task, invoking exactly one of the callbacks
    /// when done. Dropping or cancelling the handle first suppresses both.
    pub fn validate_with<A, R>(&self, packet: Packet, on_accept: A, on_reject: R) -> ValidationHandle
    where
        A: FnOnce(&Packet) + Send + 'static,
        R: FnOnce(&Packet, ValidationError) + Send + 'static,
    {
        let validator = self.clone();
        let task = tokio::spawn(async move {
            match validator.validate(&packet).await {
                Ok(()) => on_accept(&packet),
                Err(err) => on_reject(&packet, err),
            }
        });
        ValidationHandle { task: Some(task) }
    }

    async fn validate_with_config(
        &self,
        config: &PolicyConfiguration,
        packet: &Packet,
    ) -> Result<(), ValidationError> {
        let mut signer = match config.check(packet)? {
            PolicyDecision::Bypass => return Ok(()),
            PolicyDecision::NeedsChain { signer, .. } => signer,
        };

        // Only the reserved digest identity is self-verifying; a digest
        // naming any other key still needs a chain to that key.
        if signer == digest_sha256_identity() {
            return self.verify_item(packet, None);
        }

        let mut state = ValidationState::default();
        loop {
            if let Some(anchor) = config.anchors().find(&signer) {
                debug!(anchor = %anchor.name(), depth = state.chain.len(), "reached trust anchor");
                return self.verify_chain(&state, &anchor, packet);
            }
            if state.chain.len() >= self.options.max_depth {
                return Err(ValidationError::ChainDepthExceeded {
                    depth: self.options.max_depth,
                });
            }
            if !state.visited.insert(signer.clone()) {
                return Err(ValidationError::ChainLoop { name: signer });
            }

            let cert = self.fetch_certificate(&signer).await?;
            // Certificates are Data packets and go through the Data rules.
            signer = match config.check(cert.packet())? {
                PolicyDecision::Bypass => return Ok(()),
                PolicyDecision::NeedsChain { signer, .. } => signer,
            };
            state.chain.push(cert);
        }
    }

    /// Verify signatures from the anchor down to the original packet.
    fn verify_chain(
        &self,
        state: &ValidationState,
        anchor: &Certificate,
        packet: &Packet,
    ) -> Result<(), ValidationError> {
        let mut key = anchor.public_key();
        for cert in state.chain.iter().rev() {
            self.verify_item(cert.packet(), Some(key))?;
            key = cert.public_key();
        }
        self.verify_item(packet, Some(key))
    }

    /// `public_key` is `None` only for self-verifying digests. An unkeyed
    /// digest never stands in for a key holder's signature.
    fn verify_item(&self, item: &Packet, public_key: Option<&[u8]>) -> Result<(), ValidationError> {
        let verified = match (item.signature_type(), public_key) {
            (Some(SignatureType::DigestSha256), None) => self.verifier.verify(
                item.signed_portion(),
                item.signature_value(),
                SignatureType::DigestSha256,
                &[],
            ),
            (Some(signature_type), Some(key)) if signature_type != SignatureType::DigestSha256 => {
                self.verifier.verify(
                    item.signed_portion(),
                    item.signature_value(),
                    signature_type,
                    key,
                )
            }
            _ => false,
        };
        if verified {
            Ok(())
        } else {
            Err(ValidationError::InvalidSignature {
                name: item.name().clone(),
            })
        }
    }

    async fn fetch_certificate(&self, name: &Name) -> Result<Certificate, ValidationError> {
        let interest = Interest::for_certificate(name.clone());
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(name = %name, attempt, "fetching certificate");
            match self.face.express(&interest).await {
                FaceResponse::Data(wire) => {
                    let cert = self
                        .policy
                        .codec()
                        .decode_certificate(&wire)
                        .map_err(|e| ValidationError::MalformedCertificate {
                            name: name.clone(),
                            reason: e.to_string(),
                        })?;
                    if !name.is_prefix_of(cert.name()) {
                        return Err(ValidationError::MalformedCertificate {
                            name: name.clone(),
                            reason: format!("received unrelated certificate {}", cert.name()),
                        });
                    }
                    return Ok(cert);
                }
                FaceResponse::Nack(reason) => {
                    return Err(ValidationError::CertificateUnavailable {
                        name: name.clone(),
                        reason: format!("nack: {reason}"),
                    });
                }
                FaceResponse::Timeout if attempt <= self.options.fetch_retries => {
                    warn!(name = %name, attempt, "certificate fetch timed out, retrying");
                }
                FaceResponse::Timeout => {
                    return Err(ValidationError::CertificateUnavailable {
                        name: name.clone(),
                        reason: format!("timed out after {attempt} attempts"),
                    });
                }
            }
        }
    }
}

/// An in-flight [`Validator::validate_with`] call.
///
/// Dropping the handle cancels the validation; use [`detach`](Self::detach)
/// to let it run on its own.
#[derive(Debug)]
pub struct ValidationHandle {
    task: Option<JoinHandle<()>>,
}

impl ValidationHandle {
    /// Stop the validation; neither callback will run if it has not yet.
    pub fn cancel(self) {
        drop(self);
    }

    /// Let the validation run to completion without holding the handle.
    pub fn detach(mut self) {
        self.task.take();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait until the validation and its callback have finished.
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
        }
        self.task = None;
    }
}

impl Drop for ValidationHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
