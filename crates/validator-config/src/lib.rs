//! # validator-config
//!
//! Configuration-driven trust validation for signed Interest and Data
//! packets. A [`ValidationPolicy`] loads rules and trust anchors from an
//! INFO-format configuration; a [`Validator`] checks packets against it and
//! walks the certificate chain, fetching missing certificates through a
//! [`Face`], until it reaches a trust anchor.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use validator_config::{
//!     DefaultVerifier, JsonCodec, MemoryFace, ValidationPolicy, Validator, ValidatorOptions,
//! };
//!
//! # async fn run(packet: validator_config::Packet) {
//! let policy = Arc::new(ValidationPolicy::new(Arc::new(JsonCodec)));
//! policy.load_file("/etc/ndn/validator.conf").unwrap();
//!
//! let validator = Validator::new(
//!     policy,
//!     Arc::new(MemoryFace::new()),
//!     Arc::new(DefaultVerifier),
//!     ValidatorOptions::default(),
//! );
//! match validator.validate(&packet).await {
//!     Ok(()) => println!("trusted"),
//!     Err(err) => println!("rejected: {err}"),
//! }
//! # }
//! ```

pub mod anchor;
pub mod codec;
mod decision;
mod error;
pub mod face;
pub mod loader;
mod matcher;
pub mod packet;
mod policy;
mod schema;
pub mod section;
mod validator;
mod verifier;

#[cfg(test)]
mod testutil;

// Re-export primary public API at crate root.
pub use anchor::{AnchorSource, TrustAnchorContainer, TrustAnchorGroup};
pub use codec::{Codec, CodecError, JsonCodec};
pub use decision::PolicyDecision;
pub use error::{ConfigError, ValidationError};
pub use face::{Face, FaceResponse, Interest, MemoryFace, NackReason};
pub use packet::{
    Certificate, CertificateError, Packet, PacketKind, SignatureInfo, SignatureType,
};
pub use policy::{PolicyConfiguration, ValidationPolicy};
pub use schema::{Checker, Filter, KeyLocatorConstraint, Rule};
pub use section::ConfigSection;
pub use validator::{ValidationHandle, Validator, ValidatorOptions};
pub use verifier::{DefaultVerifier, SignatureVerifier};
