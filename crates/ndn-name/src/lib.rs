//! # ndn-name
//!
//! Hierarchical names for the trust validator: the [`Name`] / [`Component`]
//! model with its canonical ordering and URI form, the structural
//! [`NameRelation`]s used by filters and checkers, and [`NameRegex`], a
//! component-wise pattern matcher with capture and expansion.
//!
//! ## Quick start
//!
//! ```rust
//! use ndn_name::{Name, NameRegex, NameRelation};
//!
//! let key: Name = "/ndn/alice/KEY/k1".parse().unwrap();
//! let data: Name = "/ndn/alice/photos/1".parse().unwrap();
//!
//! let identity = NameRegex::compile("^(<>*)<KEY><>$")
//!     .unwrap()
//!     .match_name(&key)
//!     .unwrap()
//!     .expand("\\1")
//!     .unwrap();
//! assert!(NameRelation::IsPrefixOf.holds(&identity, &data));
//! ```

mod name;
pub mod pattern;
mod relation;

pub use name::{Component, Name, NameError};
pub use pattern::{Captures, ExpandError, NameRegex, RegexError};
pub use relation::{NameRelation, UnknownRelation};
