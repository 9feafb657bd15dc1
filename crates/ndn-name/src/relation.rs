use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::name::Name;

/// Structural relation between two names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameRelation {
    /// Both names have identical component sequences.
    Equal,
    /// The first name is a prefix of (or equal to) the second.
    IsPrefixOf,
    /// The first name is a prefix of the second and the two differ.
    IsStrictPrefixOf,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name relation '{0}' (expected equal, is-prefix-of or is-strict-prefix-of)")]
pub struct UnknownRelation(pub String);

impl NameRelation {
    /// Evaluate `a <relation> b`.
    pub fn holds(self, a: &Name, b: &Name) -> bool {
        match self {
            Self::Equal => a == b,
            Self::IsPrefixOf => a.is_prefix_of(b),
            Self::IsStrictPrefixOf => a.len() < b.len() && a.is_prefix_of(b),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::IsPrefixOf => "is-prefix-of",
            Self::IsStrictPrefixOf => "is-strict-prefix-of",
        }
    }
}

impl FromStr for NameRelation {
    type Err = UnknownRelation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" => Ok(Self::Equal),
            "is-prefix-of" => Ok(Self::IsPrefixOf),
            "is-strict-prefix-of" => Ok(Self::IsStrictPrefixOf),
            _ => Err(UnknownRelation(s.to_string())),
        }
    }
}

impl fmt::Display for NameRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
