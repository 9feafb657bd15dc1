use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors produced while parsing a name from its URI form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("invalid percent-escape in name component '{0}'")]
    BadEscape(String),

    #[error("'{0}' is not a valid name component (period-only components need three extra periods)")]
    BadComponent(String),
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A single opaque name component.
///
/// Ordering is canonical: shorter components sort first, components of equal
/// length compare byte-wise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Component(Vec<u8>);

impl Component {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self(value.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode a component from its escaped URI form.
    pub fn from_escaped(escaped: &str) -> Result<Self, NameError> {
        if escaped.bytes().all(|b| b == b'.') {
            // "..." is the empty component, "...." is ".", and so on.
            return match escaped.len() {
                n if n >= 3 => Ok(Self(vec![b'.'; n - 3])),
                _ => Err(NameError::BadComponent(escaped.to_string())),
            };
        }

        let bytes = escaped.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| NameError::BadEscape(escaped.to_string()))?;
                out.push(hex);
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        Ok(Self(out))
    }

    /// Encode the component in escaped URI form.
    pub fn to_escaped(&self) -> String {
        if self.0.iter().all(|b| *b == b'.') {
            return format!("...{}", ".".repeat(self.0.len()));
        }
        let mut out = String::with_capacity(self.0.len());
        for &b in &self.0 {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{b:02X}"));
            }
        }
        out
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for Component {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Component {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<u8>> for Component {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_escaped())
    }
}

// ---------------------------------------------------------------------------
// Name
// ---------------------------------------------------------------------------

/// A hierarchical name: an ordered sequence of [`Component`]s.
///
/// The derived ordering compares component by component, so a name sorts
/// directly before every name it is a strict prefix of.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    /// The empty name (`/`).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components<I, C>(components: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Component>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a name from its URI form, e.g. `/ndn/edu/%C1.R`.
    ///
    /// An `ndn:` scheme prefix is accepted, empty path segments are skipped.
    pub fn from_uri(uri: &str) -> Result<Self, NameError> {
        let uri = uri.trim();
        let uri = uri.strip_prefix("ndn:").unwrap_or(uri);
        let uri = uri.split(['?', '#']).next().unwrap_or_default();

        let components = uri
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(Component::from_escaped)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    pub fn to_uri(&self) -> String {
        if self.components.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for c in &self.components {
            out.push('/');
            out.push_str(&c.to_escaped());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Component> {
        self.components.iter()
    }

    /// Builder-style append.
    pub fn append(mut self, component: impl Into<Component>) -> Self {
        self.components.push(component.into());
        self
    }

    pub fn push(&mut self, component: impl Into<Component>) {
        self.components.push(component.into());
    }

    /// Append every component of `other`.
    pub fn extend_from(&mut self, other: &Name) {
        self.components.extend(other.components.iter().cloned());
    }

    /// The first `len` components (the whole name if `len` exceeds it).
    pub fn prefix(&self, len: usize) -> Name {
        Name {
            components: self.components[..len.min(self.components.len())].to_vec(),
        }
    }

    /// `len` components starting at `start`, clamped to the name's bounds.
    pub fn sub_name(&self, start: usize, len: usize) -> Name {
        let start = start.min(self.components.len());
        let end = start.saturating_add(len).min(self.components.len());
        Name {
            components: self.components[start..end].to_vec(),
        }
    }

    /// True if `self` is a prefix of `other` (equal names included).
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(a, b)| a == b)
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl<'a> IntoIterator for &'a Name {
    type Item = &'a Component;
    type IntoIter = std::slice::Iter<'a, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_uri())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        Name::from_uri(&uri).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn parse_and_render_round_trip() {
        let n = name("/ndn/edu/ucla/%00%01");
        assert_eq!(n.len(), 4);
        assert_eq!(n.get(3).unwrap().as_bytes(), &[0x00, 0x01]);
        assert_eq!(n.to_uri(), "/ndn/edu/ucla/%00%01");
    }

    #[test]
    fn scheme_and_empty_segments_are_ignored() {
        assert_eq!(name("ndn:/a//b/"), name("/a/b"));
        assert_eq!(name("/").len(), 0);
        assert_eq!(Name::new().to_uri(), "/");
    }

    #[test]
    fn period_only_components() {
        let n = name("/.../....");
        assert!(n.get(0).unwrap().is_empty());
        assert_eq!(n.get(1).unwrap().as_bytes(), b".");
        assert_eq!(n.to_uri(), "/.../....");
        assert!(Name::from_uri("/a/..").is_err());
    }

    #[test]
    fn bad_escape_rejected() {
        assert_eq!(
            Name::from_uri("/a/%zz").unwrap_err(),
            NameError::BadEscape("%zz".to_string())
        );
        assert!(Name::from_uri("/a/%4").is_err());
    }

    #[test]
    fn reserved_bytes_are_escaped() {
        let n = Name::new().append("a b").append("x/y");
        assert_eq!(n.to_uri(), "/a%20b/x%2Fy");
        assert_eq!(name(&n.to_uri()), n);
    }

    #[test]
    fn canonical_component_order() {
        // Shorter components sort first regardless of content.
        assert!(Component::from("z") < Component::from("aa"));
        assert!(Component::from("ab") < Component::from("ba"));
        // A prefix sorts directly before its extensions.
        assert!(name("/a") < name("/a/b"));
        assert!(name("/a/b") < name("/a/c"));
        assert!(name("/a/zz") > name("/a/b/c"));
    }

    #[test]
    fn prefix_helpers() {
        let n = name("/a/b/c");
        assert_eq!(n.prefix(2), name("/a/b"));
        assert_eq!(n.prefix(10), n);
        assert_eq!(n.sub_name(1, 5), name("/b/c"));
        assert!(name("/a/b").is_prefix_of(&n));
        assert!(n.is_prefix_of(&n));
        assert!(!name("/a/c").is_prefix_of(&n));
        assert!(Name::new().is_prefix_of(&n));
    }
}
