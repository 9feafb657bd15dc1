use ndn_name::{Name, NameRegex, NameRelation};

use crate::error::ConfigError;
use crate::packet::{PacketKind, SignatureType};
use crate::section::ConfigSection;

/// Key-name pattern used by hierarchical checkers: everything before the
/// last `KEY` component is the signer's identity.
pub(crate) const HIERARCHICAL_KEY_PATTERN: &str = "^(<>*)<KEY><>{1,3}$";

/// Selects which packets a rule applies to.
#[derive(Debug, Clone)]
pub enum Filter {
    /// `<name> <relation> <packet name>` holds.
    Relation { name: Name, relation: NameRelation },
    /// The packet name matches the pattern.
    Regex(NameRegex),
}

/// Constraint on the key locator of a customized checker.
#[derive(Debug, Clone)]
pub enum KeyLocatorConstraint {
    /// `<name> <relation> <key locator>` holds.
    Relation { name: Name, relation: NameRelation },
    /// The key locator matches the pattern.
    Regex(NameRegex),
    /// Both names are matched and expanded, then related:
    /// `expand(key locator) <relation> expand(packet name)`.
    Hyper {
        key_regex: NameRegex,
        key_expand: String,
        relation: NameRelation,
        packet_regex: NameRegex,
        packet_expand: String,
    },
}

#[derive(Debug, Clone)]
pub enum Checker {
    /// The signer's identity must be a prefix of the packet name.
    Hierarchical {
        sig_type: SignatureType,
        key_pattern: NameRegex,
    },
    Customized {
        sig_type: SignatureType,
        key_locator: Option<KeyLocatorConstraint>,
    },
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub kind: PacketKind,
    /// Any filter may match; no filters matches every packet.
    pub filters: Vec<Filter>,
    /// Tried in order until one accepts.
    pub checkers: Vec<Checker>,
}

// ---------------------------------------------------------------------------
// Construction from configuration sections
// ---------------------------------------------------------------------------

fn required<'a>(
    section: &'a ConfigSection,
    key: &str,
    context: &str,
    source: &str,
) -> Result<&'a str, ConfigError> {
    match section.value(key) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::section(
            source,
            format!("{context} requires '{key}'"),
        )),
    }
}

fn reject_unknown(
    section: &ConfigSection,
    allowed: &[&str],
    context: &str,
    source: &str,
) -> Result<(), ConfigError> {
    for entry in section {
        if !allowed.iter().any(|k| entry.key.eq_ignore_ascii_case(k)) {
            return Err(ConfigError::section(
                source,
                format!("unexpected '{}' in {context} (line {})", entry.key, entry.line),
            ));
        }
    }
    Ok(())
}

fn parse_name(value: &str, context: &str, source: &str) -> Result<Name, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::section(source, format!("{context}: {e}")))
}

fn parse_relation(value: &str, context: &str, source: &str) -> Result<NameRelation, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::section(source, format!("{context}: {e}")))
}

fn parse_regex(value: &str, context: &str, source: &str) -> Result<NameRegex, ConfigError> {
    NameRegex::compile(value).map_err(|e| ConfigError::section(source, format!("{context}: {e}")))
}

fn require_name_type(section: &ConfigSection, context: &str, source: &str) -> Result<(), ConfigError> {
    let ty = required(section, "type", context, source)?;
    if !ty.eq_ignore_ascii_case("name") {
        return Err(ConfigError::section(
            source,
            format!("unsupported {context} type '{ty}' (only 'name' is supported)"),
        ));
    }
    Ok(())
}

impl Filter {
    pub fn from_section(section: &ConfigSection, source: &str) -> Result<Self, ConfigError> {
        const CTX: &str = "filter";
        require_name_type(section, CTX, source)?;

        if let Some(pattern) = section.value("regex") {
            reject_unknown(section, &["type", "regex"], CTX, source)?;
            return Ok(Self::Regex(parse_regex(pattern, CTX, source)?));
        }

        reject_unknown(section, &["type", "name", "relation"], CTX, source)?;
        let name = parse_name(required(section, "name", CTX, source)?, CTX, source)?;
        let relation = parse_relation(required(section, "relation", CTX, source)?, CTX, source)?;
        Ok(Self::Relation { name, relation })
    }
}

impl KeyLocatorConstraint {
    pub fn from_section(section: &ConfigSection, source: &str) -> Result<Self, ConfigError> {
        const CTX: &str = "key-locator";
        require_name_type(section, CTX, source)?;

        if let Some(hyper) = section.get("hyper-relation") {
            reject_unknown(section, &["type", "hyper-relation"], CTX, source)?;
            return Self::hyper_from_section(&hyper.children, source);
        }

        if let Some(pattern) = section.value("regex") {
            reject_unknown(section, &["type", "regex"], CTX, source)?;
            return Ok(Self::Regex(parse_regex(pattern, CTX, source)?));
        }

        reject_unknown(section, &["type", "name", "relation"], CTX, source)?;
        let name = parse_name(required(section, "name", CTX, source)?, CTX, source)?;
        let relation = parse_relation(required(section, "relation", CTX, source)?, CTX, source)?;
        Ok(Self::Relation { name, relation })
    }

    fn hyper_from_section(section: &ConfigSection, source: &str) -> Result<Self, ConfigError> {
        const CTX: &str = "hyper-relation";
        reject_unknown(
            section,
            &["k-regex", "k-expand", "h-relation", "p-regex", "p-expand"],
            CTX,
            source,
        )?;
        Ok(Self::Hyper {
            key_regex: parse_regex(required(section, "k-regex", CTX, source)?, CTX, source)?,
            key_expand: required(section, "k-expand", CTX, source)?.to_string(),
            relation: parse_relation(required(section, "h-relation", CTX, source)?, CTX, source)?,
            packet_regex: parse_regex(required(section, "p-regex", CTX, source)?, CTX, source)?,
            packet_expand: required(section, "p-expand", CTX, source)?.to_string(),
        })
    }
}

impl Checker {
    pub fn from_section(section: &ConfigSection, source: &str) -> Result<Self, ConfigError> {
        const CTX: &str = "checker";
        let ty = required(section, "type", CTX, source)?;
        let sig_type = required(section, "sig-type", CTX, source)?
            .parse::<SignatureType>()
            .map_err(|e| ConfigError::section(source, format!("{CTX}: {e}")))?;

        match ty.to_ascii_lowercase().as_str() {
            "hierarchical" => {
                reject_unknown(section, &["type", "sig-type"], CTX, source)?;
                Ok(Self::Hierarchical {
                    sig_type,
                    key_pattern: parse_regex(HIERARCHICAL_KEY_PATTERN, CTX, source)?,
                })
            }
            "customized" => {
                reject_unknown(section, &["type", "sig-type", "key-locator"], CTX, source)?;
                let key_locator = section
                    .get("key-locator")
                    .map(|e| KeyLocatorConstraint::from_section(&e.children, source))
                    .transpose()?;
                Ok(Self::Customized {
                    sig_type,
                    key_locator,
                })
            }
            other => Err(ConfigError::section(
                source,
                format!("unsupported checker type '{other}'"),
            )),
        }
    }

    pub fn sig_type(&self) -> SignatureType {
        match self {
            Self::Hierarchical { sig_type, .. } | Self::Customized { sig_type, .. } => *sig_type,
        }
    }
}

impl Rule {
    pub fn from_section(section: &ConfigSection, source: &str) -> Result<Self, ConfigError> {
        reject_unknown(section, &["id", "for", "filter", "checker"], "rule", source)?;
        let id = required(section, "id", "rule", source)?.to_string();
        let ctx = format!("rule '{id}'");

        let kind = required(section, "for", &ctx, source)?
            .parse::<PacketKind>()
            .map_err(|e| ConfigError::section(source, format!("{ctx}: {e}")))?;

        let mut filters = Vec::new();
        let mut checkers = Vec::new();
        for entry in section {
            if entry.key.eq_ignore_ascii_case("filter") {
                filters.push(Filter::from_section(&entry.children, source)?);
            } else if entry.key.eq_ignore_ascii_case("checker") {
                checkers.push(Checker::from_section(&entry.children, source)?);
            }
        }
        if checkers.is_empty() {
            return Err(ConfigError::section(
                source,
                format!("{ctx} needs at least one checker"),
            ));
        }

        Ok(Self {
            id,
            kind,
            filters,
            checkers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(text: &str) -> ConfigSection {
        ConfigSection::parse(text, "t").unwrap()
    }

    #[test]
    fn rule_with_filters_and_checkers() {
        let rule = Rule::from_section(
            &section(
                r#"
id "Two checkers"
for interest
filter
{
  type name
  name /a
  relation is-strict-prefix-of
}
filter
{
  type name
  regex ^<b><>*$
}
checker
{
  type hierarchical
  sig-type ed25519
}
checker
{
  type customized
  sig-type sha256
}
"#,
            ),
            "t",
        )
        .unwrap();
        assert_eq!(rule.id, "Two checkers");
        assert_eq!(rule.kind, PacketKind::Interest);
        assert_eq!(rule.filters.len(), 2);
        assert!(matches!(
            rule.filters[0],
            Filter::Relation {
                relation: NameRelation::IsStrictPrefixOf,
                ..
            }
        ));
        assert_eq!(rule.checkers.len(), 2);
        assert_eq!(rule.checkers[1].sig_type(), SignatureType::DigestSha256);
    }

    #[test]
    fn hyper_relation_key_locator() {
        let checker = Checker::from_section(
            &section(
                r#"
type customized
sig-type ecdsa-sha256
key-locator
{
  type name
  hyper-relation
  {
    k-regex ^(<>*)<KEY><>$
    k-expand \\1
    h-relation is-prefix-of
    p-regex ^(<>*)$
    p-expand \\1
  }
}
"#,
            ),
            "t",
        )
        .unwrap();
        match checker {
            Checker::Customized {
                key_locator: Some(KeyLocatorConstraint::Hyper { key_expand, .. }),
                ..
            } => assert_eq!(key_expand, "\\\\1"),
            other => panic!("unexpected checker {other:?}"),
        }
    }

    #[test]
    fn missing_pieces_are_errors() {
        let cases = [
            "for data\nchecker { type hierarchical\n sig-type ed25519 }",
            "id r\nchecker { type hierarchical\n sig-type ed25519 }",
            "id r\nfor data",
            "id r\nfor packets\nchecker { type hierarchical\n sig-type ed25519 }",
            "id r\nfor data\nchecker { type hierarchical }",
            "id r\nfor data\nchecker { type fancy\n sig-type ed25519 }",
            "id r\nfor data\nchecker { type customized\n sig-type md5 }",
            "id r\nfor data\nfilter { type name\n name /a }\nchecker { type hierarchical\n sig-type ed25519 }",
            "id r\nfor data\nfilter { type prefix\n regex ^<>$ }\nchecker { type hierarchical\n sig-type ed25519 }",
            "id r\nfor data\nfilter { type name\n regex ^<a\n }\nchecker { type hierarchical\n sig-type ed25519 }",
            "id r\nfor data\nextra 1\nchecker { type hierarchical\n sig-type ed25519 }",
        ];
        for text in cases {
            let err = Rule::from_section(&section(text), "t");
            assert!(err.is_err(), "accepted: {text}");
        }
    }

    #[test]
    fn relation_key_locator() {
        let checker = Checker::from_section(
            &section(
                "type customized\nsig-type ed25519\nkey-locator\n{\n type name\n name /ops\n relation equal\n}",
            ),
            "t",
        )
        .unwrap();
        assert!(matches!(
            checker,
            Checker::Customized {
                key_locator: Some(KeyLocatorConstraint::Relation {
                    relation: NameRelation::Equal,
                    ..
                }),
                ..
            }
        ));
    }
}
