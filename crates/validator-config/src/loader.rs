use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::anchor::{TrustAnchorContainer, TrustAnchorGroup};
use crate::codec::{certificate_from_base64, Codec};
use crate::error::ConfigError;
use crate::packet::PacketKind;
use crate::policy::PolicyConfiguration;
use crate::schema::Rule;
use crate::section::ConfigSection;

/// Refresh period used when a configuration asks for `refresh 0<unit>`.
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(3600);

/// Read and parse a configuration file.
pub fn read_config_file(path: impl AsRef<Path>) -> Result<ConfigSection, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigSection::parse(&text, &path.display().to_string())
}

/// Parse a refresh period of the form `<n>h`, `<n>m` or `<n>s`.
pub fn parse_refresh(value: &str, source: &str) -> Result<Duration, ConfigError> {
    let value = value.trim();
    let bad = || ConfigError::section(source, format!("bad refresh period '{value}'"));

    let mut chars = value.chars();
    let unit = chars.next_back().ok_or_else(bad)?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let count: u64 = digits.parse().map_err(|_| bad())?;
    let seconds_per_unit = match unit {
        'h' => 3600,
        'm' => 60,
        's' => 1,
        _ => return Err(bad()),
    };
    if count == 0 {
        return Ok(DEFAULT_REFRESH);
    }
    count
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(bad)
}

fn resolve(base_dir: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// What one `trust-anchor` block contributes.
enum AnchorEntry {
    Group(TrustAnchorGroup),
    Any,
}

fn load_anchor(
    section: &ConfigSection,
    base_dir: &Path,
    source: &str,
    index: usize,
    codec: &Arc<dyn Codec>,
) -> Result<AnchorEntry, ConfigError> {
    let ty = section
        .value("type")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::section(source, "trust-anchor requires 'type'"))?;

    let allowed: &[&str] = match ty {
        "file" => &["type", "file-name", "refresh"],
        "base64" => &["type", "base64-string"],
        "dir" => &["type", "dir", "refresh"],
        "any" => &["type"],
        other => {
            return Err(ConfigError::section(
                source,
                format!("unsupported trust-anchor type '{other}'"),
            ))
        }
    };
    if let Some(extra) = section
        .iter()
        .find(|e| !allowed.iter().any(|k| e.key.eq_ignore_ascii_case(k)))
    {
        return Err(ConfigError::section(
            source,
            format!("unexpected '{}' in {ty} trust-anchor", extra.key),
        ));
    }

    let refresh = section
        .value("refresh")
        .map(|v| parse_refresh(v, source))
        .transpose()?;
    let required = |key: &str| {
        section
            .value(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::section(source, format!("{ty} trust-anchor requires '{key}'")))
    };

    let group = match ty {
        "file" => {
            let path = resolve(base_dir, required("file-name")?);
            let id = path.display().to_string();
            TrustAnchorGroup::from_file(id, path, refresh, codec.clone())
                .map_err(|e| ConfigError::anchor(source, e.to_string()))?
        }
        "base64" => {
            let cert = certificate_from_base64(codec.as_ref(), required("base64-string")?)
                .map_err(|e| ConfigError::anchor(source, e.to_string()))?;
            TrustAnchorGroup::from_certificate(format!("base64-{index}"), cert, codec.clone())
        }
        "dir" => {
            let dir = resolve(base_dir, required("dir")?);
            TrustAnchorGroup::from_dir(dir.display().to_string(), dir, refresh, codec.clone())
        }
        _ => return Ok(AnchorEntry::Any),
    };
    Ok(AnchorEntry::Group(group))
}

/// Build a complete configuration from a parsed tree.
///
/// `source` names the configuration for error messages; its directory is
/// the base for relative anchor paths.
pub(crate) fn build_configuration(
    root: &ConfigSection,
    source: &Path,
    codec: &Arc<dyn Codec>,
) -> Result<PolicyConfiguration, ConfigError> {
    let source_name = source.display().to_string();
    let base_dir = source
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut data_rules = Vec::new();
    let mut interest_rules = Vec::new();
    let mut anchors = TrustAnchorContainer::new();
    let mut bypass = false;

    for (index, entry) in root.iter().enumerate() {
        match entry.key.as_str() {
            "rule" => {
                let rule = Rule::from_section(&entry.children, &source_name)?;
                debug!(rule = %rule.id, kind = %rule.kind, "loaded rule");
                match rule.kind {
                    PacketKind::Data => data_rules.push(rule),
                    PacketKind::Interest => interest_rules.push(rule),
                }
            }
            "trust-anchor" => {
                match load_anchor(&entry.children, base_dir, &source_name, index, codec)? {
                    AnchorEntry::Group(group) => anchors.insert(group),
                    AnchorEntry::Any => bypass = true,
                }
            }
            other => {
                return Err(ConfigError::section(
                    &source_name,
                    format!("unrecognized section '{other}' (line {})", entry.line),
                ))
            }
        }
    }

    if bypass {
        data_rules.clear();
        interest_rules.clear();
    }

    info!(
        source = %source_name,
        data_rules = data_rules.len(),
        interest_rules = interest_rules.len(),
        anchors = anchors.len(),
        bypass,
        "validator configuration loaded"
    );

    Ok(PolicyConfiguration::configured(
        bypass,
        data_rules,
        interest_rules,
        anchors,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_units() {
        assert_eq!(parse_refresh("1h", "t").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_refresh("10m", "t").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_refresh("30s", "t").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_refresh("0s", "t").unwrap(), DEFAULT_REFRESH);
    }

    #[test]
    fn refresh_errors() {
        for bad in ["", "h", "1d", "1.5h", "-1s", "+5s", " 5 s", "abc", "0"] {
            assert!(parse_refresh(bad, "t").is_err(), "accepted '{bad}'");
        }
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        assert_eq!(
            resolve(Path::new("/etc/ndn"), "anchor.cert"),
            PathBuf::from("/etc/ndn/anchor.cert")
        );
        assert_eq!(
            resolve(Path::new("/etc/ndn"), "/var/anchor.cert"),
            PathBuf::from("/var/anchor.cert")
        );
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let err = read_config_file("/does/not/exist.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }), "{err}");
    }
}
