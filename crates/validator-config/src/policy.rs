use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::anchor::TrustAnchorContainer;
use crate::codec::Codec;
use crate::decision::PolicyDecision;
use crate::error::{ConfigError, ValidationError};
use crate::loader::{build_configuration, read_config_file};
use crate::packet::{Packet, PacketKind};
use crate::schema::Rule;
use crate::section::ConfigSection;

// ---------------------------------------------------------------------------
// PolicyConfiguration
// ---------------------------------------------------------------------------

/// One immutable, fully loaded configuration.
#[derive(Debug, Default)]
pub struct PolicyConfiguration {
    configured: bool,
    bypass: bool,
    data_rules: Vec<Rule>,
    interest_rules: Vec<Rule>,
    anchors: TrustAnchorContainer,
}

impl PolicyConfiguration {
    /// The state before any load: rejects every packet.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub(crate) fn configured(
        bypass: bool,
        data_rules: Vec<Rule>,
        interest_rules: Vec<Rule>,
        anchors: TrustAnchorContainer,
    ) -> Self {
        Self {
            configured: true,
            bypass,
            data_rules,
            interest_rules,
            anchors,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn should_bypass(&self) -> bool {
        self.bypass
    }

    pub fn rules(&self, kind: PacketKind) -> &[Rule] {
        match kind {
            PacketKind::Data => &self.data_rules,
            PacketKind::Interest => &self.interest_rules,
        }
    }

    pub fn anchors(&self) -> &TrustAnchorContainer {
        &self.anchors
    }

    /// Find the first rule for the packet and run its checkers.
    pub fn check(&self, packet: &Packet) -> Result<PolicyDecision, ValidationError> {
        if self.bypass {
            trace!(name = %packet.name(), "bypass configuration accepts packet");
            return Ok(PolicyDecision::Bypass);
        }

        let rules = self.rules(packet.kind());
        let Some(rule) = rules.iter().find(|r| r.matches(packet.name())) else {
            debug!(name = %packet.name(), kind = %packet.kind(), "no rule matches packet");
            return Err(ValidationError::NoMatchingRule {
                kind: packet.kind(),
                name: packet.name().clone(),
            });
        };

        trace!(rule = %rule.id, name = %packet.name(), "rule matched packet");
        let signer = rule.check(packet.name(), packet.signature_info())?;
        Ok(PolicyDecision::NeedsChain {
            rule: rule.id.clone(),
            signer,
        })
    }
}

// ---------------------------------------------------------------------------
// ValidationPolicy
// ---------------------------------------------------------------------------

/// Holds the active [`PolicyConfiguration`] and replaces it on reload.
///
/// Each load is built in isolation and published in a single step; a
/// failed load leaves the previous configuration active. Validations take
/// a [`snapshot`](Self::snapshot) when they start and keep using it even
/// if a reload lands while they wait on the network.
pub struct ValidationPolicy {
    codec: Arc<dyn Codec>,
    current: watch::Sender<Arc<PolicyConfiguration>>,
}

impl std::fmt::Debug for ValidationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPolicy")
            .field("current", &*self.snapshot())
            .finish()
    }
}

impl ValidationPolicy {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        let (current, _) = watch::channel(Arc::new(PolicyConfiguration::unconfigured()));
        Self { codec, current }
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Load a configuration tree. `source` is used for error messages and
    /// as the base for relative anchor paths.
    pub fn load_section(
        &self,
        section: &ConfigSection,
        source: impl AsRef<Path>,
    ) -> Result<(), ConfigError> {
        let source = source.as_ref();
        match build_configuration(section, source, &self.codec) {
            Ok(config) => {
                self.current.send_replace(Arc::new(config));
                Ok(())
            }
            Err(err) => {
                warn!(source = %source.display(), error = %err, "configuration rejected, keeping previous");
                Err(err)
            }
        }
    }

    pub fn load_str(&self, text: &str, source: impl AsRef<Path>) -> Result<(), ConfigError> {
        let source = source.as_ref();
        let section = ConfigSection::parse(text, &source.display().to_string())?;
        self.load_section(&section, source)
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let section = read_config_file(path)?;
        self.load_section(&section, path)
    }

    /// The configuration currently in effect.
    pub fn snapshot(&self) -> Arc<PolicyConfiguration> {
        self.current.borrow().clone()
    }

    /// Receive every configuration published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<PolicyConfiguration>> {
        self.current.subscribe()
    }

    pub fn is_configured(&self) -> bool {
        self.current.borrow().is_configured()
    }

    pub fn should_bypass(&self) -> bool {
        self.current.borrow().should_bypass()
    }

    pub fn data_rule_count(&self) -> usize {
        self.current.borrow().rules(PacketKind::Data).len()
    }

    pub fn interest_rule_count(&self) -> usize {
        self.current.borrow().rules(PacketKind::Interest).len()
    }

    pub fn check(&self, packet: &Packet) -> Result<PolicyDecision, ValidationError> {
        self.snapshot().check(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{certificate_to_base64, JsonCodec};
    use crate::testutil::{digest_data, name, TestIdentity};

    const SIMPLE: &str = r#"
rule
{
  id "Simple Rule"
  for data
  filter
  {
    type name
    name /localhost/test
    relation is-prefix-of
  }
  checker
  {
    type customized
    sig-type sha256
  }
}
rule
{
  id "Interest Rule"
  for interest
  checker
  {
    type customized
    sig-type sha256
  }
}
"#;

    fn policy() -> ValidationPolicy {
        ValidationPolicy::new(Arc::new(JsonCodec))
    }

    #[test]
    fn starts_unconfigured_and_rejects() {
        let p = policy();
        assert!(!p.is_configured());
        let err = p.check(&digest_data("/localhost/test/a")).unwrap_err();
        assert_eq!(err.code(), "no_matching_rule");
    }

    #[test]
    fn empty_configuration_rejects_everything() {
        let p = policy();
        p.load_str("", "empty.conf").unwrap();
        assert!(p.is_configured());
        assert!(!p.should_bypass());
        assert_eq!(p.data_rule_count(), 0);
        assert!(p.check(&digest_data("/a")).is_err());
    }

    #[test]
    fn rules_are_counted_per_kind() {
        let p = policy();
        p.load_str(SIMPLE, "simple.conf").unwrap();
        assert_eq!(p.data_rule_count(), 1);
        assert_eq!(p.interest_rule_count(), 1);

        let decision = p.check(&digest_data("/localhost/test/a")).unwrap();
        assert_eq!(decision.rule(), Some("Simple Rule"));
        assert!(p.check(&digest_data("/elsewhere")).is_err());
    }

    #[test]
    fn unquoted_repetition_in_filter_regex_loads() {
        let p = policy();
        let text = r#"
rule
{
  id "Bounded"
  for data
  filter
  {
    type name
    regex ^<a><>{1,2}$
  }
  checker
  {
    type customized
    sig-type sha256
  }
}
"#;
        p.load_str(text, "p.conf").unwrap();
        assert_eq!(p.data_rule_count(), 1);
        assert!(p.check(&digest_data("/a/b")).is_ok());
        assert!(p.check(&digest_data("/a/b/c")).is_ok());
        assert!(p.check(&digest_data("/a")).is_err());
        assert!(p.check(&digest_data("/a/b/c/d")).is_err());
    }

    #[test]
    fn trust_anchor_any_bypasses_and_clears_rules() {
        let p = policy();
        let text = format!("{SIMPLE}\ntrust-anchor\n{{\n  type any\n}}\n");
        p.load_str(&text, "any.conf").unwrap();
        assert!(p.should_bypass());
        assert_eq!(p.data_rule_count(), 0);
        assert_eq!(p.interest_rule_count(), 0);
        let unsigned = crate::packet::Packet::data(name("/anything"));
        assert_eq!(p.check(&unsigned).unwrap(), PolicyDecision::Bypass);
    }

    #[test]
    fn reload_replaces_everything() {
        let p = policy();
        p.load_str("trust-anchor { type any }", "a.conf").unwrap();
        assert!(p.should_bypass());

        p.load_str(SIMPLE, "b.conf").unwrap();
        assert!(!p.should_bypass());
        assert_eq!(p.data_rule_count(), 1);

        p.load_str("", "c.conf").unwrap();
        assert_eq!(p.data_rule_count(), 0);
        assert_eq!(p.interest_rule_count(), 0);
    }

    #[test]
    fn failed_loads_keep_previous_configuration() {
        let p = policy();
        p.load_str(SIMPLE, "good.conf").unwrap();

        let err = p.load_str("unknown-section { }", "bad.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Section { .. }), "{err}");
        let err = p.load_str("rule {", "bad.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { .. }), "{err}");
        let err = p
            .load_str("trust-anchor\n{\n type file\n file-name missing.cert\n}", "/nowhere/bad.conf")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Anchor { .. }), "{err}");

        assert_eq!(p.data_rule_count(), 1);
        assert_eq!(p.interest_rule_count(), 1);
    }

    #[test]
    fn failed_load_on_fresh_policy_stays_unconfigured() {
        let p = policy();
        assert!(p.load_str("trust-anchor { type bogus }", "x.conf").is_err());
        assert!(p.load_file("/does/not/exist.conf").is_err());
        assert!(!p.is_configured());
    }

    #[test]
    fn file_and_base64_anchors_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = TestIdentity::self_signed("/root", 1);
        let other = TestIdentity::self_signed("/other", 2);
        let encoded = certificate_to_base64(&JsonCodec, &root.cert).unwrap();
        std::fs::write(dir.path().join("root.cert"), &encoded).unwrap();

        let config_path = dir.path().join("validator.conf");
        let text = format!(
            "trust-anchor\n{{\n type file\n file-name root.cert\n}}\ntrust-anchor\n{{\n type base64\n base64-string \"{}\"\n}}\n",
            certificate_to_base64(&JsonCodec, &other.cert).unwrap()
        );
        std::fs::write(&config_path, text).unwrap();

        let p = policy();
        p.load_file(&config_path).unwrap();
        let snapshot = p.snapshot();
        assert_eq!(snapshot.anchors().len(), 2);
        assert!(snapshot.anchors().find(&root.key_name).is_some());
        assert!(snapshot.anchors().find(&other.key_name).is_some());
    }

    #[test]
    fn bad_refresh_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = policy();
        for refresh in ["1x", "h", "abc"] {
            let text = format!("trust-anchor\n{{\n type dir\n dir certs\n refresh {refresh}\n}}");
            let err = p
                .load_str(&text, dir.path().join("v.conf"))
                .unwrap_err();
            assert!(matches!(err, ConfigError::Section { .. }), "{err}");
        }
    }

    #[tokio::test]
    async fn subscribers_see_reloads() {
        let p = policy();
        let mut rx = p.subscribe();
        p.load_str(SIMPLE, "s.conf").unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().rules(PacketKind::Data).len(), 1);
    }
}
