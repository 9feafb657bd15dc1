use ndn_name::Name;

/// The outcome of running a packet through the active configuration when it
/// is not rejected outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The configuration trusts everything; signatures are not examined.
    Bypass,
    /// A rule's checker accepted the packet. The signer must still chain up
    /// to a trust anchor.
    NeedsChain {
        /// Id of the rule that matched.
        rule: String,
        /// Key locator to resolve next.
        signer: Name,
    },
}

impl PolicyDecision {
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::Bypass => None,
            Self::NeedsChain { rule, .. } => Some(rule),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_id_is_exposed() {
        assert_eq!(PolicyDecision::Bypass.rule(), None);
        let d = PolicyDecision::NeedsChain {
            rule: "r1".into(),
            signer: "/a/KEY/k".parse().unwrap(),
        };
        assert_eq!(d.rule(), Some("r1"));
    }
}
