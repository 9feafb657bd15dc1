use serde::{Deserialize, Serialize};

/// One line of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: AuditEventType,
    /// Component that emitted the event, e.g. `validator` or `policy`.
    pub component: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<ValidationDecisionRecord>,
}

impl AuditEntry {
    /// New entry stamped with a fresh UUID v4 and the current UTC time.
    pub fn new(
        event_type: AuditEventType,
        component: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            event_type,
            component: component.into(),
            details,
            decision: None,
        }
    }

    /// Entry for a finished validation; the event type follows the outcome.
    pub fn for_decision(component: impl Into<String>, decision: ValidationDecisionRecord) -> Self {
        let event_type = match decision.outcome {
            DecisionOutcome::Accepted => AuditEventType::PacketAccepted,
            DecisionOutcome::Rejected => AuditEventType::PacketRejected,
        };
        Self {
            decision: Some(decision),
            ..Self::new(event_type, component, serde_json::Value::Null)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ProcessStarted,
    ProcessStopped,
    PolicyLoaded,
    PolicyLoadFailed,
    PacketAccepted,
    PacketRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Accepted,
    Rejected,
}

/// What the validator concluded about one packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDecisionRecord {
    pub packet_name: String,
    pub packet_kind: String,
    pub outcome: DecisionOutcome,
    /// Machine-readable rejection code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationDecisionRecord {
    pub fn accepted(packet_name: impl Into<String>, packet_kind: impl Into<String>) -> Self {
        Self {
            packet_name: packet_name.into(),
            packet_kind: packet_kind.into(),
            outcome: DecisionOutcome::Accepted,
            error_code: None,
            reason: None,
        }
    }

    pub fn rejected(
        packet_name: impl Into<String>,
        packet_kind: impl Into<String>,
        error_code: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            packet_name: packet_name.into(),
            packet_kind: packet_kind.into(),
            outcome: DecisionOutcome::Rejected,
            error_code: Some(error_code.into()),
            reason: Some(reason.into()),
        }
    }
}
