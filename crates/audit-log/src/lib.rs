//! Append-only JSON-lines audit trail for trust validation.
//!
//! Every policy load and every validation decision can be recorded as a
//! single JSON object per line. Producers hold a cloneable [`AuditSink`];
//! a background task owns the file and flushes it when idle.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audit_log::{AuditEntry, AuditSink, ValidationDecisionRecord};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, handle) = AuditSink::start("/var/log/ndn-validate/audit.jsonl").await?;
//!
//! sink.log(AuditEntry::for_decision(
//!     "validator",
//!     ValidationDecisionRecord::accepted("/ndn/alice/doc", "data"),
//! ))
//! .await;
//!
//! drop(sink);
//! handle.await?;
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod sink;
pub mod writer;

pub use entry::{AuditEntry, AuditEventType, DecisionOutcome, ValidationDecisionRecord};
pub use sink::AuditSink;
pub use writer::{AuditWriteError, AuditWriter};
