mod cli;
mod config;
mod inputs;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use audit_log::{AuditEntry, AuditEventType, AuditSink, ValidationDecisionRecord};
use validator_config::{
    DefaultVerifier, JsonCodec, MemoryFace, Packet, ValidationError, ValidationPolicy, Validator,
};

use crate::cli::Cli;

const COMPONENT: &str = "ndn-validate";

/// Outcome of one packet, reported back from the validation callbacks.
struct Verdict {
    path: String,
    name: String,
    result: Result<(), ValidationError>,
}

/// Optional audit trail. Without a configured path every call is a no-op.
#[derive(Clone, Default)]
struct Audit(Option<AuditSink>);

impl Audit {
    async fn log(&self, entry: AuditEntry) {
        if let Some(sink) = &self.0 {
            sink.log(entry).await;
        }
    }

    fn try_log(&self, entry: AuditEntry) {
        if let Some(sink) = &self.0 {
            sink.try_log(entry);
        }
    }
}

fn decision_record(packet: &Packet, result: &Result<(), ValidationError>) -> ValidationDecisionRecord {
    let name = packet.name().to_string();
    let kind = packet.kind().as_str();
    match result {
        Ok(()) => ValidationDecisionRecord::accepted(name, kind),
        Err(err) => ValidationDecisionRecord::rejected(name, kind, err.code(), err.to_string()),
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load settings, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref policy) = cli.policy {
        cfg.policy_file = policy.clone();
    }
    if let Some(ref dir) = cli.cert_dir {
        cfg.certificates.dir = Some(dir.clone());
    }

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(
        config_file = %cli.config.display(),
        policy_file = %cfg.policy_file.display(),
        packets = cli.packets.len(),
        "ndn-validate starting"
    );

    // 4. Start audit logger.
    let (audit, audit_handle) = match cfg.logging.audit_log_path {
        Some(ref path) => {
            let (sink, handle) = AuditSink::start(path)
                .await
                .context("failed to start audit logger")?;
            (Audit(Some(sink)), Some(handle))
        }
        None => (Audit::default(), None),
    };

    audit
        .log(AuditEntry::new(
            AuditEventType::ProcessStarted,
            COMPONENT,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "config_file": cli.config.display().to_string(),
            }),
        ))
        .await;

    // 5. Load the validator configuration.
    let codec = Arc::new(JsonCodec);
    let policy = Arc::new(ValidationPolicy::new(codec.clone()));

    if let Err(err) = policy.load_file(&cfg.policy_file) {
        audit
            .log(AuditEntry::new(
                AuditEventType::PolicyLoadFailed,
                "policy",
                serde_json::json!({
                    "policy_file": cfg.policy_file.display().to_string(),
                    "error": err.to_string(),
                }),
            ))
            .await;
        drop(audit);
        if let Some(handle) = audit_handle {
            let _ = handle.await;
        }
        return Err(err).context("failed to load validator configuration");
    }

    let summary = serde_json::json!({
        "policy_file": cfg.policy_file.display().to_string(),
        "bypass": policy.should_bypass(),
        "data_rules": policy.data_rule_count(),
        "interest_rules": policy.interest_rule_count(),
        "anchors": policy.snapshot().anchors().len(),
    });
    audit
        .log(AuditEntry::new(
            AuditEventType::PolicyLoaded,
            "policy",
            summary.clone(),
        ))
        .await;

    // 6. With --check, report the configuration and stop.
    let all_accepted = if cli.check {
        println!("{summary}");
        true
    } else {
        validate_packets(&cli, &cfg, policy, codec, &audit).await?
    };

    // 7. Shut down the audit trail.
    info!("ndn-validate shutting down");
    audit
        .log(AuditEntry::new(
            AuditEventType::ProcessStopped,
            COMPONENT,
            serde_json::json!({ "all_accepted": all_accepted }),
        ))
        .await;
    drop(audit);
    if let Some(handle) = audit_handle {
        handle.await.context("audit writer task failed")?;
    }

    Ok(if all_accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn validate_packets(
    cli: &Cli,
    cfg: &config::Config,
    policy: Arc<ValidationPolicy>,
    codec: Arc<JsonCodec>,
    audit: &Audit,
) -> Result<bool> {
    let face = Arc::new(MemoryFace::new());
    if let Some(ref dir) = cfg.certificates.dir {
        let loaded = inputs::load_certificates(&face, codec.as_ref(), dir)?;
        info!(dir = %dir.display(), loaded, "certificates available for fetching");
    }

    let validator = Validator::new(policy, face, Arc::new(DefaultVerifier), cfg.validator);

    let (tx, mut rx) = mpsc::unbounded_channel::<Verdict>();
    let mut handles = Vec::with_capacity(cli.packets.len());
    let mut failed = false;

    for path in &cli.packets {
        let packet = match inputs::read_packet(codec.as_ref(), path) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "skipping packet");
                failed = true;
                continue;
            }
        };

        let shown = path.display().to_string();
        let (accept_tx, reject_tx) = (tx.clone(), tx.clone());
        let (accept_audit, reject_audit) = (audit.clone(), audit.clone());
        let accept_path = shown.clone();

        let handle = validator.validate_with(
            packet,
            move |packet| {
                let result = Ok(());
                accept_audit.try_log(AuditEntry::for_decision(
                    "validator",
                    decision_record(packet, &result),
                ));
                let _ = accept_tx.send(Verdict {
                    path: accept_path,
                    name: packet.name().to_string(),
                    result,
                });
            },
            move |packet, err| {
                let result = Err(err);
                reject_audit.try_log(AuditEntry::for_decision(
                    "validator",
                    decision_record(packet, &result),
                ));
                let _ = reject_tx.send(Verdict {
                    path: shown,
                    name: packet.name().to_string(),
                    result,
                });
            },
        );
        handles.push(handle);
    }
    drop(tx);

    for handle in &mut handles {
        handle.wait().await;
    }

    while let Some(verdict) = rx.recv().await {
        match verdict.result {
            Ok(()) => println!("ACCEPT {} {}", verdict.path, verdict.name),
            Err(err) => {
                failed = true;
                println!("REJECT {} {} [{}] {err}", verdict.path, verdict.name, err.code());
            }
        }
    }

    Ok(!failed)
}
