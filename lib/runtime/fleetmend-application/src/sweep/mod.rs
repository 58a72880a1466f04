//! One-shot handlers, one per domain. Entities inside a sweep are processed
//! one after another.

mod cluster;
mod disk;
mod metrics;
mod network;
mod pods;
mod service;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use fleetmend_domain::{
    ActionResult, Decision, Domain, GuardrailConfig, LedgerEntry, ProblemKind,
};
use fleetmend_ports::{AlertPort, Clock, LedgerPort};

use crate::guardrail::{GuardrailLoader, LedgerFacts, Verdict, evaluate};
use crate::remediator::{Outcome, Remediator};

pub use cluster::ClusterSweep;
pub use disk::DiskSweep;
pub use metrics::MetricsSweep;
pub use network::NetworkSweep;
pub use pods::PodSweep;
pub use service::ServiceSweep;

#[async_trait]
pub trait Sweep: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<SweepReport>;
}

/// Collector output could not be read. No decision exists yet, so the
/// failure is logged and never reaches the ledger.
#[derive(Debug, thiserror::Error)]
#[error("collector read failed: {0:#}")]
pub struct SourceUnavailable(pub anyhow::Error);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub outcomes: Vec<Outcome>,
}

impl SweepReport {
    pub fn count(&self, result: ActionResult) -> usize {
        self.outcomes.iter().filter(|o| o.result == result).count()
    }
}

/// Shared collaborators for every sweep.
#[derive(Clone)]
pub struct SweepContext {
    pub ledger: Arc<dyn LedgerPort>,
    pub alerts: Arc<dyn AlertPort>,
    pub clock: Arc<dyn Clock>,
    pub guardrails: GuardrailLoader,
    /// Host this agent runs on.
    pub host: String,
    /// Cluster this agent may act on.
    pub cluster: String,
    pub action_timeout: Duration,
}

impl SweepContext {
    pub fn remediator(&self) -> Remediator {
        Remediator::new(
            self.ledger.clone(),
            self.alerts.clone(),
            self.clock.clone(),
            self.action_timeout,
        )
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn since_minutes(&self, minutes: i64) -> DateTime<Utc> {
        self.now() - chrono::Duration::minutes(minutes.max(0))
    }

    /// Gathers ledger facts and runs the guardrail for one decision.
    pub async fn evaluate(
        &self,
        domain: Domain,
        decision: &Decision,
        config: &GuardrailConfig,
    ) -> Result<Verdict> {
        let now = self.clock.now();
        let facts =
            LedgerFacts::gather(self.ledger.as_ref(), domain, &decision.entity_key, config, now)
                .await?;
        Ok(evaluate(decision, config, &facts, now))
    }

    /// Runs one entity's work. An error is logged and recorded as a failed
    /// attempt so the rest of the sweep carries on. A [`SourceUnavailable`]
    /// error is only logged.
    pub async fn isolate<Fut>(
        &self,
        domain: Domain,
        entity_key: &str,
        kind: &ProblemKind,
        report: &mut SweepReport,
        work: Fut,
    ) where
        Fut: Future<Output = Result<Vec<Outcome>>>,
    {
        match work.await {
            Ok(outcomes) => report.outcomes.extend(outcomes),
            Err(e) if e.is::<SourceUnavailable>() => {
                tracing::warn!(domain = %domain, entity = %entity_key, "{:#}", e);
            }
            Err(e) => {
                tracing::error!(
                    domain = %domain,
                    entity = %entity_key,
                    kind = %kind,
                    "Remediation error: {:#}",
                    e
                );
                let message = "remediation aborted by error".to_string();
                let entry = LedgerEntry::new(
                    entity_key,
                    domain,
                    kind.clone(),
                    self.clock.now(),
                    ActionResult::Fail,
                    message.clone(),
                )
                .with_error(format!("{e:#}"));
                if let Err(e) = self.ledger.append(entry).await {
                    tracing::error!(entity = %entity_key, "Failed to append ledger entry: {:#}", e);
                }
                report.outcomes.push(Outcome {
                    entity_key: entity_key.to_string(),
                    kind: kind.clone(),
                    result: ActionResult::Fail,
                    message,
                    actuated: false,
                });
            }
        }
    }
}
