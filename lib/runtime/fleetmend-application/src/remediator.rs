use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use fleetmend_domain::{
    Action, ActionResult, Alert, Decision, Domain, GuardrailConfig, LedgerEntry, ProblemKind,
    Severity,
};
use fleetmend_ports::{ActuatorReport, AlertPort, Clock, LedgerPort};

use crate::guardrail::Verdict;

/// One decision on its way through the remediator.
pub struct Remediation<'a> {
    pub domain: Domain,
    pub decision: &'a Decision,
    pub verdict: &'a Verdict,
    pub config: &'a GuardrailConfig,
    /// Whether this process may act on the entity directly.
    pub owned: bool,
    /// What the fix does, phrased for "would ..." and failure messages.
    pub intent: String,
    /// Raise a warning alert when the actuator fails. Callers that verify
    /// afterwards raise their own alert instead.
    pub alert_on_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub entity_key: String,
    pub kind: ProblemKind,
    pub result: ActionResult,
    pub message: String,
    /// The actuator was called, whatever it returned.
    pub actuated: bool,
}

#[derive(Clone)]
pub struct Remediator {
    ledger: Arc<dyn LedgerPort>,
    alerts: Arc<dyn AlertPort>,
    clock: Arc<dyn Clock>,
    action_timeout: Duration,
}

impl Remediator {
    pub fn new(
        ledger: Arc<dyn LedgerPort>,
        alerts: Arc<dyn AlertPort>,
        clock: Arc<dyn Clock>,
        action_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            alerts,
            clock,
            action_timeout,
        }
    }

    /// True when `apply` would reach the actuator.
    pub fn will_actuate(verdict: &Verdict, config: &GuardrailConfig, owned: bool) -> bool {
        matches!(verdict, Verdict::Permit(Action::AutoFix)) && !config.dry_run && owned
    }

    /// Writes exactly one ledger entry whatever happens.
    pub async fn apply<F, Fut>(&self, request: Remediation<'_>, fix: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ActuatorReport>>,
    {
        let decision = request.decision;
        match request.verdict {
            Verdict::Deny(reason) => {
                let message = format!("{} (auto-fix denied: {reason})", decision.message);
                tracing::info!(
                    domain = %request.domain,
                    entity = %decision.entity_key,
                    kind = %decision.kind,
                    reason = reason.code(),
                    "guardrail denied remediation"
                );
                let outcome = self
                    .record(&request, ActionResult::Skipped, message.clone(), None, false)
                    .await;
                self.alert(
                    request.domain,
                    &decision.entity_key,
                    &decision.kind,
                    decision.severity,
                    message,
                    request.config,
                )
                .await;
                outcome
            }
            Verdict::Permit(Action::AlertOnly) => {
                let message = format!("{} (alert only)", decision.message);
                let outcome = self
                    .record(&request, ActionResult::Skipped, message.clone(), None, false)
                    .await;
                self.alert(
                    request.domain,
                    &decision.entity_key,
                    &decision.kind,
                    decision.severity,
                    message,
                    request.config,
                )
                .await;
                outcome
            }
            Verdict::Permit(action) => {
                let queued = !request.owned || *action == Action::Queued;
                if request.config.dry_run {
                    let result = if queued {
                        ActionResult::Queued
                    } else {
                        ActionResult::DryRunNoop
                    };
                    let message = format!("dry-run: would {}", request.intent);
                    return self.record(&request, result, message, None, false).await;
                }
                if queued {
                    let message =
                        format!("queued for {}: {}", decision.owner(), request.intent);
                    return self
                        .record(&request, ActionResult::Queued, message, None, false)
                        .await;
                }
                self.actuate(request, fix).await
            }
        }
    }

    /// Records a permitted fix that a pre-condition probe ruled out.
    pub async fn skip(&self, request: Remediation<'_>, reason: &str) -> Outcome {
        tracing::info!(
            domain = %request.domain,
            entity = %request.decision.entity_key,
            "skipping {}: {}",
            request.intent,
            reason
        );
        let message = format!("skipped {}: {reason}", request.intent);
        self.record(&request, ActionResult::Skipped, message, None, false)
            .await
    }

    async fn actuate<F, Fut>(&self, request: Remediation<'_>, fix: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ActuatorReport>>,
    {
        let (result, message, error) =
            match tokio::time::timeout(self.action_timeout, fix()).await {
                Ok(Ok(report)) if report.ok => (ActionResult::Success, report.message, None),
                Ok(Ok(report)) => (
                    ActionResult::Fail,
                    format!("{} failed", request.intent),
                    Some(report.message),
                ),
                Ok(Err(e)) => (
                    ActionResult::Fail,
                    format!("{} failed", request.intent),
                    Some(format!("{e:#}")),
                ),
                Err(_) => (
                    ActionResult::Fail,
                    format!("{} failed", request.intent),
                    Some(format!(
                        "timed out after {}s",
                        self.action_timeout.as_secs()
                    )),
                ),
            };

        let outcome = self
            .record(&request, result, message, error.clone(), true)
            .await;
        if result == ActionResult::Fail && request.alert_on_failure {
            let decision = request.decision;
            self.alert(
                request.domain,
                &decision.entity_key,
                &decision.kind,
                Severity::Warning,
                format!(
                    "{}: {}",
                    outcome.message,
                    error.as_deref().unwrap_or("unknown error")
                ),
                request.config,
            )
            .await;
        }
        outcome
    }

    async fn record(
        &self,
        request: &Remediation<'_>,
        result: ActionResult,
        message: String,
        error: Option<String>,
        actuated: bool,
    ) -> Outcome {
        let decision = request.decision;
        let mut entry = LedgerEntry::new(
            decision.entity_key.clone(),
            request.domain,
            decision.kind.clone(),
            self.clock.now(),
            result,
            message.clone(),
        );
        if let Some(error) = &error {
            entry = entry.with_error(error);
        }
        if let Err(e) = self.ledger.append(entry).await {
            tracing::error!(entity = %decision.entity_key, "Failed to append ledger entry: {:#}", e);
        }
        tracing::info!(
            domain = %request.domain,
            entity = %decision.entity_key,
            kind = %decision.kind,
            result = result.as_str(),
            "{}",
            message
        );
        Outcome {
            entity_key: decision.entity_key.clone(),
            kind: decision.kind.clone(),
            result,
            message,
            actuated,
        }
    }

    /// Fire and forget. Repeats for the same entity and kind inside
    /// `alert_interval_seconds` are dropped.
    pub async fn alert(
        &self,
        domain: Domain,
        entity_key: &str,
        kind: &ProblemKind,
        severity: Severity,
        message: String,
        config: &GuardrailConfig,
    ) {
        let now = self.clock.now();
        if config.alert_interval_seconds > 0 {
            match self.alerts.last_raised(entity_key, kind).await {
                Ok(Some(last))
                    if (now - last).num_seconds()
                        < i64::try_from(config.alert_interval_seconds).unwrap_or(i64::MAX) =>
                {
                    tracing::debug!(entity = %entity_key, kind = %kind, "alert throttled");
                    return;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to read last alert time: {:#}", e),
            }
        }

        let alert = Alert {
            entity_key: entity_key.to_string(),
            severity,
            source: domain,
            kind: kind.clone(),
            message,
            raised_at: now,
        };
        if let Err(e) = self.alerts.raise(alert).await {
            tracing::error!("Failed to raise alert: {:#}", e);
        }
    }
}
