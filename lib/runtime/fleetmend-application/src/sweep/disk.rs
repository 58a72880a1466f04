use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use fleetmend_domain::{
    ActionResult, Decision, DiskConfig, DiskObservation, Domain, GuardrailConfig, ProblemKind,
    Severity,
};
use fleetmend_ports::{ActuatorReport, DiskActuator, DiskSource};

use crate::classify::{
    classify_disk_usage, classify_inodes, classify_read_only, classify_smart, disk_entity_key,
};
use crate::remediator::{Outcome, Remediation, Remediator};
use crate::sweep::{SourceUnavailable, Sweep, SweepContext, SweepReport};

/// Per mount: read-only root first, then inodes, then space. A failed step
/// stops the later ones for that mount. Inode and space fixes need
/// `consecutive` readings over the warn threshold.
pub struct DiskSweep {
    ctx: SweepContext,
    source: Arc<dyn DiskSource>,
    actuator: Arc<dyn DiskActuator>,
    config: DiskConfig,
}

impl DiskSweep {
    pub fn new(
        ctx: SweepContext,
        source: Arc<dyn DiskSource>,
        actuator: Arc<dyn DiskActuator>,
        config: DiskConfig,
    ) -> Self {
        Self {
            ctx,
            source,
            actuator,
            config,
        }
    }

    async fn permit_and_apply<F, Fut>(
        &self,
        remediator: &Remediator,
        decision: &Decision,
        guardrail: &GuardrailConfig,
        intent: String,
        fix: F,
    ) -> Result<Outcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ActuatorReport>>,
    {
        let verdict = self.ctx.evaluate(Domain::Disk, decision, guardrail).await?;
        let request = Remediation {
            domain: Domain::Disk,
            decision,
            verdict: &verdict,
            config: guardrail,
            owned: decision.owner().eq_ignore_ascii_case(&self.ctx.host),
            intent,
            alert_on_failure: false,
        };
        Ok(remediator.apply(request, fix).await)
    }

    async fn handle_mount(
        &self,
        disk: &DiskObservation,
        guardrail: &GuardrailConfig,
    ) -> Result<Vec<Outcome>> {
        let remediator = self.ctx.remediator();
        let mut outcomes = Vec::new();
        let history = self
            .source
            .recent_disks(&disk.host, &disk.mount, self.config.consecutive.max(1))
            .await
            .map_err(SourceUnavailable)?;

        if let Some(decision) = classify_read_only(disk) {
            let outcome = self
                .permit_and_apply(
                    &remediator,
                    &decision,
                    guardrail,
                    format!("remount {} read-write", disk.mount),
                    || self.actuator.remount_rw(&disk.mount),
                )
                .await?;
            let result = outcome.result;
            if result == ActionResult::Fail {
                remediator
                    .alert(
                        Domain::Disk,
                        &decision.entity_key,
                        &decision.kind,
                        Severity::Critical,
                        "Root FS is read-only. Remount failed.".to_string(),
                        guardrail,
                    )
                    .await;
            }
            outcomes.push(outcome);
            if result != ActionResult::Success {
                return Ok(outcomes);
            }
        }

        if let Some(decision) = classify_inodes(&history, &self.config) {
            let outcome = self
                .permit_and_apply(
                    &remediator,
                    &decision,
                    guardrail,
                    format!("clean inodes on {}", disk.mount),
                    || self.actuator.cleanup_inodes(&disk.mount),
                )
                .await?;
            let result = outcome.result;
            self.report_cleanup(&remediator, &decision, &outcome, guardrail, "inode cleanup")
                .await;
            outcomes.push(outcome);
            if result == ActionResult::Fail {
                return Ok(outcomes);
            }
        }

        if let Some(decision) = classify_disk_usage(&history, &self.config) {
            let outcome = self
                .permit_and_apply(
                    &remediator,
                    &decision,
                    guardrail,
                    format!("clean up space on {}", disk.mount),
                    || self.actuator.cleanup_disk(&disk.mount),
                )
                .await?;
            self.report_cleanup(&remediator, &decision, &outcome, guardrail, "cleanup")
                .await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Only actual actuator runs get a follow-up alert.
    async fn report_cleanup(
        &self,
        remediator: &Remediator,
        decision: &Decision,
        outcome: &Outcome,
        guardrail: &GuardrailConfig,
        what: &str,
    ) {
        if !outcome.actuated {
            return;
        }
        let (severity, message) = if outcome.result == ActionResult::Success {
            (Severity::Warning, format!("{what} ok: {}", outcome.message))
        } else {
            (
                Severity::Critical,
                format!("{what} failed on {}: {}", decision.owner(), outcome.message),
            )
        };
        remediator
            .alert(
                Domain::Disk,
                &decision.entity_key,
                &decision.kind,
                severity,
                message,
                guardrail,
            )
            .await;
    }

    /// Sets `failing` as soon as any device classifies as failed.
    async fn handle_smart(
        &self,
        guardrail: &GuardrailConfig,
        failing: &mut bool,
    ) -> Result<Vec<Outcome>> {
        let remediator = self.ctx.remediator();
        let mut outcomes = Vec::new();
        let observations = self
            .source
            .latest_smart(&self.ctx.host)
            .await
            .map_err(SourceUnavailable)?;
        for observation in observations {
            let Some(decision) = classify_smart(&observation) else {
                continue;
            };
            *failing = true;
            let outcome = self
                .permit_and_apply(
                    &remediator,
                    &decision,
                    guardrail,
                    format!("replace {}", observation.device),
                    || async {
                        Ok(ActuatorReport::failed(
                            "SMART failures need hardware replacement",
                        ))
                    },
                )
                .await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

#[async_trait]
impl Sweep for DiskSweep {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn run(&self) -> Result<SweepReport> {
        let guardrail = self.ctx.guardrails.load(Domain::Disk);
        let mut report = SweepReport::default();
        let host = self.ctx.host.clone();

        let mut smart_failing = false;
        self.ctx
            .isolate(
                Domain::Disk,
                &format!("{host}/smart"),
                &ProblemKind::SmartFailure,
                &mut report,
                self.handle_smart(&guardrail, &mut smart_failing),
            )
            .await;
        if smart_failing {
            tracing::warn!(host = %host, "SMART failure reported, skipping disk fixes");
            return Ok(report);
        }

        for disk in self.source.latest_disks(&host).await? {
            report.examined += 1;
            let key = disk_entity_key(&disk.host, "disk-cleanup", &disk.mount);
            self.ctx
                .isolate(
                    Domain::Disk,
                    &key,
                    &ProblemKind::DiskFull,
                    &mut report,
                    self.handle_mount(&disk, &guardrail),
                )
                .await;
        }
        Ok(report)
    }
}
