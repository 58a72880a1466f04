use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use fleetmend_domain::Domain;
use fleetmend_ports::{ActuatorReport, ClusterSource};

use crate::classify::classify_cluster;
use crate::remediator::Remediation;
use crate::sweep::{Sweep, SweepContext, SweepReport};

/// API reachability. Never actuates.
pub struct ClusterSweep {
    ctx: SweepContext,
    source: Arc<dyn ClusterSource>,
}

impl ClusterSweep {
    pub fn new(ctx: SweepContext, source: Arc<dyn ClusterSource>) -> Self {
        Self { ctx, source }
    }
}

#[async_trait]
impl Sweep for ClusterSweep {
    fn name(&self) -> &'static str {
        "cluster"
    }

    async fn run(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let Some(observation) = self.source.latest_cluster(&self.ctx.cluster).await? else {
            tracing::debug!(cluster = %self.ctx.cluster, "no cluster observation yet");
            return Ok(report);
        };
        report.examined += 1;
        let Some(decision) = classify_cluster(&observation) else {
            return Ok(report);
        };

        let guardrail = self.ctx.guardrails.load(Domain::Cluster);
        let verdict = self
            .ctx
            .evaluate(Domain::Cluster, &decision, &guardrail)
            .await?;
        let request = Remediation {
            domain: Domain::Cluster,
            decision: &decision,
            verdict: &verdict,
            config: &guardrail,
            owned: observation.cluster == self.ctx.cluster,
            intent: "page the cluster owner".to_string(),
            alert_on_failure: false,
        };
        let outcome = self
            .ctx
            .remediator()
            .apply(request, || async {
                Ok(ActuatorReport::failed("cluster outages are alert-only"))
            })
            .await;
        report.outcomes.push(outcome);
        Ok(report)
    }
}
