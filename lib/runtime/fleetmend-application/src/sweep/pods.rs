use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use fleetmend_domain::{Decision, Domain, GuardrailConfig, PodConfig, PodObservation};
use fleetmend_ports::{PodActuator, PodSource};

use crate::classify::classify_pod;
use crate::remediator::{Outcome, Remediation};
use crate::sweep::{Sweep, SweepContext, SweepReport};

/// Pods in other clusters are queued for the agent that owns them.
pub struct PodSweep {
    ctx: SweepContext,
    source: Arc<dyn PodSource>,
    actuator: Arc<dyn PodActuator>,
    config: PodConfig,
}

impl PodSweep {
    pub fn new(
        ctx: SweepContext,
        source: Arc<dyn PodSource>,
        actuator: Arc<dyn PodActuator>,
        config: PodConfig,
    ) -> Self {
        Self {
            ctx,
            source,
            actuator,
            config,
        }
    }

    async fn remediate(
        &self,
        decision: &Decision,
        pod: &PodObservation,
        guardrail: &GuardrailConfig,
    ) -> Result<Vec<Outcome>> {
        let verdict = self.ctx.evaluate(Domain::Pod, decision, guardrail).await?;
        let request = Remediation {
            domain: Domain::Pod,
            decision,
            verdict: &verdict,
            config: guardrail,
            owned: pod.cluster == self.ctx.cluster,
            intent: format!("delete pod {}/{}", pod.namespace, pod.pod),
            alert_on_failure: true,
        };
        let outcome = self
            .ctx
            .remediator()
            .apply(request, || self.actuator.delete_pod(&pod.namespace, &pod.pod))
            .await;
        Ok(vec![outcome])
    }
}

#[async_trait]
impl Sweep for PodSweep {
    fn name(&self) -> &'static str {
        "pods"
    }

    async fn run(&self) -> Result<SweepReport> {
        let guardrail = self.ctx.guardrails.load(Domain::Pod);
        let since = self.ctx.since_minutes(self.config.lookback_minutes);
        let pods = self.source.unhealthy_pods(&self.ctx.cluster, since).await?;

        let mut report = SweepReport::default();
        let mut seen = HashSet::new();
        for pod in pods {
            report.examined += 1;
            let Some(decision) = classify_pod(&pod, &self.config) else {
                continue;
            };
            if !seen.insert(decision.entity_key.clone()) {
                continue;
            }
            self.ctx
                .isolate(
                    Domain::Pod,
                    &decision.entity_key,
                    &decision.kind,
                    &mut report,
                    self.remediate(&decision, &pod, &guardrail),
                )
                .await;
        }
        Ok(report)
    }
}
