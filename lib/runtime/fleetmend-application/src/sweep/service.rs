use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use fleetmend_domain::{
    Decision, Domain, GuardrailConfig, ServiceObservation, ServiceRecoveryConfig,
};
use fleetmend_ports::{ServiceActuator, ServiceSource};

use crate::classify::{classify_service, service_ignore_reason};
use crate::remediator::{Outcome, Remediation};
use crate::sweep::{Sweep, SweepContext, SweepReport};

pub struct ServiceSweep {
    ctx: SweepContext,
    source: Arc<dyn ServiceSource>,
    actuator: Arc<dyn ServiceActuator>,
    config: ServiceRecoveryConfig,
}

impl ServiceSweep {
    pub fn new(
        ctx: SweepContext,
        source: Arc<dyn ServiceSource>,
        actuator: Arc<dyn ServiceActuator>,
        config: ServiceRecoveryConfig,
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
        observation: &ServiceObservation,
        guardrail: &GuardrailConfig,
    ) -> Result<Vec<Outcome>> {
        let verdict = self.ctx.evaluate(Domain::Service, decision, guardrail).await?;
        let request = Remediation {
            domain: Domain::Service,
            decision,
            verdict: &verdict,
            config: guardrail,
            owned: observation.host.eq_ignore_ascii_case(&self.ctx.host),
            intent: format!("restart {}", observation.service),
            alert_on_failure: true,
        };
        let outcome = self
            .ctx
            .remediator()
            .apply(request, || self.actuator.restart(&observation.service))
            .await;
        Ok(vec![outcome])
    }
}

#[async_trait]
impl Sweep for ServiceSweep {
    fn name(&self) -> &'static str {
        "service"
    }

    async fn run(&self) -> Result<SweepReport> {
        let guardrail = self.ctx.guardrails.load(Domain::Service);
        let since = self.ctx.since_minutes(self.config.lookback_minutes);
        let observations = self.source.unhealthy_services(since).await?;

        let mut report = SweepReport::default();
        let mut seen = HashSet::new();
        for observation in observations {
            if !seen.insert((observation.host.clone(), observation.service.clone())) {
                continue;
            }
            report.examined += 1;

            let Some(decision) = classify_service(&observation, &self.config) else {
                if let Some(reason) = service_ignore_reason(&observation, &self.config) {
                    tracing::info!(
                        host = %observation.host,
                        service = %observation.service,
                        "service {} left alone: {}",
                        observation.status.as_str(),
                        reason
                    );
                }
                continue;
            };

            self.ctx
                .isolate(
                    Domain::Service,
                    &decision.entity_key,
                    &decision.kind,
                    &mut report,
                    self.remediate(&decision, &observation, &guardrail),
                )
                .await;
        }
        Ok(report)
    }
}
