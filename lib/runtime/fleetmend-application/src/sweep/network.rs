use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use fleetmend_domain::{
    ActionResult, Decision, Domain, GuardrailConfig, NetworkConfig, NetworkEvent, ProblemKind,
};
use fleetmend_ports::{
    ActuatorReport, InterfaceInfo, NetworkActuator, NetworkProbe, NetworkSource,
};

use crate::classify::network_decisions;
use crate::remediator::{Outcome, Remediation, Remediator};
use crate::sweep::{Sweep, SweepContext, SweepReport};
use crate::verify::verify_probe;

pub struct NetworkSweep {
    ctx: SweepContext,
    source: Arc<dyn NetworkSource>,
    actuator: Arc<dyn NetworkActuator>,
    probe: Arc<dyn NetworkProbe>,
    config: NetworkConfig,
}

impl NetworkSweep {
    pub fn new(
        ctx: SweepContext,
        source: Arc<dyn NetworkSource>,
        actuator: Arc<dyn NetworkActuator>,
        probe: Arc<dyn NetworkProbe>,
        config: NetworkConfig,
    ) -> Self {
        Self {
            ctx,
            source,
            actuator,
            probe,
            config,
        }
    }

    /// Events arrive newest first; only the latest per target matters.
    fn latest_per_target(events: Vec<NetworkEvent>) -> Vec<NetworkEvent> {
        let mut seen = HashSet::new();
        events
            .into_iter()
            .filter(|event| seen.insert(event.target.clone()))
            .collect()
    }

    /// A reload is only worth it when the target alone is unreachable.
    async fn firewall_precondition(&self, target: &str) -> Result<Option<String>> {
        if self.probe.ping(target, None).await? {
            return Ok(Some(format!("{target} answers ping again")));
        }
        if !self.probe.resolves(&self.config.dns_probe_name).await? {
            return Ok(Some(format!(
                "{} does not resolve, outage is wider than a firewall rule",
                self.config.dns_probe_name
            )));
        }
        if !self.probe.has_default_route().await? {
            return Ok(Some("no default route".to_string()));
        }
        Ok(None)
    }

    async fn bounce_candidate(
        &self,
        event: &NetworkEvent,
        bounced: &HashSet<String>,
    ) -> Result<Option<InterfaceInfo>> {
        for nic in self.probe.interfaces().await? {
            if bounced.contains(&nic.name) {
                continue;
            }
            if let Some(wanted) = &event.interface {
                if &nic.name != wanted {
                    continue;
                }
            }
            let safe = nic.is_up
                && nic.has_ipv4
                && !nic.is_primary
                && !nic.has_default_route
                && nic.low_traffic;
            if !safe {
                continue;
            }
            if !self.probe.ping(&event.target, Some(&nic.name)).await? {
                return Ok(Some(nic));
            }
        }
        Ok(None)
    }

    async fn verify_and_alert(
        &self,
        remediator: &Remediator,
        decision: &Decision,
        outcome: &Outcome,
        guardrail: &GuardrailConfig,
        target: &str,
        interface: Option<&str>,
    ) {
        let what = match interface {
            Some(nic) => format!("{target} via {nic}"),
            None => target.to_string(),
        };
        let delay = Duration::from_secs(self.config.verify_delay_seconds);
        let post = verify_probe(self.ctx.clock.as_ref(), delay, &what, || async {
            match decision.kind {
                ProblemKind::DnsFailure => self.probe.resolves(target).await,
                _ => self.probe.ping(target, interface).await,
            }
        })
        .await;
        remediator
            .alert(
                Domain::Network,
                &decision.entity_key,
                &decision.kind,
                post.severity,
                format!("{}; {}", outcome.message, post.message),
                guardrail,
            )
            .await;
    }

    /// Sets `passed_on` when the firewall fix is ruled out and the event
    /// should be handled as its next matching problem instead.
    async fn handle_event(
        &self,
        event: &NetworkEvent,
        decision: &Decision,
        guardrail: &GuardrailConfig,
        bounced: &mut HashSet<String>,
        passed_on: &mut bool,
    ) -> Result<Vec<Outcome>> {
        let verdict = self
            .ctx
            .evaluate(Domain::Network, decision, guardrail)
            .await?;
        let owned = event.host.eq_ignore_ascii_case(&self.ctx.host);
        let actuating = Remediator::will_actuate(&verdict, guardrail, owned);
        let remediator = self.ctx.remediator();
        let mut request = Remediation {
            domain: Domain::Network,
            decision,
            verdict: &verdict,
            config: guardrail,
            owned,
            intent: String::new(),
            alert_on_failure: true,
        };

        let outcome = match decision.kind {
            ProblemKind::FirewallBlock => {
                request.intent = format!("reload firewall for {}", event.target);
                if actuating {
                    if let Some(reason) = self.firewall_precondition(&event.target).await? {
                        *passed_on = true;
                        return Ok(vec![remediator.skip(request, &reason).await]);
                    }
                }
                let outcome = remediator
                    .apply(request, || self.actuator.reload_firewall(&event.target))
                    .await;
                if outcome.actuated && outcome.result == ActionResult::Success {
                    self.verify_and_alert(
                        &remediator,
                        decision,
                        &outcome,
                        guardrail,
                        &event.target,
                        None,
                    )
                    .await;
                }
                outcome
            }
            ProblemKind::DnsFailure => {
                request.intent = "restart the DNS cache".to_string();
                let outcome = remediator
                    .apply(request, || self.actuator.restart_dns_cache())
                    .await;
                if outcome.actuated && outcome.result == ActionResult::Success {
                    self.verify_and_alert(
                        &remediator,
                        decision,
                        &outcome,
                        guardrail,
                        &event.target,
                        None,
                    )
                    .await;
                }
                outcome
            }
            ProblemKind::PacketLoss => {
                request.intent = "bounce an idle secondary interface".to_string();
                if !actuating {
                    remediator
                        .apply(request, || async {
                            Ok(ActuatorReport::failed("no interface chosen"))
                        })
                        .await
                } else {
                    let Some(nic) = self.bounce_candidate(event, bounced).await? else {
                        return Ok(vec![
                            remediator
                                .skip(request, "no safe interface to bounce")
                                .await,
                        ]);
                    };
                    request.intent = format!("bounce interface {}", nic.name);
                    bounced.insert(nic.name.clone());
                    let outcome = remediator
                        .apply(request, || self.actuator.bounce_interface(&nic.name))
                        .await;
                    if outcome.actuated && outcome.result == ActionResult::Success {
                        self.verify_and_alert(
                            &remediator,
                            decision,
                            &outcome,
                            guardrail,
                            &event.target,
                            Some(&nic.name),
                        )
                        .await;
                    }
                    outcome
                }
            }
            _ => {
                request.intent = format!("observe {}", event.target);
                remediator
                    .apply(request, || async {
                        Ok(ActuatorReport::ok("latency is alert-only"))
                    })
                    .await
            }
        };
        Ok(vec![outcome])
    }
}

#[async_trait]
impl Sweep for NetworkSweep {
    fn name(&self) -> &'static str {
        "network"
    }

    async fn run(&self) -> Result<SweepReport> {
        let guardrail = self.ctx.guardrails.load(Domain::Network);
        let since = self.ctx.since_minutes(self.config.lookback_minutes);
        let events = self.source.recent_events(&self.ctx.host, since).await?;

        let mut report = SweepReport::default();
        let mut bounced = HashSet::new();
        for event in Self::latest_per_target(events) {
            report.examined += 1;
            for decision in network_decisions(&event, &self.config) {
                let mut passed_on = false;
                self.ctx
                    .isolate(
                        Domain::Network,
                        &decision.entity_key,
                        &decision.kind,
                        &mut report,
                        self.handle_event(
                            &event,
                            &decision,
                            &guardrail,
                            &mut bounced,
                            &mut passed_on,
                        ),
                    )
                    .await;
                if !passed_on {
                    break;
                }
            }
        }
        Ok(report)
    }
}
