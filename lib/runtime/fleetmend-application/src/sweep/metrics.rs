use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use fleetmend_domain::{
    Decision, Domain, MetricsConfig, ProblemKind, ResourceSample, ZombieSnapshot,
};
use fleetmend_ports::{
    ActuatorReport, ProcessActuator, ProcessInfo, ProcessSort, ResourceSource, ServiceActuator,
};

use crate::classify::{classify_cpu, classify_load, classify_memory, classify_zombies};
use crate::remediator::{Outcome, Remediation, Remediator};
use crate::sweep::{SourceUnavailable, Sweep, SweepContext, SweepReport};
use crate::verify::verify_resource;

const SYSTEM_USERS: [&str; 4] = ["system", "root", "local system", "nt authority\\system"];
const MIN_KILL_UPTIME_SECONDS: u64 = 60;
const TOP_PROCESSES: usize = 10;
const HOTSPOT_PROCESSES: usize = 5;

/// CPU, memory, load and zombie handling for the local host.
pub struct MetricsSweep {
    ctx: SweepContext,
    source: Arc<dyn ResourceSource>,
    processes: Arc<dyn ProcessActuator>,
    services: Arc<dyn ServiceActuator>,
    config: MetricsConfig,
    /// Load average and zombie accounting exist on unix hosts only.
    unix_metrics: bool,
}

impl MetricsSweep {
    pub fn new(
        ctx: SweepContext,
        source: Arc<dyn ResourceSource>,
        processes: Arc<dyn ProcessActuator>,
        services: Arc<dyn ServiceActuator>,
        config: MetricsConfig,
        unix_metrics: bool,
    ) -> Self {
        Self {
            ctx,
            source,
            processes,
            services,
            config,
            unix_metrics,
        }
    }

    fn matches_any(name: &str, list: &[String]) -> bool {
        list.iter().any(|entry| entry.eq_ignore_ascii_case(name))
    }

    async fn verify_and_alert(
        &self,
        remediator: &Remediator,
        decision: &Decision,
        outcome: &Outcome,
        domain: Domain,
        delay_seconds: u64,
        value: fn(&ResourceSample) -> Option<f64>,
        warn: f64,
    ) {
        let post = verify_resource(
            self.ctx.clock.as_ref(),
            self.source.as_ref(),
            &self.ctx.host,
            Duration::from_secs(delay_seconds),
            domain.as_str(),
            value,
            warn,
        )
        .await;
        let guardrail = self.ctx.guardrails.load(domain);
        remediator
            .alert(
                domain,
                &decision.entity_key,
                &decision.kind,
                post.severity,
                format!("{}; {}", outcome.message, post.message),
                &guardrail,
            )
            .await;
    }

    /// Whitelisted top consumer first, then the first safe non-system process.
    async fn kill_cpu_offender(&self) -> Result<ActuatorReport> {
        let top = self
            .processes
            .list_processes(ProcessSort::Cpu, TOP_PROCESSES)
            .await?;
        let cfg = &self.config.cpu;

        if let Some(p) = top.iter().find(|p| Self::matches_any(&p.name, &cfg.kill_whitelist)) {
            return self.terminate(p, "whitelist").await;
        }

        let fallback = top.iter().find(|p| {
            let name = p.name.to_lowercase();
            let blacklisted = cfg
                .kill_blacklist
                .iter()
                .any(|bl| name.contains(&bl.to_lowercase()));
            !blacklisted
                && !SYSTEM_USERS.contains(&p.user.to_lowercase().as_str())
                && p.uptime_seconds >= MIN_KILL_UPTIME_SECONDS
        });
        match fallback {
            Some(p) => self.terminate(p, "fallback").await,
            None => Ok(ActuatorReport::failed("no safe process to terminate")),
        }
    }

    async fn terminate(&self, process: &ProcessInfo, mode: &str) -> Result<ActuatorReport> {
        let report = self.processes.terminate(process.pid, false).await?;
        Ok(ActuatorReport {
            ok: report.ok,
            message: format!(
                "terminated {}({}) [{mode}]: {}",
                process.name, process.pid, report.message
            ),
        })
    }

    /// Restart a known leaky service, else stop the largest whitelisted process.
    async fn relieve_memory(&self) -> Result<ActuatorReport> {
        let cfg = &self.config.memory;
        for service in &cfg.restart_services {
            match self.services.restart(service).await {
                Ok(report) if report.ok => {
                    return Ok(ActuatorReport::ok(format!("restarted {service}")));
                }
                Ok(report) => tracing::warn!("restart of {} failed: {}", service, report.message),
                Err(e) => tracing::warn!("restart of {} failed: {:#}", service, e),
            }
        }

        let top = self
            .processes
            .list_processes(ProcessSort::Memory, TOP_PROCESSES)
            .await?;
        match top.iter().find(|p| Self::matches_any(&p.name, &cfg.kill_whitelist)) {
            Some(p) => self.terminate(p, "rss").await,
            None => Ok(ActuatorReport::failed(
                "no leaky service restarted and no whitelisted process to terminate",
            )),
        }
    }

    /// Restart the parent's unit when allowed, else TERM a whitelisted parent.
    async fn reap_zombies(&self, snapshot: &ZombieSnapshot) -> Result<ActuatorReport> {
        let cfg = &self.config.zombie;
        let mut parents = snapshot.parents.clone();
        parents.sort_by(|a, b| b.zombies.cmp(&a.zombies));

        for parent in &parents {
            let unit = cfg.restart_services.iter().find(|unit| {
                unit.eq_ignore_ascii_case(&parent.name)
                    || unit.eq_ignore_ascii_case(&format!("{}.service", parent.name))
            });
            if let Some(unit) = unit {
                let report = self.services.restart(unit).await?;
                if report.ok {
                    return Ok(ActuatorReport::ok(format!(
                        "restarted {unit} (parent of {} zombies)",
                        parent.zombies
                    )));
                }
            }
        }

        for parent in &parents {
            if Self::matches_any(&parent.name, &cfg.kill_parent_whitelist) {
                let report = self.processes.terminate(parent.ppid, false).await?;
                return Ok(ActuatorReport {
                    ok: report.ok,
                    message: format!(
                        "sent TERM to {}({}): {}",
                        parent.name, parent.ppid, report.message
                    ),
                });
            }
        }
        Ok(ActuatorReport::failed("no restartable or whitelisted zombie parent"))
    }

    async fn handle_cpu(&self) -> Result<Vec<Outcome>> {
        let cfg = &self.config.cpu;
        let since = self.ctx.since_minutes(cfg.lookback_minutes);
        let samples = self
            .source
            .recent_samples(&self.ctx.host, since, cfg.consecutive.max(1))
            .await
            .map_err(SourceUnavailable)?;
        let Some(decision) = classify_cpu(&samples, cfg) else {
            return Ok(Vec::new());
        };

        let guardrail = self.ctx.guardrails.load(Domain::Cpu);
        let verdict = self.ctx.evaluate(Domain::Cpu, &decision, &guardrail).await?;
        let remediator = self.ctx.remediator();
        let request = Remediation {
            domain: Domain::Cpu,
            decision: &decision,
            verdict: &verdict,
            config: &guardrail,
            owned: true,
            intent: "terminate the top CPU consumer".to_string(),
            alert_on_failure: false,
        };
        let outcome = remediator.apply(request, || self.kill_cpu_offender()).await;
        if outcome.actuated {
            self.verify_and_alert(
                &remediator,
                &decision,
                &outcome,
                Domain::Cpu,
                cfg.post_verify_seconds,
                |s| s.cpu_pct,
                cfg.warn,
            )
            .await;
        }
        Ok(vec![outcome])
    }

    async fn handle_memory(&self) -> Result<Vec<Outcome>> {
        let cfg = &self.config.memory;
        let since = self.ctx.since_minutes(cfg.lookback_minutes);
        let samples = self
            .source
            .recent_samples(&self.ctx.host, since, cfg.consecutive.max(1))
            .await
            .map_err(SourceUnavailable)?;
        let Some(decision) = classify_memory(&samples, cfg) else {
            return Ok(Vec::new());
        };

        let guardrail = self.ctx.guardrails.load(Domain::Memory);
        let verdict = self
            .ctx
            .evaluate(Domain::Memory, &decision, &guardrail)
            .await?;
        let remediator = self.ctx.remediator();
        let request = Remediation {
            domain: Domain::Memory,
            decision: &decision,
            verdict: &verdict,
            config: &guardrail,
            owned: true,
            intent: "relieve memory pressure".to_string(),
            alert_on_failure: false,
        };
        let outcome = remediator.apply(request, || self.relieve_memory()).await;
        if outcome.actuated {
            self.verify_and_alert(
                &remediator,
                &decision,
                &outcome,
                Domain::Memory,
                cfg.post_verify_seconds,
                |s| s.mem_pct,
                cfg.warn,
            )
            .await;
        }
        Ok(vec![outcome])
    }

    async fn handle_load(&self) -> Result<Vec<Outcome>> {
        let cfg = &self.config.load;
        let since = self.ctx.since_minutes(cfg.lookback_minutes);
        let samples = self
            .source
            .recent_samples(&self.ctx.host, since, cfg.consecutive.max(1))
            .await
            .map_err(SourceUnavailable)?;
        let Some(mut decision) = classify_load(&samples, cfg) else {
            return Ok(Vec::new());
        };

        match self
            .processes
            .list_processes(ProcessSort::Cpu, HOTSPOT_PROCESSES)
            .await
        {
            Ok(top) if !top.is_empty() => {
                let hotspots = top
                    .iter()
                    .map(|p| format!("{}({}) {:.0}%", p.name, p.pid, p.cpu_pct))
                    .collect::<Vec<_>>()
                    .join(", ");
                decision.message = format!("{}; hotspots: {hotspots}", decision.message);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("hotspot snapshot failed: {:#}", e),
        }

        let guardrail = self.ctx.guardrails.load(Domain::Load);
        let verdict = self.ctx.evaluate(Domain::Load, &decision, &guardrail).await?;
        let request = Remediation {
            domain: Domain::Load,
            decision: &decision,
            verdict: &verdict,
            config: &guardrail,
            owned: true,
            intent: "observe load".to_string(),
            alert_on_failure: false,
        };
        let outcome = self
            .ctx
            .remediator()
            .apply(request, || async {
                Ok(ActuatorReport::ok("load spike is alert-only"))
            })
            .await;
        Ok(vec![outcome])
    }

    async fn handle_zombies(&self) -> Result<Vec<Outcome>> {
        let cfg = &self.config.zombie;
        let snapshots = self
            .source
            .recent_zombie_snapshots(&self.ctx.host, cfg.consecutive.max(1))
            .await
            .map_err(SourceUnavailable)?;
        let Some(decision) = classify_zombies(&snapshots, cfg) else {
            return Ok(Vec::new());
        };

        let guardrail = self.ctx.guardrails.load(Domain::Zombie);
        let verdict = self
            .ctx
            .evaluate(Domain::Zombie, &decision, &guardrail)
            .await?;
        let request = Remediation {
            domain: Domain::Zombie,
            decision: &decision,
            verdict: &verdict,
            config: &guardrail,
            owned: true,
            intent: "reap zombie processes".to_string(),
            alert_on_failure: true,
        };
        let outcome = self
            .ctx
            .remediator()
            .apply(request, || self.reap_zombies(&snapshots[0]))
            .await;
        Ok(vec![outcome])
    }
}

#[async_trait]
impl Sweep for MetricsSweep {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn run(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let host = self.ctx.host.clone();

        report.examined += 1;
        self.ctx
            .isolate(
                Domain::Cpu,
                &format!("{host}/cpu"),
                &ProblemKind::CpuHigh,
                &mut report,
                self.handle_cpu(),
            )
            .await;
        self.ctx
            .isolate(
                Domain::Memory,
                &format!("{host}/memory"),
                &ProblemKind::MemoryPressure,
                &mut report,
                self.handle_memory(),
            )
            .await;

        if self.unix_metrics {
            self.ctx
                .isolate(
                    Domain::Load,
                    &format!("{host}/load"),
                    &ProblemKind::LoadSpike,
                    &mut report,
                    self.handle_load(),
                )
                .await;
            self.ctx
                .isolate(
                    Domain::Zombie,
                    &format!("{host}/zombies"),
                    &ProblemKind::ZombieFlood,
                    &mut report,
                    self.handle_zombies(),
                )
                .await;
        }
        Ok(report)
    }
}
