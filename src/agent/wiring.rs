use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};

use fleetmend_adapter_host::{CommandRunner, HostPlatform, local_hostname};
use fleetmend_adapter_notification::NotificationService;
use fleetmend_adapter_storage::SqliteStore;
use fleetmend_application::{
    ClusterSweep, DiskSweep, GuardrailLoader, MetricsSweep, NetworkSweep, PodSweep, ServiceSweep,
    SweepContext, SystemClock,
};
use fleetmend_domain::FleetmendConfig;
use fleetmend_ports::{ClusterSource, PodActuator};

use crate::agent::scheduler::{ScheduledSweep, Scheduler};

pub const SWEEP_NAMES: [&str; 6] = ["service", "metrics", "disk", "network", "pods", "cluster"];

/// Command-line and environment toggles layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    pub once: bool,
    pub only: Option<String>,
    pub dry_run: bool,
}

pub struct Agent {
    scheduler: Scheduler,
    once: bool,
}

impl Agent {
    pub async fn build(config: &FleetmendConfig, options: &AgentOptions) -> Result<Self> {
        if let Some(only) = &options.only {
            if !SWEEP_NAMES.contains(&only.as_str()) {
                bail!("unknown domain {only:?}, expected one of {}", SWEEP_NAMES.join(", "));
            }
        }

        let store = Arc::new(SqliteStore::open(&config.storage.sqlite_path)?);
        let host = config.agent.host.clone().unwrap_or_else(local_hostname);
        let platform = HostPlatform::detect();
        let action_timeout = Duration::from_secs(config.agent.action_timeout_seconds.max(1));
        let host_actuators = platform.actuators(CommandRunner::new(action_timeout));
        let dry_run = options.dry_run || config.agent.dry_run;

        let notifier = NotificationService::new(config.notifications.channels.clone())
            .with_history(store.clone());
        let ctx = SweepContext {
            ledger: store.clone(),
            alerts: Arc::new(notifier),
            clock: Arc::new(SystemClock),
            guardrails: GuardrailLoader::from_dir(&config.guardrails.dir)
                .with_forced_dry_run(dry_run),
            host: host.clone(),
            cluster: config.agent.cluster.clone(),
            action_timeout,
        };
        let (pods, cluster) = cluster_ports(config, action_timeout).await;
        let cluster = cluster.unwrap_or_else(|| -> Arc<dyn ClusterSource> { store.clone() });

        let schedule = &config.schedule;
        let every = |seconds: u64| Duration::from_secs(seconds.max(1));
        let sweeps = vec![
            ScheduledSweep::new(
                Arc::new(ServiceSweep::new(
                    ctx.clone(),
                    store.clone(),
                    host_actuators.services.clone(),
                    config.service.clone(),
                )),
                every(schedule.service_seconds),
            ),
            ScheduledSweep::new(
                Arc::new(MetricsSweep::new(
                    ctx.clone(),
                    store.clone(),
                    host_actuators.processes.clone(),
                    host_actuators.services.clone(),
                    config.metrics.clone(),
                    platform.has_unix_metrics(),
                )),
                every(schedule.metrics_seconds),
            ),
            ScheduledSweep::new(
                Arc::new(DiskSweep::new(
                    ctx.clone(),
                    store.clone(),
                    host_actuators.disks.clone(),
                    config.disk.clone(),
                )),
                every(schedule.disk_seconds),
            ),
            ScheduledSweep::new(
                Arc::new(NetworkSweep::new(
                    ctx.clone(),
                    store.clone(),
                    host_actuators.network.clone(),
                    host_actuators.probe.clone(),
                    config.network.clone(),
                )),
                every(schedule.network_seconds),
            ),
            ScheduledSweep::new(
                Arc::new(PodSweep::new(ctx.clone(), store.clone(), pods, config.pods.clone())),
                every(schedule.pods_seconds),
            ),
            ScheduledSweep::new(
                Arc::new(ClusterSweep::new(ctx, cluster)),
                every(schedule.cluster_seconds),
            ),
        ];

        let sweeps: Vec<_> = sweeps
            .into_iter()
            .filter(|s| options.only.as_deref().is_none_or(|only| s.name() == only))
            .collect();

        tracing::info!(
            host = %host,
            platform = platform.as_str(),
            cluster = %config.agent.cluster,
            dry_run,
            sweeps = sweeps.len(),
            "agent ready"
        );

        Ok(Self {
            scheduler: Scheduler::new(
                sweeps,
                Duration::from_secs(schedule.jitter_seconds),
                Duration::from_secs(schedule.stagger_seconds),
            ),
            once: options.once,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// One pass when `once` is set, otherwise sweeps until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        if self.once {
            self.scheduler.run_once().await;
        } else {
            self.scheduler.run_until(shutdown).await;
        }
    }
}

/// Pod actuator plus a live API probe. Without the probe the cluster sweep
/// reads collector rows from the store.
#[cfg(feature = "kube")]
async fn cluster_ports(
    config: &FleetmendConfig,
    timeout: Duration,
) -> (Arc<dyn PodActuator>, Option<Arc<dyn ClusterSource>>) {
    use fleetmend_adapter_kube::{KubeApiProbe, KubePodActuator};
    use fleetmend_ports::NullPodActuator;

    let context = config.agent.kube_context.as_deref();
    let pods: Arc<dyn PodActuator> = match KubePodActuator::connect(context).await {
        Ok(actuator) => Arc::new(actuator),
        Err(e) => {
            tracing::warn!("Kubernetes client unavailable, pod fixes disabled: {:#}", e);
            Arc::new(NullPodActuator)
        }
    };
    let probe: Arc<dyn ClusterSource> = Arc::new(KubeApiProbe::new(
        config.agent.cluster.clone(),
        config.agent.kube_context.clone(),
        timeout,
    ));
    (pods, Some(probe))
}

#[cfg(not(feature = "kube"))]
async fn cluster_ports(
    _config: &FleetmendConfig,
    _timeout: Duration,
) -> (Arc<dyn PodActuator>, Option<Arc<dyn ClusterSource>>) {
    (Arc::new(fleetmend_ports::NullPodActuator), None)
}
