use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use fleetmend_domain::{
    Alert, ClusterObservation, ContainerState, CountFilter, DiskObservation, Domain,
    GuardrailConfig, LedgerEntry, LedgerScope, NetworkEvent, PodObservation, ProblemKind,
    ResourceSample, ServiceObservation, ServiceStatus, SmartObservation, ZombieSnapshot,
};
use fleetmend_ports::{
    ActuatorReport, AlertPort, Clock, ClusterSource, DiskActuator, DiskSource, InterfaceInfo,
    LedgerPort, NetworkActuator, NetworkProbe, NetworkSource, PodActuator, PodSource,
    ProcessActuator, ProcessInfo, ProcessSort, ResourceSource, ServiceActuator, ServiceSource,
};

use crate::guardrail::GuardrailLoader;
use crate::sweep::SweepContext;

pub const HOST: &str = "web-01";
pub const CLUSTER: &str = "prod";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

#[derive(Default)]
pub struct MemoryLedger {
    pub entries: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerPort for MemoryLedger {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn last_action_time(&self, entity_key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.entity_key == entity_key && e.result.is_attempt())
            .map(|e| e.timestamp)
            .max())
    }

    async fn count(
        &self,
        scope: &LedgerScope,
        filter: CountFilter,
        since: DateTime<Utc>,
    ) -> Result<u32> {
        let count = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp >= since && filter.matches(e.result))
            .filter(|e| match scope {
                LedgerScope::Entity(key) => &e.entity_key == key,
                LedgerScope::Domain(domain) => e.domain == *domain,
            })
            .count();
        Ok(count as u32)
    }
}

#[derive(Default)]
pub struct MemoryAlerts {
    pub raised: Mutex<Vec<Alert>>,
}

impl MemoryAlerts {
    pub fn raised(&self) -> Vec<Alert> {
        self.raised.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertPort for MemoryAlerts {
    async fn raise(&self, alert: Alert) -> Result<()> {
        self.raised.lock().unwrap().push(alert);
        Ok(())
    }

    async fn last_raised(
        &self,
        entity_key: &str,
        kind: &ProblemKind,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .raised
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.entity_key == entity_key && &a.kind == kind)
            .map(|a| a.raised_at)
            .max())
    }
}

/// Sleeping advances the clock instead of waiting.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(seconds);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration.as_secs() as i64);
    }
}

/// Records every call by name; replies are scripted per call name.
#[derive(Default)]
pub struct FakeActuator {
    pub calls: Mutex<Vec<String>>,
    pub replies: Mutex<HashMap<String, ActuatorReport>>,
    pub processes: Mutex<Vec<ProcessInfo>>,
    pub interfaces: Mutex<Vec<InterfaceInfo>>,
    pub probe_results: Mutex<HashMap<String, bool>>,
    pub hang: Mutex<bool>,
}

impl FakeActuator {
    pub fn reply(&self, call: &str, report: ActuatorReport) {
        self.replies
            .lock()
            .unwrap()
            .insert(call.to_string(), report);
    }

    pub fn probe(&self, call: &str, ok: bool) {
        self.probe_results
            .lock()
            .unwrap()
            .insert(call.to_string(), ok);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn act(&self, call: String) -> Result<ActuatorReport> {
        self.calls.lock().unwrap().push(call.clone());
        let hang = *self.hang.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        let reply = self.replies.lock().unwrap().get(&call).cloned();
        Ok(reply.unwrap_or_else(|| ActuatorReport::ok(format!("{call} done"))))
    }

    fn answer(&self, call: String) -> Result<bool> {
        self.calls.lock().unwrap().push(call.clone());
        self.probe_results
            .lock()
            .unwrap()
            .get(&call)
            .copied()
            .ok_or_else(|| anyhow!("no scripted answer for {call}"))
    }
}

#[async_trait]
impl ServiceActuator for FakeActuator {
    async fn restart(&self, service: &str) -> Result<ActuatorReport> {
        self.act(format!("restart {service}")).await
    }
}

#[async_trait]
impl ProcessActuator for FakeActuator {
    async fn list_processes(&self, _sort: ProcessSort, limit: usize) -> Result<Vec<ProcessInfo>> {
        Ok(self
            .processes
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn terminate(&self, pid: u32, force: bool) -> Result<ActuatorReport> {
        self.act(format!("terminate {pid} force={force}")).await
    }
}

#[async_trait]
impl DiskActuator for FakeActuator {
    async fn remount_rw(&self, mount: &str) -> Result<ActuatorReport> {
        self.act(format!("remount {mount}")).await
    }

    async fn cleanup_inodes(&self, mount: &str) -> Result<ActuatorReport> {
        self.act(format!("inodes {mount}")).await
    }

    async fn cleanup_disk(&self, mount: &str) -> Result<ActuatorReport> {
        self.act(format!("cleanup {mount}")).await
    }
}

#[async_trait]
impl NetworkActuator for FakeActuator {
    async fn reload_firewall(&self, target: &str) -> Result<ActuatorReport> {
        self.act(format!("firewall {target}")).await
    }

    async fn restart_dns_cache(&self) -> Result<ActuatorReport> {
        self.act("dns restart".to_string()).await
    }

    async fn bounce_interface(&self, interface: &str) -> Result<ActuatorReport> {
        self.act(format!("bounce {interface}")).await
    }
}

#[async_trait]
impl NetworkProbe for FakeActuator {
    async fn ping(&self, target: &str, interface: Option<&str>) -> Result<bool> {
        match interface {
            Some(nic) => self.answer(format!("ping {target} via {nic}")),
            None => self.answer(format!("ping {target}")),
        }
    }

    async fn resolves(&self, name: &str) -> Result<bool> {
        self.answer(format!("resolve {name}"))
    }

    async fn has_default_route(&self) -> Result<bool> {
        self.answer("default route".to_string())
    }

    async fn interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        Ok(self.interfaces.lock().unwrap().clone())
    }
}

#[async_trait]
impl PodActuator for FakeActuator {
    async fn delete_pod(&self, namespace: &str, pod: &str) -> Result<ActuatorReport> {
        self.act(format!("delete {namespace}/{pod}")).await
    }
}

/// Collector output served straight from memory.
#[derive(Default)]
pub struct FakeSources {
    pub services: Mutex<Vec<ServiceObservation>>,
    pub samples: Mutex<Vec<ResourceSample>>,
    pub zombies: Mutex<Vec<ZombieSnapshot>>,
    pub disks: Mutex<Vec<DiskObservation>>,
    pub smart: Mutex<Vec<SmartObservation>>,
    pub network: Mutex<Vec<NetworkEvent>>,
    pub pods: Mutex<Vec<PodObservation>>,
    pub cluster: Mutex<Option<ClusterObservation>>,
    /// Source methods that fail, by name.
    pub unreadable: Mutex<HashSet<&'static str>>,
}

impl FakeSources {
    pub fn break_read(&self, method: &'static str) {
        self.unreadable.lock().unwrap().insert(method);
    }

    fn read(&self, method: &'static str) -> Result<()> {
        if self.unreadable.lock().unwrap().contains(method) {
            return Err(anyhow!("{method}: database is locked"));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceSource for FakeSources {
    async fn unhealthy_services(&self, _since: DateTime<Utc>) -> Result<Vec<ServiceObservation>> {
        Ok(self.services.lock().unwrap().clone())
    }
}

#[async_trait]
impl ResourceSource for FakeSources {
    async fn recent_samples(
        &self,
        host: &str,
        _since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ResourceSample>> {
        self.read("recent_samples")?;
        Ok(self
            .samples
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.host == host)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_sample(&self, host: &str) -> Result<Option<ResourceSample>> {
        Ok(self
            .samples
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.host == host)
            .cloned())
    }

    async fn recent_zombie_snapshots(
        &self,
        host: &str,
        limit: usize,
    ) -> Result<Vec<ZombieSnapshot>> {
        Ok(self
            .zombies
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.host == host)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DiskSource for FakeSources {
    /// `disks` is kept newest first, so the first row per mount wins.
    async fn latest_disks(&self, host: &str) -> Result<Vec<DiskObservation>> {
        let mut seen = HashSet::new();
        Ok(self
            .disks
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.host == host && seen.insert(d.mount.clone()))
            .cloned()
            .collect())
    }

    async fn recent_disks(
        &self,
        host: &str,
        mount: &str,
        limit: usize,
    ) -> Result<Vec<DiskObservation>> {
        Ok(self
            .disks
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.host == host && d.mount == mount)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_smart(&self, host: &str) -> Result<Vec<SmartObservation>> {
        self.read("latest_smart")?;
        Ok(self
            .smart
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.host == host)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NetworkSource for FakeSources {
    async fn recent_events(&self, host: &str, _since: DateTime<Utc>) -> Result<Vec<NetworkEvent>> {
        Ok(self
            .network
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.host == host)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PodSource for FakeSources {
    async fn unhealthy_pods(
        &self,
        cluster: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<PodObservation>> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.cluster == cluster)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ClusterSource for FakeSources {
    async fn latest_cluster(&self, _cluster: &str) -> Result<Option<ClusterObservation>> {
        Ok(self.cluster.lock().unwrap().clone())
    }
}

/// Live config for `domain`: defaults with dry-run switched off.
pub fn live(domain: Domain) -> GuardrailConfig {
    let mut config = GuardrailConfig::defaults_for(domain);
    config.dry_run = false;
    config
}

pub struct Harness {
    pub ledger: Arc<MemoryLedger>,
    pub alerts: Arc<MemoryAlerts>,
    pub clock: Arc<ManualClock>,
    pub actuator: Arc<FakeActuator>,
    pub sources: Arc<FakeSources>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(MemoryLedger::default()),
            alerts: Arc::new(MemoryAlerts::default()),
            clock: Arc::new(ManualClock::at(t0())),
            actuator: Arc::new(FakeActuator::default()),
            sources: Arc::new(FakeSources::default()),
        }
    }

    pub fn context(&self, configs: Vec<(Domain, GuardrailConfig)>) -> SweepContext {
        SweepContext {
            ledger: self.ledger.clone(),
            alerts: self.alerts.clone(),
            clock: self.clock.clone(),
            guardrails: GuardrailLoader::fixed(configs.into_iter().collect()),
            host: HOST.to_string(),
            cluster: CLUSTER.to_string(),
            action_timeout: Duration::from_secs(20),
        }
    }
}

pub fn service_down(host: &str, service: &str) -> ServiceObservation {
    ServiceObservation {
        host: host.to_string(),
        service: service.to_string(),
        status: ServiceStatus::Stopped,
        recoverable: true,
        os_platform: "linux".to_string(),
        timestamp: t0(),
    }
}

pub fn sample(cpu: Option<f64>, mem: Option<f64>, swap: Option<f64>) -> ResourceSample {
    ResourceSample {
        host: HOST.to_string(),
        timestamp: t0(),
        cpu_pct: cpu,
        mem_pct: mem,
        swap_pct: swap,
        load_1m: None,
        cpu_cores: None,
    }
}

pub fn cpu_samples(values: &[f64]) -> Vec<ResourceSample> {
    values
        .iter()
        .map(|v| sample(Some(*v), Some(40.0), Some(0.0)))
        .collect()
}

pub fn disk(mount: &str, usage: f64, inodes: f64, read_only: bool) -> DiskObservation {
    DiskObservation {
        host: HOST.to_string(),
        mount: mount.to_string(),
        timestamp: t0(),
        usage_pct: Some(usage),
        inode_pct: Some(inodes),
        read_only,
    }
}

pub fn network_event(target: &str, method: &str, result: &str) -> NetworkEvent {
    NetworkEvent {
        host: HOST.to_string(),
        target: target.to_string(),
        method: method.to_string(),
        result: result.to_string(),
        latency_ms: None,
        packet_loss_pct: None,
        interface: None,
        timestamp: t0(),
    }
}

pub fn pod(namespace: &str, name: &str) -> PodObservation {
    PodObservation {
        cluster: CLUSTER.to_string(),
        namespace: namespace.to_string(),
        pod: name.to_string(),
        timestamp: t0(),
        phase: "Running".to_string(),
        reason: None,
        message: None,
        pending_seconds: None,
        terminating_seconds: None,
        conditions: Vec::new(),
        containers: Vec::new(),
        reported_problem: None,
    }
}

pub fn crashlooping(name: &str) -> ContainerState {
    ContainerState {
        name: name.to_string(),
        waiting_reason: Some("CrashLoopBackOff".to_string()),
        restart_count: 7,
        ..ContainerState::default()
    }
}
