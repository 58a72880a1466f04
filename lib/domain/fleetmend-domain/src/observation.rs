use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recovery domains. Each one owns its guardrail file and its global key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Service,
    Cpu,
    Memory,
    Load,
    Zombie,
    Disk,
    Network,
    Pod,
    Cluster,
}

impl Domain {
    pub const ALL: [Domain; 9] = [
        Domain::Service,
        Domain::Cpu,
        Domain::Memory,
        Domain::Load,
        Domain::Zombie,
        Domain::Disk,
        Domain::Network,
        Domain::Pod,
        Domain::Cluster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Service => "service",
            Domain::Cpu => "cpu",
            Domain::Memory => "memory",
            Domain::Load => "load",
            Domain::Zombie => "zombie",
            Domain::Disk => "disk",
            Domain::Network => "network",
            Domain::Pod => "pod",
            Domain::Cluster => "cluster",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|domain| domain.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits an entity key into the components guardrail lists may name.
///
/// `k8s://prod/default/web-1` yields `prod`, `default`, `web-1`.
pub fn key_components(entity_key: &str) -> impl Iterator<Item = &str> {
    let trimmed = entity_key
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(entity_key);
    trimmed.split('/').filter(|part| !part.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Failed,
    Other(String),
}

impl ServiceStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" | "active" => ServiceStatus::Running,
            "stopped" | "inactive" | "dead" => ServiceStatus::Stopped,
            "failed" => ServiceStatus::Failed,
            other => ServiceStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Failed => "failed",
            ServiceStatus::Other(raw) => raw,
        }
    }

    pub fn is_down(&self) -> bool {
        matches!(self, ServiceStatus::Stopped | ServiceStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceObservation {
    pub host: String,
    pub service: String,
    pub status: ServiceStatus,
    pub recoverable: bool,
    pub os_platform: String,
    pub timestamp: DateTime<Utc>,
}

/// One row of host resource metrics. Missing values stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub host: String,
    pub timestamp: DateTime<Utc>,
    pub cpu_pct: Option<f64>,
    pub mem_pct: Option<f64>,
    pub swap_pct: Option<f64>,
    pub load_1m: Option<f64>,
    pub cpu_cores: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZombieParent {
    pub ppid: u32,
    pub name: String,
    pub zombies: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZombieSnapshot {
    pub host: String,
    pub timestamp: DateTime<Utc>,
    pub total_procs: u32,
    pub zombies: u32,
    pub parents: Vec<ZombieParent>,
}

impl ZombieSnapshot {
    pub fn ratio(&self) -> f64 {
        if self.total_procs == 0 {
            0.0
        } else {
            f64::from(self.zombies) / f64::from(self.total_procs)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskObservation {
    pub host: String,
    pub mount: String,
    pub timestamp: DateTime<Utc>,
    pub usage_pct: Option<f64>,
    pub inode_pct: Option<f64>,
    pub read_only: bool,
}

impl DiskObservation {
    pub fn is_root(&self) -> bool {
        self.mount == "/" || self.mount.eq_ignore_ascii_case("C:\\") || self.mount.eq_ignore_ascii_case("C:")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmartHealth {
    Passed,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartObservation {
    pub host: String,
    pub device: String,
    pub timestamp: DateTime<Utc>,
    pub health: SmartHealth,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub host: String,
    pub target: String,
    pub method: String,
    pub result: String,
    pub latency_ms: Option<f64>,
    pub packet_loss_pct: Option<f64>,
    pub interface: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodCondition {
    pub kind: String,
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContainerState {
    pub name: String,
    pub waiting_reason: Option<String>,
    pub terminated_reason: Option<String>,
    pub last_terminated_reason: Option<String>,
    pub restart_count: u32,
    pub ready: bool,
}

/// Raw pod status as reported by the collector. The classifier derives the
/// problem from these fields; `reported_problem` is only used when nothing
/// here matches a known signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodObservation {
    pub cluster: String,
    pub namespace: String,
    pub pod: String,
    pub timestamp: DateTime<Utc>,
    pub phase: String,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub pending_seconds: Option<i64>,
    pub terminating_seconds: Option<i64>,
    #[serde(default)]
    pub conditions: Vec<PodCondition>,
    #[serde(default)]
    pub containers: Vec<ContainerState>,
    pub reported_problem: Option<String>,
}

impl PodObservation {
    pub fn total_restarts(&self) -> u32 {
        self.containers.iter().map(|c| c.restart_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterObservation {
    pub cluster: String,
    pub timestamp: DateTime<Utc>,
    pub api_reachable: bool,
    pub detail: Option<String>,
    pub nodes_ready: Option<u32>,
    pub nodes_total: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum Observation {
    Service(ServiceObservation),
    Resource(ResourceSample),
    Zombie(ZombieSnapshot),
    Disk(DiskObservation),
    Smart(SmartObservation),
    Network(NetworkEvent),
    Pod(PodObservation),
    Cluster(ClusterObservation),
}

impl Observation {
    pub fn entity_key(&self) -> String {
        match self {
            Observation::Service(o) => format!("{}/{}", o.host, o.service),
            Observation::Resource(o) => format!("{}/metrics", o.host),
            Observation::Zombie(o) => format!("{}/zombies", o.host),
            Observation::Disk(o) => format!("{}/{}", o.host, o.mount),
            Observation::Smart(o) => format!("{}/{}", o.host, o.device),
            Observation::Network(o) => format!("{}/{}", o.host, o.target),
            Observation::Pod(o) => format!("k8s://{}/{}/{}", o.cluster, o.namespace, o.pod),
            Observation::Cluster(o) => format!("k8s://{}", o.cluster),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Observation::Service(o) => o.timestamp,
            Observation::Resource(o) => o.timestamp,
            Observation::Zombie(o) => o.timestamp,
            Observation::Disk(o) => o.timestamp,
            Observation::Smart(o) => o.timestamp,
            Observation::Network(o) => o.timestamp,
            Observation::Pod(o) => o.timestamp,
            Observation::Cluster(o) => o.timestamp,
        }
    }

    /// Host or cluster responsible for acting on this observation.
    pub fn owner(&self) -> &str {
        match self {
            Observation::Service(o) => &o.host,
            Observation::Resource(o) => &o.host,
            Observation::Zombie(o) => &o.host,
            Observation::Disk(o) => &o.host,
            Observation::Smart(o) => &o.host,
            Observation::Network(o) => &o.host,
            Observation::Pod(o) => &o.cluster,
            Observation::Cluster(o) => &o.cluster,
        }
    }
}
