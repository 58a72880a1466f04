use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetmendConfig {
    pub agent: AgentConfig,
    pub storage: StorageConfig,
    pub guardrails: GuardrailsConfig,
    pub service: ServiceRecoveryConfig,
    pub metrics: MetricsConfig,
    pub disk: DiskConfig,
    pub network: NetworkConfig,
    pub pods: PodConfig,
    pub schedule: ScheduleConfig,
    pub notifications: NotificationsConfig,
}

impl FleetmendConfig {
    /// Reads YAML config. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Overrides the detected host name.
    pub host: Option<String>,
    pub cluster: String,
    pub kube_context: Option<String>,
    pub action_timeout_seconds: u64,
    pub dry_run: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: None,
            cluster: "default".to_string(),
            kube_context: None,
            action_timeout_seconds: 20,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub sqlite_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "fleetmend.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailsConfig {
    /// Directory holding `<domain>.json` files.
    pub dir: String,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            dir: "config/guardrails".to_string(),
        }
    }
}

/// `host` is a host name or `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedServiceRule {
    pub host: String,
    pub service: String,
}

impl ApprovedServiceRule {
    pub fn matches(&self, host: &str, service: &str) -> bool {
        (self.host == "*" || self.host.eq_ignore_ascii_case(host))
            && self.service.eq_ignore_ascii_case(service)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRecoveryConfig {
    pub approved: Vec<ApprovedServiceRule>,
    pub lookback_minutes: i64,
}

impl Default for ServiceRecoveryConfig {
    fn default() -> Self {
        Self {
            approved: Vec::new(),
            lookback_minutes: 10,
        }
    }
}

impl ServiceRecoveryConfig {
    pub fn is_approved(&self, host: &str, service: &str) -> bool {
        self.approved.iter().any(|rule| rule.matches(host, service))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub cpu: CpuConfig,
    pub memory: MemoryConfig,
    pub load: LoadConfig,
    pub zombie: ZombieConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub warn: f64,
    pub crit: f64,
    pub consecutive: usize,
    pub lookback_minutes: i64,
    pub post_verify_seconds: u64,
    pub kill_whitelist: Vec<String>,
    pub kill_blacklist: Vec<String>,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            warn: 90.0,
            crit: 95.0,
            consecutive: 3,
            lookback_minutes: 5,
            post_verify_seconds: 10,
            kill_whitelist: Vec::new(),
            kill_blacklist: vec![
                "systemd".to_string(),
                "sshd".to_string(),
                "kubelet".to_string(),
                "containerd".to_string(),
                "dockerd".to_string(),
                "svchost.exe".to_string(),
                "lsass.exe".to_string(),
                "csrss.exe".to_string(),
                "wininit.exe".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub warn: f64,
    pub crit: f64,
    pub swap_warn: f64,
    pub consecutive: usize,
    pub lookback_minutes: i64,
    pub post_verify_seconds: u64,
    pub restart_services: Vec<String>,
    pub kill_whitelist: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            warn: 90.0,
            crit: 95.0,
            swap_warn: 50.0,
            consecutive: 3,
            lookback_minutes: 5,
            post_verify_seconds: 10,
            restart_services: Vec::new(),
            kill_whitelist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub warn_multiplier: f64,
    pub crit_multiplier: f64,
    pub consecutive: usize,
    pub lookback_minutes: i64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            warn_multiplier: 1.5,
            crit_multiplier: 2.0,
            consecutive: 3,
            lookback_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZombieConfig {
    pub min_total_procs: u32,
    pub ratio_warn: f64,
    pub ratio_crit: f64,
    pub abs_crit: u32,
    pub consecutive: usize,
    pub restart_services: Vec<String>,
    pub kill_parent_whitelist: Vec<String>,
}

impl Default for ZombieConfig {
    fn default() -> Self {
        Self {
            min_total_procs: 100,
            ratio_warn: 0.05,
            ratio_crit: 0.10,
            abs_crit: 50,
            consecutive: 2,
            restart_services: Vec::new(),
            kill_parent_whitelist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    pub warn: f64,
    pub crit: f64,
    pub inode_warn: f64,
    pub inode_crit: f64,
    /// Newest readings per mount that must all be over a threshold.
    pub consecutive: usize,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            warn: 90.0,
            crit: 95.0,
            inode_warn: 90.0,
            inode_crit: 95.0,
            consecutive: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub latency_threshold_ms: f64,
    pub lookback_minutes: i64,
    pub dns_probe_name: String,
    pub verify_delay_seconds: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            latency_threshold_ms: 300.0,
            lookback_minutes: 10,
            dns_probe_name: "google.com".to_string(),
            verify_delay_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodConfig {
    pub long_pending_seconds: i64,
    pub stuck_terminating_seconds: i64,
    pub lookback_minutes: i64,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            long_pending_seconds: 300,
            stuck_terminating_seconds: 300,
            lookback_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub service_seconds: u64,
    pub metrics_seconds: u64,
    pub disk_seconds: u64,
    pub network_seconds: u64,
    pub pods_seconds: u64,
    pub cluster_seconds: u64,
    pub jitter_seconds: u64,
    pub stagger_seconds: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            service_seconds: 60,
            metrics_seconds: 60,
            disk_seconds: 300,
            network_seconds: 120,
            pods_seconds: 60,
            cluster_seconds: 60,
            jitter_seconds: 5,
            stagger_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationChannelConfig {
    Log,
    Ntfy { url: String, topic: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub channels: Vec<NotificationChannelConfig>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channels: vec![NotificationChannelConfig::Log],
        }
    }
}
