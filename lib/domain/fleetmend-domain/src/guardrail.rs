use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decision::ProblemKind;
use crate::ledger::CountFilter;
use crate::observation::Domain;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("guardrail config {path} is missing")]
    Missing { path: String },
    #[error("failed to read guardrail config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid guardrail config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCap {
    pub window_seconds: u64,
    pub max_actions: u32,
    #[serde(default)]
    pub counts: CountFilter,
}

impl WindowCap {
    pub fn new(window_seconds: u64, max_actions: u32, counts: CountFilter) -> Self {
        Self {
            window_seconds,
            max_actions,
            counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCaps {
    pub per_entity: WindowCap,
    pub global: WindowCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub base_seconds: u64,
    pub max_seconds: u64,
}

impl BackoffConfig {
    /// Wait after `attempts` recent attempts: `base * 2^(attempts-1)`, capped.
    pub fn delay_seconds(&self, attempts: u32) -> u64 {
        if attempts == 0 {
            return 0;
        }
        let exponent = (attempts - 1).min(32);
        self.base_seconds
            .saturating_mul(1u64 << exponent)
            .min(self.max_seconds)
    }
}

/// Per-domain safety policy. Built once per sweep and passed down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    pub enabled: bool,
    pub entity_blacklist: Vec<String>,
    pub entity_whitelist: Vec<String>,
    pub cooldown_seconds: u64,
    pub window_caps: WindowCaps,
    pub dry_run: bool,
    pub allowed_auto_actions: BTreeMap<String, bool>,
    pub backoff: Option<BackoffConfig>,
    pub alert_interval_seconds: u64,
}

/// Partial file contents. Every present field replaces the domain default.
#[derive(Debug, Default, Deserialize)]
struct GuardrailOverrides {
    enabled: Option<bool>,
    entity_blacklist: Option<Vec<String>>,
    entity_whitelist: Option<Vec<String>>,
    cooldown_seconds: Option<u64>,
    window_caps: Option<WindowCapsOverrides>,
    dry_run: Option<bool>,
    allowed_auto_actions: Option<BTreeMap<String, bool>>,
    backoff: Option<BackoffConfig>,
    alert_interval_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WindowCapsOverrides {
    per_entity: Option<WindowCap>,
    global: Option<WindowCap>,
}

fn allow(kinds: &[ProblemKind]) -> BTreeMap<String, bool> {
    kinds
        .iter()
        .map(|kind| (kind.as_str().to_string(), true))
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl GuardrailConfig {
    pub fn defaults_for(domain: Domain) -> Self {
        let mut config = GuardrailConfig {
            enabled: true,
            entity_blacklist: Vec::new(),
            entity_whitelist: Vec::new(),
            cooldown_seconds: 300,
            window_caps: WindowCaps {
                per_entity: WindowCap::new(1800, 3, CountFilter::Failures),
                global: WindowCap::new(600, 20, CountFilter::Failures),
            },
            dry_run: true,
            allowed_auto_actions: BTreeMap::new(),
            backoff: None,
            alert_interval_seconds: 0,
        };

        match domain {
            Domain::Service => {
                config.cooldown_seconds = 60;
                config.window_caps.per_entity = WindowCap::new(600, 3, CountFilter::Attempts);
                config.allowed_auto_actions = allow(&[ProblemKind::ServiceDown]);
                config.backoff = Some(BackoffConfig {
                    base_seconds: 60,
                    max_seconds: 600,
                });
            }
            Domain::Cpu => {
                config.allowed_auto_actions = allow(&[ProblemKind::CpuHigh]);
                config.window_caps.global = WindowCap::new(3600, 10, CountFilter::Failures);
            }
            Domain::Memory => {
                config.allowed_auto_actions = allow(&[ProblemKind::MemoryPressure]);
                config.window_caps.global = WindowCap::new(3600, 10, CountFilter::Failures);
            }
            Domain::Load => {
                config.alert_interval_seconds = 900;
            }
            Domain::Zombie => {
                config.cooldown_seconds = 600;
                config.allowed_auto_actions = allow(&[ProblemKind::ZombieFlood]);
            }
            Domain::Disk => {
                config.allowed_auto_actions = allow(&[
                    ProblemKind::DiskFull,
                    ProblemKind::InodeExhausted,
                    ProblemKind::FilesystemReadOnly,
                ]);
                config.alert_interval_seconds = 3600;
            }
            Domain::Network => {
                config.allowed_auto_actions = allow(&[
                    ProblemKind::FirewallBlock,
                    ProblemKind::DnsFailure,
                    ProblemKind::PacketLoss,
                ]);
            }
            Domain::Pod => {
                config.entity_blacklist = strings(&[
                    "kube-system",
                    "kube-public",
                    "kube-node-lease",
                    "smart-monitor-orchestrator",
                    "smart-monitor-db",
                    "kube-apiserver",
                    "kube-scheduler",
                    "kube-controller-manager",
                ]);
                config.window_caps.per_entity = WindowCap::new(3600, 3, CountFilter::Attempts);
                config.window_caps.global = WindowCap::new(600, 20, CountFilter::Attempts);
                config.allowed_auto_actions = allow(&[ProblemKind::CrashLoopBackOff]);
            }
            Domain::Cluster => {
                config.alert_interval_seconds = 300;
            }
        }
        config
    }

    /// Fallback when the file cannot be used: domain lists and caps are kept,
    /// but nothing is allowed to act.
    pub fn conservative(domain: Domain) -> Self {
        let mut config = Self::defaults_for(domain);
        config.enabled = true;
        config.dry_run = true;
        config.allowed_auto_actions.clear();
        config
    }

    pub fn from_json_str(domain: Domain, raw: &str) -> Result<Self, serde_json::Error> {
        let overrides: GuardrailOverrides = serde_json::from_str(raw)?;
        Ok(Self::defaults_for(domain).merged(overrides))
    }

    pub fn load_from_path(domain: Domain, path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::Missing {
                    path: display.clone(),
                }
            } else {
                ConfigError::Io {
                    path: display.clone(),
                    source,
                }
            }
        })?;
        Self::from_json_str(domain, &raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Never fails: an unusable file yields [`GuardrailConfig::conservative`]
    /// and a warning.
    pub fn load_or_default(path: &Path, domain: Domain) -> Self {
        match Self::load_from_path(domain, path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(domain = %domain, "{}, using conservative defaults", e);
                Self::conservative(domain)
            }
        }
    }

    fn merged(mut self, overrides: GuardrailOverrides) -> Self {
        if let Some(v) = overrides.enabled {
            self.enabled = v;
        }
        if let Some(v) = overrides.entity_blacklist {
            self.entity_blacklist = v;
        }
        if let Some(v) = overrides.entity_whitelist {
            self.entity_whitelist = v;
        }
        if let Some(v) = overrides.cooldown_seconds {
            self.cooldown_seconds = v;
        }
        if let Some(caps) = overrides.window_caps {
            if let Some(v) = caps.per_entity {
                self.window_caps.per_entity = v;
            }
            if let Some(v) = caps.global {
                self.window_caps.global = v;
            }
        }
        if let Some(v) = overrides.dry_run {
            self.dry_run = v;
        }
        if let Some(v) = overrides.allowed_auto_actions {
            self.allowed_auto_actions = v;
        }
        if overrides.backoff.is_some() {
            self.backoff = overrides.backoff;
        }
        if let Some(v) = overrides.alert_interval_seconds {
            self.alert_interval_seconds = v;
        }
        self
    }

    pub fn allows_auto(&self, kind: &ProblemKind) -> bool {
        self.allowed_auto_actions
            .get(kind.as_str())
            .copied()
            .unwrap_or(false)
    }
}
