//! Side-effecting fixes. Every call is expected to finish in bounded time;
//! the caller still wraps it in a timeout.

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorReport {
    pub ok: bool,
    pub message: String,
}

impl ActuatorReport {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    pub user: String,
    pub cpu_pct: f64,
    pub rss_kb: u64,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSort {
    Cpu,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub is_up: bool,
    pub has_ipv4: bool,
    pub is_primary: bool,
    pub has_default_route: bool,
    pub low_traffic: bool,
}

#[async_trait]
pub trait ServiceActuator: Send + Sync {
    async fn restart(&self, service: &str) -> Result<ActuatorReport>;
}

#[async_trait]
pub trait ProcessActuator: Send + Sync {
    async fn list_processes(&self, sort: ProcessSort, limit: usize) -> Result<Vec<ProcessInfo>>;

    async fn terminate(&self, pid: u32, force: bool) -> Result<ActuatorReport>;
}

#[async_trait]
pub trait DiskActuator: Send + Sync {
    async fn remount_rw(&self, mount: &str) -> Result<ActuatorReport>;

    async fn cleanup_inodes(&self, mount: &str) -> Result<ActuatorReport>;

    async fn cleanup_disk(&self, mount: &str) -> Result<ActuatorReport>;
}

#[async_trait]
pub trait NetworkActuator: Send + Sync {
    async fn reload_firewall(&self, target: &str) -> Result<ActuatorReport>;

    async fn restart_dns_cache(&self) -> Result<ActuatorReport>;

    async fn bounce_interface(&self, interface: &str) -> Result<ActuatorReport>;
}

/// Read-only checks used to gate and verify network fixes.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn ping(&self, target: &str, interface: Option<&str>) -> Result<bool>;

    async fn resolves(&self, name: &str) -> Result<bool>;

    async fn has_default_route(&self) -> Result<bool>;

    async fn interfaces(&self) -> Result<Vec<InterfaceInfo>>;
}

#[async_trait]
pub trait PodActuator: Send + Sync {
    /// Deletes the pod immediately so its controller recreates it.
    async fn delete_pod(&self, namespace: &str, pod: &str) -> Result<ActuatorReport>;
}

#[derive(Clone, Default)]
pub struct NullPodActuator;

#[async_trait]
impl PodActuator for NullPodActuator {
    async fn delete_pod(&self, namespace: &str, pod: &str) -> Result<ActuatorReport> {
        Ok(ActuatorReport::failed(format!(
            "no kubernetes client configured to delete {namespace}/{pod}"
        )))
    }
}
