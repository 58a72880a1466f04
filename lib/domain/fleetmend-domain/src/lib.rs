//! Domain models for detection, decisions and the remediation ledger.

pub mod alert;
pub mod config;
pub mod decision;
pub mod guardrail;
pub mod ledger;
pub mod observation;

pub use alert::Alert;
pub use config::{
    AgentConfig, ApprovedServiceRule, CpuConfig, DiskConfig, FleetmendConfig, GuardrailsConfig,
    LoadConfig, MemoryConfig, MetricsConfig, NetworkConfig, NotificationChannelConfig,
    NotificationsConfig, PodConfig, ScheduleConfig, ServiceRecoveryConfig, StorageConfig,
    ZombieConfig,
};
pub use decision::{Action, Decision, ProblemKind, Severity};
pub use guardrail::{BackoffConfig, ConfigError, GuardrailConfig, WindowCap, WindowCaps};
pub use ledger::{
    ActionResult, CountFilter, LedgerEntry, LedgerScope, MAX_ERROR_CHARS, truncate_error,
};
pub use observation::{
    ClusterObservation, ContainerState, DiskObservation, Domain, NetworkEvent, Observation,
    PodCondition, PodObservation, ResourceSample, ServiceObservation, ServiceStatus, SmartHealth,
    SmartObservation, ZombieParent, ZombieSnapshot, key_components,
};

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod guardrail_test;
