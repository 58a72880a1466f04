use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::observation::Observation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("critical") {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    AutoFix,
    AlertOnly,
    Queued,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::AutoFix => "auto_fix",
            Action::AlertOnly => "alert_only",
            Action::Queued => "queued",
        }
    }
}

/// Detected problem. Serialized as its stable name so ledger rows and
/// guardrail `allowed_auto_actions` keys stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    ServiceDown,
    CpuHigh,
    MemoryPressure,
    LoadSpike,
    ZombieFlood,
    DiskFull,
    InodeExhausted,
    FilesystemReadOnly,
    SmartFailure,
    FirewallBlock,
    DnsFailure,
    PacketLoss,
    LatencySpike,
    OomKilled,
    CrashLoopBackOff,
    ImagePullBackOff,
    ErrImagePull,
    LongPending,
    ProbeFailure,
    StuckTerminating,
    Unschedulable,
    Evicted,
    ApiDown,
    Unknown(String),
}

impl ProblemKind {
    const KNOWN: [ProblemKind; 23] = [
        ProblemKind::ServiceDown,
        ProblemKind::CpuHigh,
        ProblemKind::MemoryPressure,
        ProblemKind::LoadSpike,
        ProblemKind::ZombieFlood,
        ProblemKind::DiskFull,
        ProblemKind::InodeExhausted,
        ProblemKind::FilesystemReadOnly,
        ProblemKind::SmartFailure,
        ProblemKind::FirewallBlock,
        ProblemKind::DnsFailure,
        ProblemKind::PacketLoss,
        ProblemKind::LatencySpike,
        ProblemKind::OomKilled,
        ProblemKind::CrashLoopBackOff,
        ProblemKind::ImagePullBackOff,
        ProblemKind::ErrImagePull,
        ProblemKind::LongPending,
        ProblemKind::ProbeFailure,
        ProblemKind::StuckTerminating,
        ProblemKind::Unschedulable,
        ProblemKind::Evicted,
        ProblemKind::ApiDown,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ProblemKind::ServiceDown => "ServiceDown",
            ProblemKind::CpuHigh => "CpuHigh",
            ProblemKind::MemoryPressure => "MemoryPressure",
            ProblemKind::LoadSpike => "LoadSpike",
            ProblemKind::ZombieFlood => "ZombieFlood",
            ProblemKind::DiskFull => "DiskFull",
            ProblemKind::InodeExhausted => "InodeExhausted",
            ProblemKind::FilesystemReadOnly => "FilesystemReadOnly",
            ProblemKind::SmartFailure => "SmartFailure",
            ProblemKind::FirewallBlock => "FirewallBlock",
            ProblemKind::DnsFailure => "DnsFailure",
            ProblemKind::PacketLoss => "PacketLoss",
            ProblemKind::LatencySpike => "LatencySpike",
            ProblemKind::OomKilled => "OOMKilled",
            ProblemKind::CrashLoopBackOff => "CrashLoopBackOff",
            ProblemKind::ImagePullBackOff => "ImagePullBackOff",
            ProblemKind::ErrImagePull => "ErrImagePull",
            ProblemKind::LongPending => "LongPending",
            ProblemKind::ProbeFailure => "ProbeFailure",
            ProblemKind::StuckTerminating => "StuckTerminating",
            ProblemKind::Unschedulable => "Unschedulable",
            ProblemKind::Evicted => "Evicted",
            ProblemKind::ApiDown => "ApiDown",
            ProblemKind::Unknown(raw) => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        Self::KNOWN
            .iter()
            .find(|kind| kind.as_str() == trimmed)
            .cloned()
            .unwrap_or_else(|| ProblemKind::Unknown(trimmed.to_string()))
    }
}

impl std::fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProblemKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProblemKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ProblemKind::parse(&raw))
    }
}

/// Classifier output. Consumed once by the guardrail and the remediator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub entity_key: String,
    pub severity: Severity,
    pub action: Action,
    pub kind: ProblemKind,
    pub message: String,
    pub derived_from: Observation,
}

impl Decision {
    pub fn new(
        entity_key: impl Into<String>,
        severity: Severity,
        action: Action,
        kind: ProblemKind,
        message: impl Into<String>,
        derived_from: Observation,
    ) -> Self {
        Self {
            entity_key: entity_key.into(),
            severity,
            action,
            kind,
            message: message.into(),
            derived_from,
        }
    }

    pub fn owner(&self) -> &str {
        self.derived_from.owner()
    }
}
