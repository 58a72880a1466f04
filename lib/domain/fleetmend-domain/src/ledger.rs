use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::ProblemKind;
use crate::observation::Domain;

pub const MAX_ERROR_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    Success,
    Fail,
    Skipped,
    DryRunNoop,
    Queued,
}

impl ActionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionResult::Success => "success",
            ActionResult::Fail => "fail",
            ActionResult::Skipped => "skipped",
            ActionResult::DryRunNoop => "dry_run_noop",
            ActionResult::Queued => "queued",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(ActionResult::Success),
            "fail" => Some(ActionResult::Fail),
            "skipped" => Some(ActionResult::Skipped),
            "dry_run_noop" => Some(ActionResult::DryRunNoop),
            "queued" => Some(ActionResult::Queued),
            _ => None,
        }
    }

    /// Attempts feed cooldowns and attempt-counted rate windows. A skip is
    /// never an attempt, otherwise every denial would extend its own cooldown.
    pub fn is_attempt(&self) -> bool {
        !matches!(self, ActionResult::Skipped)
    }
}

/// What a rate window counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountFilter {
    #[default]
    Failures,
    Attempts,
}

impl CountFilter {
    pub fn matches(&self, result: ActionResult) -> bool {
        match self {
            CountFilter::Failures => result == ActionResult::Fail,
            CountFilter::Attempts => result.is_attempt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerScope {
    Entity(String),
    Domain(Domain),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entity_key: String,
    pub domain: Domain,
    pub kind: ProblemKind,
    pub timestamp: DateTime<Utc>,
    pub result: ActionResult,
    pub message: String,
    pub error_message: Option<String>,
}

impl LedgerEntry {
    pub fn new(
        entity_key: impl Into<String>,
        domain: Domain,
        kind: ProblemKind,
        timestamp: DateTime<Utc>,
        result: ActionResult,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity_key: entity_key.into(),
            domain,
            kind,
            timestamp,
            result,
            message: message.into(),
            error_message: None,
        }
    }

    pub fn with_error(mut self, error: impl AsRef<str>) -> Self {
        self.error_message = Some(truncate_error(error.as_ref()));
        self
    }
}

pub fn truncate_error(raw: &str) -> String {
    if raw.chars().count() <= MAX_ERROR_CHARS {
        return raw.to_string();
    }
    raw.chars().take(MAX_ERROR_CHARS).collect()
}
