use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use fleetmend_domain::{
    Action, CountFilter, Decision, Domain, GuardrailConfig, LedgerScope, key_components,
};
use fleetmend_ports::LedgerPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapScope {
    Entity,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    Disabled,
    Blacklisted(String),
    NotWhitelisted,
    Cooldown { remaining_seconds: i64 },
    Backoff { scope: CapScope, count: u32, max: u32 },
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::Disabled => "disabled",
            DenyReason::Blacklisted(_) => "blacklisted",
            DenyReason::NotWhitelisted => "not_whitelisted",
            DenyReason::Cooldown { .. } => "cooldown",
            DenyReason::Backoff { .. } => "backoff",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Blacklisted(entry) => write!(f, "blacklisted ({entry})"),
            DenyReason::Cooldown { remaining_seconds } => {
                write!(f, "cooldown ({remaining_seconds}s remaining)")
            }
            DenyReason::Backoff { scope, count, max } => {
                let scope = match scope {
                    CapScope::Entity => "entity",
                    CapScope::Global => "global",
                };
                write!(f, "backoff ({scope} window {count}/{max})")
            }
            other => f.write_str(other.code()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Carries the effective action, possibly downgraded to alert-only.
    Permit(Action),
    Deny(DenyReason),
}

/// Ledger answers the policy needs, gathered right before evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFacts {
    pub last_action_at: Option<DateTime<Utc>>,
    /// Attempts on the entity inside the per-entity window.
    pub entity_attempts: u32,
    /// Entries matching the per-entity cap filter inside its window.
    pub entity_count: u32,
    /// Entries matching the global cap filter across the domain.
    pub global_count: u32,
}

impl LedgerFacts {
    pub async fn gather(
        ledger: &dyn LedgerPort,
        domain: Domain,
        entity_key: &str,
        config: &GuardrailConfig,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let per_entity = &config.window_caps.per_entity;
        let global = &config.window_caps.global;
        let entity_scope = LedgerScope::Entity(entity_key.to_string());
        let entity_since = window_start(now, per_entity.window_seconds);

        let last_action_at = ledger.last_action_time(entity_key).await?;
        let entity_attempts = ledger
            .count(&entity_scope, CountFilter::Attempts, entity_since)
            .await?;
        let entity_count = if per_entity.counts == CountFilter::Attempts {
            entity_attempts
        } else {
            ledger
                .count(&entity_scope, per_entity.counts, entity_since)
                .await?
        };
        let global_count = ledger
            .count(
                &LedgerScope::Domain(domain),
                global.counts,
                window_start(now, global.window_seconds),
            )
            .await?;

        Ok(Self {
            last_action_at,
            entity_attempts,
            entity_count,
            global_count,
        })
    }
}

pub(crate) fn window_start(now: DateTime<Utc>, window_seconds: u64) -> DateTime<Utc> {
    let span = Duration::try_seconds(i64::try_from(window_seconds).unwrap_or(i64::MAX))
        .unwrap_or(Duration::MAX);
    now.checked_sub_signed(span)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn list_match<'a>(list: &'a [String], entity_key: &str) -> Option<&'a String> {
    list.iter().find(|entry| {
        entry.eq_ignore_ascii_case(entity_key)
            || key_components(entity_key).any(|part| entry.eq_ignore_ascii_case(part))
    })
}

/// Checks run in a fixed order and stop at the first denial. A kind that is
/// not allowed to auto-fix is downgraded to alert-only instead of denied.
pub fn evaluate(
    decision: &Decision,
    config: &GuardrailConfig,
    facts: &LedgerFacts,
    now: DateTime<Utc>,
) -> Verdict {
    if !config.enabled {
        return Verdict::Deny(DenyReason::Disabled);
    }

    if let Some(entry) = list_match(&config.entity_blacklist, &decision.entity_key) {
        return Verdict::Deny(DenyReason::Blacklisted(entry.clone()));
    }

    if !config.entity_whitelist.is_empty()
        && list_match(&config.entity_whitelist, &decision.entity_key).is_none()
    {
        return Verdict::Deny(DenyReason::NotWhitelisted);
    }

    let action = match decision.action {
        Action::AlertOnly => Action::AlertOnly,
        requested if config.allows_auto(&decision.kind) => requested,
        _ => Action::AlertOnly,
    };
    if action == Action::AlertOnly {
        return Verdict::Permit(Action::AlertOnly);
    }

    let backoff = config
        .backoff
        .map(|b| b.delay_seconds(facts.entity_attempts))
        .unwrap_or(0);
    let effective_cooldown =
        i64::try_from(config.cooldown_seconds.max(backoff)).unwrap_or(i64::MAX);
    if let Some(last) = facts.last_action_at {
        let elapsed = (now - last).num_seconds();
        if elapsed < effective_cooldown {
            return Verdict::Deny(DenyReason::Cooldown {
                remaining_seconds: effective_cooldown - elapsed,
            });
        }
    }

    let per_entity = &config.window_caps.per_entity;
    if facts.entity_count >= per_entity.max_actions {
        return Verdict::Deny(DenyReason::Backoff {
            scope: CapScope::Entity,
            count: facts.entity_count,
            max: per_entity.max_actions,
        });
    }

    let global = &config.window_caps.global;
    if facts.global_count >= global.max_actions {
        return Verdict::Deny(DenyReason::Backoff {
            scope: CapScope::Global,
            count: facts.global_count,
            max: global.max_actions,
        });
    }

    Verdict::Permit(action)
}

#[derive(Debug, Clone)]
enum GuardrailSource {
    Directory(PathBuf),
    Fixed(HashMap<Domain, GuardrailConfig>),
}

/// Produces the per-sweep `GuardrailConfig`. Loading never fails: any problem
/// with the file falls back to the conservative config and logs a warning.
#[derive(Debug, Clone)]
pub struct GuardrailLoader {
    source: GuardrailSource,
    force_dry_run: bool,
}

impl GuardrailLoader {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: GuardrailSource::Directory(dir.into()),
            force_dry_run: false,
        }
    }

    pub fn fixed(configs: HashMap<Domain, GuardrailConfig>) -> Self {
        Self {
            source: GuardrailSource::Fixed(configs),
            force_dry_run: false,
        }
    }

    pub fn with_forced_dry_run(mut self, force: bool) -> Self {
        self.force_dry_run = force;
        self
    }

    pub fn load(&self, domain: Domain) -> GuardrailConfig {
        let mut config = match &self.source {
            GuardrailSource::Directory(dir) => GuardrailConfig::load_or_default(
                &dir.join(format!("{}.json", domain.as_str())),
                domain,
            ),
            GuardrailSource::Fixed(configs) => configs
                .get(&domain)
                .cloned()
                .unwrap_or_else(|| GuardrailConfig::conservative(domain)),
        };
        if self.force_dry_run {
            config.dry_run = true;
        }
        config
    }
}
