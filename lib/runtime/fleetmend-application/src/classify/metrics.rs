use fleetmend_domain::{
    Action, CpuConfig, Decision, LoadConfig, MemoryConfig, Observation, ProblemKind,
    ResourceSample, Severity, ZombieConfig, ZombieSnapshot,
};

use super::sustained;

fn format_values(
    rows: &[ResourceSample],
    need: usize,
    value: fn(&ResourceSample) -> Option<f64>,
) -> String {
    rows.iter()
        .take(need.max(1))
        .map(|row| match value(row) {
            Some(v) => format!("{v:.1}"),
            None => "-".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn classify_cpu(samples: &[ResourceSample], config: &CpuConfig) -> Option<Decision> {
    if !sustained(samples, config.consecutive, |s| s.cpu_pct.map(|v| v >= config.warn)) {
        return None;
    }
    let latest = &samples[0];
    let current = latest.cpu_pct.unwrap_or_default();
    let severity = if current >= config.crit {
        Severity::Critical
    } else {
        Severity::Warning
    };
    Some(Decision::new(
        format!("{}/cpu", latest.host),
        severity,
        Action::AutoFix,
        ProblemKind::CpuHigh,
        format!(
            "cpu on {} at or above {:.0}% for {} samples [{}]",
            latest.host,
            config.warn,
            config.consecutive.max(1),
            format_values(samples, config.consecutive, |s| s.cpu_pct)
        ),
        Observation::Resource(latest.clone()),
    ))
}

pub fn classify_memory(samples: &[ResourceSample], config: &MemoryConfig) -> Option<Decision> {
    let pressured = |s: &ResourceSample| match (s.mem_pct, s.swap_pct) {
        (Some(mem), Some(swap)) => Some(mem >= config.warn && swap >= config.swap_warn),
        _ => None,
    };
    if !sustained(samples, config.consecutive, pressured) {
        return None;
    }
    let latest = &samples[0];
    let severity = if latest.mem_pct.unwrap_or_default() >= config.crit {
        Severity::Critical
    } else {
        Severity::Warning
    };
    Some(Decision::new(
        format!("{}/memory", latest.host),
        severity,
        Action::AutoFix,
        ProblemKind::MemoryPressure,
        format!(
            "memory on {} at or above {:.0}% with swap at or above {:.0}% [mem {}] [swap {}]",
            latest.host,
            config.warn,
            config.swap_warn,
            format_values(samples, config.consecutive, |s| s.mem_pct),
            format_values(samples, config.consecutive, |s| s.swap_pct)
        ),
        Observation::Resource(latest.clone()),
    ))
}

/// Load is judged against the core count of the newest sample. Hosts that do
/// not report a load average never trigger.
pub fn classify_load(samples: &[ResourceSample], config: &LoadConfig) -> Option<Decision> {
    let latest = samples.first()?;
    let cores = f64::from(latest.cpu_cores.filter(|c| *c > 0)?);
    let threshold = cores * config.warn_multiplier;
    if !sustained(samples, config.consecutive, |s| s.load_1m.map(|l| l >= threshold)) {
        return None;
    }
    let current = latest.load_1m.unwrap_or_default();
    let severity = if current >= cores * config.crit_multiplier {
        Severity::Critical
    } else {
        Severity::Warning
    };
    Some(Decision::new(
        format!("{}/load", latest.host),
        severity,
        Action::AlertOnly,
        ProblemKind::LoadSpike,
        format!(
            "load on {} is {current:.2}, threshold {threshold:.2} ({cores} cores x {})",
            latest.host, config.warn_multiplier
        ),
        Observation::Resource(latest.clone()),
    ))
}

pub fn zombie_level(snapshot: &ZombieSnapshot, config: &ZombieConfig) -> Option<Severity> {
    if snapshot.total_procs < config.min_total_procs {
        return None;
    }
    let ratio = snapshot.ratio();
    if snapshot.zombies >= config.abs_crit || ratio >= config.ratio_crit {
        Some(Severity::Critical)
    } else if ratio >= config.ratio_warn {
        Some(Severity::Warning)
    } else {
        None
    }
}

pub fn classify_zombies(snapshots: &[ZombieSnapshot], config: &ZombieConfig) -> Option<Decision> {
    let flooded = |s: &ZombieSnapshot| Some(zombie_level(s, config).is_some());
    if !sustained(snapshots, config.consecutive, flooded) {
        return None;
    }
    let latest = &snapshots[0];
    let severity = zombie_level(latest, config)?;
    Some(Decision::new(
        format!("{}/zombies", latest.host),
        severity,
        Action::AutoFix,
        ProblemKind::ZombieFlood,
        format!(
            "{} zombies out of {} processes ({:.1}%) on {}",
            latest.zombies,
            latest.total_procs,
            latest.ratio() * 100.0,
            latest.host
        ),
        Observation::Zombie(latest.clone()),
    ))
}
