use fleetmend_domain::{
    Action, Decision, DiskConfig, DiskObservation, Observation, ProblemKind, Severity,
    SmartHealth, SmartObservation,
};

use super::sustained;

/// Each disk fix gets its own key so a remount does not put the cleanup that
/// follows it into cooldown.
pub fn disk_entity_key(host: &str, facet: &str, mount: &str) -> String {
    format!("{host}/{facet}/{}", mount.trim_start_matches('/'))
}

fn level(value: f64, warn: f64, crit: f64) -> Option<Severity> {
    if value >= crit {
        Some(Severity::Critical)
    } else if value >= warn {
        Some(Severity::Warning)
    } else {
        None
    }
}

pub fn classify_smart(observation: &SmartObservation) -> Option<Decision> {
    if observation.health != SmartHealth::Failed {
        return None;
    }
    Some(Decision::new(
        format!("{}/{}", observation.host, observation.device),
        Severity::Critical,
        Action::AlertOnly,
        ProblemKind::SmartFailure,
        format!(
            "SMART health check failed for {} on {}: {}",
            observation.device, observation.host, observation.detail
        ),
        Observation::Smart(observation.clone()),
    ))
}

pub fn classify_read_only(disk: &DiskObservation) -> Option<Decision> {
    if !(disk.is_root() && disk.read_only) {
        return None;
    }
    Some(Decision::new(
        disk_entity_key(&disk.host, "fs-remount", &disk.mount),
        Severity::Critical,
        Action::AutoFix,
        ProblemKind::FilesystemReadOnly,
        format!("root filesystem on {} is mounted read-only", disk.host),
        Observation::Disk(disk.clone()),
    ))
}

/// `history` is newest first for one mount. Severity follows the newest row.
pub fn classify_inodes(history: &[DiskObservation], config: &DiskConfig) -> Option<Decision> {
    if !sustained(history, config.consecutive, |d| {
        d.inode_pct.map(|v| v >= config.inode_warn)
    }) {
        return None;
    }
    let disk = history.first()?;
    let used = disk.inode_pct?;
    let severity = level(used, config.inode_warn, config.inode_crit)?;
    Some(Decision::new(
        disk_entity_key(&disk.host, "inode-cleanup", &disk.mount),
        severity,
        Action::AutoFix,
        ProblemKind::InodeExhausted,
        format!("inode usage on {}:{} at {used:.1}%", disk.host, disk.mount),
        Observation::Disk(disk.clone()),
    ))
}

/// `history` is newest first for one mount. Severity follows the newest row.
pub fn classify_disk_usage(history: &[DiskObservation], config: &DiskConfig) -> Option<Decision> {
    if !sustained(history, config.consecutive, |d| {
        d.usage_pct.map(|v| v >= config.warn)
    }) {
        return None;
    }
    let disk = history.first()?;
    let used = disk.usage_pct?;
    let severity = level(used, config.warn, config.crit)?;
    Some(Decision::new(
        disk_entity_key(&disk.host, "disk-cleanup", &disk.mount),
        severity,
        Action::AutoFix,
        ProblemKind::DiskFull,
        format!("disk usage on {}:{} at {used:.1}%", disk.host, disk.mount),
        Observation::Disk(disk.clone()),
    ))
}
