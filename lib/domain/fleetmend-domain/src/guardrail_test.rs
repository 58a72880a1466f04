use std::io::Write;

use pretty_assertions::assert_eq;

use crate::{BackoffConfig, ConfigError, CountFilter, Domain, GuardrailConfig, ProblemKind};

#[test]
fn pod_defaults_only_allow_crashloop() {
    let config = GuardrailConfig::defaults_for(Domain::Pod);
    assert!(config.dry_run);
    assert_eq!(config.cooldown_seconds, 300);
    assert!(config.allows_auto(&ProblemKind::CrashLoopBackOff));
    assert!(!config.allows_auto(&ProblemKind::OomKilled));
    assert!(config.entity_blacklist.iter().any(|e| e == "kube-system"));
    assert_eq!(config.window_caps.per_entity.max_actions, 3);
    assert_eq!(config.window_caps.global.window_seconds, 600);
}

#[test]
fn conservative_fallback_allows_nothing() {
    let config = GuardrailConfig::conservative(Domain::Service);
    assert!(config.enabled);
    assert!(config.dry_run);
    assert!(config.allowed_auto_actions.is_empty());
}

#[test]
fn partial_file_overrides_only_named_fields() {
    let raw = r#"{
        "dry_run": false,
        "cooldown_seconds": 120,
        "window_caps": { "per_entity": { "window_seconds": 1800, "max_actions": 5 } }
    }"#;
    let config = GuardrailConfig::from_json_str(Domain::Cpu, raw).unwrap();
    assert!(!config.dry_run);
    assert_eq!(config.cooldown_seconds, 120);
    assert_eq!(config.window_caps.per_entity.max_actions, 5);
    assert_eq!(config.window_caps.per_entity.counts, CountFilter::Failures);
    assert_eq!(config.window_caps.global.max_actions, 10);
    assert!(config.allows_auto(&ProblemKind::CpuHigh));
}

#[test]
fn missing_and_malformed_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("pod.json");
    assert!(matches!(
        GuardrailConfig::load_from_path(Domain::Pod, &missing),
        Err(ConfigError::Missing { .. })
    ));

    let broken = dir.path().join("disk.json");
    let mut file = std::fs::File::create(&broken).unwrap();
    file.write_all(b"{ not json").unwrap();
    assert!(matches!(
        GuardrailConfig::load_from_path(Domain::Disk, &broken),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn backoff_doubles_until_capped() {
    let backoff = BackoffConfig {
        base_seconds: 60,
        max_seconds: 600,
    };
    assert_eq!(backoff.delay_seconds(0), 0);
    assert_eq!(backoff.delay_seconds(1), 60);
    assert_eq!(backoff.delay_seconds(2), 120);
    assert_eq!(backoff.delay_seconds(4), 480);
    assert_eq!(backoff.delay_seconds(5), 600);
    assert_eq!(backoff.delay_seconds(90), 600);
}

#[test]
fn unknown_problem_kinds_keep_their_name() {
    let kind = ProblemKind::parse("Flapping");
    assert_eq!(kind, ProblemKind::Unknown("Flapping".to_string()));
    assert_eq!(kind.as_str(), "Flapping");
    assert_eq!(ProblemKind::parse("OOMKilled"), ProblemKind::OomKilled);
}
