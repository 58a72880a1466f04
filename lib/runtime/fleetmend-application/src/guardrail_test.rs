use std::io::Write;

use chrono::Duration;
use pretty_assertions::assert_eq;

use fleetmend_domain::{
    Action, ActionResult, BackoffConfig, Decision, Domain, GuardrailConfig, LedgerEntry,
    Observation, ProblemKind, Severity,
};
use fleetmend_ports::LedgerPort;

use crate::fakes::{HOST, MemoryLedger, live, pod, sample, service_down, t0};
use crate::guardrail::{CapScope, DenyReason, GuardrailLoader, LedgerFacts, Verdict, evaluate};

fn nginx_down() -> Decision {
    Decision::new(
        format!("{HOST}/nginx"),
        Severity::Warning,
        Action::AutoFix,
        ProblemKind::ServiceDown,
        "nginx is stopped",
        Observation::Service(service_down(HOST, "nginx")),
    )
}

fn cpu_high() -> Decision {
    Decision::new(
        format!("{HOST}/cpu"),
        Severity::Critical,
        Action::AutoFix,
        ProblemKind::CpuHigh,
        "cpu high",
        Observation::Resource(sample(Some(97.0), None, None)),
    )
}

fn pod_decision(namespace: &str, kind: ProblemKind, action: Action) -> Decision {
    Decision::new(
        format!("k8s://prod/{namespace}/api-0"),
        Severity::Critical,
        action,
        kind,
        "pod unhealthy",
        Observation::Pod(pod(namespace, "api-0")),
    )
}

fn entry(key: &str, domain: Domain, seconds_ago: i64, result: ActionResult) -> LedgerEntry {
    LedgerEntry::new(
        key,
        domain,
        ProblemKind::CpuHigh,
        t0() - Duration::seconds(seconds_ago),
        result,
        "earlier attempt",
    )
}

#[test]
fn disabled_config_denies_everything() {
    let mut config = live(Domain::Service);
    config.enabled = false;
    let verdict = evaluate(&nginx_down(), &config, &LedgerFacts::default(), t0());
    assert_eq!(verdict, Verdict::Deny(DenyReason::Disabled));
}

#[test]
fn blacklist_matches_any_key_component() {
    let config = live(Domain::Pod);
    let decision = pod_decision("KUBE-SYSTEM", ProblemKind::CrashLoopBackOff, Action::AutoFix);
    let verdict = evaluate(&decision, &config, &LedgerFacts::default(), t0());
    assert_eq!(
        verdict,
        Verdict::Deny(DenyReason::Blacklisted("kube-system".to_string()))
    );
}

#[test]
fn whitelist_excludes_unlisted_entities() {
    let mut config = live(Domain::Service);
    config.entity_whitelist = vec!["db-01".to_string()];
    let verdict = evaluate(&nginx_down(), &config, &LedgerFacts::default(), t0());
    assert_eq!(verdict, Verdict::Deny(DenyReason::NotWhitelisted));

    config.entity_whitelist = vec![HOST.to_string()];
    let verdict = evaluate(&nginx_down(), &config, &LedgerFacts::default(), t0());
    assert_eq!(verdict, Verdict::Permit(Action::AutoFix));
}

#[test]
fn kinds_without_auto_fix_are_downgraded() {
    let config = live(Domain::Pod);
    let decision = pod_decision("shop", ProblemKind::OomKilled, Action::AutoFix);
    let verdict = evaluate(&decision, &config, &LedgerFacts::default(), t0());
    assert_eq!(verdict, Verdict::Permit(Action::AlertOnly));
}

#[test]
fn alert_only_ignores_cooldown() {
    let config = live(Domain::Pod);
    let decision = pod_decision("shop", ProblemKind::OomKilled, Action::AlertOnly);
    let facts = LedgerFacts {
        last_action_at: Some(t0()),
        entity_attempts: 5,
        entity_count: 5,
        global_count: 50,
    };
    assert_eq!(
        evaluate(&decision, &config, &facts, t0()),
        Verdict::Permit(Action::AlertOnly)
    );
}

#[test]
fn cooldown_boundary_is_exclusive() {
    let mut config = live(Domain::Service);
    config.backoff = None;
    let decision = nginx_down();

    let inside = LedgerFacts {
        last_action_at: Some(t0() - Duration::seconds(59)),
        entity_attempts: 1,
        entity_count: 1,
        global_count: 0,
    };
    assert_eq!(
        evaluate(&decision, &config, &inside, t0()),
        Verdict::Deny(DenyReason::Cooldown {
            remaining_seconds: 1
        })
    );

    let outside = LedgerFacts {
        last_action_at: Some(t0() - Duration::seconds(61)),
        ..inside
    };
    assert_eq!(
        evaluate(&decision, &config, &outside, t0()),
        Verdict::Permit(Action::AutoFix)
    );
}

#[test]
fn backoff_stretches_cooldown_after_repeated_attempts() {
    let mut config = live(Domain::Service);
    config.backoff = Some(BackoffConfig {
        base_seconds: 60,
        max_seconds: 480,
    });
    let facts = LedgerFacts {
        last_action_at: Some(t0() - Duration::seconds(100)),
        entity_attempts: 2,
        entity_count: 2,
        global_count: 2,
    };
    assert_eq!(
        evaluate(&nginx_down(), &config, &facts, t0()),
        Verdict::Deny(DenyReason::Cooldown {
            remaining_seconds: 20
        })
    );
}

#[tokio::test]
async fn per_entity_window_caps_failures() {
    let ledger = MemoryLedger::default();
    let key = format!("{HOST}/cpu");
    for seconds_ago in [1700, 1000, 400] {
        ledger
            .append(entry(&key, Domain::Cpu, seconds_ago, ActionResult::Fail))
            .await
            .unwrap();
    }
    ledger
        .append(entry(&key, Domain::Cpu, 1900, ActionResult::Fail))
        .await
        .unwrap();

    let config = live(Domain::Cpu);
    let facts = LedgerFacts::gather(&ledger, Domain::Cpu, &key, &config, t0())
        .await
        .unwrap();
    assert_eq!(facts.entity_count, 3);
    assert_eq!(
        evaluate(&cpu_high(), &config, &facts, t0()),
        Verdict::Deny(DenyReason::Backoff {
            scope: CapScope::Entity,
            count: 3,
            max: 3
        })
    );

    let ledger = MemoryLedger::default();
    for seconds_ago in [1700, 400] {
        ledger
            .append(entry(&key, Domain::Cpu, seconds_ago, ActionResult::Fail))
            .await
            .unwrap();
    }
    let facts = LedgerFacts::gather(&ledger, Domain::Cpu, &key, &config, t0())
        .await
        .unwrap();
    assert_eq!(facts.entity_count, 2);
    assert_eq!(
        evaluate(&cpu_high(), &config, &facts, t0()),
        Verdict::Permit(Action::AutoFix)
    );
}

#[tokio::test]
async fn skipped_entries_do_not_start_a_cooldown() {
    let ledger = MemoryLedger::default();
    let key = format!("{HOST}/nginx");
    ledger
        .append(entry(&key, Domain::Service, 5, ActionResult::Skipped))
        .await
        .unwrap();

    let config = live(Domain::Service);
    let facts = LedgerFacts::gather(&ledger, Domain::Service, &key, &config, t0())
        .await
        .unwrap();
    assert_eq!(facts.last_action_at, None);
    assert_eq!(
        evaluate(&nginx_down(), &config, &facts, t0()),
        Verdict::Permit(Action::AutoFix)
    );
}

#[test]
fn loader_falls_back_to_conservative_on_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("service.json")).unwrap();
    file.write_all(b"{ \"dry_run\": ").unwrap();

    let loader = GuardrailLoader::from_dir(dir.path());
    assert_eq!(
        loader.load(Domain::Service),
        GuardrailConfig::conservative(Domain::Service)
    );
    assert_eq!(
        loader.load(Domain::Disk),
        GuardrailConfig::conservative(Domain::Disk)
    );
}

#[test]
fn forced_dry_run_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pod.json"), r#"{ "dry_run": false }"#).unwrap();

    let loader = GuardrailLoader::from_dir(dir.path());
    assert!(!loader.load(Domain::Pod).dry_run);
    assert!(loader.with_forced_dry_run(true).load(Domain::Pod).dry_run);
}
