use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use fleetmend_domain::{
    Action, ActionResult, Decision, Domain, GuardrailConfig, MAX_ERROR_CHARS, Observation,
    ProblemKind, Severity,
};
use fleetmend_ports::{ActuatorReport, ServiceActuator};

use crate::fakes::{
    FakeActuator, HOST, ManualClock, MemoryAlerts, MemoryLedger, live, service_down, t0,
};
use crate::guardrail::{DenyReason, Verdict};
use crate::remediator::{Remediation, Remediator};

struct Fixture {
    ledger: Arc<MemoryLedger>,
    alerts: Arc<MemoryAlerts>,
    clock: Arc<ManualClock>,
    actuator: Arc<FakeActuator>,
    remediator: Remediator,
}

fn fixture() -> Fixture {
    let ledger = Arc::new(MemoryLedger::default());
    let alerts = Arc::new(MemoryAlerts::default());
    let clock = Arc::new(ManualClock::at(t0()));
    let remediator = Remediator::new(
        ledger.clone(),
        alerts.clone(),
        clock.clone(),
        Duration::from_secs(20),
    );
    Fixture {
        ledger,
        alerts,
        clock,
        actuator: Arc::new(FakeActuator::default()),
        remediator,
    }
}

fn nginx_down(host: &str) -> Decision {
    Decision::new(
        format!("{host}/nginx"),
        Severity::Warning,
        Action::AutoFix,
        ProblemKind::ServiceDown,
        format!("service nginx on {host} is stopped"),
        Observation::Service(service_down(host, "nginx")),
    )
}

fn request<'a>(
    decision: &'a Decision,
    verdict: &'a Verdict,
    config: &'a GuardrailConfig,
    owned: bool,
) -> Remediation<'a> {
    Remediation {
        domain: Domain::Service,
        decision,
        verdict,
        config,
        owned,
        intent: "restart nginx".to_string(),
        alert_on_failure: true,
    }
}

#[tokio::test]
async fn successful_restart_is_logged_without_alert() {
    let f = fixture();
    let decision = nginx_down(HOST);
    let verdict = Verdict::Permit(Action::AutoFix);
    let config = live(Domain::Service);

    let outcome = f
        .remediator
        .apply(request(&decision, &verdict, &config, true), || {
            f.actuator.restart("nginx")
        })
        .await;

    assert_eq!(outcome.result, ActionResult::Success);
    assert!(outcome.actuated);
    assert_eq!(f.actuator.calls(), vec!["restart nginx".to_string()]);
    let entries = f.ledger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].result, ActionResult::Success);
    assert_eq!(entries[0].entity_key, "web-01/nginx");
    assert!(f.alerts.raised().is_empty());
}

#[tokio::test]
async fn failed_restart_is_logged_and_alerted() {
    let f = fixture();
    f.actuator
        .reply("restart nginx", ActuatorReport::failed("unit nginx.service not found"));
    let decision = nginx_down(HOST);
    let verdict = Verdict::Permit(Action::AutoFix);
    let config = live(Domain::Service);

    let outcome = f
        .remediator
        .apply(request(&decision, &verdict, &config, true), || {
            f.actuator.restart("nginx")
        })
        .await;

    assert_eq!(outcome.result, ActionResult::Fail);
    let entries = f.ledger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].result, ActionResult::Fail);
    assert_eq!(
        entries[0].error_message.as_deref(),
        Some("unit nginx.service not found")
    );
    let alerts = f.alerts.raised();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Warning);
    assert!(alerts[0].message.contains("restart nginx failed"));
}

#[tokio::test]
async fn dry_run_never_calls_the_actuator() {
    let f = fixture();
    let decision = nginx_down(HOST);
    let verdict = Verdict::Permit(Action::AutoFix);
    let config = GuardrailConfig::defaults_for(Domain::Service);
    assert!(config.dry_run);

    let outcome = f
        .remediator
        .apply(request(&decision, &verdict, &config, true), || {
            f.actuator.restart("nginx")
        })
        .await;

    assert_eq!(outcome.result, ActionResult::DryRunNoop);
    assert_eq!(outcome.message, "dry-run: would restart nginx");
    assert!(f.actuator.calls().is_empty());
    assert_eq!(f.ledger.entries().len(), 1);
}

#[tokio::test]
async fn foreign_entities_are_queued() {
    let f = fixture();
    let decision = nginx_down("db-07");
    let verdict = Verdict::Permit(Action::AutoFix);
    let config = live(Domain::Service);

    let outcome = f
        .remediator
        .apply(request(&decision, &verdict, &config, false), || {
            f.actuator.restart("nginx")
        })
        .await;

    assert_eq!(outcome.result, ActionResult::Queued);
    assert_eq!(outcome.message, "queued for db-07: restart nginx");
    assert!(f.actuator.calls().is_empty());
}

#[tokio::test]
async fn denial_is_skipped_and_alerted() {
    let f = fixture();
    let decision = nginx_down(HOST);
    let verdict = Verdict::Deny(DenyReason::Cooldown {
        remaining_seconds: 42,
    });
    let config = live(Domain::Service);

    let outcome = f
        .remediator
        .apply(request(&decision, &verdict, &config, true), || {
            f.actuator.restart("nginx")
        })
        .await;

    assert_eq!(outcome.result, ActionResult::Skipped);
    assert!(outcome.message.ends_with("(auto-fix denied: cooldown (42s remaining))"));
    assert!(f.actuator.calls().is_empty());
    assert_eq!(f.alerts.raised().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_fix_times_out_as_failure() {
    let f = fixture();
    *f.actuator.hang.lock().unwrap() = true;
    let decision = nginx_down(HOST);
    let verdict = Verdict::Permit(Action::AutoFix);
    let config = live(Domain::Service);

    let outcome = f
        .remediator
        .apply(request(&decision, &verdict, &config, true), || {
            f.actuator.restart("nginx")
        })
        .await;

    assert_eq!(outcome.result, ActionResult::Fail);
    let entries = f.ledger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].error_message.as_deref(),
        Some("timed out after 20s")
    );
}

#[tokio::test]
async fn long_errors_are_truncated() {
    let f = fixture();
    f.actuator
        .reply("restart nginx", ActuatorReport::failed("x".repeat(2000)));
    let decision = nginx_down(HOST);
    let verdict = Verdict::Permit(Action::AutoFix);
    let config = live(Domain::Service);

    f.remediator
        .apply(request(&decision, &verdict, &config, true), || {
            f.actuator.restart("nginx")
        })
        .await;

    let error = f.ledger.entries()[0].error_message.clone().unwrap();
    assert_eq!(error.chars().count(), MAX_ERROR_CHARS);
}

#[tokio::test]
async fn alerts_are_throttled_per_entity_and_kind() {
    let f = fixture();
    let config = live(Domain::Cluster);
    assert_eq!(config.alert_interval_seconds, 300);
    let kind = ProblemKind::ApiDown;
    let raise = |key: &'static str| {
        f.remediator.alert(
            Domain::Cluster,
            key,
            &kind,
            Severity::Critical,
            "api down".to_string(),
            &config,
        )
    };

    for _ in 0..3 {
        raise("k8s://prod").await;
        f.clock.advance(60);
    }
    assert_eq!(f.alerts.raised().len(), 1);

    f.clock.advance(300);
    raise("k8s://prod").await;
    assert_eq!(f.alerts.raised().len(), 2);

    raise("k8s://staging").await;
    assert_eq!(f.alerts.raised().len(), 3);
}
