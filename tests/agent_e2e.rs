use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use pretty_assertions::assert_eq;

use fleetmend::{Agent, AgentOptions, ScheduledSweep, Scheduler};
use fleetmend_adapter_notification::NotificationService;
use fleetmend_adapter_storage::SqliteStore;
use fleetmend_application::{GuardrailLoader, ServiceSweep, SweepContext, SystemClock};
use fleetmend_domain::{
    ActionResult, ApprovedServiceRule, FleetmendConfig, ServiceObservation,
    ServiceRecoveryConfig, ServiceStatus,
};
use fleetmend_ports::{ActuatorReport, ServiceActuator};

#[derive(Default)]
struct RecordingRestarts {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ServiceActuator for RecordingRestarts {
    async fn restart(&self, service: &str) -> Result<ActuatorReport> {
        self.calls.lock().unwrap().push(service.to_string());
        Ok(ActuatorReport::ok(format!("restarted {service}")))
    }
}

fn stopped(service: &str) -> ServiceObservation {
    ServiceObservation {
        host: "web-01".to_string(),
        service: service.to_string(),
        status: ServiceStatus::Stopped,
        recoverable: true,
        os_platform: "linux".to_string(),
        timestamp: Utc::now(),
    }
}

fn context(store: &Arc<SqliteStore>, guardrail_dir: &std::path::Path) -> SweepContext {
    let alerts = NotificationService::new(Vec::new()).with_history(store.clone());
    SweepContext {
        ledger: store.clone(),
        alerts: Arc::new(alerts),
        clock: Arc::new(SystemClock),
        guardrails: GuardrailLoader::from_dir(guardrail_dir),
        host: "web-01".to_string(),
        cluster: "prod".to_string(),
        action_timeout: Duration::from_secs(5),
    }
}

fn nginx_only() -> ServiceRecoveryConfig {
    ServiceRecoveryConfig {
        approved: vec![ApprovedServiceRule {
            host: "web-01".to_string(),
            service: "nginx".to_string(),
        }],
        ..ServiceRecoveryConfig::default()
    }
}

#[tokio::test]
async fn stopped_service_is_restarted_once_and_then_held_by_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("service.json"), r#"{"dry_run": false}"#).unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("fleetmend.db")).unwrap());
    store.record_service(stopped("nginx")).await.unwrap();
    store.record_service(stopped("postgres")).await.unwrap();

    let restarts = Arc::new(RecordingRestarts::default());
    let sweep = ServiceSweep::new(
        context(&store, dir.path()),
        store.clone(),
        restarts.clone(),
        nginx_only(),
    );
    let scheduler = Scheduler::new(
        vec![ScheduledSweep::new(Arc::new(sweep), Duration::from_secs(60))],
        Duration::ZERO,
        Duration::ZERO,
    );

    let first = scheduler.run_once().await;
    let report = first[0].1.as_ref().unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.count(ActionResult::Success), 1);
    assert_eq!(*restarts.calls.lock().unwrap(), vec!["nginx".to_string()]);

    let second = scheduler.run_once().await;
    assert_eq!(second[0].1.as_ref().unwrap().count(ActionResult::Skipped), 1);
    assert_eq!(restarts.calls.lock().unwrap().len(), 1);

    let entries = store.ledger_entries("web-01/nginx").await.unwrap();
    let results: Vec<_> = entries.iter().map(|e| e.result).collect();
    assert_eq!(results, vec![ActionResult::Success, ActionResult::Skipped]);
    assert!(store.ledger_entries("web-01/postgres").await.unwrap().is_empty());

    let alerts = store.alerts_for("web-01/nginx").await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, "warning");
    assert!(alerts[0].1.contains("cooldown"));
}

#[tokio::test]
async fn unreadable_guardrail_file_falls_back_to_alert_only() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("service.json"), "{ not json").unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("fleetmend.db")).unwrap());
    store.record_service(stopped("nginx")).await.unwrap();

    let restarts = Arc::new(RecordingRestarts::default());
    let sweep = ServiceSweep::new(
        context(&store, dir.path()),
        store.clone(),
        restarts.clone(),
        nginx_only(),
    );
    let scheduler = Scheduler::new(
        vec![ScheduledSweep::new(Arc::new(sweep), Duration::from_secs(60))],
        Duration::ZERO,
        Duration::ZERO,
    );

    let results = scheduler.run_once().await;
    let report = results[0].1.as_ref().unwrap();
    assert_eq!(report.count(ActionResult::Skipped), 1);
    assert_eq!(report.count(ActionResult::DryRunNoop), 0);
    assert!(restarts.calls.lock().unwrap().is_empty());

    let entries = store.ledger_entries("web-01/nginx").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].result, ActionResult::Skipped);
    assert_eq!(store.alerts_for("web-01/nginx").await.unwrap().len(), 1);
}

#[tokio::test]
async fn agent_rejects_unknown_domain() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = FleetmendConfig::default();
    config.storage.sqlite_path = dir.path().join("fleetmend.db").display().to_string();
    let options = AgentOptions {
        only: Some("printer".to_string()),
        ..AgentOptions::default()
    };

    let err = Agent::build(&config, &options).await.err().unwrap();
    assert!(err.to_string().contains("unknown domain"));
}

#[tokio::test]
async fn agent_limited_to_one_domain_runs_a_single_pass() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = FleetmendConfig::default();
    config.storage.sqlite_path = dir.path().join("fleetmend.db").display().to_string();
    config.guardrails.dir = dir.path().display().to_string();
    config.agent.host = Some("web-01".to_string());
    let options = AgentOptions {
        once: true,
        only: Some("service".to_string()),
        dry_run: true,
    };

    let agent = Agent::build(&config, &options).await.unwrap();
    assert_eq!(agent.scheduler().names(), vec!["service"]);
    agent.run(std::future::pending()).await;
}
