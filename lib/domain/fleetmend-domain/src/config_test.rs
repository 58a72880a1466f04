use pretty_assertions::assert_eq;

use crate::{FleetmendConfig, NotificationChannelConfig, key_components};

#[test]
fn empty_yaml_yields_defaults() {
    let config = FleetmendConfig::from_yaml_str("").unwrap();
    assert_eq!(config, FleetmendConfig::default());
    assert_eq!(config.metrics.cpu.consecutive, 3);
    assert_eq!(config.network.latency_threshold_ms, 300.0);
}

#[test]
fn yaml_sections_override_defaults() {
    let raw = r#"
agent:
  host: node-7
  cluster: prod
service:
  approved:
    - host: "*"
      service: nginx.service
    - host: db-1
      service: postgresql
metrics:
  cpu:
    warn: 80
notifications:
  channels:
    - type: ntfy
      url: https://ntfy.sh
      topic: fleet
"#;
    let config = FleetmendConfig::from_yaml_str(raw).unwrap();
    assert_eq!(config.agent.host.as_deref(), Some("node-7"));
    assert_eq!(config.agent.cluster, "prod");
    assert_eq!(config.metrics.cpu.warn, 80.0);
    assert_eq!(config.metrics.cpu.crit, 95.0);
    assert!(config.service.is_approved("web-3", "nginx.service"));
    assert!(config.service.is_approved("db-1", "postgresql"));
    assert!(!config.service.is_approved("db-2", "postgresql"));
    assert_eq!(
        config.notifications.channels,
        vec![NotificationChannelConfig::Ntfy {
            url: "https://ntfy.sh".to_string(),
            topic: "fleet".to_string(),
        }]
    );
}

#[test]
fn missing_config_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = FleetmendConfig::load_from_path(&dir.path().join("absent.yaml")).unwrap();
    assert_eq!(config.storage.sqlite_path, "fleetmend.db");
}

#[test]
fn key_components_strip_scheme() {
    let parts: Vec<_> = key_components("k8s://prod/kube-system/coredns-1").collect();
    assert_eq!(parts, vec!["prod", "kube-system", "coredns-1"]);
    let parts: Vec<_> = key_components("web-1/nginx.service").collect();
    assert_eq!(parts, vec!["web-1", "nginx.service"]);
}
