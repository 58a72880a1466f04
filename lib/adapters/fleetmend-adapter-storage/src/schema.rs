use rusqlite::Connection;

/// Every statement is idempotent; running it on an existing database is a no-op.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS remediation_ledger (
    id            TEXT PRIMARY KEY,
    entity_key    TEXT NOT NULL,
    domain        TEXT NOT NULL,
    kind          TEXT NOT NULL,
    ts            INTEGER NOT NULL,
    result        TEXT NOT NULL,
    message       TEXT NOT NULL,
    error_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_ledger_entity_ts ON remediation_ledger(entity_key, ts);
CREATE INDEX IF NOT EXISTS idx_ledger_domain_ts ON remediation_ledger(domain, ts);

CREATE TABLE IF NOT EXISTS alerts (
    id         TEXT PRIMARY KEY,
    entity_key TEXT NOT NULL,
    kind       TEXT NOT NULL,
    severity   TEXT NOT NULL,
    source     TEXT NOT NULL,
    message    TEXT NOT NULL,
    raised_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_entity_kind ON alerts(entity_key, kind, raised_at);

CREATE TABLE IF NOT EXISTS service_status (
    host        TEXT NOT NULL,
    service     TEXT NOT NULL,
    status      TEXT NOT NULL,
    recoverable INTEGER NOT NULL,
    os_platform TEXT NOT NULL,
    ts          INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_service_status ON service_status(host, service, ts);

CREATE TABLE IF NOT EXISTS system_metrics (
    host      TEXT NOT NULL,
    ts        INTEGER NOT NULL,
    cpu_pct   REAL,
    mem_pct   REAL,
    swap_pct  REAL,
    load_1m   REAL,
    cpu_cores INTEGER
);
CREATE INDEX IF NOT EXISTS idx_system_metrics ON system_metrics(host, ts);

CREATE TABLE IF NOT EXISTS zombie_snapshots (
    host        TEXT NOT NULL,
    ts          INTEGER NOT NULL,
    total_procs INTEGER NOT NULL,
    zombies     INTEGER NOT NULL,
    parents     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_zombie_snapshots ON zombie_snapshots(host, ts);

CREATE TABLE IF NOT EXISTS disk_health (
    host      TEXT NOT NULL,
    mount     TEXT NOT NULL,
    ts        INTEGER NOT NULL,
    usage_pct REAL,
    inode_pct REAL,
    read_only INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_disk_health ON disk_health(host, mount, ts);

CREATE TABLE IF NOT EXISTS smart_health (
    host   TEXT NOT NULL,
    device TEXT NOT NULL,
    ts     INTEGER NOT NULL,
    health TEXT NOT NULL,
    detail TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_smart_health ON smart_health(host, device, ts);

CREATE TABLE IF NOT EXISTS network_events (
    host            TEXT NOT NULL,
    target          TEXT NOT NULL,
    method          TEXT NOT NULL,
    result          TEXT NOT NULL,
    latency_ms      REAL,
    packet_loss_pct REAL,
    interface       TEXT,
    ts              INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_network_events ON network_events(host, ts);

CREATE TABLE IF NOT EXISTS k8s_pod_health (
    cluster   TEXT NOT NULL,
    namespace TEXT NOT NULL,
    pod       TEXT NOT NULL,
    ts        INTEGER NOT NULL,
    phase     TEXT NOT NULL,
    problem   TEXT,
    payload   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_k8s_pod_health ON k8s_pod_health(cluster, namespace, pod, ts);

CREATE TABLE IF NOT EXISTS k8s_cluster_health (
    cluster       TEXT NOT NULL,
    ts            INTEGER NOT NULL,
    api_reachable INTEGER NOT NULL,
    detail        TEXT,
    nodes_ready   INTEGER,
    nodes_total   INTEGER
);
CREATE INDEX IF NOT EXISTS idx_k8s_cluster_health ON k8s_cluster_health(cluster, ts);
"#;

pub fn apply(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
