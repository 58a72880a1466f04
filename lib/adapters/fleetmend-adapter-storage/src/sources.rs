//! Collector tables. Writers are the `record_*` helpers; readers implement the
//! source ports.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;

use fleetmend_domain::{
    ClusterObservation, DiskObservation, NetworkEvent, PodObservation, ResourceSample,
    ServiceObservation, ServiceStatus, SmartHealth, SmartObservation, ZombieParent,
    ZombieSnapshot,
};
use fleetmend_ports::{
    ClusterSource, DiskSource, NetworkSource, PodSource, ResourceSource, ServiceSource,
};

use crate::store::{SqliteStore, from_millis, to_millis};

fn smart_health_str(health: &SmartHealth) -> &'static str {
    match health {
        SmartHealth::Passed => "passed",
        SmartHealth::Failed => "failed",
        SmartHealth::Unknown => "unknown",
    }
}

fn parse_smart_health(raw: &str) -> SmartHealth {
    match raw.trim().to_ascii_lowercase().as_str() {
        "passed" | "ok" | "healthy" => SmartHealth::Passed,
        "failed" | "failing" => SmartHealth::Failed,
        _ => SmartHealth::Unknown,
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn disk_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiskObservation> {
    Ok(DiskObservation {
        host: row.get(0)?,
        mount: row.get(1)?,
        timestamp: from_millis(row.get(2)?),
        usage_pct: row.get(3)?,
        inode_pct: row.get(4)?,
        read_only: row.get(5)?,
    })
}

fn sample_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResourceSample> {
    Ok(ResourceSample {
        host: row.get(0)?,
        timestamp: from_millis(row.get(1)?),
        cpu_pct: row.get(2)?,
        mem_pct: row.get(3)?,
        swap_pct: row.get(4)?,
        load_1m: row.get(5)?,
        cpu_cores: row.get(6)?,
    })
}

impl SqliteStore {
    pub async fn record_service(&self, observation: ServiceObservation) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO service_status (host, service, status, recoverable, os_platform, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    observation.host,
                    observation.service,
                    observation.status.as_str(),
                    observation.recoverable,
                    observation.os_platform,
                    to_millis(observation.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn record_sample(&self, sample: ResourceSample) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO system_metrics
                 (host, ts, cpu_pct, mem_pct, swap_pct, load_1m, cpu_cores)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    sample.host,
                    to_millis(sample.timestamp),
                    sample.cpu_pct,
                    sample.mem_pct,
                    sample.swap_pct,
                    sample.load_1m,
                    sample.cpu_cores,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn record_zombies(&self, snapshot: ZombieSnapshot) -> Result<()> {
        let parents = serde_json::to_string(&snapshot.parents)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO zombie_snapshots (host, ts, total_procs, zombies, parents)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    snapshot.host,
                    to_millis(snapshot.timestamp),
                    snapshot.total_procs,
                    snapshot.zombies,
                    parents,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn record_disk(&self, disk: DiskObservation) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO disk_health (host, mount, ts, usage_pct, inode_pct, read_only)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    disk.host,
                    disk.mount,
                    to_millis(disk.timestamp),
                    disk.usage_pct,
                    disk.inode_pct,
                    disk.read_only,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn record_smart(&self, observation: SmartObservation) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO smart_health (host, device, ts, health, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    observation.host,
                    observation.device,
                    to_millis(observation.timestamp),
                    smart_health_str(&observation.health),
                    observation.detail,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn record_network(&self, event: NetworkEvent) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO network_events
                 (host, target, method, result, latency_ms, packet_loss_pct, interface, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.host,
                    event.target,
                    event.method,
                    event.result,
                    event.latency_ms,
                    event.packet_loss_pct,
                    event.interface,
                    to_millis(event.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// The full observation is kept as JSON; the columns are for lookup only.
    pub async fn record_pod(&self, pod: PodObservation) -> Result<()> {
        let payload = serde_json::to_string(&pod).context("Failed to encode pod observation")?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO k8s_pod_health (cluster, namespace, pod, ts, phase, problem, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    pod.cluster,
                    pod.namespace,
                    pod.pod,
                    to_millis(pod.timestamp),
                    pod.phase,
                    pod.reported_problem,
                    payload,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn record_cluster(&self, observation: ClusterObservation) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO k8s_cluster_health
                 (cluster, ts, api_reachable, detail, nodes_ready, nodes_total)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    observation.cluster,
                    to_millis(observation.timestamp),
                    observation.api_reachable,
                    observation.detail,
                    observation.nodes_ready,
                    observation.nodes_total,
                ],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ServiceSource for SqliteStore {
    async fn unhealthy_services(&self, since: DateTime<Utc>) -> Result<Vec<ServiceObservation>> {
        let since = to_millis(since);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.host, s.service, s.status, s.recoverable, s.os_platform, s.ts
                 FROM service_status s
                 WHERE s.ts >= ?1
                   AND s.ts = (SELECT MAX(t.ts) FROM service_status t
                               WHERE t.host = s.host AND t.service = s.service)
                 ORDER BY s.ts DESC",
            )?;
            let rows = stmt
                .query_map(params![since], |row| {
                    Ok(ServiceObservation {
                        host: row.get(0)?,
                        service: row.get(1)?,
                        status: ServiceStatus::parse(&row.get::<_, String>(2)?),
                        recoverable: row.get(3)?,
                        os_platform: row.get(4)?,
                        timestamp: from_millis(row.get(5)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows.into_iter().filter(|o| o.status.is_down()).collect())
        })
        .await
    }
}

#[async_trait]
impl ResourceSource for SqliteStore {
    async fn recent_samples(
        &self,
        host: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ResourceSample>> {
        let host = host.to_string();
        let since = to_millis(since);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT host, ts, cpu_pct, mem_pct, swap_pct, load_1m, cpu_cores
                 FROM system_metrics WHERE host = ?1 AND ts >= ?2
                 ORDER BY ts DESC LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![host, since, limit_param(limit)], sample_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn latest_sample(&self, host: &str) -> Result<Option<ResourceSample>> {
        let host = host.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT host, ts, cpu_pct, mem_pct, swap_pct, load_1m, cpu_cores
                 FROM system_metrics WHERE host = ?1 ORDER BY ts DESC LIMIT 1",
            )?;
            let mut rows = stmt.query_map(params![host], sample_from_row)?;
            let latest = rows.next().transpose()?;
            Ok(latest)
        })
        .await
    }

    async fn recent_zombie_snapshots(
        &self,
        host: &str,
        limit: usize,
    ) -> Result<Vec<ZombieSnapshot>> {
        let host = host.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT host, ts, total_procs, zombies, parents
                 FROM zombie_snapshots WHERE host = ?1 ORDER BY ts DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![host, limit_param(limit)], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut snapshots = Vec::with_capacity(rows.len());
            for (host, ts, total_procs, zombies, parents) in rows {
                let parents: Vec<ZombieParent> = serde_json::from_str(&parents)
                    .with_context(|| format!("Invalid zombie parents for {host}"))?;
                snapshots.push(ZombieSnapshot {
                    host,
                    timestamp: from_millis(ts),
                    total_procs,
                    zombies,
                    parents,
                });
            }
            Ok(snapshots)
        })
        .await
    }
}

#[async_trait]
impl DiskSource for SqliteStore {
    async fn latest_disks(&self, host: &str) -> Result<Vec<DiskObservation>> {
        let host = host.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT d.host, d.mount, d.ts, d.usage_pct, d.inode_pct, d.read_only
                 FROM disk_health d
                 WHERE d.host = ?1
                   AND d.ts = (SELECT MAX(e.ts) FROM disk_health e
                               WHERE e.host = d.host AND e.mount = d.mount)
                 ORDER BY d.mount",
            )?;
            let rows = stmt
                .query_map(params![host], disk_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn recent_disks(
        &self,
        host: &str,
        mount: &str,
        limit: usize,
    ) -> Result<Vec<DiskObservation>> {
        let host = host.to_string();
        let mount = mount.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT host, mount, ts, usage_pct, inode_pct, read_only
                 FROM disk_health
                 WHERE host = ?1 AND mount = ?2
                 ORDER BY ts DESC LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![host, mount, limit_param(limit)], disk_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn latest_smart(&self, host: &str) -> Result<Vec<SmartObservation>> {
        let host = host.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.host, s.device, s.ts, s.health, s.detail
                 FROM smart_health s
                 WHERE s.host = ?1
                   AND s.ts = (SELECT MAX(t.ts) FROM smart_health t
                               WHERE t.host = s.host AND t.device = s.device)
                 ORDER BY s.device",
            )?;
            let rows = stmt
                .query_map(params![host], |row| {
                    Ok(SmartObservation {
                        host: row.get(0)?,
                        device: row.get(1)?,
                        timestamp: from_millis(row.get(2)?),
                        health: parse_smart_health(&row.get::<_, String>(3)?),
                        detail: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl NetworkSource for SqliteStore {
    async fn recent_events(&self, host: &str, since: DateTime<Utc>) -> Result<Vec<NetworkEvent>> {
        let host = host.to_string();
        let since = to_millis(since);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT host, target, method, result, latency_ms, packet_loss_pct, interface, ts
                 FROM network_events WHERE host = ?1 AND ts >= ?2 ORDER BY ts DESC",
            )?;
            let rows = stmt
                .query_map(params![host, since], |row| {
                    Ok(NetworkEvent {
                        host: row.get(0)?,
                        target: row.get(1)?,
                        method: row.get(2)?,
                        result: row.get(3)?,
                        latency_ms: row.get(4)?,
                        packet_loss_pct: row.get(5)?,
                        interface: row.get(6)?,
                        timestamp: from_millis(row.get(7)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl PodSource for SqliteStore {
    /// Latest row per pod unless the collector marked it healthy.
    async fn unhealthy_pods(
        &self,
        cluster: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PodObservation>> {
        let cluster = cluster.to_string();
        let since = to_millis(since);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT p.payload
                 FROM k8s_pod_health p
                 WHERE p.cluster = ?1 AND p.ts >= ?2
                   AND (p.problem IS NULL OR p.problem <> 'Healthy')
                   AND p.ts = (SELECT MAX(q.ts) FROM k8s_pod_health q
                               WHERE q.cluster = p.cluster AND q.namespace = p.namespace
                                 AND q.pod = p.pod)
                 ORDER BY p.ts DESC",
            )?;
            let payloads = stmt
                .query_map(params![cluster, since], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut pods = Vec::with_capacity(payloads.len());
            for payload in payloads {
                match serde_json::from_str::<PodObservation>(&payload) {
                    Ok(pod) => pods.push(pod),
                    Err(e) => tracing::warn!("Skipping unreadable pod row: {}", e),
                }
            }
            Ok(pods)
        })
        .await
    }
}

#[async_trait]
impl ClusterSource for SqliteStore {
    async fn latest_cluster(&self, cluster: &str) -> Result<Option<ClusterObservation>> {
        let cluster = cluster.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT cluster, ts, api_reachable, detail, nodes_ready, nodes_total
                 FROM k8s_cluster_health WHERE cluster = ?1 ORDER BY ts DESC LIMIT 1",
            )?;
            let mut rows = stmt.query_map(params![cluster], |row| {
                Ok(ClusterObservation {
                    cluster: row.get(0)?,
                    timestamp: from_millis(row.get(1)?),
                    api_reachable: row.get(2)?,
                    detail: row.get(3)?,
                    nodes_ready: row.get(4)?,
                    nodes_total: row.get(5)?,
                })
            })?;
            let latest = rows.next().transpose()?;
            Ok(latest)
        })
        .await
    }
}
