use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use fleetmend_domain::{
    ActionResult, Alert, CountFilter, Domain, LedgerEntry, LedgerScope, ProblemKind,
};
use fleetmend_ports::{AlertPort, LedgerPort};

use crate::store::{SqliteStore, from_millis, to_millis};

impl SqliteStore {
    /// Entries for one entity, oldest first.
    pub async fn ledger_entries(&self, entity_key: &str) -> Result<Vec<LedgerEntry>> {
        let entity_key = entity_key.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT entity_key, domain, kind, ts, result, message, error_message
                 FROM remediation_ledger WHERE entity_key = ?1 ORDER BY ts ASC",
            )?;
            let rows = stmt.query_map(params![entity_key], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (key, domain, kind, ts, result, message, error_message) = row?;
                let parsed = (Domain::parse(&domain), ActionResult::parse(&result));
                let (Some(domain), Some(result)) = parsed else {
                    tracing::warn!(entity = %key, "Skipping unreadable ledger row");
                    continue;
                };
                entries.push(LedgerEntry {
                    entity_key: key,
                    domain,
                    kind: ProblemKind::parse(&kind),
                    timestamp: from_millis(ts),
                    result,
                    message,
                    error_message,
                });
            }
            Ok(entries)
        })
        .await
    }

    pub async fn alerts_for(&self, entity_key: &str) -> Result<Vec<(String, String)>> {
        let entity_key = entity_key.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT severity, message FROM alerts WHERE entity_key = ?1 ORDER BY raised_at ASC",
            )?;
            let rows = stmt
                .query_map(params![entity_key], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl LedgerPort for SqliteStore {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO remediation_ledger
                 (id, entity_key, domain, kind, ts, result, message, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    Uuid::new_v4().to_string(),
                    entry.entity_key,
                    entry.domain.as_str(),
                    entry.kind.as_str(),
                    to_millis(entry.timestamp),
                    entry.result.as_str(),
                    entry.message,
                    entry.error_message,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn last_action_time(&self, entity_key: &str) -> Result<Option<DateTime<Utc>>> {
        let entity_key = entity_key.to_string();
        self.with_conn(move |conn| {
            let ts: Option<i64> = conn.query_row(
                "SELECT MAX(ts) FROM remediation_ledger
                 WHERE entity_key = ?1 AND result <> ?2",
                params![entity_key, ActionResult::Skipped.as_str()],
                |row| row.get(0),
            )?;
            Ok(ts.map(from_millis))
        })
        .await
    }

    async fn count(
        &self,
        scope: &LedgerScope,
        filter: CountFilter,
        since: DateTime<Utc>,
    ) -> Result<u32> {
        let (column, value) = match scope {
            LedgerScope::Entity(key) => ("entity_key", key.clone()),
            LedgerScope::Domain(domain) => ("domain", domain.as_str().to_string()),
        };
        let (operator, result) = match filter {
            CountFilter::Failures => ("=", ActionResult::Fail),
            CountFilter::Attempts => ("<>", ActionResult::Skipped),
        };
        let sql = format!(
            "SELECT COUNT(*) FROM remediation_ledger
             WHERE {column} = ?1 AND ts >= ?2 AND result {operator} ?3"
        );
        let since = to_millis(since);
        self.with_conn(move |conn| {
            let count: i64 =
                conn.query_row(&sql, params![value, since, result.as_str()], |row| row.get(0))?;
            Ok(u32::try_from(count).unwrap_or(u32::MAX))
        })
        .await
    }
}

#[async_trait]
impl AlertPort for SqliteStore {
    async fn raise(&self, alert: Alert) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO alerts (id, entity_key, kind, severity, source, message, raised_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    Uuid::new_v4().to_string(),
                    alert.entity_key,
                    alert.kind.as_str(),
                    alert.severity.as_str(),
                    alert.source.as_str(),
                    alert.message,
                    to_millis(alert.raised_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn last_raised(
        &self,
        entity_key: &str,
        kind: &ProblemKind,
    ) -> Result<Option<DateTime<Utc>>> {
        let entity_key = entity_key.to_string();
        let kind = kind.as_str().to_string();
        self.with_conn(move |conn| {
            let ts: Option<i64> = conn.query_row(
                "SELECT MAX(raised_at) FROM alerts WHERE entity_key = ?1 AND kind = ?2",
                params![entity_key, kind],
                |row| row.get(0),
            )?;
            Ok(ts.map(from_millis))
        })
        .await
    }
}
