use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use fleetmend_domain::{CountFilter, LedgerEntry, LedgerScope};

/// Append-only remediation history.
#[async_trait]
pub trait LedgerPort: Send + Sync {
    async fn append(&self, entry: LedgerEntry) -> Result<()>;

    /// Latest attempt on `entity_key`. Skipped entries do not count.
    async fn last_action_time(&self, entity_key: &str) -> Result<Option<DateTime<Utc>>>;

    async fn count(
        &self,
        scope: &LedgerScope,
        filter: CountFilter,
        since: DateTime<Utc>,
    ) -> Result<u32>;
}
