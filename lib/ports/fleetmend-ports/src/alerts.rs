use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use fleetmend_domain::{Alert, ProblemKind};

#[async_trait]
pub trait AlertPort: Send + Sync {
    async fn raise(&self, alert: Alert) -> Result<()>;

    async fn last_raised(&self, entity_key: &str, kind: &ProblemKind)
    -> Result<Option<DateTime<Utc>>>;
}
