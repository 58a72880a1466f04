//! Read-only views over collector output.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use fleetmend_domain::{
    ClusterObservation, DiskObservation, NetworkEvent, PodObservation, ResourceSample,
    ServiceObservation, SmartObservation, ZombieSnapshot,
};

#[async_trait]
pub trait ServiceSource: Send + Sync {
    /// Latest status per (host, service) observed since `since`, stopped or failed only.
    async fn unhealthy_services(&self, since: DateTime<Utc>) -> Result<Vec<ServiceObservation>>;
}

#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Newest first, at most `limit` rows.
    async fn recent_samples(
        &self,
        host: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ResourceSample>>;

    async fn latest_sample(&self, host: &str) -> Result<Option<ResourceSample>>;

    /// Newest first, at most `limit` rows.
    async fn recent_zombie_snapshots(&self, host: &str, limit: usize)
    -> Result<Vec<ZombieSnapshot>>;
}

#[async_trait]
pub trait DiskSource: Send + Sync {
    /// Latest reading per mount.
    async fn latest_disks(&self, host: &str) -> Result<Vec<DiskObservation>>;

    /// Newest first, at most `limit` rows for one mount.
    async fn recent_disks(
        &self,
        host: &str,
        mount: &str,
        limit: usize,
    ) -> Result<Vec<DiskObservation>>;

    async fn latest_smart(&self, host: &str) -> Result<Vec<SmartObservation>>;
}

#[async_trait]
pub trait NetworkSource: Send + Sync {
    /// Newest first.
    async fn recent_events(&self, host: &str, since: DateTime<Utc>) -> Result<Vec<NetworkEvent>>;
}

#[async_trait]
pub trait PodSource: Send + Sync {
    async fn unhealthy_pods(
        &self,
        cluster: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PodObservation>>;
}

#[async_trait]
pub trait ClusterSource: Send + Sync {
    async fn latest_cluster(&self, cluster: &str) -> Result<Option<ClusterObservation>>;
}
