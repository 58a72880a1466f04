use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};

use fleetmend_domain::ClusterObservation;
use fleetmend_ports::ClusterSource;

use crate::client::connect;

/// Probes the API server live instead of reading collector rows. Any failure
/// to reach it, including a broken kubeconfig, reads as unreachable.
#[derive(Debug, Clone)]
pub struct KubeApiProbe {
    cluster: String,
    context: Option<String>,
    timeout: Duration,
}

impl KubeApiProbe {
    pub fn new(cluster: impl Into<String>, context: Option<String>, timeout: Duration) -> Self {
        Self {
            cluster: cluster.into(),
            context,
            timeout,
        }
    }

    async fn probe(&self) -> Result<(u32, u32)> {
        let client = connect(self.context.as_deref()).await?;
        client.apiserver_version().await?;

        let nodes: Api<Node> = Api::all(client);
        let list = nodes.list(&ListParams::default()).await?;
        let total = list.items.len();
        let ready = list.items.iter().filter(|node| node_ready(node)).count();
        Ok((
            u32::try_from(ready).unwrap_or(u32::MAX),
            u32::try_from(total).unwrap_or(u32::MAX),
        ))
    }
}

fn node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

#[async_trait]
impl ClusterSource for KubeApiProbe {
    async fn latest_cluster(&self, cluster: &str) -> Result<Option<ClusterObservation>> {
        if cluster != self.cluster {
            return Ok(None);
        }
        let outcome = tokio::time::timeout(self.timeout, self.probe()).await;
        let (api_reachable, detail, nodes_ready, nodes_total) = match outcome {
            Ok(Ok((ready, total))) => (true, None, Some(ready), Some(total)),
            Ok(Err(e)) => (false, Some(format!("{e:#}")), None, None),
            Err(_) => (
                false,
                Some(format!("no answer within {}s", self.timeout.as_secs())),
                None,
                None,
            ),
        };
        if !api_reachable {
            tracing::warn!(cluster = %self.cluster, "Kubernetes API unreachable");
        }
        Ok(Some(ClusterObservation {
            cluster: self.cluster.clone(),
            timestamp: Utc::now(),
            api_reachable,
            detail,
            nodes_ready,
            nodes_total,
        }))
    }
}
