use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::Client;
use kube::api::{Api, DeleteParams};

use fleetmend_ports::{ActuatorReport, PodActuator};

use crate::client::connect;

/// Deletes pods through the API server so their controller recreates them.
#[derive(Clone)]
pub struct KubePodActuator {
    client: Client,
}

impl KubePodActuator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn connect(context: Option<&str>) -> Result<Self> {
        Ok(Self::new(connect(context).await?))
    }
}

#[async_trait]
impl PodActuator for KubePodActuator {
    async fn delete_pod(&self, namespace: &str, pod: &str) -> Result<ActuatorReport> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            grace_period_seconds: Some(0),
            ..DeleteParams::default()
        };
        Ok(match pods.delete(pod, &params).await {
            Ok(_) => ActuatorReport::ok(format!("deleted pod {namespace}/{pod}")),
            Err(e) => ActuatorReport::failed(format!("delete {namespace}/{pod} failed: {e}")),
        })
    }
}
