use anyhow::{Context, Result};
use kube::config::KubeConfigOptions;
use kube::{Client, Config};

/// Builds a client for `context`, or for the inferred environment when no
/// context is configured (in-cluster service account, then `~/.kube/config`).
pub async fn connect(context: Option<&str>) -> Result<Client> {
    let config = match context {
        Some(context) => {
            let options = KubeConfigOptions {
                context: Some(context.to_string()),
                ..KubeConfigOptions::default()
            };
            Config::from_kubeconfig(&options)
                .await
                .with_context(|| format!("failed to load kubeconfig context {context}"))?
        }
        None => Config::infer()
            .await
            .context("failed to infer kubernetes config")?,
    };
    Client::try_from(config).context("failed to build kubernetes client")
}
