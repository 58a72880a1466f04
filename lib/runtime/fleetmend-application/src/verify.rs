//! Best-effort checks after a fix. They decide alert severity only.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;

use fleetmend_domain::{ResourceSample, Severity};
use fleetmend_ports::{Clock, ResourceSource};

#[derive(Debug, Clone, PartialEq)]
pub struct PostCheck {
    pub severity: Severity,
    pub message: String,
}

/// Waits `delay`, resamples, and compares the metric with its warn level.
pub async fn verify_resource(
    clock: &dyn Clock,
    source: &dyn ResourceSource,
    host: &str,
    delay: Duration,
    metric: &str,
    value: fn(&ResourceSample) -> Option<f64>,
    warn: f64,
) -> PostCheck {
    clock.sleep(delay).await;
    let current = match source.latest_sample(host).await {
        Ok(sample) => sample.as_ref().and_then(value),
        Err(e) => {
            tracing::warn!(host = %host, "post-check sample failed: {:#}", e);
            None
        }
    };
    match current {
        Some(v) if v < warn => PostCheck {
            severity: Severity::Warning,
            message: format!("{metric} mitigated, now {v:.1}%"),
        },
        Some(v) => PostCheck {
            severity: Severity::Critical,
            message: format!("{metric} persists at {v:.1}%, manual intervention needed"),
        },
        None => PostCheck {
            severity: Severity::Critical,
            message: format!("{metric} post-check missing"),
        },
    }
}

/// Waits `delay`, then runs `probe`. A probe error counts as still broken.
pub async fn verify_probe<F, Fut>(
    clock: &dyn Clock,
    delay: Duration,
    what: &str,
    probe: F,
) -> PostCheck
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    clock.sleep(delay).await;
    match probe().await {
        Ok(true) => PostCheck {
            severity: Severity::Warning,
            message: format!("{what} restored"),
        },
        Ok(false) => PostCheck {
            severity: Severity::Critical,
            message: format!("{what} still failing"),
        },
        Err(e) => PostCheck {
            severity: Severity::Critical,
            message: format!("{what} post-check failed: {e:#}"),
        },
    }
}
