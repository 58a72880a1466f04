use fleetmend_domain::{
    Action, Decision, Observation, PodConfig, PodObservation, ProblemKind, Severity,
};

fn container_signal(pod: &PodObservation) -> Option<(ProblemKind, String)> {
    let oom = pod.containers.iter().find(|c| {
        c.terminated_reason.as_deref() == Some("OOMKilled")
            || c.last_terminated_reason.as_deref() == Some("OOMKilled")
    });
    if let Some(container) = oom {
        return Some((
            ProblemKind::OomKilled,
            format!("container {} terminated due to OOMKilled", container.name),
        ));
    }

    let waiting = |reason: &str| {
        pod.containers
            .iter()
            .find(|c| c.waiting_reason.as_deref() == Some(reason))
    };
    if let Some(container) = waiting("CrashLoopBackOff") {
        return Some((
            ProblemKind::CrashLoopBackOff,
            format!(
                "container {} in CrashLoopBackOff ({} restarts)",
                container.name, container.restart_count
            ),
        ));
    }
    for (reason, kind) in [
        ("ImagePullBackOff", ProblemKind::ImagePullBackOff),
        ("ErrImagePull", ProblemKind::ErrImagePull),
    ] {
        if let Some(container) = waiting(reason) {
            return Some((kind, format!("container {} waiting: {reason}", container.name)));
        }
    }
    None
}

fn pod_signal(pod: &PodObservation, config: &PodConfig) -> Option<(ProblemKind, String)> {
    let pending = pod.phase.trim() == "Pending";

    if pending {
        if let Some(age) = pod.pending_seconds.filter(|age| *age >= config.long_pending_seconds) {
            return Some((
                ProblemKind::LongPending,
                format!(
                    "pod pending for {age}s (threshold={}s)",
                    config.long_pending_seconds
                ),
            ));
        }
    }

    let probe = pod.conditions.iter().find(|c| {
        matches!(c.kind.as_str(), "Ready" | "ContainersReady")
            && c.status == "False"
            && format!(
                "{} {}",
                c.reason.as_deref().unwrap_or_default(),
                c.message.as_deref().unwrap_or_default()
            )
            .to_lowercase()
            .contains("probe")
    });
    if let Some(condition) = probe {
        return Some((
            ProblemKind::ProbeFailure,
            condition
                .message
                .clone()
                .unwrap_or_else(|| "pod failing health probes".to_string()),
        ));
    }

    if let Some(age) = pod
        .terminating_seconds
        .filter(|age| *age >= config.stuck_terminating_seconds)
    {
        return Some((
            ProblemKind::StuckTerminating,
            format!(
                "pod terminating for {age}s (threshold={}s)",
                config.stuck_terminating_seconds
            ),
        ));
    }

    if pending {
        let unschedulable = pod.conditions.iter().find(|c| {
            c.kind == "PodScheduled"
                && c.status == "False"
                && c.reason.as_deref() == Some("Unschedulable")
        });
        if let Some(condition) = unschedulable {
            return Some((
                ProblemKind::Unschedulable,
                condition
                    .message
                    .clone()
                    .unwrap_or_else(|| "pod unschedulable".to_string()),
            ));
        }
    }

    if pod.reason.as_deref() == Some("Evicted") {
        return Some((
            ProblemKind::Evicted,
            pod.message
                .clone()
                .unwrap_or_else(|| "pod evicted by Kubernetes".to_string()),
        ));
    }
    None
}

/// Highest-priority problem wins:
/// OOMKilled > CrashLoopBackOff > image pull > LongPending > ProbeFailure >
/// StuckTerminating > Unschedulable > Evicted.
pub fn classify_pod(pod: &PodObservation, config: &PodConfig) -> Option<Decision> {
    let detected = container_signal(pod).or_else(|| pod_signal(pod, config));

    let (kind, detail, severity, action) = match detected {
        Some((kind, detail)) => {
            let severity = match kind {
                ProblemKind::OomKilled | ProblemKind::CrashLoopBackOff => Severity::Critical,
                _ => Severity::Warning,
            };
            let action = if kind == ProblemKind::CrashLoopBackOff {
                Action::AutoFix
            } else {
                Action::AlertOnly
            };
            (kind, detail, severity, action)
        }
        None => {
            // Reported by the collector but not backed by any status signal.
            let reported = pod.reported_problem.as_deref().map(str::trim).unwrap_or("");
            if reported.is_empty() || reported == "Healthy" {
                return None;
            }
            let detail = pod
                .message
                .clone()
                .unwrap_or_else(|| format!("collector reported {reported}"));
            (
                ProblemKind::parse(reported),
                detail,
                Severity::Warning,
                Action::AlertOnly,
            )
        }
    };

    Some(Decision::new(
        format!("k8s://{}/{}/{}", pod.cluster, pod.namespace, pod.pod),
        severity,
        action,
        kind.clone(),
        format!("pod {}/{} {kind}: {detail}", pod.namespace, pod.pod),
        Observation::Pod(pod.clone()),
    ))
}
