use fleetmend_domain::{
    Action, ClusterObservation, Decision, Observation, ProblemKind, Severity,
};

pub fn classify_cluster(observation: &ClusterObservation) -> Option<Decision> {
    if observation.api_reachable {
        return None;
    }
    let detail = observation
        .detail
        .as_deref()
        .unwrap_or("no response from API server");
    Some(Decision::new(
        format!("k8s://{}", observation.cluster),
        Severity::Critical,
        Action::AlertOnly,
        ProblemKind::ApiDown,
        format!("Kubernetes API for cluster {} unreachable: {detail}", observation.cluster),
        Observation::Cluster(observation.clone()),
    ))
}
