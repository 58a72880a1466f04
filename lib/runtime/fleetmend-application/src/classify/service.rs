use fleetmend_domain::{
    Action, Decision, Observation, ProblemKind, ServiceObservation, ServiceRecoveryConfig,
    Severity,
};

/// Why a down service is left alone, if it is.
pub fn service_ignore_reason(
    observation: &ServiceObservation,
    config: &ServiceRecoveryConfig,
) -> Option<&'static str> {
    if !observation.recoverable {
        Some("not recoverable")
    } else if !config.is_approved(&observation.host, &observation.service) {
        Some("not approved for restart")
    } else {
        None
    }
}

pub fn classify_service(
    observation: &ServiceObservation,
    config: &ServiceRecoveryConfig,
) -> Option<Decision> {
    if !observation.status.is_down() || service_ignore_reason(observation, config).is_some() {
        return None;
    }
    Some(Decision::new(
        format!("{}/{}", observation.host, observation.service),
        Severity::Warning,
        Action::AutoFix,
        ProblemKind::ServiceDown,
        format!(
            "service {} on {} is {}",
            observation.service,
            observation.host,
            observation.status.as_str()
        ),
        Observation::Service(observation.clone()),
    ))
}
