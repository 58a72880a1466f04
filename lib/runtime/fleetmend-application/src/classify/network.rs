use fleetmend_domain::{
    Action, Decision, NetworkConfig, NetworkEvent, Observation, ProblemKind, Severity,
};

const FIREWALL_HINTS: [&str; 9] = [
    "connection refused",
    "blocked by firewall",
    "administratively prohibited",
    "destination host prohibited",
    "destination net unreachable",
    "no route to host",
    "request timed out",
    "timed out after",
    "filtered",
];

const DNS_FAILURE_HINTS: [&str; 6] = [
    "non-existent domain",
    "can't find",
    "unknown",
    "server failed",
    "no response from server",
    "timed out",
];

fn is_firewall_block(event: &NetworkEvent, result: &str) -> bool {
    !event.result.is_empty() && FIREWALL_HINTS.iter().any(|hint| result.contains(hint))
}

fn is_dns_failure(event: &NetworkEvent, result: &str) -> bool {
    event.method == "nslookup" && DNS_FAILURE_HINTS.iter().any(|hint| result.contains(hint))
}

fn is_total_loss(event: &NetworkEvent, result: &str) -> bool {
    if event.method == "ping" && event.packet_loss_pct.is_some_and(|loss| loss >= 100.0) {
        return true;
    }
    matches!(event.method.as_str(), "ping" | "traceroute") && result.contains("timed out")
}

/// Every matching problem, highest priority first: firewall block, DNS
/// failure, total packet loss, latency spike.
pub fn network_decisions(event: &NetworkEvent, config: &NetworkConfig) -> Vec<Decision> {
    let result = event.result.to_lowercase();
    let mut matches = Vec::new();
    if is_firewall_block(event, &result) {
        matches.push((
            ProblemKind::FirewallBlock,
            Severity::Warning,
            Action::AutoFix,
            format!("{} to {} looks blocked: {}", event.method, event.target, event.result),
        ));
    }
    if is_dns_failure(event, &result) {
        matches.push((
            ProblemKind::DnsFailure,
            Severity::Warning,
            Action::AutoFix,
            format!("DNS lookup for {} failed: {}", event.target, event.result),
        ));
    }
    if is_total_loss(event, &result) {
        matches.push((
            ProblemKind::PacketLoss,
            Severity::Critical,
            Action::AutoFix,
            format!("100% packet loss to {}", event.target),
        ));
    }
    if let Some(latency) = event
        .latency_ms
        .filter(|latency| *latency > config.latency_threshold_ms)
    {
        matches.push((
            ProblemKind::LatencySpike,
            Severity::Critical,
            Action::AlertOnly,
            format!(
                "latency to {} is {latency:.0}ms (threshold {:.0}ms)",
                event.target, config.latency_threshold_ms
            ),
        ));
    }

    matches
        .into_iter()
        .map(|(kind, severity, action, detail)| {
            Decision::new(
                format!("{}/{}", event.host, event.target),
                severity,
                action,
                kind,
                detail,
                Observation::Network(event.clone()),
            )
        })
        .collect()
}

/// The highest-priority problem only.
pub fn classify_network_event(event: &NetworkEvent, config: &NetworkConfig) -> Option<Decision> {
    network_decisions(event, config).into_iter().next()
}
