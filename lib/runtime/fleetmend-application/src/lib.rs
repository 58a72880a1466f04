//! Classification, guardrails and remediation sweeps.

pub mod classify;
pub mod clock;
pub mod guardrail;
pub mod remediator;
pub mod sweep;
pub mod verify;

pub use clock::SystemClock;
pub use guardrail::{CapScope, DenyReason, GuardrailLoader, LedgerFacts, Verdict, evaluate};
pub use remediator::{Outcome, Remediation, Remediator};
pub use sweep::{
    ClusterSweep, DiskSweep, MetricsSweep, NetworkSweep, PodSweep, ServiceSweep,
    SourceUnavailable, Sweep, SweepContext, SweepReport,
};
pub use verify::{PostCheck, verify_probe, verify_resource};

#[cfg(test)]
mod fakes;
#[cfg(test)]
mod guardrail_test;
#[cfg(test)]
mod remediator_test;
