//! Fleet health agent: wires storage, host and cluster adapters into the
//! remediation sweeps and runs them on a schedule.

pub mod agent;

pub use agent::{Agent, AgentOptions, ScheduledSweep, Scheduler};
