mod scheduler;
mod wiring;

pub use scheduler::{ScheduledSweep, Scheduler, jittered};
pub use wiring::{Agent, AgentOptions, SWEEP_NAMES};

#[cfg(test)]
mod scheduler_test;
