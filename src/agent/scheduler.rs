use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::{Instant, sleep_until};

use fleetmend_application::{Sweep, SweepReport};
use fleetmend_domain::ActionResult;

#[derive(Clone)]
pub struct ScheduledSweep {
    sweep: Arc<dyn Sweep>,
    interval: Duration,
}

impl ScheduledSweep {
    pub fn new(sweep: Arc<dyn Sweep>, interval: Duration) -> Self {
        Self { sweep, interval }
    }

    pub fn name(&self) -> &'static str {
        self.sweep.name()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// `interval` moved by a uniform offset in `[-jitter, +jitter]`, never below
/// one second.
pub fn jittered(interval: Duration, jitter: Duration, rng: &mut impl Rng) -> Duration {
    let floor = Duration::from_secs(1);
    if jitter.is_zero() {
        return interval.max(floor);
    }
    let spread = i64::try_from(jitter.as_millis()).unwrap_or(i64::MAX);
    let offset = rng.random_range(-spread..=spread);
    let base = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
    let millis = base.saturating_add(offset).max(0);
    Duration::from_millis(u64::try_from(millis).unwrap_or(0)).max(floor)
}

/// Runs every sweep on its own cadence from a single task. Sweeps never
/// overlap and a failing sweep is logged and rescheduled.
pub struct Scheduler {
    sweeps: Vec<ScheduledSweep>,
    jitter: Duration,
    stagger: Duration,
}

impl Scheduler {
    pub fn new(sweeps: Vec<ScheduledSweep>, jitter: Duration, stagger: Duration) -> Self {
        Self {
            sweeps,
            jitter,
            stagger,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sweeps.iter().map(ScheduledSweep::name).collect()
    }

    /// One pass over every sweep, in order.
    pub async fn run_once(&self) -> Vec<(&'static str, Option<SweepReport>)> {
        let mut results = Vec::with_capacity(self.sweeps.len());
        for scheduled in &self.sweeps {
            results.push((scheduled.name(), run_logged(scheduled).await));
        }
        results
    }

    /// Sweeps until `shutdown` resolves. Shutdown is observed between sweeps;
    /// a sweep in flight always finishes.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if self.sweeps.is_empty() {
            tracing::warn!("No sweeps selected");
            return;
        }
        tokio::pin!(shutdown);

        let start = Instant::now();
        let mut due: Vec<Instant> = (0..self.sweeps.len())
            .map(|i| start + self.stagger * u32::try_from(i).unwrap_or(u32::MAX))
            .collect();

        loop {
            let (next, at) = due
                .iter()
                .copied()
                .enumerate()
                .min_by_key(|(_, at)| *at)
                .unwrap_or((0, start));

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, scheduler stopping");
                    return;
                }
                _ = sleep_until(at) => {}
            }

            let scheduled = &self.sweeps[next];
            run_logged(scheduled).await;
            let wait = jittered(scheduled.interval, self.jitter, &mut rand::rng());
            due[next] = Instant::now() + wait;
        }
    }
}

async fn run_logged(scheduled: &ScheduledSweep) -> Option<SweepReport> {
    let name = scheduled.name();
    match scheduled.sweep.run().await {
        Ok(report) => {
            tracing::info!(
                sweep = name,
                examined = report.examined,
                success = report.count(ActionResult::Success),
                fail = report.count(ActionResult::Fail),
                skipped = report.count(ActionResult::Skipped),
                dry_run = report.count(ActionResult::DryRunNoop),
                queued = report.count(ActionResult::Queued),
                "sweep finished"
            );
            Some(report)
        }
        Err(e) => {
            tracing::error!(sweep = name, "Sweep failed: {:#}", e);
            None
        }
    }
}
