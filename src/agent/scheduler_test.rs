use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;

use fleetmend_application::{Sweep, SweepReport};

use crate::agent::{ScheduledSweep, Scheduler, jittered};

struct CountingSweep {
    name: &'static str,
    runs: AtomicUsize,
    fail: bool,
}

impl CountingSweep {
    fn new(name: &'static str, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            runs: AtomicUsize::new(0),
            fail,
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sweep for CountingSweep {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self) -> Result<SweepReport> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("source unavailable");
        }
        Ok(SweepReport::default())
    }
}

#[test]
fn jitter_stays_within_bounds() {
    let mut rng = StdRng::seed_from_u64(7);
    let interval = Duration::from_secs(60);
    let jitter = Duration::from_secs(5);
    for _ in 0..200 {
        let wait = jittered(interval, jitter, &mut rng);
        assert!(wait >= Duration::from_secs(55));
        assert!(wait <= Duration::from_secs(65));
    }
    assert_eq!(
        jittered(Duration::ZERO, Duration::ZERO, &mut rng),
        Duration::from_secs(1)
    );
}

#[tokio::test]
async fn run_once_visits_every_sweep_and_survives_failures() {
    let broken = CountingSweep::new("service", true);
    let healthy = CountingSweep::new("disk", false);
    let scheduler = Scheduler::new(
        vec![
            ScheduledSweep::new(broken.clone(), Duration::from_secs(60)),
            ScheduledSweep::new(healthy.clone(), Duration::from_secs(300)),
        ],
        Duration::ZERO,
        Duration::ZERO,
    );

    let results = scheduler.run_once().await;
    assert_eq!(scheduler.names(), vec!["service", "disk"]);
    assert!(results[0].1.is_none());
    assert!(results[1].1.is_some());
    assert_eq!(broken.runs(), 1);
    assert_eq!(healthy.runs(), 1);
}

#[tokio::test(start_paused = true)]
async fn sweeps_follow_their_own_cadence_until_shutdown() {
    let fast = CountingSweep::new("service", false);
    let slow = CountingSweep::new("disk", true);
    let scheduler = Scheduler::new(
        vec![
            ScheduledSweep::new(fast.clone(), Duration::from_secs(60)),
            ScheduledSweep::new(slow.clone(), Duration::from_secs(300)),
        ],
        Duration::ZERO,
        Duration::from_secs(2),
    );

    scheduler
        .run_until(tokio::time::sleep(Duration::from_secs(250)))
        .await;

    // service at 0, 60, 120, 180, 240; disk once at 2
    assert_eq!(fast.runs(), 5);
    assert_eq!(slow.runs(), 1);
}
