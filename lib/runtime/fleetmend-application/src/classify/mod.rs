//! Pure, deterministic classifiers. No I/O happens here.

mod cluster;
mod disk;
mod metrics;
mod network;
mod pods;
mod service;

pub use cluster::classify_cluster;
pub use disk::{
    classify_disk_usage, classify_inodes, classify_read_only, classify_smart, disk_entity_key,
};
pub use metrics::{classify_cpu, classify_load, classify_memory, classify_zombies, zombie_level};
pub use network::{classify_network_event, network_decisions};
pub use pods::classify_pod;
pub use service::{classify_service, service_ignore_reason};

/// True when exactly the first `need` rows (newest first) all pass `check`.
/// A missing value inside that window never counts as a pass.
fn sustained<T>(rows: &[T], need: usize, check: impl Fn(&T) -> Option<bool>) -> bool {
    let need = need.max(1);
    rows.len() >= need && rows[..need].iter().all(|row| check(row) == Some(true))
}
