//! Kubernetes API adapters.

mod client;
mod cluster;
mod pod;

pub use client::connect;
pub use cluster::KubeApiProbe;
pub use pod::KubePodActuator;
