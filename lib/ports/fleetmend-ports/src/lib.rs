//! Port traits between the remediation core and its collaborators.

pub mod actuators;
pub mod alerts;
pub mod clock;
pub mod ledger;
pub mod sources;

pub use actuators::{
    ActuatorReport, DiskActuator, InterfaceInfo, NetworkActuator, NetworkProbe, NullPodActuator,
    PodActuator, ProcessActuator, ProcessInfo, ProcessSort, ServiceActuator,
};
pub use alerts::AlertPort;
pub use clock::Clock;
pub use ledger::LedgerPort;
pub use sources::{
    ClusterSource, DiskSource, NetworkSource, PodSource, ResourceSource, ServiceSource,
};
