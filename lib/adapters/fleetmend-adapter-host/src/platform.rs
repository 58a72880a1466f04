use std::sync::Arc;

use fleetmend_ports::{
    DiskActuator, NetworkActuator, NetworkProbe, ProcessActuator, ServiceActuator,
};

use crate::command::CommandRunner;
use crate::linux::LinuxHost;
use crate::windows::WindowsHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Linux,
    Windows,
}

impl HostPlatform {
    /// Anything that is not Windows is driven through the Linux toolset.
    pub fn detect() -> Self {
        if cfg!(windows) {
            HostPlatform::Windows
        } else {
            HostPlatform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostPlatform::Linux => "linux",
            HostPlatform::Windows => "windows",
        }
    }

    /// Load averages and zombie counts only exist on unix hosts.
    pub fn has_unix_metrics(&self) -> bool {
        matches!(self, HostPlatform::Linux)
    }

    pub fn actuators(&self, runner: CommandRunner) -> HostActuators {
        match self {
            HostPlatform::Linux => HostActuators::from_host(Arc::new(LinuxHost::new(runner))),
            HostPlatform::Windows => HostActuators::from_host(Arc::new(WindowsHost::new(runner))),
        }
    }
}

/// One host implementation viewed through each actuator port.
#[derive(Clone)]
pub struct HostActuators {
    pub services: Arc<dyn ServiceActuator>,
    pub processes: Arc<dyn ProcessActuator>,
    pub disks: Arc<dyn DiskActuator>,
    pub network: Arc<dyn NetworkActuator>,
    pub probe: Arc<dyn NetworkProbe>,
}

impl HostActuators {
    fn from_host<H>(host: Arc<H>) -> Self
    where
        H: ServiceActuator
            + ProcessActuator
            + DiskActuator
            + NetworkActuator
            + NetworkProbe
            + 'static,
    {
        Self {
            services: host.clone(),
            processes: host.clone(),
            disks: host.clone(),
            network: host.clone(),
            probe: host,
        }
    }
}

/// Local host name, or `localhost` when it cannot be read.
pub fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!("Failed to read host name: {}", e);
            "localhost".to_string()
        }
    }
}
