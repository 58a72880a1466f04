//! Linux and Windows host actuators driven through shell commands.

pub mod command;
pub mod error;
pub mod linux;
pub mod parse;
pub mod platform;
pub mod windows;

pub use command::{CommandOutput, CommandRunner};
pub use error::ActuatorError;
pub use linux::LinuxHost;
pub use platform::{HostActuators, HostPlatform, local_hostname};
pub use windows::WindowsHost;

#[cfg(test)]
mod command_test;
#[cfg(test)]
mod parse_test;
