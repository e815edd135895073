/*
Platform-specific detection and startup of the broker OS service.

The coordinator only sees the ServiceController trait; one implementation
exists per supported platform and is picked at runtime, so the detection
logic stays testable from any host.
*/
use std::io;

use crate::error::{BootstrapError, ProbeError, StartError};

mod linux;
mod windows;

pub use linux::LinuxServiceController;
pub use windows::WindowsServiceController;

/// Transient classification of the broker service, derived by probing the
/// OS. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Unknown,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The service manager accepted the start request.
    Started,
    /// The service was already up; starting it was a no-op.
    AlreadyRunning,
}

pub trait ServiceController: Send + Sync {
    fn service_name(&self) -> &str;

    /// Whether the broker service is currently up. Blocking; invokes
    /// external OS commands.
    fn is_alive(&self) -> Result<bool, ProbeError>;

    /// Asks the OS to start the broker service. Blocking.
    fn start(&self) -> Result<StartOutcome, StartError>;
}

/// Picks the controller for the OS this process runs on.
pub fn platform_controller(service: &str) -> Result<Box<dyn ServiceController>, BootstrapError> {
    match std::env::consts::OS {
        "windows" => Ok(Box::new(WindowsServiceController::new(service))),
        "linux" => Ok(Box::new(LinuxServiceController::new(service))),
        other => Err(BootstrapError::UnsupportedPlatform(other.to_string())),
    }
}

fn probe_spawn_error(command: &str, err: io::Error) -> ProbeError {
    match err.kind() {
        io::ErrorKind::NotFound => ProbeError::CommandUnavailable(command.to_string()),
        _ => ProbeError::UnexpectedOutput(format!("{command}: {err}")),
    }
}

fn start_spawn_error(command: &str, err: io::Error) -> StartError {
    match err.kind() {
        io::ErrorKind::NotFound => StartError::CommandUnavailable(command.to_string()),
        io::ErrorKind::PermissionDenied => {
            StartError::PermissionDenied(format!("{command}: {err}"))
        }
        _ => StartError::UnexpectedOutput(format!("{command}: {err}")),
    }
}
