use std::io;
use std::process::Command;

use tracing::debug;

use super::{probe_spawn_error, start_spawn_error, ServiceController, StartOutcome};
use crate::error::{ProbeError, StartError};

/// Controls the broker through systemd, falling back to the process table
/// for detection since the broker may run unmanaged by the init system.
pub struct LinuxServiceController {
    service: String,
}

impl LinuxServiceController {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl ServiceController for LinuxServiceController {
    fn service_name(&self) -> &str {
        &self.service
    }

    fn is_alive(&self) -> Result<bool, ProbeError> {
        match Command::new("systemctl")
            .args(["is-active", "--quiet", &self.service])
            .status()
        {
            Ok(status) if status.success() => return Ok(true),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("systemctl unavailable, checking the process table only");
            }
            Err(e) => return Err(probe_spawn_error("systemctl is-active", e)),
        }

        match Command::new("pgrep").args(["-x", &self.service]).status() {
            Ok(status) => Ok(status.success()),
            Err(e) => Err(probe_spawn_error("pgrep", e)),
        }
    }

    fn start(&self) -> Result<StartOutcome, StartError> {
        let output = Command::new("systemctl")
            .args(["start", &self.service])
            .output()
            .map_err(|e| start_spawn_error("systemctl start", e))?;

        if output.status.success() {
            return Ok(StartOutcome::Started);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_start_failure(&stderr))
    }
}

fn classify_start_failure(stderr: &str) -> StartError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("access denied")
        || lowered.contains("permission denied")
        || lowered.contains("authentication required")
    {
        StartError::PermissionDenied(stderr.trim().to_string())
    } else {
        StartError::UnexpectedOutput(stderr.trim().to_string())
    }
}
