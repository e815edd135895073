use std::process::Command;

use super::{probe_spawn_error, start_spawn_error, ServiceController, StartOutcome};
use crate::error::{ProbeError, StartError};

/// Controls the broker through the Windows service manager (`sc.exe`).
pub struct WindowsServiceController {
    service: String,
}

impl WindowsServiceController {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl ServiceController for WindowsServiceController {
    fn service_name(&self) -> &str {
        &self.service
    }

    fn is_alive(&self) -> Result<bool, ProbeError> {
        let output = Command::new("sc")
            .args(["query", &self.service])
            .output()
            .map_err(|e| probe_spawn_error("sc query", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(query_reports_running(&stdout))
    }

    fn start(&self) -> Result<StartOutcome, StartError> {
        let output = Command::new("sc")
            .args(["start", &self.service])
            .output()
            .map_err(|e| start_spawn_error("sc start", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        classify_start_output(&stdout)
    }
}

fn query_reports_running(stdout: &str) -> bool {
    stdout.to_lowercase().contains("running")
}

fn classify_start_output(stdout: &str) -> Result<StartOutcome, StartError> {
    if stdout.contains("START_PENDING") {
        return Ok(StartOutcome::Started);
    }
    if stdout.contains("ALREADY_RUNNING") {
        return Ok(StartOutcome::AlreadyRunning);
    }
    Err(StartError::UnexpectedOutput(stdout.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_matches_running_case_insensitively() {
        assert!(query_reports_running(
            "        STATE              : 4  RUNNING"
        ));
        assert!(query_reports_running("state: Running"));
        assert!(!query_reports_running(
            "        STATE              : 1  STOPPED"
        ));
        assert!(!query_reports_running(""));
    }

    #[test]
    fn start_pending_counts_as_started() {
        let outcome = classify_start_output("        STATE              : 2  START_PENDING")
            .expect("start output should classify as success");
        assert_eq!(outcome, StartOutcome::Started);
    }

    #[test]
    fn already_running_counts_as_noop_success() {
        let outcome = classify_start_output(
            "[SC] StartService FAILED 1056:\n\nAn instance of the service is already running. (ALREADY_RUNNING)",
        )
        .expect("already-running should classify as success");
        assert_eq!(outcome, StartOutcome::AlreadyRunning);
    }

    #[test]
    fn anything_else_is_a_start_failure() {
        let err = classify_start_output("[SC] StartService FAILED 1058")
            .expect_err("unknown output should be a failure");
        assert!(matches!(err, StartError::UnexpectedOutput(_)));
    }
}
