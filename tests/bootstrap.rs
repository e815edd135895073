mod common;

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use broker_bootstrap::bootstrap::{run_with_controller, BootstrapContext, Phase};
use broker_bootstrap::config::Config;
use broker_bootstrap::error::{BootstrapError, DiscoveryError, ProbeError, StartError};
use broker_bootstrap::service::{ServiceController, StartOutcome};
use tokio::sync::watch;

use crate::common::folder_to_use;

#[derive(Clone, Copy)]
enum StartScript {
    Succeeds(StartOutcome),
    Fails,
    MustNotBeCalled,
}

/// Stand-in controller so phase behavior can be exercised without an OS
/// service manager.
struct ScriptedController {
    alive: bool,
    probe_fails: bool,
    probe_delay: Option<Duration>,
    start: StartScript,
    start_calls: Arc<AtomicUsize>,
}

impl ScriptedController {
    fn new(alive: bool, start: StartScript) -> (Self, Arc<AtomicUsize>) {
        let start_calls = Arc::new(AtomicUsize::new(0));
        let controller = Self {
            alive,
            probe_fails: false,
            probe_delay: None,
            start,
            start_calls: start_calls.clone(),
        };
        (controller, start_calls)
    }
}

impl ServiceController for ScriptedController {
    fn service_name(&self) -> &str {
        "mosquitto"
    }

    fn is_alive(&self) -> Result<bool, ProbeError> {
        if let Some(delay) = self.probe_delay {
            std::thread::sleep(delay);
        }
        if self.probe_fails {
            return Err(ProbeError::UnexpectedOutput("scripted probe failure".into()));
        }
        Ok(self.alive)
    }

    fn start(&self) -> Result<StartOutcome, StartError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        match self.start {
            StartScript::Succeeds(outcome) => Ok(outcome),
            StartScript::Fails => Err(StartError::UnexpectedOutput(
                "scripted start failure".into(),
            )),
            StartScript::MustNotBeCalled => panic!("start() must not have been invoked"),
        }
    }
}

fn context() -> BootstrapContext {
    let base_dir = folder_to_use();
    BootstrapContext::new(base_dir.join("settings.ini"), "mosquitto")
}

#[tokio::test]
async fn alive_broker_skips_the_start_entirely() {
    let (controller, start_calls) = ScriptedController::new(true, StartScript::MustNotBeCalled);
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let config = run_with_controller(context(), Box::new(controller), shutdown_rx)
        .await
        .expect("bootstrap should succeed with an alive broker");

    assert_eq!(config.network.broker_port, 1883);
    assert_eq!(start_calls.load(Ordering::SeqCst), 0);
    drop(shutdown_tx);
}

#[tokio::test]
async fn unreadable_config_degrades_to_defaults_and_continues() {
    let base_dir = folder_to_use();
    // A directory at the config path makes load_or_create fail while the
    // path still exists.
    let path = base_dir.join("settings.ini");
    std::fs::create_dir(&path).unwrap();
    let ctx = BootstrapContext::new(path, "mosquitto");

    let (controller, start_calls) = ScriptedController::new(true, StartScript::MustNotBeCalled);
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let config = run_with_controller(ctx, Box::new(controller), shutdown_rx)
        .await
        .expect("a degraded configuration must not abort the bootstrap");

    assert_eq!(config, Config::default());
    assert_eq!(start_calls.load(Ordering::SeqCst), 0);
    drop(shutdown_tx);
}

#[tokio::test]
async fn announcer_failure_still_runs_the_detection_phase() {
    let mut ctx = context();
    ctx.resolver = || {
        Err(DiscoveryError::NoInterface(io::Error::other(
            "no route to subnet",
        )))
    };

    let (controller, start_calls) =
        ScriptedController::new(false, StartScript::Succeeds(StartOutcome::Started));
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    run_with_controller(ctx, Box::new(controller), shutdown_rx)
        .await
        .expect("a failed announcer must not stop broker detection");

    assert_eq!(
        start_calls.load(Ordering::SeqCst),
        1,
        "the detection phase must still run and start the broker"
    );
    drop(shutdown_tx);
}

#[tokio::test]
async fn already_running_start_outcome_still_succeeds() {
    let (controller, start_calls) =
        ScriptedController::new(false, StartScript::Succeeds(StartOutcome::AlreadyRunning));
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    run_with_controller(context(), Box::new(controller), shutdown_rx)
        .await
        .expect("already-running must count as success");

    assert_eq!(
        start_calls.load(Ordering::SeqCst),
        1,
        "exactly one start attempt expected"
    );
    drop(shutdown_tx);
}

#[tokio::test]
async fn start_failure_aborts_the_bootstrap() {
    let (controller, _) = ScriptedController::new(false, StartScript::Fails);
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let err = run_with_controller(context(), Box::new(controller), shutdown_rx)
        .await
        .expect_err("a failed start must abort the bootstrap");

    assert!(matches!(err, BootstrapError::Start(_)), "got {err:?}");
    drop(shutdown_tx);
}

#[tokio::test]
async fn failed_probe_still_attempts_a_start() {
    let (mut controller, start_calls) =
        ScriptedController::new(false, StartScript::Succeeds(StartOutcome::Started));
    controller.probe_fails = true;
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    run_with_controller(context(), Box::new(controller), shutdown_rx)
        .await
        .expect("a probe failure alone must not abort the bootstrap");

    assert_eq!(start_calls.load(Ordering::SeqCst), 1);
    drop(shutdown_tx);
}

#[tokio::test]
async fn stuck_detection_phase_times_out_instead_of_hanging() {
    let (mut controller, _) = ScriptedController::new(true, StartScript::MustNotBeCalled);
    controller.probe_delay = Some(Duration::from_secs(10));
    let mut ctx = context();
    ctx.phase_timeout = Duration::from_millis(500);
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let err = run_with_controller(ctx, Box::new(controller), shutdown_rx)
        .await
        .expect_err("a stalled phase must abort the bootstrap");

    assert!(
        matches!(
            err,
            BootstrapError::PhaseTimeout {
                phase: Phase::DetectOrStartBroker,
                ..
            }
        ),
        "got {err:?}"
    );
    drop(shutdown_tx);
}
