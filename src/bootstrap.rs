/*
Sequences the bootstrap: load config, start announcing, make sure the broker
service is up. Each phase completes over its own single-use channel and the
coordinator waits on it with a timeout, so a stuck phase aborts the bootstrap
instead of hanging it.
*/
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::discovery;
use crate::error::{BootstrapError, StartError};
use crate::service::{self, ServiceController, ServiceState, StartOutcome};

pub const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a bootstrap run needs, passed explicitly into each phase
/// instead of living in process-global state.
#[derive(Debug, Clone)]
pub struct BootstrapContext {
    pub config_path: PathBuf,
    pub service: String,
    pub phase_timeout: Duration,
    /// How the announcer discovers the host address; swappable in tests.
    pub resolver: discovery::AddressResolver,
}

impl BootstrapContext {
    pub fn new(config_path: impl Into<PathBuf>, service: impl Into<String>) -> Self {
        Self {
            config_path: config_path.into(),
            service: service.into(),
            phase_timeout: DEFAULT_PHASE_TIMEOUT,
            resolver: discovery::resolve_local_ip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoadConfig,
    AnnounceStart,
    DetectOrStartBroker,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::LoadConfig => "load-config",
            Phase::AnnounceStart => "announce-start",
            Phase::DetectOrStartBroker => "detect-or-start-broker",
        };
        f.write_str(name)
    }
}

/// How the final phase brought the broker up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerReady {
    /// Probe found the service already alive; no start was issued.
    Detected,
    Started,
    AlreadyRunning,
}

/// Runs the full bootstrap with the controller for the current platform.
pub async fn run(
    ctx: BootstrapContext,
    shutdown_rx: watch::Receiver<()>,
) -> Result<Config, BootstrapError> {
    let controller = service::platform_controller(&ctx.service)?;
    run_with_controller(ctx, controller, shutdown_rx).await
}

pub async fn run_with_controller(
    ctx: BootstrapContext,
    controller: Box<dyn ServiceController>,
    shutdown_rx: watch::Receiver<()>,
) -> Result<Config, BootstrapError> {
    info!("starting broker management services");

    // Phase 1: mandatory. The announcement payload depends on the configured
    // port and QoS, so nothing else may start before this completes.
    info!("loading configuration from {:?}", ctx.config_path);
    let (config_tx, config_rx) = oneshot::channel();
    let config_path = ctx.config_path.clone();
    task::spawn_blocking(move || {
        let _ = config_tx.send(Config::load_or_create(&config_path));
    });

    let config = match await_phase(Phase::LoadConfig, ctx.phase_timeout, config_rx).await? {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            warn!("continuing with in-memory default configuration");
            Config::default()
        }
    };
    info!("configuration loaded: {:?}", config);

    // Phase 2: best effort. A host without a usable interface can still run
    // its broker for local clients, so a failed announcer never stops the
    // detection phase from running.
    info!("starting broker discovery announcements");
    let (ready_tx, ready_rx) = oneshot::channel();
    tokio::spawn(discovery::run_announcer_with_resolver(
        config.network,
        ctx.resolver,
        ready_tx,
        shutdown_rx,
    ));

    match await_phase(Phase::AnnounceStart, ctx.phase_timeout, ready_rx).await {
        Ok(Ok(ip)) => info!("announcing broker at {ip}"),
        Ok(Err(e)) => warn!("discovery announcements disabled: {e}"),
        Err(e) => warn!("discovery announcements disabled: {e}"),
    }

    // Phase 3: mandatory. Probe the service and start it if needed.
    info!("detecting broker service status for '{}'", controller.service_name());
    let (broker_tx, broker_rx) = oneshot::channel();
    task::spawn_blocking(move || {
        let _ = broker_tx.send(detect_or_start(controller.as_ref()));
    });

    match await_phase(Phase::DetectOrStartBroker, ctx.phase_timeout, broker_rx).await? {
        Ok(BrokerReady::Detected) => info!("broker service is already running"),
        Ok(BrokerReady::Started) => info!("broker service is starting"),
        Ok(BrokerReady::AlreadyRunning) => {
            info!("broker service was already running, skipping start")
        }
        Err(e) => {
            error!("failed to bring up the broker service: {e}");
            return Err(BootstrapError::Start(e));
        }
    }

    info!("broker bootstrap complete");
    Ok(config)
}

fn detect_or_start(controller: &dyn ServiceController) -> Result<BrokerReady, StartError> {
    let state = match controller.is_alive() {
        Ok(true) => ServiceState::Running,
        Ok(false) => ServiceState::Stopped,
        Err(e) => {
            // A failed probe is not fatal on its own; attempt the start and
            // let its outcome decide.
            warn!("broker service probe failed: {e}");
            ServiceState::Unknown
        }
    };

    if state == ServiceState::Running {
        return Ok(BrokerReady::Detected);
    }

    match controller.start()? {
        StartOutcome::Started => Ok(BrokerReady::Started),
        StartOutcome::AlreadyRunning => Ok(BrokerReady::AlreadyRunning),
    }
}

/// Single consumption point for a phase's completion signal. Each phase gets
/// a fresh channel, so a stale raise can never leak into the next wait.
async fn await_phase<T>(
    phase: Phase,
    wait: Duration,
    rx: oneshot::Receiver<T>,
) -> Result<T, BootstrapError> {
    match timeout(wait, rx).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(BootstrapError::PhaseInterrupted { phase }),
        Err(_) => Err(BootstrapError::PhaseTimeout {
            phase,
            timeout: wait,
        }),
    }
}
