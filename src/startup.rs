use crate::browser;
use crate::config::{AppConfig, APP_NAME};
use crate::db::Database;
use crate::instance::{InstanceLock, LockGuard, LockOutcome};
use crate::port::find_available_port;
use crate::server::ServerHandle;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

const SERVER_STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Clean,
    AlreadyRunning,
    NoPortAvailable,
    StoreInitFailed,
    ServerStartFailed,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::AlreadyRunning => 2,
            Self::NoPortAvailable => 3,
            Self::StoreInitFailed => 4,
            Self::ServerStartFailed => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    NotStarted,
    LockHeld,
    PortChosen,
    StoreReady,
    Serving,
    UserQuit,
    SignalInterrupt,
    Released,
    Terminated,
}

impl StartupPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::LockHeld => "lock-held",
            Self::PortChosen => "port-chosen",
            Self::StoreReady => "store-ready",
            Self::Serving => "serving",
            Self::UserQuit => "user-quit",
            Self::SignalInterrupt => "signal-interrupt",
            Self::Released => "released",
            Self::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    UserQuit,
    SignalInterrupt,
}

impl ShutdownReason {
    fn phase(self) -> StartupPhase {
        match self {
            Self::UserQuit => StartupPhase::UserQuit,
            Self::SignalInterrupt => StartupPhase::SignalInterrupt,
        }
    }
}

pub struct Sequencer {
    config: AppConfig,
    phase: StartupPhase,
}

impl Sequencer {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            phase: StartupPhase::NotStarted,
        }
    }

    pub fn phase(&self) -> StartupPhase {
        self.phase
    }

    /// Runs every step up to `Serving`. On failure the lock (if taken) is
    /// released and the exit status for that failure class is returned.
    pub fn start(mut self) -> Result<Running, ExitStatus> {
        let lock = InstanceLock::new(&self.config.lock_path);
        match lock.acquire() {
            LockOutcome::AlreadyRunning { pid } => {
                eprintln!("{} läuft bereits (PID {}).", APP_NAME, pid);
                return Err(self.fail(ExitStatus::AlreadyRunning));
            }
            LockOutcome::Acquired | LockOutcome::Degraded => {}
        }
        let guard = LockGuard::new(lock);
        self.advance(StartupPhase::LockHeld);

        let Some(port) = find_available_port(
            &self.config.host,
            self.config.preferred_port,
            self.config.port_attempts,
        ) else {
            eprintln!(
                "Kein freier Port zwischen {} und {} gefunden.",
                self.config.preferred_port,
                self.config
                    .preferred_port
                    .saturating_add(self.config.port_attempts.saturating_sub(1))
            );
            return Err(self.fail(ExitStatus::NoPortAvailable));
        };
        tracing::info!(port, "selected listening port");
        self.advance(StartupPhase::PortChosen);

        let db = match Database::new(&self.config.database_path) {
            Ok(db) => db,
            Err(error) => {
                tracing::error!(error = %error, path = %self.config.database_path.display(), "store init failed");
                eprintln!(
                    "Datenbank {} konnte nicht geöffnet werden: {}",
                    self.config.database_path.display(),
                    error
                );
                return Err(self.fail(ExitStatus::StoreInitFailed));
            }
        };
        self.advance(StartupPhase::StoreReady);

        let server = match ServerHandle::start(db, &self.config.host, port) {
            Ok(server) => server,
            Err(error) => {
                tracing::error!(error = %error, port, "server start failed");
                eprintln!("Server konnte nicht gestartet werden: {}", error);
                return Err(self.fail(ExitStatus::ServerStartFailed));
            }
        };
        self.advance(StartupPhase::Serving);

        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        watch_interrupt(&server, shutdown_tx.clone());

        Ok(Running {
            url: self.config.url(server.addr().port()),
            config: self.config,
            phase: self.phase,
            guard,
            server,
            shutdown_tx,
            shutdown_rx,
        })
    }

    fn advance(&mut self, next: StartupPhase) {
        transition(&mut self.phase, next);
    }

    fn fail(&mut self, status: ExitStatus) -> ExitStatus {
        tracing::error!(phase = self.phase.as_str(), code = status.code(), "startup aborted");
        self.advance(StartupPhase::Terminated);
        status
    }
}

fn watch_interrupt(server: &ServerHandle, shutdown: Sender<ShutdownReason>) {
    server.runtime().spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received");
                let _ = shutdown.send(ShutdownReason::SignalInterrupt);
            }
            Err(error) => tracing::warn!(error = %error, "failed to listen for interrupt"),
        }
    });
}

pub struct Running {
    config: AppConfig,
    url: String,
    phase: StartupPhase,
    guard: LockGuard,
    server: ServerHandle,
    shutdown_tx: Sender<ShutdownReason>,
    shutdown_rx: Receiver<ShutdownReason>,
}

impl Running {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn phase(&self) -> StartupPhase {
        self.phase
    }

    pub fn shutdown_sender(&self) -> Sender<ShutdownReason> {
        self.shutdown_tx.clone()
    }

    pub fn announce(&self) {
        println!("Starte {}...", APP_NAME);
        println!("Datenbank-Speicherort: {}", self.config.database_path.display());
        println!("Adresse: {}", self.url);
        if self.config.open_browser {
            println!("Die Anwendung öffnet sich automatisch in Ihrem Browser...");
        }
        println!("Zum Beenden drücken Sie Ctrl+C");
    }

    pub fn launch_browser(&self) {
        if self.config.open_browser {
            browser::open_after(self.url.clone(), self.config.browser_delay);
        } else {
            tracing::info!("browser launch disabled");
        }
    }

    pub fn wait_and_finish(self) -> ExitStatus {
        // `self` holds a sender, so the channel cannot disconnect while we wait.
        let reason = self
            .shutdown_rx
            .recv()
            .unwrap_or(ShutdownReason::SignalInterrupt);
        self.finish(reason)
    }

    pub fn finish(mut self, reason: ShutdownReason) -> ExitStatus {
        transition(&mut self.phase, reason.phase());
        self.guard.lock().release();
        transition(&mut self.phase, StartupPhase::Released);

        let Self {
            server, mut phase, ..
        } = self;
        server.stop(SERVER_STOP_GRACE);
        transition(&mut phase, StartupPhase::Terminated);
        ExitStatus::Clean
    }
}

fn transition(phase: &mut StartupPhase, next: StartupPhase) {
    tracing::info!(from = phase.as_str(), to = next.as_str(), "startup phase");
    *phase = next;
}

pub fn run(config: AppConfig) -> ExitStatus {
    let running = match Sequencer::new(config).start() {
        Ok(running) => running,
        Err(status) => return status,
    };
    running.announce();
    running.launch_browser();
    wait_for_quit(running)
}

#[cfg(feature = "tray")]
fn wait_for_quit(running: Running) -> ExitStatus {
    let url = running.url().to_string();
    let quit = running.shutdown_sender();
    let waiter = std::thread::Builder::new()
        .name("shutdown-waiter".into())
        .spawn(move || {
            let status = running.wait_and_finish();
            tracing::info!(code = status.code(), "exiting");
            crate::flush_logs();
            std::process::exit(status.code());
        });
    let waiter = match waiter {
        Ok(waiter) => waiter,
        Err(error) => {
            tracing::error!(error = %error, "failed to spawn shutdown waiter");
            return ExitStatus::Clean;
        }
    };

    if let Err(error) = crate::tray::run(url, quit) {
        tracing::warn!(error = %error, "tray unavailable, waiting for interrupt instead");
    }
    let _ = waiter.join();
    ExitStatus::Clean
}

#[cfg(not(feature = "tray"))]
fn wait_for_quit(running: Running) -> ExitStatus {
    running.wait_and_finish()
}
