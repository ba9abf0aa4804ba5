//! One child-process session: start, watch, terminate.

use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::launcher::command::{CommandBuilder, NoPackageRoot, PackageRootResolver};
use crate::launcher::output::{spawn_output_pumps, OutputLine};
use crate::launcher::registry::SessionRegistry;
use crate::models::params::LaunchParameters;
use crate::models::ports::AllocatedPorts;
use crate::models::session::SessionStatus;
use crate::{AppError, Result};

/// Interval between exit polls by the background watcher.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bounded wait before a graceful termination escalates.
const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(5);

/// A launched (or launchable) child process with negotiated ports.
///
/// Lifecycle: `Starting -> Running -> Terminated(exit_code)`, or
/// `Starting -> FailedToStart` when the OS cannot create the process.
/// Exit is observed by a background watcher and published through a
/// watch channel; callers either block on [`ProcessSession::wait_for_exit`]
/// or poll [`ProcessSession::is_running`].
pub struct ProcessSession {
    id: String,
    params: LaunchParameters,
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn PackageRootResolver>,
    graceful_timeout: Duration,
    ports: OnceLock<AllocatedPorts>,
    child: Arc<Mutex<Option<Child>>>,
    status_tx: Arc<watch::Sender<SessionStatus>>,
    status_rx: watch::Receiver<SessionStatus>,
    output_rx: StdMutex<Option<UnboundedReceiver<OutputLine>>>,
}

impl ProcessSession {
    /// Create a session in the `Starting` state. Nothing is reserved or
    /// spawned until [`ProcessSession::start`] is called.
    #[must_use]
    pub fn new(params: LaunchParameters, registry: Arc<SessionRegistry>) -> Self {
        let (status_tx, status_rx) = watch::channel(SessionStatus::Starting);
        Self {
            id: Uuid::new_v4().to_string(),
            params,
            registry,
            resolver: Arc::new(NoPackageRoot),
            graceful_timeout: DEFAULT_GRACEFUL_TIMEOUT,
            ports: OnceLock::new(),
            child: Arc::new(Mutex::new(None)),
            status_tx: Arc::new(status_tx),
            status_rx,
            output_rx: StdMutex::new(None),
        }
    }

    /// Inject a package-root resolver collaborator.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PackageRootResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Override the graceful-termination timeout.
    #[must_use]
    pub fn with_graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    /// Session identifier used for registry lookup.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The launch parameters this session was created with.
    #[must_use]
    pub fn params(&self) -> &LaunchParameters {
        &self.params
    }

    /// Ports reserved for this session; unset until `start()` reserves
    /// them.
    #[must_use]
    pub fn ports(&self) -> AllocatedPorts {
        self.ports.get().copied().unwrap_or_default()
    }

    /// Debugger-attach port, `-1` if unset.
    #[must_use]
    pub fn debug_port(&self) -> i32 {
        self.ports().debug_port()
    }

    /// Runtime-service port, `-1` if unset.
    #[must_use]
    pub fn service_port(&self) -> i32 {
        self.ports().service_port()
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.status_rx.borrow()
    }

    /// Whether the child process is currently alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.status(), SessionStatus::Running)
    }

    /// Take the output stream: a lazy, ordered sequence of raw lines.
    /// Single-take and not restartable; returns `None` on subsequent
    /// calls or before `start()`. The stream ends once the process has
    /// terminated and all buffered output is drained.
    #[must_use]
    pub fn subscribe_output(&self) -> Option<UnboundedReceiver<OutputLine>> {
        self.output_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Reserve ports, register with the registry, and spawn the child.
    ///
    /// Port reservation and registration happen inside the registry's
    /// single lock region; if the OS then fails to create the process the
    /// reservation is released before the error is returned, so no port
    /// leaks.
    ///
    /// # Errors
    ///
    /// `AppError::Validation` / `AppError::SdkNotConfigured` for bad
    /// parameters (surfaced before any port action),
    /// `AppError::NoPortAvailable` when allocation is exhausted, and
    /// `AppError::ProcessLaunch` when the OS spawn call fails (the
    /// session is left in `FailedToStart`).
    pub async fn start(&self) -> Result<()> {
        let span = info_span!("session_start", session_id = %self.id);
        let _guard = span.enter();

        self.params.validate()?;
        if self.ports.get().is_some() {
            return Err(AppError::Validation("session already started".into()));
        }

        let ports = self
            .registry
            .allocate_and_register(&self.id, self.params.wants_debug())?;
        let Some(service_port) = ports.service else {
            // allocate_and_register always sets the service port.
            self.registry.unregister(&self.id)?;
            return Err(AppError::NoPortAvailable(
                "service port was not allocated".into(),
            ));
        };
        let _ = self.ports.set(ports);

        let builder = CommandBuilder::new(Arc::clone(&self.resolver));
        let launch = match builder.build(&self.params, ports.debug, service_port) {
            Ok(launch) => launch,
            Err(err) => {
                self.registry.unregister(&self.id)?;
                return Err(err);
            }
        };

        let mut cmd = Command::new(&launch.exe);
        if launch.clear_env {
            cmd.env_clear();
        }
        cmd.envs(&launch.env)
            .args(&launch.args)
            .current_dir(&launch.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                // Release the tentative reservation before surfacing.
                if let Err(unregister_err) = self.registry.unregister(&self.id) {
                    warn!(%unregister_err, "failed to release ports after spawn failure");
                }
                let _ = self.status_tx.send(SessionStatus::FailedToStart);
                return Err(AppError::ProcessLaunch(format!(
                    "failed to spawn {}: {err}",
                    launch.exe.to_string_lossy()
                )));
            }
        };

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => {
                spawn_output_pumps(stdout, stderr, &output_tx);
            }
            _ => warn!(session_id = %self.id, "child pipes unavailable"),
        }
        drop(output_tx);
        *self
            .output_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(output_rx);

        info!(
            session_id = %self.id,
            pid = child.id().unwrap_or(0),
            exe = %launch.exe.to_string_lossy(),
            debug_port = ports.debug_port(),
            service_port = ports.service_port(),
            "child process spawned"
        );

        {
            let mut guard = self.child.lock().await;
            *guard = Some(child);
        }
        self.registry.update_status(&self.id, SessionStatus::Running)?;
        let _ = self.status_tx.send(SessionStatus::Running);

        spawn_exit_watcher(
            self.id.clone(),
            Arc::clone(&self.child),
            Arc::clone(&self.registry),
            Arc::clone(&self.status_tx),
        );
        Ok(())
    }

    /// Terminate the child. A no-op `Ok(())` when the session already
    /// reached a terminal state.
    ///
    /// Graceful termination sends an interrupt signal and waits up to the
    /// configured timeout for the exit notification before force-killing.
    /// The wait is an ordinary await point, so callers can cancel it with
    /// their own timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` when the force-kill itself fails; the exit
    /// watcher still reports whatever final state the child reaches.
    pub async fn terminate(&self, graceful: bool) -> Result<()> {
        let span = info_span!("session_terminate", session_id = %self.id, graceful);
        let _guard = span.enter();

        if self.status().is_terminal() {
            return Ok(());
        }
        {
            let guard = self.child.lock().await;
            if guard.is_none() {
                // Never spawned; nothing to signal.
                return Ok(());
            }
        }

        if graceful {
            self.send_interrupt().await;
            let waited = tokio::time::timeout(self.graceful_timeout, self.wait_for_exit()).await;
            if let Ok(status) = waited {
                info!(?status, "child exited within grace period");
                return Ok(());
            }
            warn!("child did not exit within grace period, forcing kill");
        }

        {
            let mut guard = self.child.lock().await;
            if let Some(child) = guard.as_mut() {
                child.kill().await.map_err(|err| {
                    AppError::Io(format!("failed to force-kill child: {err}"))
                })?;
            }
        }
        // The watcher observes the cached exit status and publishes it.
        let status = self.wait_for_exit().await;
        info!(?status, "child terminated");
        Ok(())
    }

    /// Wait until the session reaches a terminal state and return it.
    pub async fn wait_for_exit(&self) -> SessionStatus {
        let mut rx = self.status_rx.clone();
        // Bound separately: the Ref returned by wait_for borrows rx and
        // must be dropped before rx is.
        let waited = rx.wait_for(|status| status.is_terminal()).await;
        match waited {
            Ok(status) => *status,
            // Sender kept alive by `self`; this arm is unreachable while
            // the session exists.
            Err(_) => self.status(),
        }
    }

    async fn send_interrupt(&self) {
        let mut guard = self.child.lock().await;
        if let Some(child) = guard.as_mut() {
            signal_terminate(child);
        }
    }
}

/// Ask the child to exit. SIGTERM on unix; a hard kill signal elsewhere,
/// where no gentler portable option exists.
#[cfg(unix)]
fn signal_terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        warn!(%err, pid, "failed to send SIGTERM");
    }
}

#[cfg(not(unix))]
fn signal_terminate(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        warn!(%err, "failed to signal child");
    }
}

/// Background watcher that polls the child for exit and publishes the
/// result to the registry and the status channel.
fn spawn_exit_watcher(
    id: String,
    child: Arc<Mutex<Option<Child>>>,
    registry: Arc<SessionRegistry>,
    status_tx: Arc<watch::Sender<SessionStatus>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
            let mut guard = child.lock().await;
            let Some(proc) = guard.as_mut() else {
                break;
            };
            let exit_code = match proc.try_wait() {
                Ok(Some(status)) => status.code(),
                Ok(None) => continue,
                Err(err) => {
                    warn!(session_id = %id, %err, "failed to poll child process");
                    None
                }
            };
            drop(guard);

            let status = SessionStatus::Terminated { exit_code };
            if let Err(err) = registry.update_status(&id, status) {
                warn!(session_id = %id, %err, "failed to record termination");
            }
            let _ = status_tx.send(status);
            info!(session_id = %id, ?exit_code, "child process exited");
            break;
        }
    })
}
