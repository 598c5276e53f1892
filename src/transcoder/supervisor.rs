//! Transcode process supervisor
//!
//! One supervisor instance owns the lifecycle of the external transcode
//! process. A single monitor task per session owns the child handle and
//! resolves both the stop path and the crash path, so the exit event is
//! processed exactly once no matter how the two race.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{QualityTier, ServerConfig};
use crate::state::SharedState;

use super::artifacts::OutputLayout;
use super::command::TranscodeInvocation;
use super::error::SupervisorError;

/// Invoked with the process exit code when the transcoder dies on its own
pub type CrashObserver = Box<dyn Fn(Option<i32>) + Send + Sync>;

/// Supervisor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No transcode process exists
    Idle,
    /// `start()` is preparing artifacts and spawning
    Starting,
    /// The process is alive and encoding
    Running,
    /// `stop()` was requested; the monitor is tearing the process down
    Stopping,
    /// The process exited on its own; teardown in progress
    Crashed,
}

struct RunningTranscode {
    stop: CancellationToken,
    monitor: JoinHandle<()>,
}

struct Inner {
    phase: Phase,
    session: Option<RunningTranscode>,
}

/// Owns the external transcode process for one publish session at a time
pub struct TranscodeSupervisor {
    layout: OutputLayout,
    tiers: Vec<QualityTier>,
    stop_grace: Duration,
    state: Arc<SharedState>,
    shared: Arc<Mutex<Inner>>,
    on_crash: Arc<StdMutex<Option<CrashObserver>>>,
    // Signalled by the monitor once teardown lands back in Idle, so a
    // stop() that arrives mid-teardown can still wait it out.
    done: watch::Sender<()>,
}

/// Everything the monitor task needs after it takes ownership of the child
struct MonitorCtx {
    shared: Arc<Mutex<Inner>>,
    state: Arc<SharedState>,
    layout: OutputLayout,
    grace: Duration,
    on_crash: Arc<StdMutex<Option<CrashObserver>>>,
    done: watch::Sender<()>,
}

impl TranscodeSupervisor {
    pub fn new(config: &ServerConfig, state: Arc<SharedState>) -> Self {
        Self {
            layout: OutputLayout::new(&config.output_dir),
            tiers: config.tiers.clone(),
            stop_grace: config.stop_grace,
            state,
            shared: Arc::new(Mutex::new(Inner {
                phase: Phase::Idle,
                session: None,
            })),
            on_crash: Arc::new(StdMutex::new(None)),
            done: watch::channel(()).0,
        }
    }

    /// Register the crash-observer callback
    pub fn set_crash_observer(&self, observer: impl Fn(Option<i32>) + Send + Sync + 'static) {
        if let Ok(mut guard) = self.on_crash.lock() {
            *guard = Some(Box::new(observer));
        }
    }

    /// Startup validation of the transcode executable
    ///
    /// The orchestrator must not present itself as available when this
    /// fails: no listener may be bound without a working encoder.
    pub async fn validate_executable(config: &ServerConfig) -> Result<(), SupervisorError> {
        let status = Command::new(&config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|_| SupervisorError::ExecutableMissing(config.ffmpeg_path.clone()))?;

        if status.success() {
            Ok(())
        } else {
            Err(SupervisorError::ExecutableMissing(config.ffmpeg_path.clone()))
        }
    }

    /// Start a transcode session
    ///
    /// Refuses with [`SupervisorError::AlreadyRunning`] unless idle. Output
    /// directory failures propagate to the caller; spawn failures are
    /// additionally reported through the crash path since they indicate
    /// the executable disappeared mid-session.
    pub async fn start(&self, invocation: TranscodeInvocation) -> Result<(), SupervisorError> {
        let mut inner = self.shared.lock().await;

        if inner.phase != Phase::Idle {
            return Err(SupervisorError::AlreadyRunning);
        }
        inner.phase = Phase::Starting;

        if let Err(e) = self.layout.prepare(&self.tiers).await {
            inner.phase = Phase::Idle;
            return Err(SupervisorError::OutputDir(e));
        }

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                // No monitor exists yet, so this path cleans up inline.
                inner.phase = Phase::Idle;
                tracing::error!(program = ?invocation.program, error = %e, "Transcoder spawn failed");
                if let Err(e) = self.layout.clean().await {
                    tracing::warn!(error = %e, "Failed to clean output artifacts");
                }
                self.state.stop_stream().await;
                notify_crash(&self.on_crash, None);
                return Err(SupervisorError::Spawn(e));
            }
        };

        let stop = CancellationToken::new();
        let ctx = MonitorCtx {
            shared: Arc::clone(&self.shared),
            state: Arc::clone(&self.state),
            layout: self.layout.clone(),
            grace: self.stop_grace,
            on_crash: Arc::clone(&self.on_crash),
            done: self.done.clone(),
        };
        let monitor = tokio::spawn(monitor(child, stop.clone(), ctx));

        inner.session = Some(RunningTranscode { stop, monitor });
        inner.phase = Phase::Running;
        tracing::info!(program = ?invocation.program, tiers = self.tiers.len(), "Transcoder started");
        Ok(())
    }

    /// Stop the transcode session
    ///
    /// No-op when idle. Otherwise requests graceful termination and waits
    /// for the monitor to finish teardown; on return the process has
    /// exited and the output tree holds no stale session artifacts.
    pub async fn stop(&self) {
        let session = {
            let mut inner = self.shared.lock().await;
            match inner.phase {
                Phase::Idle => return,
                Phase::Running | Phase::Starting => inner.phase = Phase::Stopping,
                // A crash or an earlier stop is already tearing down; just
                // wait for the monitor below.
                Phase::Stopping | Phase::Crashed => {}
            }
            inner.session.take()
        };

        if let Some(session) = session {
            session.stop.cancel();
            let _ = session.monitor.await;
            return;
        }

        // Another caller holds the monitor handle; watch the phase until
        // its teardown completes.
        let mut done = self.done.subscribe();
        loop {
            if self.shared.lock().await.phase == Phase::Idle {
                return;
            }
            if done.changed().await.is_err() {
                return;
            }
        }
    }

    /// Whether a transcode session is in flight
    pub async fn is_running(&self) -> bool {
        matches!(
            self.shared.lock().await.phase,
            Phase::Starting | Phase::Running
        )
    }

    /// Current lifecycle phase
    pub async fn phase(&self) -> Phase {
        self.shared.lock().await.phase
    }
}

/// Monitor task: sole owner of the child process
///
/// Resolves exactly one of two outcomes: a stop request (graceful TERM,
/// bounded grace, forced kill) or a spontaneous exit (crash path). All
/// post-exit artifact cleanup happens here.
async fn monitor(mut child: Child, stop: CancellationToken, ctx: MonitorCtx) {
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(scan_stderr(stderr));
    }

    tokio::select! {
        status = child.wait() => {
            // Spontaneous exit. Only label it a crash if we were still
            // Running; in Stopping the stop path owns this exit.
            let spontaneous = {
                let mut inner = ctx.shared.lock().await;
                if inner.phase == Phase::Running {
                    inner.phase = Phase::Crashed;
                    true
                } else {
                    false
                }
            };

            let code = status.ok().and_then(|s| s.code());
            let abnormal = code != Some(0);
            if spontaneous {
                if abnormal {
                    tracing::error!(code = ?code, "Transcoder crashed");
                } else {
                    tracing::info!("Transcoder exited, source ended");
                }
                // Idempotent; a state some other path already took offline
                // is left alone.
                ctx.state.stop_stream().await;
                clean(&ctx.layout).await;
                if abnormal {
                    notify_crash(&ctx.on_crash, code);
                }
            } else {
                clean(&ctx.layout).await;
            }
        }
        _ = stop.cancelled() => {
            terminate(&mut child);
            // The grace timer dies with the timeout future if the child
            // exits first; no forced kill fires after a clean exit.
            match tokio::time::timeout(ctx.grace, child.wait()).await {
                Ok(status) => {
                    let code = status.ok().and_then(|s| s.code());
                    tracing::info!(code = ?code, "Transcoder terminated");
                }
                Err(_) => {
                    tracing::warn!(grace = ?ctx.grace, "Transcoder ignored termination, killing");
                    let _ = child.kill().await;
                }
            }
            clean(&ctx.layout).await;
        }
    }

    {
        let mut inner = ctx.shared.lock().await;
        inner.phase = Phase::Idle;
        inner.session = None;
    }
    let _ = ctx.done.send(());
}

async fn clean(layout: &OutputLayout) {
    if let Err(e) = layout.clean().await {
        tracing::warn!(error = %e, "Failed to clean output artifacts");
    }
}

fn notify_crash(on_crash: &StdMutex<Option<CrashObserver>>, code: Option<i32>) {
    if let Ok(guard) = on_crash.lock() {
        if let Some(observer) = guard.as_ref() {
            observer(code);
        }
    }
}

/// Request graceful termination of the child
#[cfg(unix)]
fn terminate(child: &mut Child) {
    match child.id() {
        Some(pid) => unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        },
        // Already reaped; nothing to signal.
        None => {}
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// Scan encoder stderr for error/warning markers and frame-drop counts.
/// Observability only; output never drives state transitions.
async fn scan_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let lower = line.to_ascii_lowercase();
        if lower.contains("error") {
            tracing::warn!(line = %line, "Transcoder error output");
        } else if lower.contains("drop=") && !lower.contains("drop=0") {
            tracing::warn!(line = %line, "Transcoder dropping frames");
        } else {
            tracing::debug!(line = %line, "Transcoder output");
        }
    }
}
