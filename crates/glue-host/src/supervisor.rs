//! Plugin process supervision.
//!
//! A [`Supervisor`] owns one plugin process and the transport client
//! connected to it. Starting runs spawn + handshake + connect, retried with
//! quadratic backoff on connection-level failures. A handshake that parses
//! but does not match is fatal and never retried.
//!
//! The running instance sits behind a [`RwLock`]: calls hold the read lock
//! for their round trip and a restart holds the write lock while it
//! respawns, so callers arriving mid-restart wait for the new process.
//! A request that fails because the process died restarts it on the spot
//! instead of waiting for the next liveness tick. `quit` signals the child
//! before it waits for in-flight calls.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use glue_core::handshake::PLUGIN_TYPE_ENV;
use glue_core::{
    FunctionCaller, Handshake, HandshakeConfig, PluginError, PluginResult, TransportKind, Value,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::{FunctionCache, FunctionPresence};
use crate::config::SupervisorConfig;

/// How long to wait for the exit status of a plugin that closed stdout
/// before printing its handshake.
const EXIT_STATUS_WAIT: Duration = Duration::from_secs(1);

/// How often, and how far apart, a failed request checks whether the plugin
/// process has exited.
const EXIT_POLL_ATTEMPTS: u32 = 5;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything needed to (re)start a plugin process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    path: PathBuf,
    interpreter: Option<PathBuf>,
    transport: TransportKind,
    env: HashMap<String, String>,
    config: SupervisorConfig,
    handshake: HandshakeConfig,
}

impl LaunchSpec {
    /// Run the executable at `path` directly.
    #[must_use]
    pub fn native(path: impl Into<PathBuf>, transport: TransportKind) -> Self {
        Self {
            path: path.into(),
            interpreter: None,
            transport,
            env: HashMap::new(),
            config: SupervisorConfig::default(),
            handshake: HandshakeConfig::default(),
        }
    }

    /// Run `script` with `interpreter`. Script plugins speak schema RPC.
    #[must_use]
    pub fn script(interpreter: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: Some(interpreter.into()),
            ..Self::native(script, TransportKind::Grpc)
        }
    }

    /// Add environment variables for the plugin process.
    #[must_use]
    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    /// Set the supervisor timing.
    #[must_use]
    pub fn with_config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the expected handshake.
    #[must_use]
    pub fn with_handshake(mut self, handshake: HandshakeConfig) -> Self {
        self.handshake = handshake;
        self
    }

    /// Plugin artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Requested transport.
    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Interpreter, for script plugins.
    #[must_use]
    pub fn interpreter(&self) -> Option<&Path> {
        self.interpreter.as_deref()
    }

    /// Supervisor timing.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    fn command(&self) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&self.path);
                cmd
            },
            None => Command::new(&self.path),
        };

        cmd.envs(&self.env)
            .env(PLUGIN_TYPE_ENV, self.transport.as_str())
            .env(&self.handshake.cookie_key, &self.handshake.cookie_value)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// A started plugin process and the client connected to it.
struct Instance {
    child: Mutex<Child>,
    caller: Arc<dyn FunctionCaller>,
    pid: Option<u32>,
    address: SocketAddr,
}

enum Slot {
    Running(Instance),
    /// A restart failed; the reason is reported to every later caller.
    Dead(String),
    Closed,
}

enum AttemptError {
    Fatal(PluginError),
    Retry(String),
}

/// Owns a plugin process and restarts it when it dies.
///
/// The function existence cache lives here as well, so that it is cleared
/// under the same write lock that swaps in the restarted process.
pub struct Supervisor {
    spec: LaunchSpec,
    slot: RwLock<Slot>,
    /// Pid of the running child, `0` when there is none. Readable without the
    /// slot lock so `quit` can signal a child that is busy serving calls.
    pid: AtomicU32,
    closed: AtomicBool,
    cache: FunctionCache,
    restart_count: AtomicU32,
}

impl Supervisor {
    /// Spawn the plugin, complete the handshake and connect.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::HandshakeFailed`] if the plugin announces an
    /// incompatible handshake, or [`PluginError::ConnectFailed`] once every
    /// attempt failed.
    pub async fn start(spec: LaunchSpec) -> PluginResult<Self> {
        let instance = launch(&spec).await?;
        Ok(Self {
            pid: AtomicU32::new(instance.pid.unwrap_or(0)),
            spec,
            slot: RwLock::new(Slot::Running(instance)),
            closed: AtomicBool::new(false),
            cache: FunctionCache::new(),
            restart_count: AtomicU32::new(0),
        })
    }

    /// Plugin artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.spec.path
    }

    /// Transport in use.
    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.spec.transport
    }

    /// Supervisor timing.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.spec.config
    }

    /// Function existence answers for the current process.
    #[must_use]
    pub fn cache(&self) -> &FunctionCache {
        &self.cache
    }

    /// Number of successful restarts.
    #[must_use]
    pub fn restart_count(&self) -> u32 {
        self.restart_count.load(Ordering::Acquire)
    }

    /// OS process id of the running plugin.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Address the running plugin listens on.
    pub async fn address(&self) -> Option<SocketAddr> {
        let slot = self.slot.read().await;
        self.running(&slot).ok().map(|instance| instance.address)
    }

    /// List the plugin's function names.
    ///
    /// A plugin found dead after a failed round trip is restarted and asked
    /// again.
    ///
    /// # Errors
    ///
    /// Returns a transport error, or [`PluginError::RestartExhausted`] /
    /// [`PluginError::Closed`] if the plugin is gone.
    pub async fn get_names(&self) -> PluginResult<Vec<String>> {
        match self.get_names_once().await {
            Err(e) => {
                self.recover_from(e).await?;
                self.get_names_once().await
            },
            names => names,
        }
    }

    async fn get_names_once(&self) -> PluginResult<Vec<String>> {
        let slot = self.slot.read().await;
        self.running(&slot)?.caller.get_names().await
    }

    /// Whether the plugin exports `name`, answered from the cache when
    /// possible.
    ///
    /// Only successful lookups are cached.
    ///
    /// # Errors
    ///
    /// Returns the error of the remote lookup, or [`PluginError::Closed`]
    /// after [`quit`](Self::quit).
    pub async fn has(&self, name: &str) -> PluginResult<bool> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }
        if let Some(found) = self.cache.get(name).as_bool() {
            return Ok(found);
        }

        match self.lookup(name).await {
            Err(e) => {
                self.recover_from(e).await?;
                self.lookup(name).await
            },
            found => found,
        }
    }

    /// Fill the cache entry for `name` while the current process is held,
    /// so the answer cannot outlive a restart.
    async fn lookup(&self, name: &str) -> PluginResult<bool> {
        let slot = self.slot.read().await;
        let names = self.running(&slot)?.caller.get_names().await?;
        let found = names.iter().any(|n| n == name);
        self.cache.set(name, FunctionPresence::from_found(found));
        Ok(found)
    }

    /// Call a plugin function.
    ///
    /// If the round trip fails because the process died, the plugin is
    /// restarted and the call is made once more against the new process.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Call`] when the function failed, a transport
    /// error when the round trip failed, or [`PluginError::RestartExhausted`]
    /// / [`PluginError::Closed`] if the plugin is gone.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> PluginResult<Value> {
        match self.call_once(name, args.clone()).await {
            Err(e) => {
                self.recover_from(e).await?;
                self.call_once(name, args).await
            },
            value => value,
        }
    }

    async fn call_once(&self, name: &str, args: Vec<Value>) -> PluginResult<Value> {
        let slot = self.slot.read().await;
        self.running(&slot)?.caller.call(name, args).await
    }

    fn running<'a>(&self, slot: &'a Slot) -> PluginResult<&'a Instance> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }
        match slot {
            Slot::Running(instance) => Ok(instance),
            Slot::Dead(reason) => Err(PluginError::RestartExhausted {
                path: self.spec.path.clone(),
                reason: reason.clone(),
            }),
            Slot::Closed => Err(self.closed_error()),
        }
    }

    fn closed_error(&self) -> PluginError {
        PluginError::Closed {
            path: self.spec.path.clone(),
        }
    }

    async fn child_exit(&self) -> PluginResult<Option<ExitStatus>> {
        let slot = self.slot.read().await;
        let instance = self.running(&slot)?;
        let mut child = instance.child.lock().await;
        Ok(child.try_wait()?)
    }

    /// Restart the plugin if `error` came from a process that has died.
    ///
    /// Returns `error` itself when the process is still alive, or when the
    /// error is the function's own.
    async fn recover_from(&self, error: PluginError) -> PluginResult<()> {
        if error.is_call_error() {
            return Err(error);
        }

        // The connection can drop a moment before the exit is observable.
        let mut exited = None;
        for _ in 0..EXIT_POLL_ATTEMPTS {
            match self.child_exit().await {
                Ok(Some(status)) => {
                    exited = Some(status);
                    break;
                },
                Ok(None) => tokio::time::sleep(EXIT_POLL_INTERVAL).await,
                Err(_) => break,
            }
        }
        let Some(status) = exited else {
            return Err(error);
        };

        warn!(
            plugin = %self.spec.path.display(),
            %status,
            error = %error,
            "Plugin died during a request, restarting"
        );
        self.restart().await.map(|_| ())
    }

    /// Check whether the plugin process is still running and restart it if
    /// it is not.
    ///
    /// Returns `true` when a restart happened.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::RestartExhausted`] if the restart failed (the
    /// supervisor stays dead afterwards) or [`PluginError::Closed`] after
    /// [`quit`](Self::quit).
    pub async fn check_liveness(&self) -> PluginResult<bool> {
        let Some(status) = self.child_exit().await? else {
            return Ok(false);
        };

        let crash = PluginError::ProcessExited {
            path: self.spec.path.clone(),
            status: status.to_string(),
        };
        warn!(error = %crash, "Plugin crashed, restarting");
        self.restart().await
    }

    async fn restart(&self) -> PluginResult<bool> {
        let mut slot = self.slot.write().await;
        self.running(&slot)?;
        if let Slot::Running(instance) = &mut *slot
            && instance.child.get_mut().try_wait()?.is_none()
        {
            // Replaced by a concurrent restart while we waited.
            return Ok(false);
        }

        self.pid.store(0, Ordering::Release);
        self.cache.clear();
        debug!(plugin = %self.spec.path.display(), "Function cache invalidated");

        match launch(&self.spec).await {
            Ok(instance) if self.closed.load(Ordering::Acquire) => {
                *slot = Slot::Closed;
                drop(slot);
                let Instance { child, .. } = instance;
                let grace = self.spec.config.shutdown_timeout();
                stop(&self.spec.path, child.into_inner(), grace, false).await?;
                Err(self.closed_error())
            },
            Ok(instance) => {
                self.pid.store(instance.pid.unwrap_or(0), Ordering::Release);
                *slot = Slot::Running(instance);
                let restart_count = self.restart_count.load(Ordering::Acquire).saturating_add(1);
                self.restart_count.store(restart_count, Ordering::Release);
                info!(
                    plugin = %self.spec.path.display(),
                    restart_count,
                    "Plugin restarted"
                );
                Ok(true)
            },
            Err(e) => {
                error!(plugin = %self.spec.path.display(), error = %e, "Plugin restart failed");
                let reason = e.to_string();
                *slot = Slot::Dead(reason.clone());
                Err(PluginError::RestartExhausted {
                    path: self.spec.path.clone(),
                    reason,
                })
            },
        }
    }

    /// Stop the plugin: SIGTERM, then SIGKILL once the grace period is over.
    ///
    /// The signal goes out before waiting for in-flight calls, and the
    /// whole shutdown is bounded by the grace period. Calling it again is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the process cannot be waited on or killed.
    pub async fn quit(&self) -> PluginResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.cache.clear();

        let grace = self.spec.config.shutdown_timeout();
        let started = Instant::now();
        let pid = self.pid.swap(0, Ordering::AcqRel);
        let signalled = pid != 0 && send_terminate(&self.spec.path, pid);

        let Ok(mut slot) = tokio::time::timeout(grace, self.slot.write()).await else {
            warn!(
                plugin = %self.spec.path.display(),
                grace_secs = grace.as_secs(),
                "Calls still in flight at shutdown, killing plugin"
            );
            return self.force_kill(pid).await;
        };
        let previous = std::mem::replace(&mut *slot, Slot::Closed);
        drop(slot);

        let Slot::Running(Instance { child, caller, .. }) = previous else {
            return Ok(());
        };
        drop(caller);
        let remaining = grace.saturating_sub(started.elapsed());
        stop(&self.spec.path, child.into_inner(), remaining, signalled).await
    }

    /// Kill and reap the child without waiting for the calls that hold it.
    async fn force_kill(&self, pid: u32) -> PluginResult<()> {
        if let Ok(slot) = self.slot.try_read()
            && let Slot::Running(instance) = &*slot
            && let Ok(mut child) = instance.child.try_lock()
        {
            if child.try_wait()?.is_none() {
                child.kill().await?;
            }
            return Ok(());
        }
        if pid != 0 {
            send_kill(&self.spec.path, pid);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("path", &self.spec.path)
            .field("transport", &self.spec.transport)
            .field("pid", &self.pid())
            .field("restart_count", &self.restart_count())
            .finish_non_exhaustive()
    }
}

/// Run spawn + handshake + connect until it succeeds, fails fatally or runs
/// out of attempts.
async fn launch(spec: &LaunchSpec) -> PluginResult<Instance> {
    let policy = &spec.config.retry;
    let attempts = policy.attempts();
    let mut last_error = String::new();

    for attempt in 0..attempts {
        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            debug!(
                plugin = %spec.path.display(),
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Waiting before next start attempt"
            );
            tokio::time::sleep(delay).await;
        }

        match spawn_once(spec).await {
            Ok(instance) => {
                info!(
                    plugin = %spec.path.display(),
                    pid = ?instance.pid,
                    address = %instance.address,
                    transport = %spec.transport,
                    "Plugin started"
                );
                return Ok(instance);
            },
            Err(AttemptError::Fatal(e)) => return Err(e),
            Err(AttemptError::Retry(reason)) => {
                warn!(
                    plugin = %spec.path.display(),
                    attempt = attempt.saturating_add(1),
                    max_attempts = attempts,
                    reason = %reason,
                    "Plugin start attempt failed"
                );
                last_error = reason;
            },
        }
    }

    Err(PluginError::ConnectFailed {
        path: spec.path.clone(),
        attempts,
        reason: last_error,
    })
}

async fn spawn_once(spec: &LaunchSpec) -> Result<Instance, AttemptError> {
    let mut child = spec
        .command()
        .spawn()
        .map_err(|e| AttemptError::Retry(format!("failed to spawn: {e}")))?;

    if let Some(stderr) = child.stderr.take() {
        forward_stderr(spec.path.clone(), stderr);
    }
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AttemptError::Retry("plugin stdout was not captured".to_string()))?;
    let mut lines = BufReader::new(stdout).lines();

    let startup_timeout = spec.config.startup_timeout();
    let line = match tokio::time::timeout(startup_timeout, lines.next_line()).await {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => {
            let status = exit_status(&mut child).await;
            return Err(AttemptError::Retry(format!(
                "plugin exited before handshake: {status}"
            )));
        },
        Ok(Err(e)) => {
            return Err(AttemptError::Retry(format!("failed to read handshake: {e}")));
        },
        Err(_) => {
            return Err(AttemptError::Retry(format!(
                "no handshake within {}s",
                startup_timeout.as_secs()
            )));
        },
    };

    let handshake = parse_handshake(spec, &line).map_err(AttemptError::Fatal)?;
    debug!(plugin = %spec.path.display(), %handshake, "Received handshake");
    forward_stdout(spec.path.clone(), lines);

    let caller = glue_wire::connect(handshake.transport, handshake.address)
        .await
        .map_err(|e| {
            AttemptError::Retry(format!("failed to connect to {}: {e}", handshake.address))
        })?;

    Ok(Instance {
        pid: child.id(),
        child: Mutex::new(child),
        caller,
        address: handshake.address,
    })
}

fn parse_handshake(spec: &LaunchSpec, line: &str) -> PluginResult<Handshake> {
    let failed = |reason: String| PluginError::HandshakeFailed {
        path: spec.path.clone(),
        reason,
    };

    let handshake = Handshake::parse(line).map_err(|e| failed(e.to_string()))?;
    handshake
        .verify(&spec.handshake)
        .map_err(|e| failed(e.to_string()))?;
    if handshake.transport != spec.transport {
        return Err(failed(format!(
            "requested transport {} but plugin serves {}",
            spec.transport, handshake.transport
        )));
    }
    Ok(handshake)
}

async fn exit_status(child: &mut Child) -> String {
    match tokio::time::timeout(EXIT_STATUS_WAIT, child.wait()).await {
        Ok(Ok(status)) => status.to_string(),
        Ok(Err(e)) => format!("unknown ({e})"),
        Err(_) => "stdout closed".to_string(),
    }
}

fn forward_stdout(path: PathBuf, mut lines: Lines<BufReader<ChildStdout>>) {
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(plugin = %path.display(), "{line}");
        }
    });
}

fn forward_stderr(path: PathBuf, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            warn!(plugin = %path.display(), "{line}");
        }
    });
}

/// Wait for `child` to exit, killing it once `grace` is over. Sends SIGTERM
/// first unless the caller already did.
async fn stop(path: &Path, mut child: Child, grace: Duration, signalled: bool) -> PluginResult<()> {
    if let Some(status) = child.try_wait()? {
        debug!(plugin = %path.display(), %status, "Plugin already exited");
        return Ok(());
    }

    if !signalled && !child.id().is_some_and(|pid| send_terminate(path, pid)) {
        let _ = child.start_kill();
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            log_shutdown(path, status?);
            Ok(())
        },
        Err(_) => {
            warn!(
                plugin = %path.display(),
                grace_secs = grace.as_secs(),
                "Plugin did not stop in time, killing"
            );
            child.kill().await?;
            Ok(())
        },
    }
}

fn log_shutdown(path: &Path, status: ExitStatus) {
    if status.success() {
        info!(plugin = %path.display(), "Plugin stopped");
    } else {
        warn!(plugin = %path.display(), %status, "Plugin stopped with failure status");
    }
}

#[cfg(unix)]
fn send_signal(path: &Path, pid: u32, signal: nix::sys::signal::Signal) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), signal) {
        Ok(()) => true,
        Err(e) => {
            debug!(plugin = %path.display(), pid, ?signal, error = %e, "Failed to signal plugin");
            false
        },
    }
}

#[cfg(unix)]
fn send_terminate(path: &Path, pid: u32) -> bool {
    send_signal(path, pid, nix::sys::signal::Signal::SIGTERM)
}

#[cfg(unix)]
fn send_kill(path: &Path, pid: u32) -> bool {
    send_signal(path, pid, nix::sys::signal::Signal::SIGKILL)
}

// Without signals the child is stopped through its handle, or dropped
// (`kill_on_drop`) with the supervisor.
#[cfg(not(unix))]
fn send_terminate(_path: &Path, _pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
fn send_kill(_path: &Path, _pid: u32) -> bool {
    false
}
