//! Plugins running in a supervised child process.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use glue_core::{PluginResult, Value};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, warn};

use crate::cache::FunctionCache;
use crate::plugin::{Plugin, PluginKind};
use crate::supervisor::{LaunchSpec, Supervisor};

/// A plugin process with a function existence cache and a liveness task
/// that restarts it when it dies.
pub struct ProcessPlugin {
    kind: PluginKind,
    supervisor: Arc<Supervisor>,
    liveness: JoinHandle<()>,
}

impl ProcessPlugin {
    /// Start the plugin described by `spec` and begin monitoring it.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the supervisor's start error.
    pub async fn start(kind: PluginKind, spec: LaunchSpec) -> PluginResult<Self> {
        let supervisor = Arc::new(Supervisor::start(spec).await?);
        let liveness = spawn_liveness(Arc::clone(&supervisor));
        Ok(Self {
            kind,
            supervisor,
            liveness,
        })
    }

    /// The underlying supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// The function existence cache.
    #[must_use]
    pub fn cache(&self) -> &FunctionCache {
        self.supervisor.cache()
    }

    /// Number of times the plugin process was restarted.
    #[must_use]
    pub fn restart_count(&self) -> u32 {
        self.supervisor.restart_count()
    }

    /// Run one liveness check now, restarting the plugin if it died.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::RestartExhausted`](glue_core::PluginError::RestartExhausted)
    /// if the restart failed.
    pub async fn check_liveness(&self) -> PluginResult<bool> {
        self.supervisor.check_liveness().await
    }
}

fn spawn_liveness(supervisor: Arc<Supervisor>) -> JoinHandle<()> {
    let period = supervisor.config().heartbeat_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = supervisor.check_liveness().await {
                error!(
                    plugin = %supervisor.path().display(),
                    error = %e,
                    "Liveness monitoring stopped"
                );
                break;
            }
        }
    })
}

#[async_trait]
impl Plugin for ProcessPlugin {
    fn kind(&self) -> PluginKind {
        self.kind
    }

    fn path(&self) -> &Path {
        self.supervisor.path()
    }

    async fn has(&self, name: &str) -> bool {
        match self.supervisor.has(name).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    plugin = %self.path().display(),
                    function = name,
                    error = %e,
                    "Failed to list plugin functions"
                );
                false
            },
        }
    }

    async fn call(&self, name: &str, args: Vec<Value>) -> PluginResult<Value> {
        self.supervisor.call(name, args).await
    }

    async fn quit(&self) -> PluginResult<()> {
        self.liveness.abort();
        self.supervisor.quit().await
    }
}

impl Drop for ProcessPlugin {
    fn drop(&mut self) {
        self.liveness.abort();
    }
}

impl std::fmt::Debug for ProcessPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessPlugin")
            .field("kind", &self.kind)
            .field("supervisor", &self.supervisor)
            .field("cached", &self.supervisor.cache().len())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use super::*;
    use crate::cache::FunctionPresence;
    use crate::config::{RetryPolicy, SupervisorConfig};
    use glue_core::{FunctionRegistry, TransportKind};
    use jsonrpsee::server::ServerHandle;
    use serde_json::json;

    async fn backend() -> (SocketAddr, ServerHandle) {
        let mut registry = FunctionRegistry::new();
        registry.register("sum_two_int", |a: i64, b: i64| a + b);
        glue_wire::start_grpc_server("127.0.0.1:0".parse().unwrap(), Arc::new(registry))
            .await
            .unwrap()
    }

    async fn start(dir: &Path, addr: SocketAddr, heartbeat_secs: u64) -> ProcessPlugin {
        let path = dir.join("plugin.sh");
        std::fs::write(
            &path,
            format!("echo '1|GLUE_PLUGIN_MAGIC_COOKIE=debugtalk|tcp|{addr}|grpc'\nexec sleep 30\n"),
        )
        .unwrap();
        let config = SupervisorConfig::default()
            .with_heartbeat_interval_secs(heartbeat_secs)
            .with_shutdown_timeout_secs(2)
            .with_retry(RetryPolicy {
                max_attempts: 3,
                backoff_unit_ms: 1,
            });
        let spec = LaunchSpec::script("/bin/sh", path).with_config(config);
        ProcessPlugin::start(PluginKind::PythonGrpc, spec).await.unwrap()
    }

    /// A backend whose `hang` function blocks until the returned sender is
    /// used or dropped.
    async fn hanging_backend() -> (SocketAddr, ServerHandle, std::sync::mpsc::Sender<()>) {
        let (release, hold) = std::sync::mpsc::channel::<()>();
        let hold = std::sync::Mutex::new(hold);
        let mut registry = FunctionRegistry::new();
        registry.register("hang", move || -> bool {
            hold.lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(30))
                .is_ok()
        });
        let (addr, handle) =
            glue_wire::start_grpc_server("127.0.0.1:0".parse().unwrap(), Arc::new(registry))
                .await
                .unwrap();
        (addr, handle, release)
    }

    fn is_alive(pid: u32) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(i32::try_from(pid).unwrap()), None)
            .is_ok()
    }

    fn kill(pid: u32) {
        nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(i32::try_from(pid).unwrap()),
            nix::sys::signal::Signal::SIGKILL,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_has_answers_from_cache() {
        let (addr, server) = backend().await;
        let dir = tempfile::tempdir().unwrap();
        let plugin = start(dir.path(), addr, 3600).await;

        assert!(plugin.has("sum_two_int").await);
        assert!(!plugin.has("missing_fn").await);
        assert_eq!(plugin.cache().get("sum_two_int"), FunctionPresence::Present);
        assert_eq!(plugin.cache().get("missing_fn"), FunctionPresence::Absent);

        // With the backend gone, only cached answers can still be right.
        server.stop().unwrap();
        server.stopped().await;
        assert!(plugin.has("sum_two_int").await);
        assert!(!plugin.has("missing_fn").await);

        // A failed lookup is not cached.
        assert!(!plugin.has("sumtwoint").await);
        assert_eq!(plugin.cache().get("sumtwoint"), FunctionPresence::Unknown);

        plugin.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_invalidates_cache() {
        let (addr, _server) = backend().await;
        let dir = tempfile::tempdir().unwrap();
        let plugin = start(dir.path(), addr, 3600).await;

        assert!(plugin.has("sum_two_int").await);
        assert!(!plugin.cache().is_empty());

        kill(plugin.supervisor().pid().unwrap());
        let mut restarted = false;
        for _ in 0..50 {
            if plugin.check_liveness().await.unwrap() {
                restarted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert!(restarted);
        assert!(plugin.cache().is_empty());
        assert_eq!(plugin.restart_count(), 1);
        assert_eq!(
            plugin.call("sum_two_int", vec![json!(1), json!(2)]).await.unwrap(),
            json!(3)
        );
        plugin.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_liveness_task_restarts_crashed_plugin() {
        let (addr, _server) = backend().await;
        let dir = tempfile::tempdir().unwrap();
        let plugin = start(dir.path(), addr, 1).await;
        assert_eq!(plugin.kind().transport(), Some(TransportKind::Grpc));

        kill(plugin.supervisor().pid().unwrap());
        for _ in 0..100 {
            if plugin.restart_count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(plugin.restart_count(), 1);
        assert_eq!(
            plugin.call("sum_two_int", vec![json!(2), json!(3)]).await.unwrap(),
            json!(5)
        );
        plugin.quit().await.unwrap();
        plugin.quit().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_quit_is_not_blocked_by_hung_call() {
        let (addr, _server, release) = hanging_backend().await;
        let dir = tempfile::tempdir().unwrap();
        let plugin = Arc::new(start(dir.path(), addr, 3600).await);
        let pid = plugin.supervisor().pid().unwrap();

        let in_flight = {
            let plugin = Arc::clone(&plugin);
            tokio::spawn(async move { plugin.call("hang", vec![]).await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!in_flight.is_finished());

        // Grace period is 2s.
        let started = std::time::Instant::now();
        tokio::time::timeout(Duration::from_secs(4), plugin.quit())
            .await
            .expect("quit waited for the in-flight call")
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));

        let mut stopped = false;
        for _ in 0..20 {
            if !is_alive(pid) {
                stopped = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(stopped, "plugin process still running after quit");
        assert!(plugin.supervisor().pid().is_none());
        assert!(matches!(
            plugin.call("hang", vec![]).await.unwrap_err(),
            glue_core::PluginError::Closed { .. }
        ));

        release.send(()).unwrap();
        let _ = in_flight.await.unwrap();
    }

    #[tokio::test]
    async fn test_has_after_crash_answers_for_new_process() {
        let (addr, _server) = backend().await;
        let dir = tempfile::tempdir().unwrap();
        let plugin = start(dir.path(), addr, 3600).await;
        assert!(!plugin.has("missing_fn").await);

        kill(plugin.supervisor().pid().unwrap());
        let mut restarted = false;
        for _ in 0..50 {
            if plugin.check_liveness().await.unwrap() {
                restarted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(restarted);

        // The stale negative answer went with the old process.
        assert_eq!(plugin.cache().get("missing_fn"), FunctionPresence::Unknown);
        assert!(plugin.has("sum_two_int").await);
        assert_eq!(plugin.cache().len(), 1);
        plugin.quit().await.unwrap();
    }
}
