//! Shared fixtures for the end-to-end tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use glue_core::{CallError, PluginError, TransportKind, Value};
use glue_host::{LoadOptions, Plugin, RetryPolicy, SupervisorConfig};
use serde_json::json;
use tempfile::TempDir;

/// A plugin artifact copied into its own temporary directory.
///
/// The directory is removed when the fixture is dropped.
pub struct PluginFixture {
    /// Path of the copied artifact.
    pub path: PathBuf,
    dir: TempDir,
}

impl PluginFixture {
    /// The `debugtalk` binary, installed as `debugtalk.bin`.
    pub fn native() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debugtalk.bin");
        std::fs::copy(env!("CARGO_BIN_EXE_debugtalk"), &path).unwrap();
        Self { path, dir }
    }

    /// The sample Python plugin and its SDK, or `None` without `python3`.
    pub fn python() -> Option<(Self, PathBuf)> {
        let python = which::which("python3").ok()?;
        let dir = tempfile::tempdir().unwrap();
        for file in ["glue_plugin.py", "debugtalk.py"] {
            std::fs::copy(sdk_dir().join(file), dir.path().join(file)).unwrap();
        }
        let path = dir.path().join("debugtalk.py");
        Some((Self { path, dir }, python))
    }

    /// Directory holding the artifact.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

fn sdk_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../sdk/python")
}

/// Supervisor timing suited to tests: quick retries, one-second heartbeat.
pub fn fast_supervisor() -> SupervisorConfig {
    SupervisorConfig::default()
        .with_heartbeat_interval_secs(1)
        .with_shutdown_timeout_secs(5)
        .with_retry(RetryPolicy {
            max_attempts: 3,
            backoff_unit_ms: 50,
        })
}

/// Load options for `transport` with [`fast_supervisor`] timing.
pub fn options(transport: TransportKind) -> LoadOptions {
    LoadOptions::default()
        .with_transport(transport)
        .with_supervisor(fast_supervisor())
}

/// Call and unwrap.
pub async fn call(plugin: &dyn Plugin, name: &str, args: Vec<Value>) -> Value {
    match plugin.call(name, args).await {
        Ok(value) => value,
        Err(e) => panic!("{name} failed: {e}"),
    }
}

/// The behavior every `debugtalk` plugin must show, whatever its kind.
pub async fn assert_debugtalk(plugin: &dyn Plugin) {
    assert!(plugin.has("sum_ints").await);
    assert!(plugin.has("concatenate").await);
    assert!(!plugin.has("missing_fn").await);

    assert_eq!(
        call(plugin, "sum_ints", vec![json!(1), json!(2), json!(3), json!(4)]).await,
        json!(10)
    );
    assert_eq!(call(plugin, "sum_two_int", vec![json!(1), json!(2)]).await, json!(3));
    assert_eq!(
        call(plugin, "sum", vec![json!(1), json!(2), json!(3.4), json!(5)]).await,
        json!(11.4)
    );
    assert_eq!(
        call(plugin, "sum_two_string", vec![json!("a"), json!("b")]).await,
        json!("ab")
    );
    assert_eq!(
        call(plugin, "sum_strings", vec![json!("a"), json!("b"), json!("c")]).await,
        json!("abc")
    );
    assert_eq!(
        call(plugin, "concatenate", vec![json!("a"), json!(2), json!("c"), json!(3.4)]).await,
        json!("a2c3.4")
    );
    assert_eq!(
        call(plugin, "setup_hook_example", vec![json!("x")]).await,
        json!("setup_hook_example: x")
    );

    let err = plugin.call("missing_fn", vec![]).await.unwrap_err();
    assert!(
        matches!(err, PluginError::Call(CallError::FunctionNotFound { ref name }) if name == "missing_fn"),
        "{err}"
    );
}
