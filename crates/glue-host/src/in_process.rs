//! Plugins whose functions live in the host process.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use glue_core::{FunctionRegistry, PluginError, PluginResult, Value};
use tracing::debug;

use crate::plugin::{Plugin, PluginKind};

/// A [`FunctionRegistry`] in the host's address space behind the
/// [`Plugin`] contract.
#[derive(Debug)]
pub struct InProcessPlugin {
    path: PathBuf,
    registry: FunctionRegistry,
    closed: AtomicBool,
}

impl InProcessPlugin {
    /// Wrap `registry`. `path` only identifies the plugin.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, registry: FunctionRegistry) -> Self {
        Self {
            path: path.into(),
            registry,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> PluginResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PluginError::Closed {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for InProcessPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::InProcess
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn has(&self, name: &str) -> bool {
        self.ensure_open().is_ok() && self.registry.contains(name)
    }

    async fn call(&self, name: &str, args: Vec<Value>) -> PluginResult<Value> {
        self.ensure_open()?;
        Ok(self.registry.invoke(name, args)?)
    }

    async fn quit(&self) -> PluginResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(plugin = %self.path.display(), "In-process plugin closed");
        }
        Ok(())
    }
}
