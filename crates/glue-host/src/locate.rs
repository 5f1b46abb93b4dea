//! Finding plugin artifacts and Python interpreters.

use std::path::{Path, PathBuf};

use glue_core::{PluginError, PluginResult};
use tracing::debug;

/// Artifact names searched for, in order of preference.
pub const PLUGIN_FILE_NAMES: [&str; 3] = ["debugtalk.bin", "debugtalk.py", "debugtalk.so"];

/// Resolves a user-supplied path to a plugin artifact.
pub trait PluginLocator: Send + Sync {
    /// Find the plugin file for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::PluginNotFound`] if there is none.
    fn locate(&self, path: &Path) -> PluginResult<PathBuf>;
}

/// Searches a directory and each of its parents for [`PLUGIN_FILE_NAMES`].
///
/// A path naming an existing file other than a directory is returned as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLocator;

impl PluginLocator for FileLocator {
    fn locate(&self, path: &Path) -> PluginResult<PathBuf> {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }

        let start = std::path::absolute(path)?;
        for dir in start.ancestors() {
            for name in PLUGIN_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    debug!(plugin = %candidate.display(), "Located plugin");
                    return Ok(candidate);
                }
            }
        }

        Err(PluginError::PluginNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Supplies the interpreter used to run `.py` plugins.
///
/// Virtual environment provisioning is left to implementors.
pub trait PythonRuntime: Send + Sync {
    /// Path of a `python3` executable.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::PythonNotSpecified`] if no interpreter is
    /// available.
    fn python(&self) -> PluginResult<PathBuf>;
}

/// A known interpreter path.
#[derive(Debug, Clone)]
pub struct FixedPython(pub PathBuf);

impl PythonRuntime for FixedPython {
    fn python(&self) -> PluginResult<PathBuf> {
        Ok(self.0.clone())
    }
}

/// `python3` from `$PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPython;

impl PythonRuntime for SystemPython {
    fn python(&self) -> PluginResult<PathBuf> {
        which::which("python3").map_err(|e| {
            debug!(error = %e, "python3 not found on PATH");
            PluginError::PythonNotSpecified
        })
    }
}
