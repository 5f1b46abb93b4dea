//! Choosing a loader for a plugin artifact.

use std::ffi::OsStr;
use std::path::Path;

use glue_core::{PluginError, PluginResult};
use tracing::info;

use crate::config::LoadOptions;
use crate::locate::{PluginLocator, PythonRuntime};
use crate::plugin::{Plugin, PluginKind};
use crate::process_plugin::ProcessPlugin;
use crate::supervisor::LaunchSpec;

/// Load the plugin at `path`, dispatching on its extension.
///
/// - `.bin`: native executable, transport from `options` or the
///   environment
/// - `.py`: Python script run with `options.python`, schema RPC
///
/// Shared libraries (`.so`) cannot be loaded; wrap an in-process
/// [`FunctionRegistry`](glue_core::FunctionRegistry) in an
/// [`InProcessPlugin`](crate::InProcessPlugin) instead.
///
/// # Errors
///
/// - [`PluginError::PluginNotFound`] if `path` is not a file
/// - [`PluginError::PythonNotSpecified`] for a `.py` plugin without an
///   interpreter
/// - [`PluginError::UnsupportedPluginType`] for any other extension
/// - any start error of the plugin process
pub async fn load(path: impl AsRef<Path>, options: &LoadOptions) -> PluginResult<Box<dyn Plugin>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PluginError::PluginNotFound {
            path: path.to_path_buf(),
        });
    }
    let path = std::path::absolute(path)?;

    let extension = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    let (kind, spec) = match extension {
        "bin" => {
            let transport = options.effective_transport();
            (PluginKind::native(transport), LaunchSpec::native(&path, transport))
        },
        "py" => {
            let python = options.python.clone().ok_or(PluginError::PythonNotSpecified)?;
            (PluginKind::PythonGrpc, LaunchSpec::script(python, &path))
        },
        other => {
            return Err(PluginError::UnsupportedPluginType {
                extension: other.to_string(),
            });
        },
    };

    info!(plugin = %path.display(), %kind, "Loading plugin");
    let spec = spec
        .with_env(options.env.clone())
        .with_config(options.supervisor.clone());
    let plugin = ProcessPlugin::start(kind, spec).await?;
    Ok(Box::new(plugin))
}

/// Locate the plugin for `base` and load it.
///
/// A `.py` plugin without a configured interpreter gets one from `python`.
///
/// # Errors
///
/// Returns the locator's error or any error of [`load`].
pub async fn discover(
    base: impl AsRef<Path>,
    locator: &dyn PluginLocator,
    python: &dyn PythonRuntime,
    options: &LoadOptions,
) -> PluginResult<Box<dyn Plugin>> {
    let path = locator.locate(base.as_ref())?;

    let is_python = path.extension().is_some_and(|ext| ext == "py");
    if is_python && options.python.is_none() {
        let options = options.clone().with_python(python.python()?);
        return load(&path, &options).await;
    }
    load(&path, options).await
}
