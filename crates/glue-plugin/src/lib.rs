//! Plugin-side bootstrap for glue plugins.
//!
//! A plugin binary builds a [`FunctionRegistry`] and hands it to [`serve`]:
//!
//! ```rust,no_run
//! use glue_core::FunctionRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), glue_core::PluginError> {
//!     let mut registry = FunctionRegistry::new();
//!     registry.register("sum_two_int", |a: i64, b: i64| a + b);
//!     glue_plugin::serve(registry).await
//! }
//! ```
//!
//! [`serve`] refuses to run unless the host's magic cookie is present, picks
//! the transport from `GLUE_PLUGIN_TYPE`, prints the handshake line and
//! serves until SIGTERM.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod server;

pub use server::{PluginServer, RunningServer};

use glue_core::handshake::PLUGIN_LOG_ENV;
use glue_core::{FunctionRegistry, HandshakeConfig, PluginError, PluginResult};
use glue_telemetry::{LogConfig, setup_logging};
use tracing::info;

/// Message shown when the binary is started by hand.
pub const NOT_LAUNCHED_BY_HOST: &str = "This binary is a plugin. These are not meant to be \
    executed directly. Please load it through a glue host, which will run it for you.";

/// Run the plugin process: check the cookie, serve `registry`, exit on
/// SIGTERM.
///
/// Logging goes to stderr and is enabled only when `GLUE_PLUGIN_LOG` holds a
/// filter such as `debug`.
///
/// # Errors
///
/// Returns [`PluginError::Config`] when the magic cookie is missing, or an
/// error if the server cannot be started.
pub async fn serve(registry: FunctionRegistry) -> PluginResult<()> {
    let handshake = HandshakeConfig::default();
    if !handshake.cookie_present() {
        return Err(PluginError::Config(NOT_LAUNCHED_BY_HOST.to_string()));
    }

    if let Ok(filter) = std::env::var(PLUGIN_LOG_ENV) {
        // A subscriber installed by the plugin author takes precedence.
        let _ = setup_logging(&LogConfig::for_plugin(filter));
    }

    let running = PluginServer::new(registry)
        .with_handshake(handshake)
        .start()
        .await?;
    info!(handshake = %running.handshake(), "Plugin ready");
    running.announce()?;
    running.serve().await
}
