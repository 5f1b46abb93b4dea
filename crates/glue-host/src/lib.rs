//! Host side of glue plugins.
//!
//! Loads plugin artifacts, runs them as supervised child processes and
//! forwards calls over the negotiated transport:
//!
//! ```rust,no_run
//! use glue_host::{LoadOptions, Plugin, load};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), glue_core::PluginError> {
//! let plugin = load("plugin/debugtalk.bin", &LoadOptions::default()).await?;
//! if plugin.has("sum_ints").await {
//!     let total = plugin.call("sum_ints", vec![json!(1), json!(2), json!(3)]).await?;
//!     assert_eq!(total, json!(6));
//! }
//! plugin.quit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! A crashed plugin is restarted by a liveness task; callers arriving during
//! the restart wait for the new process.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod config;
pub mod in_process;
pub mod load;
pub mod locate;
pub mod plugin;
pub mod prelude;
pub mod process_plugin;
pub mod supervisor;

pub use cache::{FunctionCache, FunctionPresence};
pub use config::{LoadOptions, RetryPolicy, SupervisorConfig};
pub use in_process::InProcessPlugin;
pub use load::{discover, load};
pub use locate::{FileLocator, FixedPython, PluginLocator, PythonRuntime, SystemPython};
pub use plugin::{Plugin, PluginKind};
pub use process_plugin::ProcessPlugin;
pub use supervisor::{LaunchSpec, Supervisor};
