//! The `debugtalk` demo plugin.
//!
//! Must be started by a glue host, which provides the magic cookie and picks
//! the transport through `GLUE_PLUGIN_TYPE`.

use glue_integration_tests::debugtalk_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    glue_plugin::serve(debugtalk_registry()).await?;
    Ok(())
}
