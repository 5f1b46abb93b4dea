//! End-to-end tests against the Python SDK. Skipped without `python3`.

mod common;

use common::{PluginFixture, assert_debugtalk, options};
use glue_core::{CallError, PluginError, TransportKind};
use glue_host::{FileLocator, FixedPython, LoadOptions, PluginKind, discover, load};
use serde_json::json;

#[tokio::test]
async fn test_python_plugin() {
    let Some((fixture, python)) = PluginFixture::python() else {
        eprintln!("python3 not found, skipping");
        return;
    };

    let plugin = load(&fixture.path, &options(TransportKind::Grpc).with_python(python))
        .await
        .unwrap();
    assert_eq!(plugin.kind(), PluginKind::PythonGrpc);

    assert_debugtalk(plugin.as_ref()).await;

    let err = plugin.call("sum_two_int", vec![json!(1)]).await.unwrap_err();
    assert!(matches!(err, PluginError::Call(CallError::Failed { .. })), "{err}");

    plugin.quit().await.unwrap();
}

#[tokio::test]
async fn test_python_unencodable_result_is_call_error() {
    let Some((fixture, python)) = PluginFixture::python() else {
        eprintln!("python3 not found, skipping");
        return;
    };

    let plugin = load(&fixture.path, &options(TransportKind::Grpc).with_python(python))
        .await
        .unwrap();

    let err = plugin.call("unencodable", vec![]).await.unwrap_err();
    assert!(
        matches!(err, PluginError::Call(CallError::Failed { ref message }) if message.contains("not JSON serializable")),
        "{err}"
    );
    // the server keeps answering after a failed encode
    assert_eq!(
        plugin.call("sum_two_int", vec![json!(1), json!(2)]).await.unwrap(),
        json!(3)
    );

    plugin.quit().await.unwrap();
}

#[tokio::test]
async fn test_python_plugin_is_discovered() {
    let Some((fixture, python)) = PluginFixture::python() else {
        eprintln!("python3 not found, skipping");
        return;
    };

    let plugin = discover(
        fixture.dir(),
        &FileLocator,
        &FixedPython(python),
        &LoadOptions::default().with_supervisor(common::fast_supervisor()),
    )
    .await
    .unwrap();
    assert_eq!(plugin.path(), fixture.path.as_path());
    assert!(plugin.has("sum_two_string").await);
    plugin.quit().await.unwrap();
}

#[tokio::test]
async fn test_python_without_interpreter() {
    let Some((fixture, _python)) = PluginFixture::python() else {
        return;
    };
    let err = load(&fixture.path, &LoadOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "python3 not specified");
}
