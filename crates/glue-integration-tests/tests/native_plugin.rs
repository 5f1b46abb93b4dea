//! End-to-end tests against the `debugtalk` binary over both transports.

mod common;

use common::{PluginFixture, assert_debugtalk, call, options};
use glue_core::{CallError, PluginError, TransportKind};
use glue_host::{InProcessPlugin, Plugin, PluginKind, load};
use glue_integration_tests::{ALWAYS_FAILS_MESSAGE, debugtalk_registry};
use serde_json::json;

async fn load_native(fixture: &PluginFixture, transport: TransportKind) -> Box<dyn Plugin> {
    load(&fixture.path, &options(transport)).await.unwrap()
}

#[tokio::test]
async fn test_grpc_plugin() {
    let fixture = PluginFixture::native();
    let plugin = load_native(&fixture, TransportKind::Grpc).await;
    assert_eq!(plugin.kind(), PluginKind::NativeGrpc);

    assert_debugtalk(plugin.as_ref()).await;
    plugin.quit().await.unwrap();
}

#[tokio::test]
async fn test_rpc_plugin() {
    let fixture = PluginFixture::native();
    let plugin = load_native(&fixture, TransportKind::Rpc).await;
    assert_eq!(plugin.kind(), PluginKind::NativeRpc);

    assert_debugtalk(plugin.as_ref()).await;
    plugin.quit().await.unwrap();
}

#[tokio::test]
async fn test_in_process_plugin() {
    let plugin = InProcessPlugin::new("debugtalk", debugtalk_registry());
    assert_debugtalk(&plugin).await;
    plugin.quit().await.unwrap();
}

#[tokio::test]
async fn test_function_errors_are_call_errors() {
    let fixture = PluginFixture::native();
    for transport in [TransportKind::Grpc, TransportKind::Rpc] {
        let plugin = load_native(&fixture, transport).await;

        let err = plugin.call("always_fails", vec![]).await.unwrap_err();
        assert!(
            matches!(err, PluginError::Call(CallError::Failed { ref message }) if message == ALWAYS_FAILS_MESSAGE),
            "{transport}: {err}"
        );

        let err = plugin.call("sum_two_int", vec![json!(1)]).await.unwrap_err();
        assert!(matches!(
            err,
            PluginError::Call(CallError::ArityMismatch { expected: 2, got: 1 })
        ));

        let err = plugin
            .call("sum_two_int", vec![json!("one"), json!(2)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PluginError::Call(CallError::TypeMismatch { index: 0, .. })
        ));

        // The plugin survives function errors.
        assert_eq!(
            call(plugin.as_ref(), "sum_two_int", vec![json!(2), json!(2)]).await,
            json!(4)
        );
        plugin.quit().await.unwrap();
    }
}

#[tokio::test]
async fn test_aliases_and_nulls() {
    let fixture = PluginFixture::native();
    let plugin = load_native(&fixture, TransportKind::Grpc).await;

    assert!(plugin.has("sumints").await);
    assert_eq!(
        call(plugin.as_ref(), "sumtwoint", vec![json!(5), json!(null)]).await,
        json!(5)
    );
    assert_eq!(
        call(plugin.as_ref(), "get_user_agent", vec![]).await,
        json!(format!("glue/{}", env!("CARGO_PKG_VERSION")))
    );
    plugin.quit().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_calls() {
    let fixture = PluginFixture::native();
    let plugin: std::sync::Arc<dyn Plugin> =
        load_native(&fixture, TransportKind::Rpc).await.into();

    let mut handles = Vec::new();
    for i in 0..16i64 {
        let plugin = std::sync::Arc::clone(&plugin);
        handles.push(tokio::spawn(async move {
            let has = plugin.has("sum_two_int").await;
            let value = plugin.call("sum_two_int", vec![json!(i), json!(1)]).await;
            (i, has, value)
        }));
    }
    for handle in handles {
        let (i, has, value) = handle.await.unwrap();
        assert!(has);
        assert_eq!(value.unwrap(), json!(i + 1));
    }
    plugin.quit().await.unwrap();
}

#[tokio::test]
async fn test_quit_is_idempotent() {
    let fixture = PluginFixture::native();
    let plugin = load_native(&fixture, TransportKind::Grpc).await;

    plugin.quit().await.unwrap();
    plugin.quit().await.unwrap();

    let err = plugin.call("sum_ints", vec![]).await.unwrap_err();
    assert!(matches!(err, PluginError::Closed { .. }));
    assert!(!plugin.has("sum_ints").await);
}
