//! The plugin binary's startup contract, driven without a host.

use std::process::Stdio;
use std::time::Duration;

use glue_core::handshake::{MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE, PLUGIN_TYPE_ENV};
use glue_core::{FunctionCaller, Handshake, HandshakeConfig, TransportKind};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

const BINARY: &str = env!("CARGO_BIN_EXE_debugtalk");

#[tokio::test]
async fn test_refuses_to_run_without_cookie() {
    let output = Command::new(BINARY)
        .env_remove(MAGIC_COOKIE_KEY)
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("This binary is a plugin"), "{stderr}");
    assert!(output.stdout.is_empty());
}

async fn announce(transport: Option<&str>) -> Handshake {
    let mut cmd = Command::new(BINARY);
    cmd.env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
        .env_remove(PLUGIN_TYPE_ENV)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    if let Some(transport) = transport {
        cmd.env(PLUGIN_TYPE_ENV, transport);
    }
    let mut child = cmd.spawn().unwrap();

    let stdout = child.stdout.take().unwrap();
    let line = tokio::time::timeout(Duration::from_secs(10), BufReader::new(stdout).lines().next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let handshake = Handshake::parse(&line).unwrap();
    handshake.verify(&HandshakeConfig::default()).unwrap();

    // The announced server answers before the process goes away.
    let caller = glue_wire::connect(handshake.transport, handshake.address)
        .await
        .unwrap();
    assert!(caller.get_names().await.unwrap().contains(&"sum_ints".to_string()));

    child.kill().await.unwrap();
    handshake
}

#[tokio::test]
async fn test_handshake_defaults_to_grpc() {
    let handshake = announce(None).await;
    assert_eq!(handshake.transport, TransportKind::Grpc);
    assert_eq!(handshake.protocol_version, 1);
    assert_eq!(handshake.network, "tcp");
    assert!(handshake.address.ip().is_loopback());
}

#[tokio::test]
async fn test_handshake_honors_rpc() {
    assert_eq!(announce(Some("rpc")).await.transport, TransportKind::Rpc);
    assert_eq!(announce(Some("other")).await.transport, TransportKind::Grpc);
}
