//! Host side of the schema RPC transport.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use glue_core::{CallError, FunctionCaller, PluginError, PluginResult, Value};
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use tracing::debug;

use super::{CALL_ERROR_CODE, CallRequest, FunctionServiceClient};
use crate::error::{WireError, WireResult};

/// Per-request ceiling. Calls have no timeout of their own; this only keeps
/// the HTTP client from applying its short default.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Client for a plugin's schema RPC server.
#[derive(Debug)]
pub struct GrpcClient {
    address: SocketAddr,
    client: HttpClient,
}

impl GrpcClient {
    /// Connect to the plugin at `address` and check that it answers.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] if the client cannot be built or the plugin
    /// does not answer `getNames`.
    pub async fn connect(address: SocketAddr) -> WireResult<Self> {
        let url = format!("http://{address}");
        let client = HttpClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(&url)
            .map_err(|e| WireError::JsonRpc(format!("failed to build client for {url}: {e}")))?;

        let names = client.get_names().await.map_err(transport_error)?;
        debug!(%address, functions = names.names.len(), "Connected schema RPC client");

        Ok(Self { address, client })
    }

    /// Address of the plugin server.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

fn transport_error(e: ClientError) -> WireError {
    match e {
        ClientError::Transport(inner) => WireError::JsonRpc(format!("transport: {inner}")),
        ClientError::ParseError(inner) => WireError::Decode(inner.to_string()),
        other => WireError::JsonRpc(other.to_string()),
    }
}

/// Split a client error into a remote function error or a transport error.
fn into_plugin_error(e: ClientError) -> PluginError {
    if let ClientError::Call(obj) = &e {
        if obj.code() == CALL_ERROR_CODE {
            let err = obj
                .data()
                .and_then(|raw| serde_json::from_str::<CallError>(raw.get()).ok())
                .unwrap_or_else(|| CallError::failed(obj.message()));
            return err.into();
        }
    }
    transport_error(e).into()
}

#[async_trait]
impl FunctionCaller for GrpcClient {
    async fn get_names(&self) -> PluginResult<Vec<String>> {
        let response = self.client.get_names().await.map_err(into_plugin_error)?;
        Ok(response.names)
    }

    async fn call(&self, name: &str, args: Vec<Value>) -> PluginResult<Value> {
        let request = CallRequest {
            name: name.to_string(),
            args: serde_json::to_vec(&args)?,
        };
        let response = FunctionServiceClient::call(&self.client, request)
            .await
            .map_err(into_plugin_error)?;
        Ok(serde_json::from_slice(&response.value)?)
    }
}
