//! Plugin side of the schema RPC transport.

use std::net::SocketAddr;
use std::sync::Arc;

use glue_core::{CallEnvelope, CallError, FunctionRegistry, Value};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::types::error::INVALID_PARAMS_CODE;
use tracing::info;

use super::{CALL_ERROR_CODE, CallRequest, CallResponse, FunctionServiceServer, NamesResponse};
use crate::dispatch::dispatch_call;
use crate::error::{WireError, WireResult};

/// The jsonrpsee method handler backed by a [`FunctionRegistry`].
#[derive(Debug, Clone)]
pub struct FunctionServer {
    registry: Arc<FunctionRegistry>,
}

impl FunctionServer {
    /// Create a handler for `registry`.
    #[must_use]
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }
}

fn call_error(err: &CallError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(CALL_ERROR_CODE, err.to_string(), Some(err))
}

fn invalid_params(message: String) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(INVALID_PARAMS_CODE, message, None::<()>)
}

#[jsonrpsee::core::async_trait]
impl FunctionServiceServer for FunctionServer {
    async fn get_names(&self) -> Result<NamesResponse, ErrorObjectOwned> {
        Ok(NamesResponse {
            names: self.registry.names(),
        })
    }

    async fn call(&self, request: CallRequest) -> Result<CallResponse, ErrorObjectOwned> {
        let args: Vec<Value> = serde_json::from_slice(&request.args)
            .map_err(|e| invalid_params(format!("invalid argument payload: {e}")))?;

        let value = dispatch_call(&self.registry, CallEnvelope::new(request.name, args))
            .await
            .map_err(|e| call_error(&e))?;

        let value = serde_json::to_vec(&value)
            .map_err(|e| call_error(&CallError::failed(format!("failed to encode result: {e}"))))?;
        Ok(CallResponse { value })
    }
}

/// Bind the schema RPC server on `addr` and start serving `registry`.
///
/// Returns the bound address and the handle that keeps the server alive.
///
/// # Errors
///
/// Returns [`WireError::JsonRpc`] if the server cannot be bound.
pub async fn start_grpc_server(
    addr: SocketAddr,
    registry: Arc<FunctionRegistry>,
) -> WireResult<(SocketAddr, ServerHandle)> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| WireError::JsonRpc(format!("failed to bind server: {e}")))?;

    let local_addr = server.local_addr()?;
    let handle = server.start(FunctionServer::new(registry).into_rpc());
    info!(address = %local_addr, "Serving schema RPC");

    Ok((local_addr, handle))
}
