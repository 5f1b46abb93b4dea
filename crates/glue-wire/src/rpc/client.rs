//! Host side of the lightweight RPC transport.

use std::net::SocketAddr;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use glue_core::{CallEnvelope, FunctionCaller, PluginResult, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::{
    FramedStream, RequestFrame, ResponseFrame, RpcRequest, RpcResponse, decode, encode, framed,
};
use crate::error::{WireError, WireResult};

struct Connection {
    stream: FramedStream,
    next_id: u64,
}

/// A single connection to a plugin's lightweight RPC server.
///
/// Round trips are serialized on the connection: one request is written and
/// its response read before the next request starts.
pub struct RpcClient {
    address: SocketAddr,
    connection: Mutex<Connection>,
}

impl RpcClient {
    /// Connect to a plugin listening on `address`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] if the TCP connection cannot be established.
    pub async fn connect(address: SocketAddr) -> WireResult<Self> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        debug!(%address, "Connected lightweight RPC client");

        Ok(Self {
            address,
            connection: Mutex::new(Connection {
                stream: framed(stream),
                next_id: 0,
            }),
        })
    }

    /// Address of the plugin server.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Send one request and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] if the connection fails or the response cannot
    /// be decoded.
    pub async fn round_trip(&self, request: RpcRequest) -> WireResult<RpcResponse> {
        let mut conn = self.connection.lock().await;
        let id = conn.next_id;
        conn.next_id = conn.next_id.wrapping_add(1);

        let frame = encode(&RequestFrame { id, request })?;
        conn.stream.send(frame).await?;

        loop {
            let bytes = conn
                .stream
                .next()
                .await
                .ok_or(WireError::ConnectionClosed)??;
            let response: ResponseFrame = decode(&bytes)?;
            if response.id == id {
                return Ok(response.response);
            }
            trace!(expected = id, received = response.id, "Discarding stale response");
        }
    }
}

#[async_trait]
impl FunctionCaller for RpcClient {
    async fn get_names(&self) -> PluginResult<Vec<String>> {
        match self.round_trip(RpcRequest::GetNames).await? {
            RpcResponse::Names(names) => Ok(names),
            other => Err(WireError::UnexpectedResponse(format!("{other:?}")).into()),
        }
    }

    async fn call(&self, name: &str, args: Vec<Value>) -> PluginResult<Value> {
        let request = RpcRequest::Call(CallEnvelope::new(name, args));
        match self.round_trip(request).await? {
            RpcResponse::Value(value) => Ok(value),
            RpcResponse::Failed(err) => Err(err.into()),
            other @ RpcResponse::Names(_) => {
                Err(WireError::UnexpectedResponse(format!("{other:?}")).into())
            },
        }
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
