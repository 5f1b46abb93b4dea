//! Plugin side of the lightweight RPC transport.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use glue_core::FunctionRegistry;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

use super::{RequestFrame, ResponseFrame, RpcRequest, RpcResponse, decode, encode, framed};
use crate::dispatch::dispatch_call;
use crate::error::WireResult;

/// Serves a [`FunctionRegistry`] over the lightweight RPC transport.
pub struct RpcServer {
    listener: TcpListener,
    registry: Arc<FunctionRegistry>,
}

impl RpcServer {
    /// Bind a listener.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the address cannot be bound.
    pub async fn bind(addr: impl ToSocketAddrs, registry: Arc<FunctionRegistry>) -> WireResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, registry })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the socket address cannot be read.
    pub fn local_addr(&self) -> WireResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    ///
    /// Each connection is handled on its own task; requests on one
    /// connection are answered in order.
    ///
    /// # Errors
    ///
    /// Returns an IO error if accepting a connection fails.
    pub async fn serve(self) -> WireResult<()> {
        info!(address = ?self.listener.local_addr().ok(), "Serving lightweight RPC");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            debug!(%peer, "Accepted connection");
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, registry).await {
                    warn!(%peer, error = %e, "Connection ended with error");
                }
            });
        }
    }
}

async fn serve_connection(stream: TcpStream, registry: Arc<FunctionRegistry>) -> WireResult<()> {
    stream.set_nodelay(true)?;
    let mut stream = framed(stream);

    while let Some(bytes) = stream.next().await {
        let RequestFrame { id, request } = decode(&bytes?)?;
        let response = match request {
            RpcRequest::GetNames => RpcResponse::Names(registry.names()),
            RpcRequest::Call(envelope) => match dispatch_call(&registry, envelope).await {
                Ok(value) => RpcResponse::Value(value),
                Err(err) => RpcResponse::Failed(err),
            },
        };
        stream.send(encode(&ResponseFrame { id, response })?).await?;
    }

    Ok(())
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("address", &self.listener.local_addr().ok())
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcClient;
    use glue_core::marshal::Variadic;
    use glue_core::{CallError, FunctionCaller, PluginError, Value};
    use serde_json::json;

    async fn start(registry: FunctionRegistry) -> RpcClient {
        let server = RpcServer::bind("127.0.0.1:0", Arc::new(registry)).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve());
        RpcClient::connect(addr).await.unwrap()
    }

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry.register("sum_ints", |Variadic(v): Variadic<i64>| v.iter().sum::<i64>());
        registry.register("echo", |Variadic(v): Variadic<Value>| v);
        registry.register("boom", || -> Result<(), String> { Err("boom".into()) });
        registry
    }

    #[tokio::test]
    async fn test_get_names() {
        let client = start(registry()).await;
        let names = client.get_names().await.unwrap();
        assert!(names.contains(&"sum_ints".to_string()));
        assert!(names.contains(&"sumints".to_string()));
    }

    #[tokio::test]
    async fn test_call_round_trip_preserves_order_and_null() {
        let client = start(registry()).await;
        let args = vec![json!(1), json!(2.5), json!("s"), json!(true), json!(null)];
        let value = client.call("echo", args.clone()).await.unwrap();
        assert_eq!(value, Value::Array(args));
    }

    #[tokio::test]
    async fn test_remote_error_is_distinct_from_transport_error() {
        let client = start(registry()).await;

        let err = client.call("boom", vec![]).await.unwrap_err();
        assert!(matches!(err, PluginError::Call(CallError::Failed { ref message }) if message == "boom"));

        let err = client.call("missing_fn", vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            PluginError::Call(CallError::FunctionNotFound { .. })
        ));

        assert_eq!(
            client.call("sum_ints", vec![json!(1), json!(2), json!(3), json!(4)]).await.unwrap(),
            json!(10)
        );
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_connection() {
        let client = Arc::new(start(registry()).await);
        let mut handles = Vec::new();
        for i in 0..16i64 {
            let client = Arc::clone(&client);
            handles.push(tokio::spawn(async move {
                client.call("sum_ints", vec![json!(i), json!(i)]).await
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let expected = i64::try_from(i).unwrap() * 2;
            assert_eq!(handle.await.unwrap().unwrap(), json!(expected));
        }
    }
}
