//! Serving a registry from inside a plugin process.

use std::future::Future;
use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use glue_core::{
    FunctionRegistry, Handshake, HandshakeConfig, PluginError, PluginResult, TransportKind,
};
use glue_wire::{RpcServer, start_grpc_server};
use jsonrpsee::server::ServerHandle;
use tracing::{debug, info};

/// Builder for the plugin's server.
#[derive(Debug)]
pub struct PluginServer {
    registry: Arc<FunctionRegistry>,
    handshake: HandshakeConfig,
    transport: TransportKind,
    bind_addr: SocketAddr,
}

impl PluginServer {
    /// Serve `registry` with the transport named in the environment, on a
    /// random loopback port.
    #[must_use]
    pub fn new(registry: FunctionRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            handshake: HandshakeConfig::default(),
            transport: TransportKind::from_env(),
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        }
    }

    /// Override the transport.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Override the handshake version and cookie.
    #[must_use]
    pub fn with_handshake(mut self, handshake: HandshakeConfig) -> Self {
        self.handshake = handshake;
        self
    }

    /// Override the listen address.
    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// The transport that will be served.
    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Bind the listener and build the handshake announcing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(self) -> PluginResult<RunningServer> {
        let (address, server) = match self.transport {
            TransportKind::Rpc => {
                let server = RpcServer::bind(self.bind_addr, Arc::clone(&self.registry)).await?;
                (server.local_addr()?, ServerTask::Rpc(server))
            },
            TransportKind::Grpc => {
                let (address, handle) =
                    start_grpc_server(self.bind_addr, Arc::clone(&self.registry)).await?;
                (address, ServerTask::Grpc(handle))
            },
        };

        let handshake = Handshake::new(&self.handshake, address, self.transport);
        debug!(%handshake, functions = self.registry.len(), "Plugin server bound");
        Ok(RunningServer { handshake, server })
    }
}

enum ServerTask {
    Rpc(RpcServer),
    Grpc(ServerHandle),
}

/// A bound plugin server that has not announced itself yet.
pub struct RunningServer {
    handshake: Handshake,
    server: ServerTask,
}

impl RunningServer {
    /// The handshake describing this server.
    #[must_use]
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Print the handshake line to stdout.
    ///
    /// # Errors
    ///
    /// Returns an IO error if stdout cannot be written.
    pub fn announce(&self) -> PluginResult<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", self.handshake)?;
        out.flush()?;
        Ok(())
    }

    /// Serve requests until `shutdown` completes or the server fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the lightweight RPC listener fails.
    pub async fn serve_until(self, shutdown: impl Future<Output = ()>) -> PluginResult<()> {
        match self.server {
            ServerTask::Rpc(server) => {
                tokio::select! {
                    result = server.serve() => result.map_err(PluginError::from),
                    () = shutdown => Ok(()),
                }
            },
            ServerTask::Grpc(handle) => {
                tokio::select! {
                    () = handle.clone().stopped() => Ok(()),
                    () = shutdown => {
                        // Already stopped is fine.
                        let _ = handle.stop();
                        handle.stopped().await;
                        Ok(())
                    },
                }
            },
        }
    }

    /// Serve until the process receives SIGTERM or ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns an error if the lightweight RPC listener fails.
    pub async fn serve(self) -> PluginResult<()> {
        let result = self.serve_until(shutdown_signal()).await;
        info!("Plugin server stopped");
        result
    }
}

impl std::fmt::Debug for RunningServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningServer")
            .field("handshake", &self.handshake)
            .finish_non_exhaustive()
    }
}

/// Resolves on ctrl-c, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => debug!("Received ctrl-c"),
        () = terminate => debug!("Received SIGTERM"),
    }
}
