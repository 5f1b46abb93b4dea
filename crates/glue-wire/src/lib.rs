//! Host/plugin transports for glue plugins.
//!
//! Two interchangeable protocols expose the same two operations, list
//! function names and call a function by name:
//!
//! - [`rpc`]: lightweight RPC, CBOR documents in length-delimited TCP frames
//! - [`grpc`]: schema RPC, a fixed two-method JSON-RPC contract over HTTP
//!
//! Both client halves implement [`FunctionCaller`]; [`connect`] picks one by
//! [`TransportKind`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod grpc;
pub mod rpc;

mod dispatch;

use std::net::SocketAddr;
use std::sync::Arc;

use glue_core::{FunctionCaller, TransportKind};

pub use error::{WireError, WireResult};
pub use grpc::{GrpcClient, start_grpc_server};
pub use rpc::{RpcClient, RpcServer};

/// Connect a client for `transport` to a plugin listening on `address`.
///
/// # Errors
///
/// Returns a [`WireError`] if the plugin cannot be reached.
pub async fn connect(
    transport: TransportKind,
    address: SocketAddr,
) -> WireResult<Arc<dyn FunctionCaller>> {
    let caller: Arc<dyn FunctionCaller> = match transport {
        TransportKind::Rpc => Arc::new(RpcClient::connect(address).await?),
        TransportKind::Grpc => Arc::new(GrpcClient::connect(address).await?),
    };
    Ok(caller)
}
