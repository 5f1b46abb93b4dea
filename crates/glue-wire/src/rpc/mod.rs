//! Lightweight RPC transport.
//!
//! Each message is a CBOR document in a length-delimited frame:
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │  4 bytes: u32 big-endian length  │
//! ├──────────────────────────────────┤
//! │  N bytes: CBOR-encoded frame     │
//! └──────────────────────────────────┘
//! ```
//!
//! Requests carry an id echoed by the response, so a client can discard a
//! stale response left behind by an abandoned round trip.

mod client;
mod server;

pub use client::RpcClient;
pub use server::RpcServer;

use bytes::Bytes;
use glue_core::{CallEnvelope, CallError, Value};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::{WireError, WireResult};

/// Maximum frame size (16 MB).
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// A request sent by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcRequest {
    /// List registered function names.
    GetNames,
    /// Call one function.
    Call(CallEnvelope),
}

/// The plugin's answer to an [`RpcRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcResponse {
    /// Answer to [`RpcRequest::GetNames`].
    Names(Vec<String>),
    /// Successful call result.
    Value(Value),
    /// The function failed.
    Failed(CallError),
}

#[derive(Debug, Serialize, Deserialize)]
struct RequestFrame {
    id: u64,
    request: RpcRequest,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResponseFrame {
    id: u64,
    response: RpcResponse,
}

type FramedStream = Framed<TcpStream, LengthDelimitedCodec>;

fn framed(stream: TcpStream) -> FramedStream {
    let codec = LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    Framed::new(stream, codec)
}

fn encode<T: Serialize>(message: &T) -> WireResult<Bytes> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf).map_err(|e| WireError::Encode(e.to_string()))?;
    Ok(Bytes::from(buf))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> WireResult<T> {
    ciborium::from_reader(bytes).map_err(|e| WireError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_frame_preserves_args() {
        let frame = RequestFrame {
            id: 7,
            request: RpcRequest::Call(CallEnvelope::new(
                "concatenate",
                vec![json!("a"), json!(2), json!(null), json!(3.4), json!(true)],
            )),
        };
        let bytes = encode(&frame).unwrap();
        let decoded: RequestFrame = decode(&bytes).unwrap();
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.request, frame.request);
    }

    #[test]
    fn test_failed_response_keeps_error_kind() {
        let frame = ResponseFrame {
            id: 1,
            response: RpcResponse::Failed(CallError::ArityMismatch {
                expected: 4,
                got: 2,
            }),
        };
        let decoded: ResponseFrame = decode(&encode(&frame).unwrap()).unwrap();
        assert_eq!(decoded.response, frame.response);
    }

    #[test]
    fn test_decode_garbage() {
        let result: WireResult<RequestFrame> = decode(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(WireError::Decode(_))));
    }
}
