//! Schema RPC transport.
//!
//! The contract is a two-method JSON-RPC service served over HTTP:
//!
//! | Method | Params | Result |
//! |---|---|---|
//! | `glue_getNames` | `[]` | `{"names": [...]}` |
//! | `glue_call` | `[{"name": "...", "args": "<base64>"}]` | `{"value": "<base64>"}` |
//!
//! `args` is the JSON encoding of the argument list and `value` the JSON
//! encoding of the single result, both carried as base64 bytes so the
//! payload stays opaque to the transport. A failing function is reported as
//! a JSON-RPC error with code [`CALL_ERROR_CODE`] and the serialized
//! [`CallError`](glue_core::CallError) as `data`.

mod client;
mod server;

pub use client::GrpcClient;
pub use server::{FunctionServer, start_grpc_server};

use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};

/// JSON-RPC error code for an error returned by the remote function.
pub const CALL_ERROR_CODE: i32 = -32001;

// ---------- Wire types ----------

/// Result of `getNames`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamesResponse {
    /// Registered function names.
    pub names: Vec<String>,
}

/// Params of `call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Function name.
    pub name: String,
    /// JSON-encoded argument list.
    #[serde(with = "base64_bytes")]
    pub args: Vec<u8>,
}

/// Result of `call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResponse {
    /// JSON-encoded result value.
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

/// The function service contract.
///
/// Implemented by the plugin (server side), called by the host (client side).
#[rpc(server, client, namespace = "glue")]
pub trait FunctionService {
    /// List registered function names.
    #[method(name = "getNames")]
    async fn get_names(&self) -> Result<NamesResponse, ErrorObjectOwned>;

    /// Call a function by name.
    #[method(name = "call")]
    async fn call(&self, request: CallRequest) -> Result<CallResponse, ErrorObjectOwned>;
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_request_encodes_args_as_base64() {
        let request = CallRequest {
            name: "sum".into(),
            args: b"[1,2]".to_vec(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["args"], "WzEsMl0=");

        let parsed: CallRequest = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let json = serde_json::json!({"value": "not base64!"});
        assert!(serde_json::from_value::<CallResponse>(json).is_err());
    }
}
