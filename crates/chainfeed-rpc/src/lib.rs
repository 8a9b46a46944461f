//! chainfeed-rpc — JSON-RPC over HTTP implementation of [`ChainClient`](chainfeed_core::ChainClient).

pub mod client;
pub mod request;
pub mod wire;

pub use client::{HttpChainClient, HttpClientConfig};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
