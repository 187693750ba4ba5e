// spdz_websocket_utils/src/server/mod.rs

//! 服务端 WebSocket 传输层模块（供测试代理服务器与集成测试使用）。

pub mod transport;

pub use transport::{receive_message, start_server, ConnectionHandler, ServerWsStream};
