//! `spdz_websocket_utils` 是为 SPDZ 代理客户端提供 WebSocket 通信实用功能的 Rust Crate。
//! 它以命名事件（named event）的形式封装底层 WebSocket 连接，与 `spdz_models`
//! 中定义的事件 Payload 配合使用。
//!
//! 主要模块包括：
//! - `message`: 定义核心消息结构 `WsMessage`（事件名 + JSON Payload 信封）。
//! - `error`: 定义库中使用的统一错误类型 `WsError`。
//! - `client`: 客户端传输层：连接建立、重连循环，以及把底层连接翻译为
//!   `TransportEvent` / `TransportEmission` 通道对的事件传输。
//! - `server`: 极简的服务端传输层，供测试代理服务器与集成测试使用。

pub mod client;
pub mod error;
pub mod message;
pub mod server;
