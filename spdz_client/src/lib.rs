// spdz_client/src/lib.rs

//! 多代理 SPDZ MPC 客户端核心。
//!
//! 本 crate 把 N 个 SPDZ 代理的 WebSocket 事件流装配成一条反应式
//! 流水线：传输事件经连接适配器拆分为类型化流，聚合层按最新值合并
//! 或位置联接组合全体代理的流，输入联接把用户输入与分片配对后
//! 广播发送，响应投影把一切归一为单条响应流。入口是
//! [`client::SpdzProxyClient`]。

pub mod aggregate;
pub mod client;
pub mod combine;
pub mod command;
pub mod config;
pub mod crypto;
pub mod error;
pub mod field;
pub mod frame;
pub mod input;
pub mod proxy;
pub mod responses;

pub use client::SpdzProxyClient;
pub use config::ClientConfig;
pub use error::{FailureEvent, SpdzClientError};
pub use proxy::SpdzProxy;
pub use responses::{ResponseBundle, SpdzResponse};
