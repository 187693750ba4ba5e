//! `spdz_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了在 SPDZ 代理客户端各个 Rust 组件（`spdz_websocket_utils`
//! 传输层、`spdz_client` 客户端核心、`spdz_servertest` 测试代理服务器）之间
//! 共享的核心数据结构和枚举类型。
//!
//! 主要包含以下类型的模型：
//! - **线路协议枚举 (`enums`)**: SPDZ 二进制帧头中的消息类型 (`MessageType`)
//!   与数值寄存器类型 (`RegType`)，以及响应流分类 (`ResponseType`) 等。
//! - **WebSocket 消息负载 (`ws_payloads`)**: 客户端与 SPDZ 代理之间通过
//!   命名事件通信时传输的各类 Payload 结构体，例如 `connectToSpdz` 请求、
//!   命令结果回执、加密的 `spdz_message` 等。
//! - **连接选项 (`options`)**: `ConnectOptions`，传输层与客户端核心共同
//!   消费的连接/重连参数。
//!
//! 设计原则：
//! - **共享性**: 所有模型都旨在被多个其他 crate 共享使用。
//! - **序列化/反序列化**: 所有模型都派生 `serde::Serialize` 和
//!   `serde::Deserialize`，以便在 JSON 事件信封中传输。
//! - **可调试性与克隆**: 所有模型都派生 `Debug` 和 `Clone`。

pub mod enums;       // 线路协议与响应流分类枚举
pub mod options;     // 连接选项 (含默认值)
pub mod ws_payloads; // WebSocket 命名事件的 Payload 结构体
