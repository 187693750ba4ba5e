// spdz_models/src/ws_payloads.rs

//! 包含 WebSocket 命名事件通信中使用的各种 Payload 结构体定义。
//!
//! 事件名称常量与各 Payload 结构体一一对应：入站事件（代理 → 客户端）
//! 为连接生命周期事件、命令回执事件与加密的 `spdz_message`；出站事件
//! （客户端 → 代理）为 `connectToSpdz` 与 `sendData` 两个命令。
//!
//! 所有共享模型都派生 `Serialize`, `Deserialize`, `Debug`, `Clone`。

use serde::{Deserialize, Serialize};

// --- 入站事件名称（代理 → 客户端） ---

/// 传输层连接建立事件（无 Payload）。
pub const CONNECT_EVENT: &str = "connect";
/// 传输层连接失败事件（无 Payload）。
pub const CONNECT_ERROR_EVENT: &str = "connect_error";
/// 传输层连接超时事件（无 Payload）。
pub const CONNECT_TIMEOUT_EVENT: &str = "connect_timeout";
/// `connectToSpdz` 命令的回执事件，Payload 为 [`CommandResultPayload`]。
pub const CONNECT_TO_SPDZ_RESULT_EVENT: &str = "connectToSpdz_result";
/// `sendData` 命令的回执事件，Payload 为 [`CommandResultPayload`]。
pub const SEND_DATA_RESULT_EVENT: &str = "sendData_result";
/// 携带一条加密 SPDZ 消息的事件，Payload 为 [`SpdzMessagePayload`]。
pub const SPDZ_MESSAGE_EVENT: &str = "spdz_message";

// --- 出站事件名称（客户端 → 代理） ---

/// 请求代理与 SPDZ 引擎建立连接，Payload 为 [`ConnectToSpdzPayload`]。
pub const CONNECT_TO_SPDZ_EVENT: &str = "connectToSpdz";
/// 向 SPDZ 引擎发送已编码的输入数据，Payload 为 [`SendDataPayload`]。
pub const SEND_DATA_EVENT: &str = "sendData";

/// `connectToSpdz` 事件的 Payload。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectToSpdzPayload {
    /// 客户端会话公钥：64 字节值的 128 字符十六进制表示。
    pub public_key: String,
    /// 若当前已连接到 SPDZ，是否复用该连接（否则拆除后重建）。
    pub reuse_connection: bool,
}

/// `sendData` 事件的 Payload。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SendDataPayload {
    /// 已编码（分片 + 输入求和后的十六进制串）的输入值列表。
    pub data: Vec<String>,
}

/// 命令回执事件（`connectToSpdz_result` / `sendData_result`）的 Payload。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CommandResultPayload {
    /// 状态码：0 表示成功，其余值为代理侧的失败码。
    pub status: i32,
    /// 失败时代理附带的错误信息。
    pub error: Option<String>,
}

impl CommandResultPayload {
    /// 回执是否表示成功（`status == 0`）。
    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// `spdz_message` 事件的 Payload：一段不透明的密文字节。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpdzMessagePayload {
    /// 加密后的消息字节，解密与帧解析由客户端核心完成。
    pub data: Vec<u8>,
}
