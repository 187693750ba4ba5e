// spdz_models/src/options.rs

//! SPDZ 代理连接选项。
//!
//! `ConnectOptions` 由传输层（重连循环）与客户端核心（位置联接的缓冲上限）
//! 共同消费。用户提供的字段覆盖默认值，未指定的字段取文档化的默认值。

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_path() -> String {
    "/test/socket.io".to_string()
}

fn default_reconnection() -> bool {
    true
}

fn default_reconnection_attempts() -> u32 {
    12
}

fn default_reconnection_delay_ms() -> u64 {
    5000
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_auto_connect() -> bool {
    true
}

fn default_join_buffer_limit() -> usize {
    1024
}

/// WebSocket 连接配置。
///
/// 所有字段都带 serde 默认值，因此可以从只包含部分字段的 JSON 配置
/// 反序列化得到完整配置。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// 传输层端点路径，会被追加到每个代理的 URL 之后。
    #[serde(default = "default_path")]
    pub path: String,

    /// 连接断开后是否自动重连。
    #[serde(default = "default_reconnection")]
    pub reconnection: bool,

    /// 最大重连尝试次数。
    #[serde(default = "default_reconnection_attempts")]
    pub reconnection_attempts: u32,

    /// 两次重连尝试之间的等待时间（毫秒）。
    #[serde(default = "default_reconnection_delay_ms")]
    pub reconnection_delay_ms: u64,

    /// 单次连接尝试的超时时间（毫秒）。
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// 构造客户端时是否立即发起连接。
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,

    /// 位置联接（zip）中单个来源允许积压的未配对条目上限。
    ///
    /// 超过上限时该联接以 `JoinBufferOverflow` 错误结束，
    /// 而不是无界占用内存。
    #[serde(default = "default_join_buffer_limit")]
    pub join_buffer_limit: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            path: default_path(),
            reconnection: default_reconnection(),
            reconnection_attempts: default_reconnection_attempts(),
            reconnection_delay_ms: default_reconnection_delay_ms(),
            timeout_ms: default_timeout_ms(),
            auto_connect: default_auto_connect(),
            join_buffer_limit: default_join_buffer_limit(),
        }
    }
}

impl ConnectOptions {
    /// 重连等待时间，作为 `Duration` 返回。
    pub fn reconnection_delay(&self) -> Duration {
        Duration::from_millis(self.reconnection_delay_ms)
    }

    /// 单次连接尝试超时，作为 `Duration` 返回。
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
