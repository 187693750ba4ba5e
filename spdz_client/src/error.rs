// spdz_client/src/error.rs

//! `spdz_client` 的自定义错误处理模块。
//!
//! 这里的大部分错误是**非致命**的：它们作为值在失败通道上流动，
//! 最终经错误投影汇入合并响应流，而不会终止产生它们的序列。
//! 只有启动期的编程/配置错误（如传输层配置无效）才允许作为
//! `Result` 直接向上传播。

use spdz_models::enums::RegType;
use thiserror::Error;

/// SPDZ 代理客户端核心的统一错误类型。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpdzClientError {
    /// 解密后的消息不足 8 字节，无法提取帧头。
    #[error("帧格式错误: 消息至少需要 8 字节，实际 {len} 字节")]
    MalformedFrame {
        /// 实际收到的明文长度。
        len: usize,
    },

    /// 帧头携带了未知的消息类型标签。
    #[error("未知的消息类型 {0}")]
    UnknownMessageType(u32),

    /// 帧头携带了未知的寄存器类型标签。
    #[error("未知的寄存器类型 {0}")]
    UnknownRegType(u32),

    /// 使用会话密钥解密代理消息失败。
    #[error("解密失败: {0}")]
    Decryption(String),

    /// 会话密钥协商（十六进制解析 / DH）失败。
    #[error("密钥协商失败: {0}")]
    KeyDerivation(String),

    /// 合并后的分片批次无法解码为域元素。
    #[error("分片解码失败: {0}")]
    ShareDecode(String),

    /// 合并后的输出批次无法解码为数值。
    #[error("输出解码失败: {0}")]
    OutputDecode(String),

    /// 合并输出批次中各代理报告的寄存器类型不一致。
    #[error("寄存器类型不一致: 代理 0 报告 {first:?}，另一代理报告 {other:?}")]
    RegTypeMismatch {
        /// 第一个代理报告的类型。
        first: RegType,
        /// 与之不一致的类型。
        other: RegType,
    },

    /// 合并输出批次的寄存器类型无法用于解码（例如空批次）。
    #[error("输出流的寄存器类型 {0} 当前无法处理")]
    UnsupportedRegTypeAggregate(u32),

    /// 用户输入数量与收到的分片数量不一致。
    #[error("试图发送 {inputs} 个输入，但只提供了 {shares} 个分片")]
    LengthMismatch {
        /// 输入值数量。
        inputs: usize,
        /// 分片数量。
        shares: usize,
    },

    /// 位置联接中单个来源的积压超过了配置上限。
    #[error("联接缓冲溢出: 积压 {pending} 条，上限 {limit} 条")]
    JoinBufferOverflow {
        /// 当前积压条数。
        pending: usize,
        /// 配置的上限。
        limit: usize,
    },

    /// 客户端已关闭（命令总线或输入通道无任何接收端）。
    #[error("客户端已关闭")]
    ClientClosed,
}

/// 一条可归因的失败事件。
///
/// 来自单个代理连接适配器的失败携带其 URL；聚合/联接阶段的失败
/// 无法归因到单个代理，`url` 为 `None`。
#[derive(Debug, Clone, PartialEq)]
pub struct FailureEvent {
    /// 失败来源的代理 URL（如可归因）。
    pub url: Option<String>,
    /// 具体错误。
    pub error: SpdzClientError,
}

impl FailureEvent {
    /// 构造一条归因到 `url` 代理的失败事件。
    pub fn for_proxy(url: impl Into<String>, error: SpdzClientError) -> Self {
        FailureEvent { url: Some(url.into()), error }
    }

    /// 构造一条无法归因到单个代理的失败事件。
    pub fn unattributed(error: SpdzClientError) -> Self {
        FailureEvent { url: None, error }
    }
}

impl std::fmt::Display for FailureEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{} (代理 {})", self.error, url),
            None => write!(f, "{}", self.error),
        }
    }
}
