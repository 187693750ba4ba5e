// spdz_models/src/enums.rs

//! 定义 SPDZ 代理客户端各组件共享的枚举类型。
//!
//! `MessageType` 与 `RegType` 对应 SPDZ 引擎二进制帧头中的两个 4 字节
//! 大端整数标签（与 SPDZ `Processor/instruction.h` 保持一致）；
//! `ResponseType` / `ConnectionStatus` / `ControlKind` 则用于客户端
//! 对外暴露的响应流分类。

use serde::{Deserialize, Serialize};

/// SPDZ 返回消息的类型标签（帧头字节 [0,4)，大端）。
///
/// 与 SPDZ `Processor/instruction.h` 中的定义保持一致。
/// 线路上 `0 = NOTYPE` 为保留值，客户端只接受以下两种。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// 输入分片：代理下发的秘密共享掩码分片。
    InputShare,
    /// 输出结果：MPC 计算的输出值。
    OutputResult,
}

impl MessageType {
    /// 尝试从线路上的 4 字节整数值解析消息类型。
    ///
    /// 未知值返回 `None`，由调用方转换为带原始值的错误。
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            1 => Some(MessageType::InputShare),
            2 => Some(MessageType::OutputResult),
            _ => None,
        }
    }

    /// 返回该类型在线路上的整数编码。
    pub fn to_wire(self) -> u32 {
        match self {
            MessageType::InputShare => 1,
            MessageType::OutputResult => 2,
        }
    }
}

/// SPDZ 数值寄存器类型标签（帧头字节 [4,8)，大端）。
///
/// 决定 payload 中每个元素的字节宽度：`ModP` 为 16 字节域元素，
/// `Int` 为 4 字节整数。`1 = GF2N` 及其余值为保留值，客户端不处理。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegType {
    /// 16 字节大端的 GF(p) 域元素。
    ModP,
    /// 4 字节大端整数。
    Int,
}

impl RegType {
    /// 尝试从线路上的 4 字节整数值解析寄存器类型。
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(RegType::ModP),
            2 => Some(RegType::Int),
            _ => None,
        }
    }

    /// 返回该类型在线路上的整数编码。
    pub fn to_wire(self) -> u32 {
        match self {
            RegType::ModP => 0,
            RegType::Int => 2,
        }
    }

    /// 该寄存器类型下 payload 中单个元素所占的字节数。
    pub fn element_len(self) -> usize {
        match self {
            RegType::ModP => 16,
            RegType::Int => 4,
        }
    }
}

/// 合并响应流中单条响应的分类。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// WebSocket 传输层连接事件（connect / connect_error / connect_timeout）。
    ProxyConnect,
    /// `connectToSpdz` 命令的回执。
    SpdzConnect,
    /// `sendData` 命令的回执。
    SendInput,
    /// 由错误投影产生的错误值。
    Error,
}

/// 单个代理的传输层连接状态。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// 连接建立成功。
    Ok,
    /// 连接失败。
    ConnectError,
    /// 连接超时。
    ConnectTimeout,
}

/// 命令回执对应的出站命令种类。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// `connectToSpdz` 命令。
    ConnectToSpdz,
    /// `sendData` 命令。
    SendData,
}
