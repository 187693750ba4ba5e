// spdz_client/src/frame.rs

//! SPDZ 代理二进制帧的解析与编码。
//!
//! 代理推送的每条 `spdz_message` 在解密后是一个定界帧：
//! 字节 `[0, 4)` 为大端消息类型标签，字节 `[4, 8)` 为大端寄存器类型
//! 标签，其余为载荷。两个标签在解析时一并校验，任一未知立即报错，
//! 不会让带着无效类型的帧流入后续聚合阶段。

use crate::error::SpdzClientError;
use spdz_models::enums::{MessageType, RegType};

/// 帧头长度：两个大端 `u32` 标签。
pub const FRAME_HEADER_LEN: usize = 8;

/// 一条解析完成的代理消息帧。
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// 消息类型（输入分片 / 输出结果）。
    pub message_type: MessageType,
    /// 载荷的寄存器类型。
    pub reg_type: RegType,
    /// 帧头之后的全部载荷字节。
    pub payload: Vec<u8>,
}

/// 解析一条解密后的代理消息。
///
/// 明文不足 [`FRAME_HEADER_LEN`] 字节、或任一标签未知时返回错误。
/// 载荷允许为空（例如不携带数据的输出通知）。
pub fn parse_frame(plaintext: &[u8]) -> Result<Frame, SpdzClientError> {
    if plaintext.len() < FRAME_HEADER_LEN {
        return Err(SpdzClientError::MalformedFrame { len: plaintext.len() });
    }

    // 长度已校验，切片固定为 4 字节。
    let message_tag = u32::from_be_bytes([plaintext[0], plaintext[1], plaintext[2], plaintext[3]]);
    let reg_tag = u32::from_be_bytes([plaintext[4], plaintext[5], plaintext[6], plaintext[7]]);

    let message_type = MessageType::from_wire(message_tag)
        .ok_or(SpdzClientError::UnknownMessageType(message_tag))?;
    let reg_type =
        RegType::from_wire(reg_tag).ok_or(SpdzClientError::UnknownRegType(reg_tag))?;

    Ok(Frame {
        message_type,
        reg_type,
        payload: plaintext[FRAME_HEADER_LEN..].to_vec(),
    })
}

/// 编码一条代理消息帧（供测试代理服务器与测试使用）。
pub fn encode_frame(message_type: MessageType, reg_type: RegType, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.extend_from_slice(&message_type.to_wire().to_be_bytes());
    buf.extend_from_slice(&reg_type.to_wire().to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_share_frame() {
        let mut raw = vec![0, 0, 0, 1, 0, 0, 0, 0];
        raw.extend_from_slice(&[0xAB; 16]);

        let frame = parse_frame(&raw).unwrap();
        assert_eq!(frame.message_type, MessageType::InputShare);
        assert_eq!(frame.reg_type, RegType::ModP);
        assert_eq!(frame.payload, vec![0xAB; 16]);
    }

    #[test]
    fn test_parse_output_frame_with_empty_payload() {
        let raw = vec![0, 0, 0, 2, 0, 0, 0, 2];

        let frame = parse_frame(&raw).unwrap();
        assert_eq!(frame.message_type, MessageType::OutputResult);
        assert_eq!(frame.reg_type, RegType::Int);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_parse_rejects_short_message() {
        let result = parse_frame(&[0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(result, Err(SpdzClientError::MalformedFrame { len: 7 }));
    }

    #[test]
    fn test_parse_rejects_unknown_message_type() {
        let raw = vec![0, 0, 0, 9, 0, 0, 0, 0];
        assert_eq!(parse_frame(&raw), Err(SpdzClientError::UnknownMessageType(9)));
    }

    #[test]
    fn test_parse_rejects_reserved_gf2n_reg_type() {
        // GF2N (1) 在线上协议中保留，但本客户端不支持。
        let raw = vec![0, 0, 0, 1, 0, 0, 0, 1];
        assert_eq!(parse_frame(&raw), Err(SpdzClientError::UnknownRegType(1)));
    }

    #[test]
    fn test_encode_parse_round_trip() {
        let payload = [1u8, 2, 3, 4];
        let raw = encode_frame(MessageType::OutputResult, RegType::Int, &payload);
        let frame = parse_frame(&raw).unwrap();
        assert_eq!(frame.message_type, MessageType::OutputResult);
        assert_eq!(frame.reg_type, RegType::Int);
        assert_eq!(frame.payload, payload);
    }
}
