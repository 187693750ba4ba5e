// spdz_websocket_utils/src/message.rs

//! 定义 WebSocket 通信中使用的核心消息结构。
//!
//! 本模块主要包含 `WsMessage` 结构体的定义及其相关实现。
//! `WsMessage` 把 SPDZ 代理协议的"命名事件"映射到一条 WebSocket 文本帧：
//! `event` 字段是事件名（见 `spdz_models::ws_payloads` 中的常量），
//! `payload` 字段是该事件对应 Payload 结构体的 JSON 字符串。
//! 无 Payload 的事件（如 `connect_error`）使用空 JSON 对象 `{}`。

use crate::error::WsError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `WsMessage` 代表客户端与 SPDZ 代理之间交换的一条命名事件消息。
///
/// # 字段
/// - `message_id`: UUID v4 生成的唯一字符串标识符，用于追踪和调试。
/// - `event`: 事件名称，决定 `payload` 应被解释为哪个 Payload 结构体。
/// - `payload`: 事件数据，JSON 字符串形式。
/// - `timestamp`: 消息创建时的 UTC 毫秒时间戳。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WsMessage {
    /// 为此消息实例生成的唯一标识符 (UUID v4 格式的字符串)。
    pub message_id: String,

    /// 事件名称，例如 `"connectToSpdz"`, `"spdz_message"`。
    pub event: String,

    /// 事件的实际数据负载，以 JSON 字符串的形式存储。
    pub payload: String,

    /// 消息创建时的 UTC 时间戳（自 Unix 纪元以来的毫秒数）。
    pub timestamp: i64,
}

impl WsMessage {
    /// 创建一个新的 `WsMessage` 实例。
    ///
    /// 自动生成 `message_id` (UUID v4) 与当前 UTC 时间戳，
    /// 并把 `payload_data` 序列化为 JSON 字符串。
    ///
    /// # Arguments
    /// * `event` - 事件名称。
    /// * `payload_data` - 实现了 `serde::Serialize` 的 Payload 数据。
    ///
    /// # Returns
    /// * `Result<WsMessage, WsError>` - 序列化失败时返回
    ///   `WsError::SerializationError`。
    pub fn new<T: Serialize>(event: &str, payload_data: &T) -> Result<WsMessage, WsError> {
        let payload_str = serde_json::to_string(payload_data)
            .map_err(|e| WsError::SerializationError(format!("创建 WsMessage 时序列化载荷失败: {}", e)))?;
        Ok(WsMessage {
            message_id: Uuid::new_v4().to_string(),
            event: event.to_string(),
            payload: payload_str,
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// 创建一条无 Payload 的事件消息（载荷为 `{}`）。
    pub fn event_only(event: &str) -> WsMessage {
        WsMessage {
            message_id: Uuid::new_v4().to_string(),
            event: event.to_string(),
            payload: "{}".to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// 将内部存储的 JSON 字符串载荷反序列化为指定的目标类型 `T`。
    ///
    /// # Returns
    /// * `Result<T, WsError>` - JSON 格式不正确或结构不匹配时返回
    ///   `WsError::DeserializationError`。
    pub fn deserialize_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, WsError> {
        serde_json::from_str(&self.payload).map_err(|e| {
            WsError::DeserializationError(format!(
                "WsMessage (事件 '{}') 载荷反序列化失败: {}, 原始载荷: '{}'",
                self.event, e, self.payload
            ))
        })
    }

    /// 将整条消息序列化为 JSON 字符串，供文本帧发送。
    pub fn to_json_string(&self) -> Result<String, WsError> {
        serde_json::to_string(self)
            .map_err(|e| WsError::SerializationError(format!("WsMessage 序列化为 JSON 失败: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spdz_models::ws_payloads::{CommandResultPayload, ConnectToSpdzPayload, CONNECT_TO_SPDZ_EVENT};

    #[test]
    fn test_ws_message_new_creation_and_payload_integrity() {
        let payload = ConnectToSpdzPayload {
            public_key: "00".repeat(64),
            reuse_connection: false,
        };

        let ws_message = WsMessage::new(CONNECT_TO_SPDZ_EVENT, &payload)
            .expect("WsMessage::new 创建消息实例失败");
        assert_eq!(ws_message.event, CONNECT_TO_SPDZ_EVENT, "事件名与预期不符");
        assert!(!ws_message.message_id.is_empty(), "消息 ID 不应为空");
        assert!(ws_message.timestamp > 0, "时间戳应为正数");

        let recovered: ConnectToSpdzPayload = ws_message
            .deserialize_payload()
            .expect("载荷反序列化回 ConnectToSpdzPayload 失败");
        assert_eq!(recovered, payload, "往返后的 Payload 与原始实例不相等");
    }

    #[test]
    fn test_ws_message_full_serialization_then_deserialization_cycle() {
        let payload = CommandResultPayload { status: 0, error: None };
        let original = WsMessage::new("sendData_result", &payload).expect("创建 WsMessage 失败");

        let json_string = original.to_json_string().expect("WsMessage 序列化失败");
        let restored: WsMessage =
            serde_json::from_str(&json_string).expect("从 JSON 恢复 WsMessage 失败");

        assert_eq!(original.event, restored.event);
        assert_eq!(original.message_id, restored.message_id);
        assert_eq!(original.timestamp, restored.timestamp);
        let recovered: CommandResultPayload =
            restored.deserialize_payload().expect("恢复后的载荷反序列化失败");
        assert_eq!(recovered, payload);
    }

    #[test]
    fn test_deserialize_payload_to_mismatched_type_error_handling() {
        let message = WsMessage::event_only("connect");
        // 空对象 {} 无法反序列化为要求字段的 ConnectToSpdzPayload
        let attempt: Result<ConnectToSpdzPayload, WsError> = message.deserialize_payload();
        match attempt {
            Err(WsError::DeserializationError(_)) => {}
            other => panic!("预期 DeserializationError，实际得到: {:?}", other.err()),
        }
    }
}
