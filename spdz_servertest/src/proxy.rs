// spdz_servertest/src/proxy.rs

//! 单个模拟代理实例。
//!
//! 每个实例监听一个地址，对每条连接：
//! * `connectToSpdz` 回执成功，并启动周期性分片下发任务；
//! * `sendData` 记录收到的编码值并回执成功，随后下发一条
//!   `Int` 类型的输出结果（回显本次收到的值数量）；
//! * 其余事件记录警告后跳过。
//!
//! 所有 `spdz_message` 均使用该实例的会话密钥加密，格式与客户端
//! 的帧解析约定一致。

use log::{info, warn};
use spdz_client::crypto::{MessageCipher, SessionCipher, SESSION_KEY_LEN};
use spdz_client::field::Gfp;
use spdz_client::frame::encode_frame;
use spdz_models::enums::{MessageType, RegType};
use spdz_models::ws_payloads::{
    CommandResultPayload, ConnectToSpdzPayload, SendDataPayload, SpdzMessagePayload,
    CONNECT_TO_SPDZ_EVENT, CONNECT_TO_SPDZ_RESULT_EVENT, SEND_DATA_EVENT, SEND_DATA_RESULT_EVENT,
    SPDZ_MESSAGE_EVENT,
};
use spdz_websocket_utils::error::WsError;
use spdz_websocket_utils::message::WsMessage;
use spdz_websocket_utils::server::{receive_message, start_server, ConnectionHandler, ServerWsStream};
use futures_util::stream::SplitStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;

/// 一个模拟代理实例的配置。
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// 监听地址，例如 "127.0.0.1:8091"。
    pub addr: String,
    /// 与客户端约定的会话密钥。
    pub session_key: [u8; SESSION_KEY_LEN],
    /// 分片下发间隔。
    pub share_interval: Duration,
}

/// 运行一个模拟代理实例直至监听失败或进程终止。
pub async fn run_proxy(config: ProxyConfig) -> Result<(), WsError> {
    info!("[模拟代理] 实例启动，监听 {}", config.addr);
    let addr = config.addr.clone();
    start_server(addr, move |handler, receiver| {
        let config = config.clone();
        async move {
            handle_connection(config, handler, receiver).await;
        }
    })
    .await
}

async fn handle_connection(
    config: ProxyConfig,
    handler: ConnectionHandler,
    mut receiver: SplitStream<ServerWsStream>,
) {
    let peer = handler.peer_addr();
    let handler = Arc::new(TokioMutex::new(handler));
    let cipher = Arc::new(SessionCipher::new(config.session_key));
    let mut pusher_started = false;

    while let Some(incoming) = receive_message(&mut receiver).await {
        let message = match incoming {
            Ok(message) => message,
            Err(e) => {
                warn!("[模拟代理] 来自 {} 的消息无法解析: {}", peer, e);
                continue;
            }
        };

        match message.event.as_str() {
            CONNECT_TO_SPDZ_EVENT => {
                match message.deserialize_payload::<ConnectToSpdzPayload>() {
                    Ok(payload) => {
                        info!(
                            "[模拟代理] {} 请求连接 SPDZ 引擎 (公钥前缀 {}, 复用连接: {})",
                            peer,
                            &payload.public_key[..payload.public_key.len().min(8)],
                            payload.reuse_connection
                        );
                        send_result(&handler, CONNECT_TO_SPDZ_RESULT_EVENT, 0, None).await;
                        if !pusher_started {
                            pusher_started = true;
                            spawn_share_pusher(
                                handler.clone(),
                                cipher.clone(),
                                config.share_interval,
                            );
                        }
                    }
                    Err(e) => {
                        warn!("[模拟代理] connectToSpdz 载荷无效: {}", e);
                        send_result(
                            &handler,
                            CONNECT_TO_SPDZ_RESULT_EVENT,
                            1,
                            Some("载荷无效".to_string()),
                        )
                        .await;
                    }
                }
            }
            SEND_DATA_EVENT => match message.deserialize_payload::<SendDataPayload>() {
                Ok(payload) => {
                    info!("[模拟代理] {} 发来 {} 个编码值", peer, payload.data.len());
                    send_result(&handler, SEND_DATA_RESULT_EVENT, 0, None).await;
                    // 回显收到的值数量作为一条 Int 输出结果
                    let count = payload.data.len() as i32;
                    let frame = encode_frame(
                        MessageType::OutputResult,
                        RegType::Int,
                        &count.to_be_bytes(),
                    );
                    push_spdz_message(&handler, cipher.as_ref(), &frame).await;
                }
                Err(e) => {
                    warn!("[模拟代理] sendData 载荷无效: {}", e);
                    send_result(
                        &handler,
                        SEND_DATA_RESULT_EVENT,
                        1,
                        Some("载荷无效".to_string()),
                    )
                    .await;
                }
            },
            other => {
                warn!("[模拟代理] 收到未知事件 '{}'，已跳过", other);
            }
        }
    }
    info!("[模拟代理] 与 {} 的连接已结束", peer);
}

/// 周期性下发一个递增的 ModP 分片。
fn spawn_share_pusher(
    handler: Arc<TokioMutex<ConnectionHandler>>,
    cipher: Arc<SessionCipher>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let mut counter: u64 = 1;
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // 第一个 tick 立即返回，跳过
        loop {
            ticker.tick().await;
            let share = Gfp::from_residue(counter as u128);
            let frame =
                encode_frame(MessageType::InputShare, RegType::ModP, &share.to_bytes_be());
            if !push_spdz_message(&handler, cipher.as_ref(), &frame).await {
                info!("[模拟代理] 分片下发任务结束 (连接已关闭)");
                return;
            }
            counter += 1;
        }
    });
}

async fn send_result(
    handler: &Arc<TokioMutex<ConnectionHandler>>,
    event: &str,
    status: i32,
    error: Option<String>,
) {
    let payload = CommandResultPayload { status, error };
    match WsMessage::new(event, &payload) {
        Ok(message) => {
            if let Err(e) = handler.lock().await.send_message(&message).await {
                warn!("[模拟代理] 发送 '{}' 回执失败: {}", event, e);
            }
        }
        Err(e) => warn!("[模拟代理] 构造 '{}' 回执失败: {}", event, e),
    }
}

/// 加密并推送一帧 `spdz_message`。返回 `false` 表示连接已不可用。
async fn push_spdz_message(
    handler: &Arc<TokioMutex<ConnectionHandler>>,
    cipher: &SessionCipher,
    frame: &[u8],
) -> bool {
    let ciphertext = match cipher.encrypt(frame) {
        Ok(ciphertext) => ciphertext,
        Err(e) => {
            warn!("[模拟代理] 加密 spdz_message 失败: {}", e);
            return true;
        }
    };
    let message = match WsMessage::new(SPDZ_MESSAGE_EVENT, &SpdzMessagePayload { data: ciphertext })
    {
        Ok(message) => message,
        Err(e) => {
            warn!("[模拟代理] 构造 spdz_message 失败: {}", e);
            return true;
        }
    };
    match handler.lock().await.send_message(&message).await {
        Ok(()) => true,
        Err(e) => {
            warn!("[模拟代理] 推送 spdz_message 失败: {}", e);
            false
        }
    }
}
