// spdz_websocket_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层核心逻辑。
//!
//! 本模块分为两层：
//! 1. 底层连接：`connect_client` / `ClientConnection` / `receive_message`，
//!    负责建立连接并收发 `WsMessage` 信封。
//! 2. 事件传输：`run_event_transport` 把一个带重连循环的连接翻译为
//!    `TransportEvent` 入站通道与 `TransportEmission` 出站通道，
//!    这是上层连接适配器消费的"命名事件"契约。连接失败与超时以
//!    事件值（而非任务失败）的形式交付，保证单个代理的瞬时故障
//!    不会终止事件序列。

use crate::error::WsError;
use crate::message::WsMessage;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use log::{debug, error, info, warn};
use spdz_models::options::ConnectOptions;
use spdz_models::ws_payloads::{
    CommandResultPayload, ConnectToSpdzPayload, SendDataPayload, SpdzMessagePayload,
    CONNECT_TO_SPDZ_EVENT, CONNECT_TO_SPDZ_RESULT_EVENT, SEND_DATA_EVENT, SEND_DATA_RESULT_EVENT,
    SPDZ_MESSAGE_EVENT,
};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    tungstenite::Error as TungsteniteError,
    WebSocketStream,
};
use url::Url;

/// `ClientWsStream` 类型别名，代表一个可能经过 TLS 加密的 TCP WebSocket 流。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 事件通道的默认容量。
pub const TRANSPORT_CHANNEL_CAPACITY: usize = 64;

/// `ClientConnection` 结构体代表一个活动的客户端 WebSocket 连接。
///
/// 它封装了与代理进行通信所需的发送端 (`SplitSink`) 和接收端 (`SplitStream`)。
pub struct ClientConnection {
    /// 用于向 WebSocket 服务器异步发送消息的发送端。
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    /// 用于从 WebSocket 服务器异步接收消息的接收端。
    pub ws_receiver: SplitStream<ClientWsStream>,
}

impl ClientConnection {
    /// 异步向代理发送一个 `WsMessage`。
    ///
    /// 先将 `WsMessage` 序列化为 JSON 字符串，再作为文本帧发送。
    pub async fn send_message(&mut self, message: &WsMessage) -> Result<(), WsError> {
        let msg_json = message.to_json_string()?;
        debug!("客户端：准备发送事件 '{}' (ID: {})", message.event, message.message_id);
        self.ws_sender.send(Message::Text(msg_json)).await?;
        Ok(())
    }
}

/// 异步连接到指定的 WebSocket 服务器。
///
/// 解析给定的 URL 字符串，使用 `tokio-tungstenite` 建立连接并完成握手，
/// 成功后把流拆分为发送端和接收端封装在 `ClientConnection` 中返回。
///
/// # Arguments
/// * `url_str` - 完整的 WebSocket URL 字符串 (例如 "ws://127.0.0.1:8080/test/socket.io")。
pub async fn connect_client(url_str: &str) -> Result<ClientConnection, WsError> {
    info!("客户端：开始尝试连接到 WebSocket 服务器，URL: {}", url_str);
    let parsed_url = Url::parse(url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("客户端：已成功连接到 {} (HTTP 状态码: {})", url_str, response.status());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("客户端：连接到 {} 失败，错误: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// 从给定的 WebSocket 接收流中异步接收并尝试解析一个 `WsMessage`。
///
/// 跳过 Ping/Pong 等控制帧（由底层库自动应答）。收到文本消息时尝试
/// 反序列化为 `WsMessage`；二进制消息视为协议错误；连接关闭返回 `None`。
pub async fn receive_message(
    ws_receiver: &mut SplitStream<ClientWsStream>,
) -> Option<Result<WsMessage, WsError>> {
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    break Some(serde_json::from_str::<WsMessage>(&text).map_err(|e| {
                        WsError::DeserializationError(format!(
                            "收到的文本消息反序列化为 WsMessage 失败: {}, 原始文本: '{}'",
                            e, text
                        ))
                    }));
                }
                Message::Binary(bin) => {
                    debug!("客户端：收到非预期的二进制消息，长度: {} 字节", bin.len());
                    break Some(Err(WsError::Message(
                        "客户端收到了非预期的 WebSocket 二进制消息".to_string(),
                    )));
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // 由 tokio-tungstenite 自动处理，继续等待业务消息
                }
                Message::Close(close_frame) => {
                    debug!("客户端：收到 Close 控制帧，详细信息: {:?}", close_frame);
                    break None;
                }
                Message::Frame(_) => {
                    debug!("客户端：收到非预期的底层原始 Frame 类型消息，正在跳过。");
                }
            },
            Some(Err(e)) => match e {
                TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed => {
                    debug!("客户端：连接已关闭 (接收时检测到)。");
                    break None;
                }
                _ => {
                    error!("客户端：从 WebSocket 流接收消息时发生底层错误: {}", e);
                    break Some(Err(WsError::WebSocketProtocolError(e)));
                }
            },
            None => {
                debug!("客户端：WebSocket 接收流已结束。");
                break None;
            }
        }
    }
}

// ------------------------------------------------------------------
// 事件传输层
// ------------------------------------------------------------------

/// 传输层交付给连接适配器的入站命名事件。
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// 连接（或重连）成功建立。
    Connect,
    /// 连接失败，附带底层错误描述。
    ConnectError(String),
    /// 单次连接尝试超时。
    ConnectTimeout,
    /// `connectToSpdz` 命令的回执。
    ConnectToSpdzResult {
        /// 状态码，0 表示成功。
        status: i32,
        /// 失败时的错误信息。
        message: Option<String>,
    },
    /// `sendData` 命令的回执。
    SendDataResult {
        /// 状态码，0 表示成功。
        status: i32,
        /// 失败时的错误信息。
        message: Option<String>,
    },
    /// 一条加密的 SPDZ 消息（密文字节）。
    SpdzMessage(Vec<u8>),
}

/// 连接适配器经传输层发出的出站命名事件。
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEmission {
    /// 请求代理与 SPDZ 引擎建立连接。
    ConnectToSpdz {
        /// 64 字节会话公钥的 128 字符十六进制表示。
        public_key: String,
        /// 是否复用已有的 SPDZ 连接。
        reuse_connection: bool,
    },
    /// 发送已编码的输入数据。
    SendData {
        /// 编码后的值列表。
        data: Vec<String>,
    },
}

/// 一个代理连接的传输通道对：入站事件接收端 + 出站事件发送端。
pub struct TransportChannels {
    /// 入站命名事件序列。
    pub events: mpsc::Receiver<TransportEvent>,
    /// 出站命名事件发送端。丢弃所有发送端会结束传输任务。
    pub emissions: mpsc::Sender<TransportEmission>,
}

/// 传输连接器：为一个代理 URL 建立事件传输。
///
/// 这是客户端核心与具体传输实现之间的接缝；测试可以注入一个
/// 直接由内存通道构造的实现。
pub trait ProxyConnector {
    /// 为 `url` 指向的代理建立（或准备建立）一条事件传输，返回其通道对。
    fn connect(&self, url: &str, options: &ConnectOptions) -> TransportChannels;
}

/// 基于 `tokio-tungstenite` 的默认连接器。
///
/// 每次 `connect` 派生一个后台任务运行 [`run_event_transport`]。
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl ProxyConnector for WsConnector {
    fn connect(&self, url: &str, options: &ConnectOptions) -> TransportChannels {
        let (events_tx, events_rx) = mpsc::channel(TRANSPORT_CHANNEL_CAPACITY);
        let (emissions_tx, emissions_rx) = mpsc::channel(TRANSPORT_CHANNEL_CAPACITY);
        let full_url = format!("{}{}", url, options.path);
        let options = options.clone();
        tokio::spawn(async move {
            run_event_transport(full_url, options, events_tx, emissions_rx).await;
        });
        TransportChannels { events: events_rx, emissions: emissions_tx }
    }
}

/// 运行一条事件传输直至其生命周期结束。
///
/// 连接失败与超时以 `ConnectError` / `ConnectTimeout` 事件值交付；
/// 按 `options` 中的重连参数自动重试，成功连接后重置尝试计数。
/// 当事件接收端或所有出站发送端被丢弃时任务结束。
pub async fn run_event_transport(
    full_url: String,
    options: ConnectOptions,
    events_tx: mpsc::Sender<TransportEvent>,
    mut emissions_rx: mpsc::Receiver<TransportEmission>,
) {
    // 未配对（连接建立前到达或发送失败需重投）的出站事件
    let mut pending: VecDeque<TransportEmission> = VecDeque::new();

    if !options.auto_connect {
        // autoConnect 关闭时，等第一条出站命令到达再发起连接
        match emissions_rx.recv().await {
            Some(first) => pending.push_back(first),
            None => return,
        }
    }

    let mut attempt: u32 = 0;
    loop {
        match tokio::time::timeout(options.timeout(), connect_client(&full_url)).await {
            Err(_elapsed) => {
                warn!("客户端：连接 {} 超时 (超过 {:?})", full_url, options.timeout());
                if events_tx.send(TransportEvent::ConnectTimeout).await.is_err() {
                    return;
                }
            }
            Ok(Err(e)) => {
                if events_tx.send(TransportEvent::ConnectError(e.to_string())).await.is_err() {
                    return;
                }
            }
            Ok(Ok(mut connection)) => {
                attempt = 0;
                if events_tx.send(TransportEvent::Connect).await.is_err() {
                    return;
                }
                if !run_session(&mut connection, &events_tx, &mut emissions_rx, &mut pending).await {
                    // 出站端或事件接收端已关闭，传输结束
                    return;
                }
                // 会话因连接断开结束，走重连逻辑
            }
        }

        if !options.reconnection || attempt >= options.reconnection_attempts {
            info!("客户端：{} 的重连已禁用或尝试次数 ({}) 用尽，事件传输结束。", full_url, attempt);
            return;
        }
        attempt += 1;
        tokio::time::sleep(options.reconnection_delay()).await;
    }
}

/// 运行一个已建立连接上的收发会话。
///
/// 返回 `true` 表示连接断开、应进入重连；返回 `false` 表示客户端侧
/// 已关闭（事件接收端或出站发送端被丢弃），传输应整体结束。
async fn run_session(
    connection: &mut ClientConnection,
    events_tx: &mpsc::Sender<TransportEvent>,
    emissions_rx: &mut mpsc::Receiver<TransportEmission>,
    pending: &mut VecDeque<TransportEmission>,
) -> bool {
    // 先补发连接建立前积压的出站事件
    while let Some(emission) = pending.pop_front() {
        let message = match emission_to_message(&emission) {
            Ok(m) => m,
            Err(e) => {
                error!("客户端：序列化出站事件失败，已丢弃: {}", e);
                continue;
            }
        };
        if let Err(e) = connection.send_message(&message).await {
            warn!("客户端：补发出站事件失败，连接可能已断开: {}", e);
            pending.push_front(emission);
            return true;
        }
    }

    loop {
        tokio::select! {
            incoming = receive_message(&mut connection.ws_receiver) => match incoming {
                Some(Ok(ws_message)) => {
                    if let Some(event) = map_incoming(ws_message) {
                        if events_tx.send(event).await.is_err() {
                            return false;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!("客户端：接收消息出错，将断开并重连: {}", e);
                    return true;
                }
                None => {
                    info!("客户端：连接已被对端关闭。");
                    return true;
                }
            },
            outgoing = emissions_rx.recv() => match outgoing {
                Some(emission) => {
                    let message = match emission_to_message(&emission) {
                        Ok(m) => m,
                        Err(e) => {
                            error!("客户端：序列化出站事件失败，已丢弃: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = connection.send_message(&message).await {
                        warn!("客户端：发送出站事件失败，连接可能已断开: {}", e);
                        pending.push_back(emission);
                        return true;
                    }
                }
                None => {
                    info!("客户端：所有出站发送端已丢弃，关闭事件传输。");
                    return false;
                }
            },
        }
    }
}

/// 把一条入站 `WsMessage` 信封翻译为传输事件。
///
/// 信封格式损坏（未知事件名、Payload 不匹配）只记录警告并跳过：
/// 解密/帧格式层面的错误归上层连接适配器管，信封层面的错误不属于
/// 协议定义的任何事件。
fn map_incoming(message: WsMessage) -> Option<TransportEvent> {
    match message.event.as_str() {
        CONNECT_TO_SPDZ_RESULT_EVENT => match message.deserialize_payload::<CommandResultPayload>() {
            Ok(payload) => Some(TransportEvent::ConnectToSpdzResult {
                status: payload.status,
                message: payload.error,
            }),
            Err(e) => {
                warn!("客户端：connectToSpdz_result 载荷无效，已跳过: {}", e);
                None
            }
        },
        SEND_DATA_RESULT_EVENT => match message.deserialize_payload::<CommandResultPayload>() {
            Ok(payload) => Some(TransportEvent::SendDataResult {
                status: payload.status,
                message: payload.error,
            }),
            Err(e) => {
                warn!("客户端：sendData_result 载荷无效，已跳过: {}", e);
                None
            }
        },
        SPDZ_MESSAGE_EVENT => match message.deserialize_payload::<SpdzMessagePayload>() {
            Ok(payload) => Some(TransportEvent::SpdzMessage(payload.data)),
            Err(e) => {
                warn!("客户端：spdz_message 载荷无效，已跳过: {}", e);
                None
            }
        },
        other => {
            warn!("客户端：收到未知事件 '{}'，已跳过。", other);
            None
        }
    }
}

/// 把一条出站传输事件编码为 `WsMessage` 信封。
fn emission_to_message(emission: &TransportEmission) -> Result<WsMessage, WsError> {
    match emission {
        TransportEmission::ConnectToSpdz { public_key, reuse_connection } => WsMessage::new(
            CONNECT_TO_SPDZ_EVENT,
            &ConnectToSpdzPayload {
                public_key: public_key.clone(),
                reuse_connection: *reuse_connection,
            },
        ),
        TransportEmission::SendData { data } => {
            WsMessage::new(SEND_DATA_EVENT, &SendDataPayload { data: data.clone() })
        }
    }
}
