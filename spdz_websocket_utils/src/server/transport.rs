// spdz_websocket_utils/src/server/transport.rs

//! 包含服务端 WebSocket 监听、接受连接和通信逻辑。
//!
//! 本模块只提供一个极简的接受循环：每个成功握手的连接被拆分为
//! 发送端（封装为 [`ConnectionHandler`]）与接收端，交给调用方提供的
//! 连接处理回调。SPDZ 代理的业务语义（命令回执、消息推送）由
//! `spdz_servertest` 在回调中实现。

use crate::error::WsError;
use crate::message::WsMessage;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use log::{debug, error, info};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    accept_async, tungstenite::protocol::Message, tungstenite::Error as TungsteniteError,
    WebSocketStream,
};

/// `ServerWsStream` 是一个类型别名，代表经过 WebSocket 握手后的 TCP 流。
pub type ServerWsStream = WebSocketStream<TcpStream>;

/// 一条已建立连接的发送端封装。
pub struct ConnectionHandler {
    /// 向客户端发送消息的 `Sink`。
    ws_sender: SplitSink<ServerWsStream, Message>,
    /// 连接方地址，用于日志。
    peer_addr: SocketAddr,
}

impl ConnectionHandler {
    /// 异步向客户端发送一个 `WsMessage`。
    pub async fn send_message(&mut self, message: &WsMessage) -> Result<(), WsError> {
        let msg_json = message.to_json_string()?;
        debug!("服务端：向 {} 发送事件 '{}'", self.peer_addr, message.event);
        self.ws_sender.send(Message::Text(msg_json)).await?;
        Ok(())
    }

    /// 连接方地址。
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// 启动 WebSocket 服务器并开始监听指定的地址。
///
/// 对于每一个成功建立的 WebSocket 连接，都会在新的 Tokio 任务中调用
/// `on_connect` 回调进行处理。服务器持续运行，直到监听器绑定失败或
/// 进程被终止。
///
/// # Arguments
/// * `addr`: 服务器监听的地址 (例如 "127.0.0.1:8080")。
/// * `on_connect`: 连接处理回调，接收该连接的 `ConnectionHandler`（发送端）
///   与 `SplitStream`（接收端）。
pub async fn start_server<F, Fut>(addr: String, on_connect: F) -> Result<(), WsError>
where
    F: Fn(ConnectionHandler, SplitStream<ServerWsStream>) -> Fut + Send + Sync + Clone + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(&addr).await?;
    info!("服务端：WebSocket 服务器正在监听地址: {}", addr);

    loop {
        match listener.accept().await {
            Ok((tcp_stream, peer_addr)) => {
                info!("服务端：从 {} 接受了新的 TCP 连接", peer_addr);
                let on_connect_callback = on_connect.clone();

                tokio::spawn(async move {
                    match accept_async(tcp_stream).await {
                        Ok(ws_stream) => {
                            info!("服务端：与 {} 的 WebSocket 握手成功", peer_addr);
                            let (ws_sender, ws_receiver) = ws_stream.split();
                            let handler = ConnectionHandler { ws_sender, peer_addr };
                            on_connect_callback(handler, ws_receiver).await;
                        }
                        Err(e) => {
                            error!("服务端：与 {} 的 WebSocket 握手失败: {}", peer_addr, e);
                        }
                    }
                });
            }
            Err(e) => {
                error!("服务端：接受 TCP 连接失败: {}。服务器将继续运行。", e);
            }
        }
    }
}

/// 从给定的服务端接收流中异步接收并尝试解析一个 `WsMessage`。
///
/// 语义与客户端的 `receive_message` 一致：跳过控制帧，连接关闭返回 `None`。
pub async fn receive_message(
    ws_receiver: &mut SplitStream<ServerWsStream>,
) -> Option<Result<WsMessage, WsError>> {
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    break Some(serde_json::from_str::<WsMessage>(&text).map_err(|e| {
                        WsError::DeserializationError(format!(
                            "服务端收到的文本消息反序列化为 WsMessage 失败: {}",
                            e
                        ))
                    }));
                }
                Message::Binary(_) => {
                    break Some(Err(WsError::Message(
                        "服务端收到了非预期的 WebSocket 二进制消息".to_string(),
                    )));
                }
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(close_frame) => {
                    debug!("服务端：收到 Close 控制帧: {:?}", close_frame);
                    break None;
                }
                Message::Frame(_) => {
                    debug!("服务端：收到非预期的底层 Frame 类型消息，正在跳过。");
                }
            },
            Some(Err(e)) => match e {
                TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed => break None,
                _ => {
                    error!("服务端：从 WebSocket 流接收消息时发生底层错误: {}", e);
                    break Some(Err(WsError::WebSocketProtocolError(e)));
                }
            },
            None => break None,
        }
    }
}
