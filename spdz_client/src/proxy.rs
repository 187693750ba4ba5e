// spdz_client/src/proxy.rs

//! 单个 SPDZ 代理的连接适配器。
//!
//! 适配器在独立的 Tokio 任务中消费传输层事件与命令总线：
//! 把连接生命周期事件、命令回执、解密解析后的分片与输出拆分到
//! 各自的类型化通道，把总线上的控制命令翻译为传输层发射。
//! 解密或帧解析失败不会终止适配器，失败作为值进入错误通道，
//! 坏帧之后的正常帧照常处理。

use crate::command::ProxyCommand;
use crate::crypto::MessageCipher;
use crate::error::FailureEvent;
use crate::frame::parse_frame;
use log::{debug, info, warn};
use spdz_models::enums::{ConnectionStatus, ControlKind, MessageType, RegType};
use spdz_websocket_utils::client::{TransportChannels, TransportEmission, TransportEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;

/// 适配器各输出通道的容量。
pub const PROXY_CHANNEL_CAPACITY: usize = 64;

/// 一个 SPDZ 代理的接入配置。
#[derive(Debug, Clone)]
pub struct SpdzProxy {
    /// 代理的 WebSocket 地址。
    pub url: String,
    /// 与该代理协商好的会话密钥。
    pub session_key: [u8; crate::crypto::SESSION_KEY_LEN],
}

/// 代理连接生命周期事件。
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    /// 连接状态。
    pub status: ConnectionStatus,
    /// 所属代理的 URL。
    pub url: String,
    /// 人类可读的状态说明。
    pub message: String,
}

/// 代理对一条控制命令的回执。
#[derive(Debug, Clone, PartialEq)]
pub struct ControlResponse {
    /// 回执对应的命令种类。
    pub kind: ControlKind,
    /// 所属代理的 URL。
    pub url: String,
    /// 代理是否执行成功。
    pub success: bool,
    /// 代理附带的说明（失败时为原因）。
    pub message: String,
}

/// 适配器对外暴露的类型化事件流。
pub struct ProxyStreams {
    /// 连接生命周期事件。
    pub connections: mpsc::Receiver<ConnectionEvent>,
    /// 控制命令回执。
    pub results: mpsc::Receiver<ControlResponse>,
    /// 输入分片载荷（原始字节，聚合层解码）。
    pub shares: mpsc::Receiver<Vec<u8>>,
    /// 输出结果载荷及其寄存器类型。
    pub outputs: mpsc::Receiver<(RegType, Vec<u8>)>,
    /// 本代理产生的失败事件。
    pub errors: mpsc::Receiver<FailureEvent>,
}

/// 一个已启动的代理连接适配器句柄。
pub struct ProxyConnection {
    url: String,
    task: TokioMutex<Option<JoinHandle<()>>>,
}

impl ProxyConnection {
    /// 启动适配器任务，返回句柄与类型化事件流。
    pub fn start(
        url: String,
        cipher: Arc<dyn MessageCipher>,
        transport: TransportChannels,
        commands: broadcast::Receiver<ProxyCommand>,
    ) -> (ProxyConnection, ProxyStreams) {
        let (connections_tx, connections_rx) = mpsc::channel(PROXY_CHANNEL_CAPACITY);
        let (results_tx, results_rx) = mpsc::channel(PROXY_CHANNEL_CAPACITY);
        let (shares_tx, shares_rx) = mpsc::channel(PROXY_CHANNEL_CAPACITY);
        let (outputs_tx, outputs_rx) = mpsc::channel(PROXY_CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(PROXY_CHANNEL_CAPACITY);

        let task_url = url.clone();
        let handle = tokio::spawn(run_adapter(
            task_url,
            cipher,
            transport,
            commands,
            AdapterSenders {
                connections: connections_tx,
                results: results_tx,
                shares: shares_tx,
                outputs: outputs_tx,
                errors: errors_tx,
            },
        ));

        let connection = ProxyConnection {
            url,
            task: TokioMutex::new(Some(handle)),
        };
        let streams = ProxyStreams {
            connections: connections_rx,
            results: results_rx,
            shares: shares_rx,
            outputs: outputs_rx,
            errors: errors_rx,
        };
        (connection, streams)
    }

    /// 所属代理的 URL。
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 关闭适配器。可安全地重复调用，后续调用为空操作。
    pub async fn close(&self) {
        let mut guard = self.task.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
            info!("[代理适配器] 已关闭与 {} 的适配器任务", self.url);
        } else {
            debug!("[代理适配器] {} 的适配器已关闭，忽略重复关闭", self.url);
        }
    }
}

struct AdapterSenders {
    connections: mpsc::Sender<ConnectionEvent>,
    results: mpsc::Sender<ControlResponse>,
    shares: mpsc::Sender<Vec<u8>>,
    outputs: mpsc::Sender<(RegType, Vec<u8>)>,
    errors: mpsc::Sender<FailureEvent>,
}

async fn run_adapter(
    url: String,
    cipher: Arc<dyn MessageCipher>,
    mut transport: TransportChannels,
    mut commands: broadcast::Receiver<ProxyCommand>,
    senders: AdapterSenders,
) {
    // 命令总线关闭后只停止命令分支，事件继续转发到流末尾。
    let mut commands_open = true;

    loop {
        tokio::select! {
            event = transport.events.recv() => match event {
                Some(event) => handle_event(&url, cipher.as_ref(), event, &senders).await,
                None => {
                    info!("[代理适配器] {} 的传输层事件流已结束", url);
                    break;
                }
            },
            command = commands.recv(), if commands_open => match command {
                Ok(command) => handle_command(&url, command, &transport.emissions).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("[代理适配器] {} 的命令订阅滞后，跳过了 {} 条命令", url, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("[代理适配器] {} 的命令总线已关闭", url);
                    commands_open = false;
                }
            },
        }
    }
}

async fn handle_event(
    url: &str,
    cipher: &dyn MessageCipher,
    event: TransportEvent,
    senders: &AdapterSenders,
) {
    match event {
        TransportEvent::Connect => {
            let _ = senders
                .connections
                .send(ConnectionEvent {
                    status: ConnectionStatus::Ok,
                    url: url.to_string(),
                    message: "SPDZ 代理连接已建立。".to_string(),
                })
                .await;
        }
        TransportEvent::ConnectError(reason) => {
            let _ = senders
                .connections
                .send(ConnectionEvent {
                    status: ConnectionStatus::ConnectError,
                    url: url.to_string(),
                    message: reason,
                })
                .await;
        }
        TransportEvent::ConnectTimeout => {
            let _ = senders
                .connections
                .send(ConnectionEvent {
                    status: ConnectionStatus::ConnectTimeout,
                    url: url.to_string(),
                    message: "SPDZ 代理连接超时。".to_string(),
                })
                .await;
        }
        TransportEvent::ConnectToSpdzResult { status, message } => {
            let _ = senders
                .results
                .send(control_response(ControlKind::ConnectToSpdz, url, status, message))
                .await;
        }
        TransportEvent::SendDataResult { status, message } => {
            let _ = senders
                .results
                .send(control_response(ControlKind::SendData, url, status, message))
                .await;
        }
        TransportEvent::SpdzMessage(ciphertext) => {
            let frame = cipher
                .decrypt(&ciphertext)
                .and_then(|plaintext| parse_frame(&plaintext));
            match frame {
                Ok(frame) => match frame.message_type {
                    MessageType::InputShare => {
                        let _ = senders.shares.send(frame.payload).await;
                    }
                    MessageType::OutputResult => {
                        let _ = senders.outputs.send((frame.reg_type, frame.payload)).await;
                    }
                },
                Err(error) => {
                    warn!("[代理适配器] 处理来自 {} 的消息失败: {}", url, error);
                    let _ = senders.errors.send(FailureEvent::for_proxy(url, error)).await;
                }
            }
        }
    }
}

fn control_response(
    kind: ControlKind,
    url: &str,
    status: i32,
    message: Option<String>,
) -> ControlResponse {
    let success = status == 0;
    let message = message.unwrap_or_else(|| {
        if success {
            "命令执行成功。".to_string()
        } else {
            format!("命令执行失败，状态码 {}。", status)
        }
    });
    ControlResponse { kind, url: url.to_string(), success, message }
}

async fn handle_command(
    url: &str,
    command: ProxyCommand,
    emissions: &mpsc::Sender<TransportEmission>,
) {
    let emission = match command {
        ProxyCommand::ConnectToSpdz { public_key, reuse_connection } => {
            TransportEmission::ConnectToSpdz { public_key, reuse_connection }
        }
        ProxyCommand::SendData { data } => TransportEmission::SendData { data },
        ProxyCommand::Unrecognized { tag } => {
            warn!("[代理适配器] {} 不知道如何处理命令 '{}'，已丢弃", url, tag);
            return;
        }
    };
    if emissions.send(emission).await.is_err() {
        warn!("[代理适配器] {} 的传输层发射通道已关闭，命令被丢弃", url);
    }
}
