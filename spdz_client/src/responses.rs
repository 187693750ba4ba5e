// spdz_client/src/responses.rs

//! 合并响应流与错误投影。
//!
//! 客户端对外只暴露一条响应流：连接状态快照、命令回执批次和失败
//! 事件都被映射为统一的 [`SpdzResponse`] 列表，再折叠成一个
//! [`ResponseBundle`]。折叠规则沿用代理协议的语义：响应类型取列表
//! 中最后一条的类型，整体成功当且仅当列表中每一条都成功。
//! 失败事件不参与任何合并，逐条投影为失败包。

use crate::error::FailureEvent;
use crate::proxy::{ConnectionEvent, ControlResponse};
use log::debug;
use spdz_models::enums::{ConnectionStatus, ControlKind, ResponseType};
use tokio::sync::mpsc;

/// 响应流通道容量。
const RESPONSE_CHANNEL_CAPACITY: usize = 64;

/// 一条规整化的客户端响应。
#[derive(Debug, Clone, PartialEq)]
pub struct SpdzResponse {
    /// 响应种类。
    pub response_type: ResponseType,
    /// 是否成功。
    pub success: bool,
    /// 所属代理的 URL（失败事件可能无法归因）。
    pub url: Option<String>,
    /// 人类可读的说明。
    pub message: String,
}

/// 折叠后的响应包。
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBundle {
    /// 包的整体类型，取成员列表最后一条的类型。
    pub response_type: ResponseType,
    /// 整体是否成功：列表中每一条都成功才为真。
    pub success: bool,
    /// 折叠前的完整响应列表。
    pub responses: Vec<SpdzResponse>,
}

/// 把一组响应折叠为一个响应包。
///
/// `success` 是对全体成员成功标志的合取，空列表时取合取的单位元
/// `true`；空列表的类型折叠为 [`ResponseType::Error`]。
pub fn process_response_message(responses: Vec<SpdzResponse>) -> ResponseBundle {
    let response_type = responses
        .last()
        .map(|r| r.response_type)
        .unwrap_or(ResponseType::Error);
    let success = responses.iter().all(|r| r.success);
    ResponseBundle { response_type, success, responses }
}

/// 启动响应投影任务，把三类来源汇成一条响应包流。
///
/// 三个来源全部关闭后输出流关闭。
pub fn spawn_response_projection(
    mut connections: mpsc::Receiver<Vec<Option<ConnectionEvent>>>,
    mut results: mpsc::Receiver<Vec<ControlResponse>>,
    mut failures: mpsc::Receiver<FailureEvent>,
) -> mpsc::Receiver<ResponseBundle> {
    let (out_tx, out_rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);
    let (inner_tx, mut inner_rx) = mpsc::channel::<Vec<SpdzResponse>>(RESPONSE_CHANNEL_CAPACITY);

    let snapshot_tx = inner_tx.clone();
    tokio::spawn(async move {
        while let Some(snapshot) = connections.recv().await {
            let responses: Vec<SpdzResponse> =
                snapshot.into_iter().flatten().map(connection_response).collect();
            if snapshot_tx.send(responses).await.is_err() {
                break;
            }
        }
    });

    let result_tx = inner_tx.clone();
    tokio::spawn(async move {
        while let Some(batch) = results.recv().await {
            let responses: Vec<SpdzResponse> = batch.into_iter().map(control_response).collect();
            if result_tx.send(responses).await.is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(failure) = failures.recv().await {
            let response = SpdzResponse {
                response_type: ResponseType::Error,
                success: false,
                url: failure.url.clone(),
                message: failure.error.to_string(),
            };
            if inner_tx.send(vec![response]).await.is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(responses) = inner_rx.recv().await {
            if out_tx.send(process_response_message(responses)).await.is_err() {
                break;
            }
        }
        debug!("[响应投影] 全部来源已关闭，响应流结束");
    });

    out_rx
}

fn connection_response(event: ConnectionEvent) -> SpdzResponse {
    SpdzResponse {
        response_type: ResponseType::ProxyConnect,
        success: event.status == ConnectionStatus::Ok,
        url: Some(event.url),
        message: event.message,
    }
}

fn control_response(response: ControlResponse) -> SpdzResponse {
    let response_type = match response.kind {
        ControlKind::ConnectToSpdz => ResponseType::SpdzConnect,
        ControlKind::SendData => ResponseType::SendInput,
    };
    SpdzResponse {
        response_type,
        success: response.success,
        url: Some(response.url),
        message: response.message,
    }
}
