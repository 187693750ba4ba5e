// spdz_client/src/aggregate.rs

//! 多代理事件流的聚合层。
//!
//! 把 N 个代理适配器的类型化流合并为客户端级的流：
//!
//! * 连接事件走最新值合并，输出全体代理的连接状态快照；
//! * 命令回执、分片、输出走位置联接，全体到齐才组成一个批次；
//! * 联接后的分片批次逐位置做域内求和，输出批次按声明顺序拼接
//!   并解码为明文整数；
//! * 各代理的失败事件与聚合阶段自身的解码失败汇入同一条失败通道，
//!   不参与任何合并。

use crate::combine::{latest_merge, positional_zip, COMBINE_CHANNEL_CAPACITY};
use crate::error::FailureEvent;
use crate::field::{decode_output_batch, decode_share_batch, Gfp};
use crate::proxy::{ConnectionEvent, ControlResponse, ProxyStreams};
use log::debug;
use spdz_models::options::ConnectOptions;
use tokio::sync::mpsc;

/// 聚合后的客户端级事件流。
pub struct AggregatedStreams {
    /// 全体代理的连接状态快照，任一代理状态变化即发出一次。
    pub connections: mpsc::Receiver<Vec<Option<ConnectionEvent>>>,
    /// 全体代理对同一条命令的回执批次。
    pub results: mpsc::Receiver<Vec<ControlResponse>>,
    /// 解码并求和后的分片批次。
    pub shares: mpsc::Receiver<Vec<Gfp>>,
    /// 解码后的明文输出批次。
    pub outputs: mpsc::Receiver<Vec<i64>>,
}

/// 把各代理适配器的流接入组合策略，返回聚合后的流。
///
/// 所有失败（代理适配器的、联接缓冲的、批次解码的）都发往 `failures`。
pub fn aggregate(
    streams: Vec<ProxyStreams>,
    options: &ConnectOptions,
    failures: mpsc::Sender<FailureEvent>,
) -> AggregatedStreams {
    let proxy_count = streams.len();
    let mut connection_sources = Vec::with_capacity(proxy_count);
    let mut result_sources = Vec::with_capacity(proxy_count);
    let mut share_sources = Vec::with_capacity(proxy_count);
    let mut output_sources = Vec::with_capacity(proxy_count);

    for streams in streams {
        connection_sources.push(streams.connections);
        result_sources.push(streams.results);
        share_sources.push(streams.shares);
        output_sources.push(streams.outputs);

        // 代理级失败直接并入失败通道，不参与合并。
        let failures = failures.clone();
        let mut errors = streams.errors;
        tokio::spawn(async move {
            while let Some(failure) = errors.recv().await {
                if failures.send(failure).await.is_err() {
                    break;
                }
            }
        });
    }

    let limit = options.join_buffer_limit;
    let connections = latest_merge(connection_sources);
    let results = positional_zip(result_sources, limit, failures.clone());
    let mut raw_shares = positional_zip(share_sources, limit, failures.clone());
    let mut raw_outputs = positional_zip(output_sources, limit, failures.clone());

    let (shares_tx, shares_rx) = mpsc::channel(COMBINE_CHANNEL_CAPACITY);
    let share_failures = failures.clone();
    tokio::spawn(async move {
        while let Some(batch) = raw_shares.recv().await {
            match decode_share_batch(&batch) {
                Ok(shares) => {
                    if shares_tx.send(shares).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    if share_failures.send(FailureEvent::unattributed(error)).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("[聚合] 分片联接流结束，共 {} 个代理", proxy_count);
    });

    let (outputs_tx, outputs_rx) = mpsc::channel(COMBINE_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        while let Some(batch) = raw_outputs.recv().await {
            match decode_output_batch(&batch) {
                Ok(values) => {
                    if outputs_tx.send(values).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    if failures.send(FailureEvent::unattributed(error)).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("[聚合] 输出联接流结束，共 {} 个代理", proxy_count);
    });

    AggregatedStreams { connections, results, shares: shares_rx, outputs: outputs_rx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpdzClientError;
    use crate::field::GFP_PRIME;
    use spdz_models::enums::{ConnectionStatus, ControlKind, RegType};

    struct ProxyHandles {
        connections: mpsc::Sender<ConnectionEvent>,
        results: mpsc::Sender<ControlResponse>,
        shares: mpsc::Sender<Vec<u8>>,
        outputs: mpsc::Sender<(RegType, Vec<u8>)>,
        errors: mpsc::Sender<FailureEvent>,
    }

    fn proxy_pair() -> (ProxyHandles, ProxyStreams) {
        let (connections_tx, connections_rx) = mpsc::channel(16);
        let (results_tx, results_rx) = mpsc::channel(16);
        let (shares_tx, shares_rx) = mpsc::channel(16);
        let (outputs_tx, outputs_rx) = mpsc::channel(16);
        let (errors_tx, errors_rx) = mpsc::channel(16);
        (
            ProxyHandles {
                connections: connections_tx,
                results: results_tx,
                shares: shares_tx,
                outputs: outputs_tx,
                errors: errors_tx,
            },
            ProxyStreams {
                connections: connections_rx,
                results: results_rx,
                shares: shares_rx,
                outputs: outputs_rx,
                errors: errors_rx,
            },
        )
    }

    fn setup(
        proxy_count: usize,
    ) -> (Vec<ProxyHandles>, AggregatedStreams, mpsc::Receiver<FailureEvent>) {
        let (handles, streams): (Vec<_>, Vec<_>) = (0..proxy_count).map(|_| proxy_pair()).unzip();
        let (failures_tx, failures_rx) = mpsc::channel(16);
        let aggregated = aggregate(streams, &ConnectOptions::default(), failures_tx);
        (handles, aggregated, failures_rx)
    }

    fn connection_ok(url: &str) -> ConnectionEvent {
        ConnectionEvent {
            status: ConnectionStatus::Ok,
            url: url.to_string(),
            message: "已连接".to_string(),
        }
    }

    #[tokio::test]
    async fn test_connection_snapshots_use_latest_merge() {
        let (handles, mut aggregated, _failures) = setup(2);

        handles[1].connections.send(connection_ok("ws://b")).await.unwrap();
        let snapshot = aggregated.connections.recv().await.unwrap();
        assert!(snapshot[0].is_none());
        assert_eq!(snapshot[1].as_ref().map(|e| e.url.as_str()), Some("ws://b"));
    }

    #[tokio::test]
    async fn test_shares_are_joined_and_summed() {
        let (handles, mut aggregated, _failures) = setup(2);

        handles[0].shares.send(5u128.to_be_bytes().to_vec()).await.unwrap();
        handles[1]
            .shares
            .send((GFP_PRIME - 2).to_be_bytes().to_vec())
            .await
            .unwrap();

        let batch = aggregated.shares.recv().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].value(), 3);
    }

    #[tokio::test]
    async fn test_outputs_are_concatenated_in_declaration_order() {
        let (handles, mut aggregated, _failures) = setup(2);

        handles[0]
            .outputs
            .send((RegType::Int, 1i32.to_be_bytes().to_vec()))
            .await
            .unwrap();
        handles[1]
            .outputs
            .send((RegType::Int, 2i32.to_be_bytes().to_vec()))
            .await
            .unwrap();

        assert_eq!(aggregated.outputs.recv().await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_reg_type_mismatch_goes_to_failures() {
        let (handles, mut aggregated, mut failures) = setup(2);

        handles[0]
            .outputs
            .send((RegType::ModP, vec![0u8; 16]))
            .await
            .unwrap();
        handles[1]
            .outputs
            .send((RegType::Int, 0i32.to_be_bytes().to_vec()))
            .await
            .unwrap();

        let failure = failures.recv().await.unwrap();
        assert_eq!(
            failure.error,
            SpdzClientError::RegTypeMismatch { first: RegType::ModP, other: RegType::Int }
        );
        // 坏批次不会出现在输出流上。
        handles[0]
            .outputs
            .send((RegType::Int, 9i32.to_be_bytes().to_vec()))
            .await
            .unwrap();
        handles[1]
            .outputs
            .send((RegType::Int, 8i32.to_be_bytes().to_vec()))
            .await
            .unwrap();
        assert_eq!(aggregated.outputs.recv().await.unwrap(), vec![9, 8]);
    }

    #[tokio::test]
    async fn test_proxy_failures_are_forwarded() {
        let (handles, _aggregated, mut failures) = setup(1);

        handles[0]
            .errors
            .send(FailureEvent::for_proxy(
                "ws://a",
                SpdzClientError::MalformedFrame { len: 2 },
            ))
            .await
            .unwrap();

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.url.as_deref(), Some("ws://a"));
    }

    #[tokio::test]
    async fn test_command_results_join_positionally() {
        let (handles, mut aggregated, _failures) = setup(2);

        for (idx, h) in handles.iter().enumerate() {
            h.results
                .send(ControlResponse {
                    kind: ControlKind::ConnectToSpdz,
                    url: format!("ws://p{}", idx),
                    success: idx == 0,
                    message: String::new(),
                })
                .await
                .unwrap();
        }

        let batch = aggregated.results.recv().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch[0].success);
        assert!(!batch[1].success);
    }
}
