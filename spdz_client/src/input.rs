// spdz_client/src/input.rs

//! 用户输入与分片批次的联接。
//!
//! 发送秘密输入需要两个来源按位置配对：用户提交的第 k 批输入值与
//! 聚合层产出的第 k 批（已求和的）分片。配对成功后逐位置计算
//! `share + input` 并编码为十六进制，通过命令总线以 `SendData`
//! 广播给全体代理；数量不一致的配对产生失败值，联接本身继续。

use crate::command::{CommandBus, ProxyCommand};
use crate::error::{FailureEvent, SpdzClientError};
use crate::field::Gfp;
use log::{debug, warn};
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// 联接器输出通道容量。
const INPUT_CHANNEL_CAPACITY: usize = 64;

/// 把一批输入值与一批分片配对编码。
///
/// 数量不一致时返回 [`SpdzClientError::LengthMismatch`]。
pub fn encode_input_batch(
    inputs: &[i64],
    shares: &[Gfp],
) -> Result<Vec<String>, SpdzClientError> {
    if inputs.len() != shares.len() {
        return Err(SpdzClientError::LengthMismatch {
            inputs: inputs.len(),
            shares: shares.len(),
        });
    }
    Ok(inputs
        .iter()
        .zip(shares)
        .map(|(input, share)| share.add(&Gfp::lift(*input)).to_hex_string())
        .collect())
}

/// 启动输入联接任务。
///
/// 返回的通道回放每次成功发送的编码数据（供观察 / 测试）。
/// 任一来源的积压达到 `pending_limit` 时报告溢出并终止联接；
/// 任一来源关闭且其队列耗尽后联接结束。
pub fn spawn_input_joiner(
    mut inputs: mpsc::Receiver<Vec<i64>>,
    mut shares: mpsc::Receiver<Vec<Gfp>>,
    bus: CommandBus,
    failures: mpsc::Sender<FailureEvent>,
    pending_limit: usize,
) -> mpsc::Receiver<Vec<String>> {
    let (sent_tx, sent_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut input_queue: VecDeque<Vec<i64>> = VecDeque::new();
        let mut share_queue: VecDeque<Vec<Gfp>> = VecDeque::new();
        let mut inputs_open = true;
        let mut shares_open = true;

        loop {
            tokio::select! {
                item = inputs.recv(), if inputs_open => match item {
                    Some(batch) => {
                        if input_queue.len() >= pending_limit {
                            report_overflow(&failures, input_queue.len(), pending_limit).await;
                            return;
                        }
                        input_queue.push_back(batch);
                    }
                    None => inputs_open = false,
                },
                item = shares.recv(), if shares_open => match item {
                    Some(batch) => {
                        if share_queue.len() >= pending_limit {
                            report_overflow(&failures, share_queue.len(), pending_limit).await;
                            return;
                        }
                        share_queue.push_back(batch);
                    }
                    None => shares_open = false,
                },
                else => break,
            }

            while !input_queue.is_empty() && !share_queue.is_empty() {
                let (Some(input_batch), Some(share_batch)) =
                    (input_queue.pop_front(), share_queue.pop_front())
                else {
                    break;
                };
                match encode_input_batch(&input_batch, &share_batch) {
                    Ok(data) => {
                        if let Err(error) =
                            bus.publish(ProxyCommand::SendData { data: data.clone() })
                        {
                            warn!("[输入联接] 无法广播输入数据: {}", error);
                        }
                        let _ = sent_tx.send(data).await;
                    }
                    Err(error) => {
                        let _ = failures.send(FailureEvent::unattributed(error)).await;
                    }
                }
            }

            if (!inputs_open && input_queue.is_empty())
                || (!shares_open && share_queue.is_empty())
            {
                break;
            }
        }
        debug!("[输入联接] 联接任务结束");
    });

    sent_rx
}

async fn report_overflow(failures: &mpsc::Sender<FailureEvent>, pending: usize, limit: usize) {
    warn!("[输入联接] 积压达到上限 {}，终止联接", limit);
    let _ = failures
        .send(FailureEvent::unattributed(SpdzClientError::JoinBufferOverflow {
            pending,
            limit,
        }))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::GFP_PRIME;

    struct Harness {
        inputs_tx: mpsc::Sender<Vec<i64>>,
        shares_tx: mpsc::Sender<Vec<Gfp>>,
        bus_rx: tokio::sync::broadcast::Receiver<ProxyCommand>,
        failures_rx: mpsc::Receiver<FailureEvent>,
        sent_rx: mpsc::Receiver<Vec<String>>,
    }

    fn start_harness(pending_limit: usize) -> Harness {
        let (inputs_tx, inputs_rx) = mpsc::channel(16);
        let (shares_tx, shares_rx) = mpsc::channel(16);
        let (failures_tx, failures_rx) = mpsc::channel(16);
        let bus = CommandBus::new();
        let bus_rx = bus.subscribe();
        let sent_rx = spawn_input_joiner(inputs_rx, shares_rx, bus, failures_tx, pending_limit);
        Harness { inputs_tx, shares_tx, bus_rx, failures_rx, sent_rx }
    }

    #[tokio::test]
    async fn test_joined_pair_is_encoded_and_broadcast() {
        let mut h = start_harness(16);

        h.shares_tx
            .send(vec![Gfp::from_residue(10), Gfp::from_residue(GFP_PRIME - 1)])
            .await
            .unwrap();
        h.inputs_tx.send(vec![5, 3]).await.unwrap();

        let expected = vec![
            Gfp::from_residue(15).to_hex_string(),
            Gfp::from_residue(2).to_hex_string(),
        ];
        assert_eq!(h.sent_rx.recv().await.unwrap(), expected);

        match h.bus_rx.recv().await.unwrap() {
            ProxyCommand::SendData { data } => assert_eq!(data, expected),
            other => panic!("收到了非预期的命令: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_length_mismatch_reports_failure_and_join_continues() {
        let mut h = start_harness(16);

        h.inputs_tx.send(vec![1, 2, 3]).await.unwrap();
        h.shares_tx.send(vec![Gfp::from_residue(1)]).await.unwrap();

        let failure = h.failures_rx.recv().await.unwrap();
        assert_eq!(
            failure.error,
            SpdzClientError::LengthMismatch { inputs: 3, shares: 1 }
        );

        // 坏配对被消费掉，下一对正常处理。
        h.inputs_tx.send(vec![4]).await.unwrap();
        h.shares_tx.send(vec![Gfp::from_residue(6)]).await.unwrap();
        assert_eq!(
            h.sent_rx.recv().await.unwrap(),
            vec![Gfp::from_residue(10).to_hex_string()]
        );
    }

    #[tokio::test]
    async fn test_overflow_ends_join() {
        let mut h = start_harness(2);

        for _ in 0..3 {
            h.inputs_tx.send(vec![1]).await.unwrap();
        }

        let failure = h.failures_rx.recv().await.unwrap();
        assert_eq!(
            failure.error,
            SpdzClientError::JoinBufferOverflow { pending: 2, limit: 2 }
        );
        assert!(h.sent_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_join_ends_when_share_stream_closes() {
        let mut h = start_harness(16);
        drop(h.shares_tx);
        assert!(h.sent_rx.recv().await.is_none());
    }
}
