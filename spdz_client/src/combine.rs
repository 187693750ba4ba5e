// spdz_client/src/combine.rs

//! 多路通道的流组合策略。
//!
//! 聚合层把 N 个代理的同类流合并成一条流，使用两种策略：
//!
//! * [`latest_merge`] —— 最新值合并。任一来源到事件就发出一次全体
//!   快照，未报告过的来源以 `None` 占位。用于连接状态这类
//!   "只关心各代理最新状态" 的流。
//! * [`positional_zip`] —— 位置联接。各来源的第 k 个事件配成第 k 个
//!   批次，先到的事件排队等待慢的来源。用于分片 / 输出 / 命令回执
//!   这类 "必须全体到齐才有意义" 的流。

use crate::error::{FailureEvent, SpdzClientError};
use log::{debug, warn};
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// 组合器内部与输出通道的容量。
pub const COMBINE_CHANNEL_CAPACITY: usize = 64;

/// 最新值合并。
///
/// 任一来源每产生一个事件，输出一次长度为 N 的快照，位置 `i` 是来源
/// `i` 迄今最新的值（尚未报告过则为 `None`）。所有来源关闭后输出流
/// 关闭。
pub fn latest_merge<T>(sources: Vec<mpsc::Receiver<T>>) -> mpsc::Receiver<Vec<Option<T>>>
where
    T: Clone + Send + 'static,
{
    let count = sources.len();
    let (out_tx, out_rx) = mpsc::channel(COMBINE_CHANNEL_CAPACITY);
    let (inner_tx, mut inner_rx) = mpsc::channel::<(usize, T)>(COMBINE_CHANNEL_CAPACITY);

    for (idx, mut source) in sources.into_iter().enumerate() {
        let inner_tx = inner_tx.clone();
        tokio::spawn(async move {
            while let Some(value) = source.recv().await {
                if inner_tx.send((idx, value)).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(inner_tx);

    tokio::spawn(async move {
        let mut latest: Vec<Option<T>> = (0..count).map(|_| None).collect();
        while let Some((idx, value)) = inner_rx.recv().await {
            latest[idx] = Some(value);
            if out_tx.send(latest.clone()).await.is_err() {
                break;
            }
        }
        debug!("[流组合] 最新值合并结束，全部 {} 个来源已关闭", count);
    });

    out_rx
}

/// 位置联接。
///
/// 各来源的第 k 个事件组成第 k 个输出批次（按来源声明顺序排列）。
/// 任一来源的积压达到 `pending_limit` 时，向 `failures` 报告
/// [`SpdzClientError::JoinBufferOverflow`] 并终止联接；任一来源关闭且
/// 其队列耗尽后，联接随之结束。
pub fn positional_zip<T>(
    sources: Vec<mpsc::Receiver<T>>,
    pending_limit: usize,
    failures: mpsc::Sender<FailureEvent>,
) -> mpsc::Receiver<Vec<T>>
where
    T: Send + 'static,
{
    let count = sources.len();
    let (out_tx, out_rx) = mpsc::channel(COMBINE_CHANNEL_CAPACITY);
    let (inner_tx, mut inner_rx) = mpsc::channel::<(usize, Option<T>)>(COMBINE_CHANNEL_CAPACITY);

    for (idx, mut source) in sources.into_iter().enumerate() {
        let inner_tx = inner_tx.clone();
        tokio::spawn(async move {
            while let Some(value) = source.recv().await {
                if inner_tx.send((idx, Some(value))).await.is_err() {
                    return;
                }
            }
            // 来源关闭标记，组合器据此判断联接是否还能出批次。
            let _ = inner_tx.send((idx, None)).await;
        });
    }
    drop(inner_tx);

    tokio::spawn(async move {
        let mut queues: Vec<VecDeque<T>> = (0..count).map(|_| VecDeque::new()).collect();
        let mut closed = vec![false; count];

        while let Some((idx, item)) = inner_rx.recv().await {
            match item {
                Some(value) => {
                    if queues[idx].len() >= pending_limit {
                        warn!(
                            "[流组合] 来源 {} 的联接积压达到上限 {}，终止联接",
                            idx, pending_limit
                        );
                        let _ = failures
                            .send(FailureEvent::unattributed(
                                SpdzClientError::JoinBufferOverflow {
                                    pending: queues[idx].len(),
                                    limit: pending_limit,
                                },
                            ))
                            .await;
                        return;
                    }
                    queues[idx].push_back(value);

                    while queues.iter().all(|q| !q.is_empty()) {
                        let batch: Option<Vec<T>> =
                            queues.iter_mut().map(|q| q.pop_front()).collect();
                        match batch {
                            Some(batch) => {
                                if out_tx.send(batch).await.is_err() {
                                    return;
                                }
                            }
                            None => return,
                        }
                    }
                }
                None => closed[idx] = true,
            }

            // 已关闭来源的队列耗尽后不可能再凑齐批次。
            if closed.iter().zip(queues.iter()).any(|(c, q)| *c && q.is_empty()) {
                debug!("[流组合] 某个来源已关闭且队列耗尽，位置联接结束");
                return;
            }
        }
    });

    out_rx
}
