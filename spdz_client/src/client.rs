// spdz_client/src/client.rs

//! SPDZ 代理客户端门面。
//!
//! [`SpdzProxyClient`] 把整条流水线装配起来：为每个代理建立传输
//! 连接与连接适配器，接上聚合层、输入联接与响应投影，对外暴露
//! 少量命令方法与三条出站流（响应包、明文输出、已发送数据）。
//! 传输层通过 [`ProxyConnector`] 注入，测试可以换成通道驱动的
//! 模拟实现。

use crate::aggregate::aggregate;
use crate::command::{CommandBus, ProxyCommand};
use crate::crypto::{MessageCipher, SessionCipher};
use crate::error::SpdzClientError;
use crate::input::spawn_input_joiner;
use crate::proxy::{ProxyConnection, SpdzProxy};
use crate::responses::{spawn_response_projection, ResponseBundle};
use log::info;
use spdz_models::options::ConnectOptions;
use spdz_websocket_utils::client::ProxyConnector;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 门面内部通道容量。
const CLIENT_CHANNEL_CAPACITY: usize = 64;

/// 多代理 SPDZ 客户端。
///
/// 每个实例持有自己的命令总线与代理连接，多个实例互不干扰。
/// 必须在 Tokio 运行时内创建。
pub struct SpdzProxyClient {
    proxies: Vec<ProxyConnection>,
    bus: CommandBus,
    inputs_tx: mpsc::Sender<Vec<i64>>,
    responses: mpsc::Receiver<ResponseBundle>,
    outputs: mpsc::Receiver<Vec<i64>>,
    sent_values: mpsc::Receiver<Vec<String>>,
}

impl SpdzProxyClient {
    /// 连接全部代理并装配事件流水线。
    ///
    /// 代理在 `proxies` 中的声明顺序决定了快照与批次中的位置。
    pub fn connect<C: ProxyConnector>(
        proxies: &[SpdzProxy],
        options: &ConnectOptions,
        connector: &C,
    ) -> SpdzProxyClient {
        info!("[SPDZ客户端] 正在连接 {} 个代理", proxies.len());

        let bus = CommandBus::new();
        let mut connections = Vec::with_capacity(proxies.len());
        let mut proxy_streams = Vec::with_capacity(proxies.len());
        for proxy in proxies {
            let transport = connector.connect(&proxy.url, options);
            let cipher: Arc<dyn MessageCipher> = Arc::new(SessionCipher::new(proxy.session_key));
            let (connection, streams) =
                ProxyConnection::start(proxy.url.clone(), cipher, transport, bus.subscribe());
            connections.push(connection);
            proxy_streams.push(streams);
        }

        let (failures_tx, failures_rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        let aggregated = aggregate(proxy_streams, options, failures_tx.clone());

        let (inputs_tx, inputs_rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        let sent_values = spawn_input_joiner(
            inputs_rx,
            aggregated.shares,
            bus.clone(),
            failures_tx,
            options.join_buffer_limit,
        );

        let responses =
            spawn_response_projection(aggregated.connections, aggregated.results, failures_rx);

        SpdzProxyClient {
            proxies: connections,
            bus,
            inputs_tx,
            responses,
            outputs: aggregated.outputs,
            sent_values,
        }
    }

    /// 已接入的代理数量。
    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    /// 要求全体代理代表本客户端连接 SPDZ 引擎。
    pub fn connect_to_spdz(
        &self,
        public_key: &str,
        reuse_connection: bool,
    ) -> Result<(), SpdzClientError> {
        self.bus.publish(ProxyCommand::ConnectToSpdz {
            public_key: public_key.to_string(),
            reuse_connection,
        })
    }

    /// 提交一批秘密输入值，等待分片到齐后自动编码发送。
    pub async fn send_input(&self, inputs: Vec<i64>) -> Result<(), SpdzClientError> {
        self.inputs_tx
            .send(inputs)
            .await
            .map_err(|_| SpdzClientError::ClientClosed)
    }

    /// 接收下一个合并响应包。流水线整体结束后返回 `None`。
    pub async fn next_response(&mut self) -> Option<ResponseBundle> {
        self.responses.recv().await
    }

    /// 接收下一批解码后的明文输出。
    pub async fn next_output(&mut self) -> Option<Vec<i64>> {
        self.outputs.recv().await
    }

    /// 接收下一批已成功发送的编码数据（观察用）。
    pub async fn next_sent_values(&mut self) -> Option<Vec<String>> {
        self.sent_values.recv().await
    }

    /// 关闭全部代理适配器。可安全地重复调用。
    pub async fn close(&self) {
        for proxy in &self.proxies {
            proxy.close().await;
        }
        info!("[SPDZ客户端] 已关闭全部 {} 个代理适配器", self.proxies.len());
    }
}
