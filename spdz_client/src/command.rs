// spdz_client/src/command.rs

//! 客户端命令总线。
//!
//! 发往代理的控制命令（连接 SPDZ 引擎、发送输入数据）通过一条
//! 客户端实例私有的广播总线分发，每个代理连接适配器各持有一个
//! 订阅端。总线随客户端实例创建与销毁，多个客户端实例互不串扰。

use crate::error::SpdzClientError;
use log::warn;
use tokio::sync::broadcast;

/// 广播总线容量。命令由用户操作驱动，频率远低于消息流。
pub const COMMAND_BUS_CAPACITY: usize = 32;

/// 发往全体代理的控制命令。
#[derive(Debug, Clone)]
pub enum ProxyCommand {
    /// 要求各代理代表客户端连接 SPDZ 引擎。
    ConnectToSpdz {
        /// 客户端会话公钥（十六进制）。
        public_key: String,
        /// 是否复用已有的引擎连接。
        reuse_connection: bool,
    },
    /// 要求各代理把一批编码后的输入数据转发给引擎。
    SendData {
        /// 十六进制编码的域元素列表。
        data: Vec<String>,
    },
    /// 无法识别的命令占位，适配器记录日志后丢弃。
    Unrecognized {
        /// 原始命令标签。
        tag: String,
    },
}

/// 命令总线：`publish` 侧归客户端门面持有，适配器通过 `subscribe` 接入。
#[derive(Debug, Clone)]
pub struct CommandBus {
    sender: broadcast::Sender<ProxyCommand>,
}

impl CommandBus {
    /// 创建一条新的命令总线。
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(COMMAND_BUS_CAPACITY);
        CommandBus { sender }
    }

    /// 向所有订阅的适配器广播一条命令。
    ///
    /// 所有适配器都已退出时返回 [`SpdzClientError::ClientClosed`]。
    pub fn publish(&self, command: ProxyCommand) -> Result<(), SpdzClientError> {
        if let ProxyCommand::Unrecognized { tag } = &command {
            warn!("[命令总线] 发布了无法识别的命令 '{}'，适配器将丢弃它", tag);
        }
        self.sender
            .send(command)
            .map(|_| ())
            .map_err(|_| SpdzClientError::ClientClosed)
    }

    /// 新建一个命令订阅端（每个代理连接适配器一个）。
    pub fn subscribe(&self) -> broadcast::Receiver<ProxyCommand> {
        self.sender.subscribe()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        CommandBus::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = CommandBus::new();
        let mut sub_a = bus.subscribe();
        let mut sub_b = bus.subscribe();

        bus.publish(ProxyCommand::SendData { data: vec!["0a".into()] }).unwrap();

        for sub in [&mut sub_a, &mut sub_b] {
            match sub.recv().await.unwrap() {
                ProxyCommand::SendData { data } => assert_eq!(data, vec!["0a".to_string()]),
                other => panic!("收到了非预期的命令: {:?}", other),
            }
        }
    }

    #[test]
    fn test_publish_without_subscribers_reports_closed() {
        let bus = CommandBus::new();
        assert_eq!(
            bus.publish(ProxyCommand::ConnectToSpdz {
                public_key: "ab".into(),
                reuse_connection: false,
            }),
            Err(SpdzClientError::ClientClosed)
        );
    }
}
