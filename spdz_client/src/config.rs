// spdz_client/src/config.rs

//! 客户端配置的加载与解析。
//!
//! 配置是一个 JSON 文件：代理列表（URL 与代理公钥）加可选的连接
//! 选项。公钥在装配前与客户端私钥协商出各代理的会话密钥。

use crate::crypto::{derive_session_key, SESSION_KEY_LEN};
use crate::error::SpdzClientError;
use crate::proxy::SpdzProxy;
use anyhow::{Context, Result};
use serde::Deserialize;
use spdz_models::options::ConnectOptions;
use std::path::Path;

/// 配置文件中的一条代理记录。
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyEntry {
    /// 代理的 WebSocket 地址（不含 socket 路径）。
    pub url: String,
    /// 代理的 X25519 公钥，64 个十六进制字符。
    pub public_key: String,
}

/// 客户端配置。
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// 参与计算的代理列表，顺序即流水线中的位置顺序。
    pub proxies: Vec<ProxyEntry>,
    /// 连接选项，缺省时使用默认值。
    #[serde(default)]
    pub options: ConnectOptions,
}

impl ClientConfig {
    /// 从 JSON 文件加载配置。
    pub fn load(path: &Path) -> Result<ClientConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: ClientConfig = serde_json::from_str(&content)
            .with_context(|| format!("配置文件 JSON 解析失败: {}", path.display()))?;
        Ok(config)
    }

    /// 用客户端私钥为每条代理记录协商会话密钥。
    pub fn resolve_proxies(
        &self,
        client_secret: [u8; SESSION_KEY_LEN],
    ) -> Result<Vec<SpdzProxy>, SpdzClientError> {
        self.proxies
            .iter()
            .map(|entry| {
                let session_key = derive_session_key(client_secret, &entry.public_key)?;
                Ok(SpdzProxy { url: entry.url.clone(), session_key })
            })
            .collect()
    }
}
