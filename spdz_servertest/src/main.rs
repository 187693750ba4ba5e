// spdz_servertest/src/main.rs

use anyhow::{Context, Result};
use log::{error, info, LevelFilter};
use spdz_client::crypto::SESSION_KEY_LEN;
use spdz_servertest::proxy::{run_proxy, ProxyConfig};
use std::time::Duration;

/// 两个模拟代理实例的会话密钥（与客户端联调配置约定一致）。
const PROXY_KEYS_HEX: [(&str, &str); 2] = [
    (
        "127.0.0.1:8091",
        "101112131415161718191a1b1c1d1e1f202122232425262728292a2b2c2d2e2f",
    ),
    (
        "127.0.0.1:8092",
        "303132333435363738393a3b3c3d3e3f404142434445464748494a4b4c4d4e4f",
    ),
];

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志记录器
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp_millis()
        .init();
    info!("[主程序] 日志系统已成功初始化 (env_logger)，默认级别: Info。");

    // 使用硬编码的代理配置，启动两个模拟代理实例
    for (addr, key_hex) in PROXY_KEYS_HEX {
        let decoded = hex::decode(key_hex).context("会话密钥十六进制解析失败")?;
        let session_key: [u8; SESSION_KEY_LEN] = decoded
            .as_slice()
            .try_into()
            .context("会话密钥长度必须为 32 字节")?;

        let config = ProxyConfig {
            addr: addr.to_string(),
            session_key,
            share_interval: Duration::from_secs(5),
        };
        info!("[主程序] 正在启动模拟代理实例: {}", addr);
        tokio::spawn(async move {
            if let Err(e) = run_proxy(config).await {
                error!("[主程序] 模拟代理 {} 异常退出: {}", addr, e);
            }
        });
    }

    info!("[主程序] 全部模拟代理已启动，按 Ctrl+C 退出。");
    tokio::signal::ctrl_c().await.context("等待终止信号失败")?;
    info!("[主程序] 收到终止信号，进程退出。");
    Ok(())
}
