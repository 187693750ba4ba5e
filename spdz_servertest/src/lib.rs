// spdz_servertest/src/lib.rs

//! SPDZ 测试代理服务器库。
//!
//! 模拟 SPDZ 代理的 WebSocket 协议面：应答 `connectToSpdz` 与
//! `sendData` 命令，并周期性下发加密的输入分片，供客户端在没有
//! 真实 SPDZ 引擎的环境中联调。

pub mod proxy;
