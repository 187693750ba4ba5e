// spdz_websocket_utils/src/client/mod.rs

//! 客户端 WebSocket 传输层模块。

pub mod transport;

pub use transport::{
    connect_client, receive_message, ClientConnection, ClientWsStream, ProxyConnector,
    TransportChannels, TransportEmission, TransportEvent, WsConnector,
};
