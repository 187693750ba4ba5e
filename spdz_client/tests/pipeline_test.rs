// spdz_client/tests/pipeline_test.rs

//! 双代理流水线的端到端集成测试。
//!
//! 用内存通道模拟两个代理的传输层，完整走一遍客户端生命周期：
//! 连接、connectToSpdz、分片下发、输入发送、输出接收、坏帧投影
//! 与幂等关闭。

use spdz_client::client::SpdzProxyClient;
use spdz_client::crypto::{MessageCipher, SessionCipher};
use spdz_client::field::{Gfp, GFP_PRIME};
use spdz_client::frame::encode_frame;
use spdz_client::proxy::SpdzProxy;
use spdz_models::enums::{MessageType, RegType, ResponseType};
use spdz_models::options::ConnectOptions;
use spdz_websocket_utils::client::{
    ProxyConnector, TransportChannels, TransportEmission, TransportEvent,
};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

const PROXY_A: &str = "ws://proxy-a:3010";
const PROXY_B: &str = "ws://proxy-b:3010";
const KEY_A: [u8; 32] = [1u8; 32];
const KEY_B: [u8; 32] = [2u8; 32];

/// 模拟代理的"服务端"：事件注入端与发射观察端。
struct FakeProxy {
    cipher: SessionCipher,
    events: mpsc::Sender<TransportEvent>,
    emissions: mpsc::Receiver<TransportEmission>,
}

impl FakeProxy {
    async fn push_event(&self, event: TransportEvent) {
        self.events.send(event).await.expect("适配器事件通道已关闭");
    }

    async fn push_frame(&self, message_type: MessageType, reg_type: RegType, payload: &[u8]) {
        let frame = encode_frame(message_type, reg_type, payload);
        let ciphertext = self.cipher.encrypt(&frame).expect("测试加密失败");
        self.push_event(TransportEvent::SpdzMessage(ciphertext)).await;
    }
}

/// 由预先建好的通道对构成的连接器。
struct MockConnector {
    channels: Mutex<HashMap<String, TransportChannels>>,
}

impl ProxyConnector for MockConnector {
    fn connect(&self, url: &str, _options: &ConnectOptions) -> TransportChannels {
        self.channels
            .lock()
            .expect("连接器内部锁中毒")
            .remove(url)
            .expect("测试没有为该 URL 准备通道")
    }
}

fn setup() -> (MockConnector, Vec<FakeProxy>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut channels = HashMap::new();
    let mut fakes = Vec::new();
    for (url, key) in [(PROXY_A, KEY_A), (PROXY_B, KEY_B)] {
        let (events_tx, events_rx) = mpsc::channel(32);
        let (emissions_tx, emissions_rx) = mpsc::channel(32);
        channels.insert(
            url.to_string(),
            TransportChannels { events: events_rx, emissions: emissions_tx },
        );
        fakes.push(FakeProxy {
            cipher: SessionCipher::new(key),
            events: events_tx,
            emissions: emissions_rx,
        });
    }
    (MockConnector { channels: Mutex::new(channels) }, fakes)
}

fn connect_client(connector: &MockConnector) -> SpdzProxyClient {
    let proxies = vec![
        SpdzProxy { url: PROXY_A.to_string(), session_key: KEY_A },
        SpdzProxy { url: PROXY_B.to_string(), session_key: KEY_B },
    ];
    SpdzProxyClient::connect(&proxies, &ConnectOptions::default(), connector)
}

#[tokio::test]
async fn test_full_two_proxy_session() {
    let (connector, mut fakes) = setup();
    let mut client = connect_client(&connector);
    assert_eq!(client.proxy_count(), 2);

    // 第一个代理连上：快照只含一条成功的 ProxyConnect。
    fakes[0].push_event(TransportEvent::Connect).await;
    let bundle = client.next_response().await.expect("响应流意外结束");
    assert_eq!(bundle.response_type, ResponseType::ProxyConnect);
    assert!(bundle.success);
    assert_eq!(bundle.responses.len(), 1);
    assert_eq!(bundle.responses[0].url.as_deref(), Some(PROXY_A));

    // 第二个代理连上：快照扩展为两条。
    fakes[1].push_event(TransportEvent::Connect).await;
    let bundle = client.next_response().await.expect("响应流意外结束");
    assert!(bundle.success);
    assert_eq!(bundle.responses.len(), 2);

    // connectToSpdz 广播到全体代理。
    client.connect_to_spdz(&"ab".repeat(64), true).expect("命令总线已关闭");
    for fake in fakes.iter_mut() {
        match fake.emissions.recv().await.expect("发射通道意外关闭") {
            TransportEmission::ConnectToSpdz { public_key, reuse_connection } => {
                assert_eq!(public_key.len(), 128);
                assert!(reuse_connection);
            }
            other => panic!("收到了非预期的发射: {:?}", other),
        }
    }

    // 两个代理都回执成功后才出一个 SpdzConnect 包。
    for fake in &fakes {
        fake.push_event(TransportEvent::ConnectToSpdzResult { status: 0, message: None }).await;
    }
    let bundle = client.next_response().await.expect("响应流意外结束");
    assert_eq!(bundle.response_type, ResponseType::SpdzConnect);
    assert!(bundle.success);
    assert_eq!(bundle.responses.len(), 2);

    // 各代理下发一个分片，逐位置求和: 10 + (p - 3) = 7 (mod p)。
    fakes[0]
        .push_frame(MessageType::InputShare, RegType::ModP, &10u128.to_be_bytes())
        .await;
    fakes[1]
        .push_frame(
            MessageType::InputShare,
            RegType::ModP,
            &(GFP_PRIME - 3).to_be_bytes(),
        )
        .await;

    // 输入 5 与分片 7 配对，编码为 share + input = 12。
    client.send_input(vec![5]).await.expect("输入通道已关闭");
    let expected_hex = vec![Gfp::from_residue(12).to_hex_string()];
    assert_eq!(
        client.next_sent_values().await.expect("发送记录流意外结束"),
        expected_hex
    );
    for fake in fakes.iter_mut() {
        match fake.emissions.recv().await.expect("发射通道意外关闭") {
            TransportEmission::SendData { data } => assert_eq!(data, expected_hex),
            other => panic!("收到了非预期的发射: {:?}", other),
        }
    }

    // sendData 回执折叠：一个失败即整包失败。
    fakes[0].push_event(TransportEvent::SendDataResult { status: 0, message: None }).await;
    fakes[1]
        .push_event(TransportEvent::SendDataResult {
            status: 1,
            message: Some("引擎拒绝".to_string()),
        })
        .await;
    let bundle = client.next_response().await.expect("响应流意外结束");
    assert_eq!(bundle.response_type, ResponseType::SendInput);
    assert!(!bundle.success);

    // 输出按声明顺序拼接：A 的 100 在前，B 的 -1 在后。
    fakes[0]
        .push_frame(MessageType::OutputResult, RegType::Int, &100i32.to_be_bytes())
        .await;
    fakes[1]
        .push_frame(MessageType::OutputResult, RegType::Int, &(-1i32).to_be_bytes())
        .await;
    assert_eq!(client.next_output().await.expect("输出流意外结束"), vec![100, -1]);

    client.close().await;
    client.close().await;
}

#[tokio::test]
async fn test_bad_ciphertext_projects_error_and_pipeline_survives() {
    let (connector, mut fakes) = setup();
    let mut client = connect_client(&connector);

    // 无法解密的垃圾密文投影为 Error 包，归因到代理 A。
    fakes[0]
        .push_event(TransportEvent::SpdzMessage(vec![0u8; 40]))
        .await;
    let bundle = client.next_response().await.expect("响应流意外结束");
    assert_eq!(bundle.response_type, ResponseType::Error);
    assert!(!bundle.success);
    assert_eq!(bundle.responses[0].url.as_deref(), Some(PROXY_A));

    // 坏帧之后正常帧照常流动。
    fakes[0].push_event(TransportEvent::Connect).await;
    let bundle = client.next_response().await.expect("响应流意外结束");
    assert_eq!(bundle.response_type, ResponseType::ProxyConnect);
    assert!(bundle.success);
    drop(fakes);
}

#[tokio::test]
async fn test_modp_outputs_are_centered() {
    let (connector, fakes) = setup();
    let mut client = connect_client(&connector);

    // p - 4 居中还原为 -4。
    fakes[0]
        .push_frame(MessageType::OutputResult, RegType::ModP, &7u128.to_be_bytes())
        .await;
    fakes[1]
        .push_frame(
            MessageType::OutputResult,
            RegType::ModP,
            &(GFP_PRIME - 4).to_be_bytes(),
        )
        .await;

    assert_eq!(client.next_output().await.expect("输出流意外结束"), vec![7, -4]);
    drop(fakes);
}

#[tokio::test]
async fn test_close_ends_outgoing_streams() {
    let (connector, fakes) = setup();
    let mut client = connect_client(&connector);

    client.close().await;
    // 适配器终止后整条流水线随之排空并关闭。
    assert!(client.next_output().await.is_none());
    drop(fakes);
}
