//! 通过真实 TCP 连接测试客户端与实时围栏
//!
//! 测试里启动一个最小的假服务端，只实现用到的几条命令。

use std::time::Duration;

use serde_json::{json, Value};
use spatio_client::config::ClientConfig;
use spatio_client::protocol::{Frame, FrameBuffer, RespEncoder, RespValue};
use spatio_client::{Client, GeofenceEvent, LiveEvent, LiveFence, Query};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

async fn listen() -> (TcpListener, ClientConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = ClientConfig::default();
    config.connection.port = listener.local_addr().unwrap().port();
    (listener, config)
}

/// 读取一条 RESP 数组命令
async fn read_command(stream: &mut TcpStream, buffer: &mut FrameBuffer) -> Option<Vec<String>> {
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(Frame::Value(RespValue::Array(Some(items)))) = buffer.next_frame().unwrap() {
            return Some(
                items
                    .iter()
                    .map(|item| item.as_text().unwrap().to_string())
                    .collect(),
            );
        }
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return None;
        }
        buffer.extend(&chunk[..n]);
    }
}

async fn reply_json(stream: &mut TcpStream, value: Value) {
    let body = value.to_string();
    stream
        .write_all(RespEncoder::bulk_string(Some(&body)).as_bytes())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_client_round_trip() {
    let (listener, config) = listen().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buffer = FrameBuffer::new();
        let mut seen = Vec::new();

        while let Some(command) = read_command(&mut stream, &mut buffer).await {
            let reply = match command[0].as_str() {
                "OUTPUT" => json!({"ok": true}),
                "SET" => json!({"ok": true, "elapsed": "10µs"}),
                "NEARBY" => json!({
                    "ok": true,
                    "objects": [{"id": "truck1", "object": {"type": "Point", "coordinates": [-112.26, 33.46]}}],
                    "count": 1,
                    "cursor": 0
                }),
                _ => json!({"ok": false, "err": "unknown command"}),
            };
            seen.push(command);
            reply_json(&mut stream, reply).await;
        }
        seen
    });

    let client = Client::connect(&config);
    client.set_point("fleet", "truck1", 33.46, -112.26).await.unwrap();

    let query = Query::nearby("fleet").limit(5).point_radius(33.46, -112.27, 5000.0);
    let result = client.execute_query(&query).await.unwrap();
    assert_eq!(result["count"], 1);
    assert_eq!(result["objects"][0]["id"], "truck1");

    let err = client.get("fleet", "truck1").await.unwrap_err();
    assert!(err.to_string().contains("unknown command"));

    client.close().await.unwrap();
    let seen = server.await.unwrap();
    assert_eq!(seen[0], vec!["OUTPUT", "json"]);
    assert_eq!(seen[1], vec!["SET", "fleet", "truck1", "POINT", "33.46", "-112.26"]);
    assert_eq!(
        seen[2],
        vec!["NEARBY", "fleet", "LIMIT", "5", "POINT", "33.46", "-112.27", "5000"]
    );
}

#[tokio::test]
async fn test_client_connect_refused_is_not_ready() {
    let (listener, config) = listen().await;
    drop(listener);

    let client = Client::connect(&config);
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, spatio_client::SpatioError::NotReady(_)));
}

#[tokio::test]
async fn test_live_fence_over_tcp() {
    let (listener, mut config) = listen().await;
    config.connection.password = Some("secret".to_string());

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(stream);

        let mut auth = String::new();
        reader.read_line(&mut auth).await.unwrap();
        let mut command = String::new();
        reader.read_line(&mut command).await.unwrap();

        let mut stream = reader.into_inner();
        stream.write_all(b"+OK\r\n").await.unwrap();
        reply_json(&mut stream, json!({"ok": true, "live": true})).await;

        // 第一个事件被拆成两次写出
        let event = json!({
            "command": "set", "detect": "enter", "key": "fleet", "id": "truck1",
            "object": {"type": "Point", "coordinates": [-112.27, 33.46]}
        })
        .to_string();
        let frame = RespEncoder::bulk_string(Some(&event));
        let (head, tail) = frame.as_bytes().split_at(frame.len() / 2);
        stream.write_all(head).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stream.write_all(tail).await.unwrap();

        stream.write_all(RespEncoder::simple_string("not json").as_bytes()).await.unwrap();
        reply_json(
            &mut stream,
            json!({"command": "del", "detect": "exit", "key": "fleet", "id": "truck1"}),
        )
        .await;
        stream.shutdown().await.unwrap();

        (auth, command)
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let query = Query::nearby("fleet").point_radius(33.46, -112.27, 500.0);
    let handle = LiveFence::connect(&config, &query, move |event: LiveEvent<GeofenceEvent>| {
        let _ = tx.send(event);
    })
    .await
    .unwrap();

    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
    handle.on_close(move || {
        let _ = closed_tx.send(());
    });

    let first = rx.recv().await.unwrap();
    assert_eq!(first.as_object().unwrap().detect.as_deref(), Some("enter"));
    assert!(matches!(rx.recv().await.unwrap(), LiveEvent::Raw(ref s) if s == "not json"));
    let third = rx.recv().await.unwrap();
    assert_eq!(third.as_object().unwrap().command, "del");

    tokio::time::timeout(Duration::from_secs(2), closed_rx)
        .await
        .unwrap()
        .unwrap();
    handle.wait().await;
    assert!(handle.is_closed());
    assert!(rx.recv().await.is_none());

    let (auth, command) = server.await.unwrap();
    assert_eq!(auth, "AUTH secret\r\n");
    assert_eq!(command, "NEARBY fleet FENCE POINT 33.46 -112.27 500\r\n");
}
