//! In-process WebSocket server harness for stream tests.
//!
//! Each accepted connection is handed to the test as a scriptable session;
//! tests drive the server side of the protocol inline.

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};

use finlight_client::ApiConfig;

pub type ServerWs = WebSocketStream<TcpStream>;

/// Default patience for any single await in a test.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Start a server; every upgraded connection is pushed to the returned
/// channel in accept order.
pub async fn spawn_server() -> (String, mpsc::UnboundedReceiver<ServerWs>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Ok(ws) = accept_async(stream).await {
                    let _ = tx.send(ws);
                }
            });
        }
    });

    (format!("ws://{addr}"), rx)
}

/// Millisecond-scale configuration so scenarios complete quickly.
pub fn test_config(url: &str) -> ApiConfig {
    ApiConfig::new("test-key")
        .wss_url(url)
        .ping_interval(Duration::from_millis(100))
        .pong_timeout(Duration::from_secs(60))
        .base_reconnect_delay(Duration::from_millis(25))
        .max_reconnect_delay(Duration::from_millis(200))
        .connection_lifetime(Duration::from_secs(30))
}

pub async fn next_session(sessions: &mut mpsc::UnboundedReceiver<ServerWs>) -> ServerWs {
    timeout(WAIT, sessions.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("server task ended")
}

/// Receive the next application (text) frame as JSON, skipping transport
/// frames.
pub async fn recv_json(ws: &mut ServerWs) -> Value {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("transport error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("frame is not JSON");
        }
    }
}

pub async fn send_json(ws: &mut ServerWs, value: &Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send failed");
}

pub async fn send_text(ws: &mut ServerWs, text: &str) {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .expect("send failed");
}

/// Drain frames until the peer closes; returns the close code, or `None`
/// for a codeless close or a hard drop.
pub async fn expect_close(ws: &mut ServerWs) -> Option<u16> {
    loop {
        match timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for close")
        {
            Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}
