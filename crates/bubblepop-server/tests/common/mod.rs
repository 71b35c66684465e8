use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use bubblepop_core::config::RoundConfig;
use bubblepop_core::net::messages::{ClientMessage, HelloMsg, ServerMessage};
use bubblepop_core::net::protocol::{PROTOCOL_VERSION, decode_server_message, encode_client_message};
use bubblepop_core::player::PlayerId;

use bubblepop_server::build_app;
use bubblepop_server::config::{ServerConfig, WorldConfig};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with fast world timing.
    pub async fn new() -> Self {
        Self::with_round(RoundConfig {
            spawn_interval_ms: 50,
            ..RoundConfig::default()
        })
        .await
    }

    pub async fn with_round(round: RoundConfig) -> Self {
        let config = ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            world: WorldConfig {
                spawn_latency_ms: 1,
                frame_interval_ms: 20,
            },
            round: Some(round),
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state, _round_loop) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn status(&self) -> serde_json::Value {
        reqwest::get(format!("{}/api/v1/status", self.base_url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Poll the status endpoint until `n` players are in the world.
    pub async fn wait_for_roster(&self, n: usize) -> serde_json::Value {
        for _ in 0..100 {
            let status = self.status().await;
            if status["roster"].as_array().map(Vec::len) == Some(n) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Roster never reached {n} players");
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Announce a player on a fresh connection.
pub async fn ws_hello(stream: &mut WsStream, player_id: PlayerId, name: &str) {
    let msg = ClientMessage::Hello(HelloMsg {
        player_id,
        name: name.to_string(),
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send_client_msg(stream, &msg).await;
}

/// Connect and say hello in one step.
pub async fn ws_join(server: &TestServer, player_id: PlayerId, name: &str) -> WsStream {
    let mut stream = ws_connect(&server.ws_url()).await;
    ws_hello(&mut stream, player_id, name).await;
    stream
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Skip server messages until `pick` accepts one (10s overall).
pub async fn ws_read_until<T>(
    stream: &mut WsStream,
    mut pick: impl FnMut(ServerMessage) -> Option<T>,
) -> T {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(found) = pick(ws_read_server_msg(stream).await) {
                return found;
            }
        }
    })
    .await
    .expect("Timed out waiting for a matching server message")
}

/// Wait for the server to close the connection. Returns the close reason,
/// if one was sent.
pub async fn ws_expect_closed(stream: &mut WsStream) -> Option<String> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Close(frame))) => return frame.map(|f| f.reason.to_string()),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return None,
            }
        }
    })
    .await
    .expect("Server did not close the connection")
}
