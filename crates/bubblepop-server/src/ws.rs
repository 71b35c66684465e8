use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use bubblepop_core::net::messages::{ClientMessage, HelloMsg};
use bubblepop_core::net::protocol::{MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message};
use bubblepop_core::player::{Player, PlayerId};

use crate::error::AppError;
use crate::round_loop::RoundCommand;
use crate::state::{AppState, ConnectionGuard};

const MAX_NAME_LEN: usize = 32;

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(AppError::Unavailable("Too many connections".to_string()));
    }

    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The first message must be a Hello.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    let hello = match decode_client_message(&first_msg) {
        Ok(ClientMessage::Hello(hello)) => hello,
        Ok(other) => {
            tracing::debug!(?other, "First message was not Hello");
            close_with(&mut ws_sender, "Expected Hello").await;
            return;
        },
        Err(e) => {
            tracing::debug!(error = %e, "Undecodable first message");
            close_with(&mut ws_sender, "Malformed Hello").await;
            return;
        },
    };

    let player = match validate_hello(&hello) {
        Ok(player) => player,
        Err(reason) => {
            tracing::info!(player_id = hello.player_id, reason, "Hello rejected");
            close_with(&mut ws_sender, reason).await;
            return;
        },
    };
    let player_id = player.id;

    if !state.connected.lock().await.insert(player_id) {
        tracing::info!(player_id, "Player already connected, rejecting duplicate");
        close_with(&mut ws_sender, "Player already connected").await;
        return;
    }

    // Subscribe before entering so the client sees everything its entry causes.
    let writer = spawn_writer(ws_sender, state.tx.subscribe(), player_id);

    tracing::info!(player_id, name = %player.name, "Player connected");
    if state.send(RoundCommand::PlayerEntered { player }).await {
        read_loop(&mut ws_receiver, &state, player_id).await;
    }

    writer.abort();
    // Exit must be queued before the id is released, so a reconnect's entry lands after it.
    state.send(RoundCommand::PlayerExited { player_id }).await;
    state.connected.lock().await.remove(&player_id);
    tracing::info!(player_id, "Player disconnected");
}

/// Check a Hello and turn it into the player it announces.
fn validate_hello(hello: &HelloMsg) -> Result<Player, &'static str> {
    if hello.protocol_version != PROTOCOL_VERSION {
        return Err("Protocol version mismatch");
    }
    let name = hello.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN || name.chars().any(char::is_control)
    {
        return Err("Invalid player name");
    }
    Ok(Player::new(hello.player_id, name))
}

async fn close_with(ws_sender: &mut SplitSink<WebSocket, Message>, reason: &str) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: reason.to_string().into(),
    };
    if let Err(e) = ws_sender.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %e, "Failed to send close frame");
    }
}

/// Forward every broadcast frame to this client until the socket fails.
fn spawn_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    rx: broadcast::Receiver<Bytes>,
    player_id: PlayerId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(rx);
        while let Some(item) = stream.next().await {
            let data = match item {
                Ok(data) => data,
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    tracing::warn!(player_id, skipped = n, "Client lagged behind broadcast");
                    continue;
                },
            };
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    })
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    player_id: PlayerId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(player_id, "Rate limited");
            continue;
        }

        let msg = match decode_client_message(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(player_id, error = %e, "Dropping undecodable message");
                continue;
            },
        };

        let cmd = match msg {
            ClientMessage::StartRound(_) => RoundCommand::StartRound { player_id },
            ClientMessage::ForceGameOver(_) => RoundCommand::ForceGameOver { player_id },
            ClientMessage::TapBubble(tap) => RoundCommand::Tap {
                player_id,
                entity: tap.entity,
            },
            ClientMessage::RequestColor(_) => RoundCommand::RequestColor { player_id },
            ClientMessage::Hello(_) => {
                tracing::debug!(player_id, "Ignoring repeated Hello");
                continue;
            },
        };
        if !state.send(cmd).await {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello(name: &str) -> HelloMsg {
        HelloMsg {
            player_id: 7,
            name: name.to_string(),
            protocol_version: PROTOCOL_VERSION,
        }
    }

    #[test]
    fn hello_name_is_trimmed() {
        let player = validate_hello(&hello("  Alice ")).unwrap();
        assert_eq!(player, Player::new(7, "Alice"));
    }

    #[test]
    fn hello_rejects_bad_names() {
        assert!(validate_hello(&hello("   ")).is_err());
        assert!(validate_hello(&hello("bad\u{7}name")).is_err());
        assert!(validate_hello(&hello(&"x".repeat(33))).is_err());
        assert!(validate_hello(&hello(&"x".repeat(32))).is_ok());
    }

    #[test]
    fn hello_rejects_version_mismatch() {
        let msg = HelloMsg {
            protocol_version: PROTOCOL_VERSION + 1,
            ..hello("Alice")
        };
        assert_eq!(validate_hello(&msg), Err("Protocol version mismatch"));
    }

    #[tokio::test]
    async fn rate_limiter_drains_then_refills() {
        let mut limiter = RateLimiter::new(2.0, 1000.0);
        assert!(limiter.allow());
        assert!(limiter.allow());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(limiter.allow());
    }

    #[tokio::test]
    async fn rate_limiter_blocks_burst() {
        let mut limiter = RateLimiter::new(1.0, 0.001);
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }
}
