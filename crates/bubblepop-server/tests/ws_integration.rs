#[allow(dead_code)]
mod common;

use bubblepop_core::config::RoundConfig;
use bubblepop_core::net::messages::{
    ClientMessage, ForceGameOverMsg, HelloMsg, RequestColorMsg, ServerMessage, StartRoundMsg,
    TapBubbleMsg,
};
use common::{
    TestServer, ws_connect, ws_expect_closed, ws_join, ws_read_server_msg, ws_read_until,
    ws_send_client_msg,
};

#[tokio::test]
async fn hello_registers_player() {
    let server = TestServer::new().await;
    let _alice = ws_join(&server, 1, "Alice").await;

    let status = server.wait_for_roster(1).await;
    assert_eq!(status["status"], "Idle");
    assert_eq!(status["roster"][0]["player_id"], 1);
    assert_eq!(status["roster"][0]["name"], "Alice");
}

#[tokio::test]
async fn disconnect_removes_player() {
    let server = TestServer::new().await;
    let alice = ws_join(&server, 1, "Alice").await;
    server.wait_for_roster(1).await;

    drop(alice);
    server.wait_for_roster(0).await;
}

#[tokio::test]
async fn first_message_must_be_hello() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;
    ws_send_client_msg(&mut stream, &ClientMessage::StartRound(StartRoundMsg {})).await;

    let reason = ws_expect_closed(&mut stream).await;
    assert_eq!(reason.as_deref(), Some("Expected Hello"));
    assert_eq!(server.status().await["status"], "Idle");
}

#[tokio::test]
async fn invalid_name_is_rejected() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url()).await;
    let hello = ClientMessage::Hello(HelloMsg {
        player_id: 1,
        name: "   ".to_string(),
        protocol_version: bubblepop_core::net::protocol::PROTOCOL_VERSION,
    });
    ws_send_client_msg(&mut stream, &hello).await;

    let reason = ws_expect_closed(&mut stream).await;
    assert_eq!(reason.as_deref(), Some("Invalid player name"));
}

#[tokio::test]
async fn duplicate_player_id_is_rejected() {
    let server = TestServer::new().await;
    let _first = ws_join(&server, 1, "Alice").await;
    server.wait_for_roster(1).await;

    let mut second = ws_join(&server, 1, "Impostor").await;
    let reason = ws_expect_closed(&mut second).await;
    assert_eq!(reason.as_deref(), Some("Player already connected"));

    let status = server.wait_for_roster(1).await;
    assert_eq!(status["roster"][0]["name"], "Alice");
}

#[tokio::test]
async fn start_round_assigns_distinct_colors() {
    let server = TestServer::new().await;
    let mut alice = ws_join(&server, 1, "Alice").await;
    let mut bob = ws_join(&server, 2, "Bob").await;
    server.wait_for_roster(2).await;

    ws_send_client_msg(&mut alice, &ClientMessage::StartRound(StartRoundMsg {})).await;

    for stream in [&mut alice, &mut bob] {
        match ws_read_server_msg(stream).await {
            ServerMessage::RoundStarted(m) => assert_eq!(m.duration_secs, 30),
            other => panic!("Expected RoundStarted, got: {other:?}"),
        }
    }

    let mut colors = Vec::new();
    for _ in 0..2 {
        match ws_read_server_msg(&mut bob).await {
            ServerMessage::ColorAssigned(m) => colors.push((m.player_id, m.color)),
            other => panic!("Expected ColorAssigned, got: {other:?}"),
        }
    }
    colors.sort_by_key(|(id, _)| *id);
    assert_eq!(colors[0].0, 1);
    assert_eq!(colors[1].0, 2);
    assert_ne!(colors[0].1, colors[1].1);

    let status = server.status().await;
    assert_eq!(status["status"], "Running");
    assert_eq!(status["time_remaining"], 30);
    assert_eq!(status["lanes_held"], 1);
}

#[tokio::test]
async fn request_color_resends_assignment() {
    let server = TestServer::new().await;
    let mut alice = ws_join(&server, 1, "Alice").await;
    server.wait_for_roster(1).await;

    ws_send_client_msg(&mut alice, &ClientMessage::StartRound(StartRoundMsg {})).await;
    let first = ws_read_until(&mut alice, |m| match m {
        ServerMessage::ColorAssigned(c) => Some(c),
        _ => None,
    })
    .await;

    ws_send_client_msg(&mut alice, &ClientMessage::RequestColor(RequestColorMsg {})).await;
    let again = ws_read_until(&mut alice, |m| match m {
        ServerMessage::ColorAssigned(c) => Some(c),
        _ => None,
    })
    .await;
    assert_eq!(first, again);
}

#[tokio::test]
async fn popping_own_bubble_wins_the_round() {
    let server = TestServer::new().await;
    let mut alice = ws_join(&server, 1, "Alice").await;
    let _bob = ws_join(&server, 2, "Bob").await;
    server.wait_for_roster(2).await;

    ws_send_client_msg(&mut alice, &ClientMessage::StartRound(StartRoundMsg {})).await;

    let target = ws_read_until(&mut alice, |m| match m {
        ServerMessage::BubbleSpawned(b) if b.data.player() == Some(1) => Some(b.entity),
        _ => None,
    })
    .await;
    ws_send_client_msg(
        &mut alice,
        &ClientMessage::TapBubble(TapBubbleMsg { entity: target }),
    )
    .await;

    let total = ws_read_until(&mut alice, |m| match m {
        ServerMessage::ScoreChanged(s) if s.player_id == 1 => Some(s.total),
        _ => None,
    })
    .await;
    assert!(total > 0);

    ws_send_client_msg(&mut alice, &ClientMessage::ForceGameOver(ForceGameOverMsg {})).await;
    let ended = ws_read_until(&mut alice, |m| match m {
        ServerMessage::RoundEnded(e) => Some(e),
        _ => None,
    })
    .await;
    assert_eq!(ended.winners, vec![1]);

    let client = reqwest::Client::new();
    let binding: serde_json::Value = client
        .get(format!("{}/api/v1/players/1/binding", server.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(binding["score"], total);
    // Colors are released when the round ends.
    assert!(binding["color_name"].is_null());

    let wins: serde_json::Value = client
        .get(format!("{}/api/v1/leaderboards/MostWins", server.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(wins["entries"][0]["player_id"], 1);
    assert_eq!(wins["entries"][0]["value"], 1);

    let stats: serde_json::Value = client
        .get(format!("{}/api/v1/players/1/stats", server.base_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["ints"]["pops"], total);
    assert_eq!(stats["ints"]["wins"], 1);
    assert_eq!(stats["names"]["players"][0], "Bob");
}

#[tokio::test]
async fn round_times_out() {
    let server = TestServer::with_round(RoundConfig {
        round_duration_secs: 1,
        spawn_interval_ms: 50,
        ..RoundConfig::default()
    })
    .await;
    let mut alice = ws_join(&server, 1, "Alice").await;
    server.wait_for_roster(1).await;

    ws_send_client_msg(&mut alice, &ClientMessage::StartRound(StartRoundMsg {})).await;
    ws_read_until(&mut alice, |m| matches!(m, ServerMessage::ResetView(_)).then_some(())).await;
    match ws_read_server_msg(&mut alice).await {
        ServerMessage::RoundEnded(e) => assert!(e.winners.is_empty()),
        other => panic!("Expected RoundEnded, got: {other:?}"),
    }
    assert_eq!(server.status().await["status"], "Idle");
}
