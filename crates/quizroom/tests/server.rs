//! Integration tests for the quiz server: real sockets, real rooms.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use quizroom::prelude::*;
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

fn catalog() -> Arc<InMemoryCatalog> {
    let quiz = Quiz {
        id: "math".into(),
        title: "Math".into(),
        description: "Numbers".into(),
        questions: vec![Question {
            text: "2+2?".into(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            correct_option_index: 1,
        }],
    };
    Arc::new(InMemoryCatalog::new(vec![quiz]).expect("valid catalog"))
}

/// Starts a server on a random port and returns the address.
async fn start_server_with(builder: QuizroomServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build(catalog())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

async fn start_server() -> String {
    start_server_with(QuizroomServer::builder()).await
}

/// Connects and consumes the `connected` greeting.
async fn connect(addr: &str) -> (ClientWs, ConnId) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    match recv(&mut ws).await {
        ServerEvent::Connected { connection_id } => (ws, connection_id),
        other => panic!("expected connected, got {other:?}"),
    }
}

async fn send(ws: &mut ClientWs, event: Value) {
    ws.send(Message::Text(event.to_string().into()))
        .await
        .expect("send");
}

async fn recv_any(ws: &mut ClientWs) -> ServerEvent {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for an event")
        .expect("stream ended")
        .expect("recv");
    assert!(msg.is_text(), "events travel as text frames");
    serde_json::from_slice(&msg.into_data()).expect("decode")
}

/// Next event, passing over lobby `rooms_list` pushes.
async fn recv(ws: &mut ClientWs) -> ServerEvent {
    loop {
        match recv_any(ws).await {
            ServerEvent::RoomsList { .. } => continue,
            event => return event,
        }
    }
}

/// Next `rooms_list`, pushed or requested.
async fn recv_rooms(ws: &mut ClientWs) -> Vec<RoomListEntry> {
    loop {
        if let ServerEvent::RoomsList { rooms } = recv_any(ws).await {
            return rooms;
        }
    }
}

/// Creates a room and returns its code.
async fn create_room(ws: &mut ClientWs, name: &str) -> RoomCode {
    send(ws, json!({"type": "create_room", "player_name": name})).await;
    match recv(ws).await {
        ServerEvent::RoomCreated { room_code, host } => {
            assert_eq!(host.name, name);
            room_code
        }
        other => panic!("expected room_created, got {other:?}"),
    }
}

async fn join(ws: &mut ClientWs, code: &RoomCode, name: &str) {
    send(
        ws,
        json!({"type": "join_room", "room_code": code, "player_name": name}),
    )
    .await;
}

fn scores(scoreboard: &[ScoreEntry]) -> Vec<(String, u32)> {
    scoreboard
        .iter()
        .map(|entry| (entry.name.clone(), entry.score))
        .collect()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connected_assigns_distinct_ids() {
    let addr = start_server().await;
    let (_a, id_a) = connect(&addr).await;
    let (_b, id_b) = connect(&addr).await;
    assert_ne!(id_a, id_b);
}

#[tokio::test]
async fn test_full_game_over_websocket() {
    let addr = start_server().await;
    let (mut host, _) = connect(&addr).await;
    let (mut alice, alice_id) = connect(&addr).await;
    let (mut bob, _) = connect(&addr).await;

    let code = create_room(&mut host, "Host").await;

    join(&mut alice, &code, "Alice").await;
    match recv(&mut host).await {
        ServerEvent::PlayerJoinedRoom { players, is_owner, .. } => {
            assert!(is_owner);
            assert_eq!(players, vec![Player::new(alice_id, "Alice")]);
        }
        other => panic!("expected player_joined_room, got {other:?}"),
    }
    match recv(&mut alice).await {
        ServerEvent::PlayerJoinedRoom { is_owner, .. } => assert!(!is_owner),
        other => panic!("expected player_joined_room, got {other:?}"),
    }

    join(&mut bob, &code, "Bob").await;
    for ws in [&mut host, &mut alice, &mut bob] {
        match recv(ws).await {
            ServerEvent::PlayerJoinedRoom { players, .. } => assert_eq!(players.len(), 2),
            other => panic!("expected player_joined_room, got {other:?}"),
        }
    }

    send(&mut host, json!({"type": "select_quiz", "room_code": code, "quiz_id": "math"})).await;
    match recv(&mut host).await {
        ServerEvent::QuizSelected { quiz } => {
            assert_eq!(quiz.questions[0].correct_option_index, Some(1));
        }
        other => panic!("expected quiz_selected, got {other:?}"),
    }
    for ws in [&mut alice, &mut bob] {
        match recv(ws).await {
            ServerEvent::QuizSelected { quiz } => {
                assert_eq!(quiz.questions[0].correct_option_index, None);
            }
            other => panic!("expected quiz_selected, got {other:?}"),
        }
    }

    send(&mut host, json!({"type": "start_game", "room_code": code})).await;
    for ws in [&mut host, &mut alice, &mut bob] {
        assert!(matches!(recv(ws).await, ServerEvent::GameStarted { .. }));
    }

    send(&mut alice, json!({"type": "player_answer", "room_code": code, "answer": "4"})).await;
    assert_eq!(
        recv(&mut host).await,
        ServerEvent::AnswerReceived {
            answered: 1,
            expected: 2
        }
    );

    send(&mut bob, json!({"type": "player_answer", "room_code": code, "answer": "5"})).await;
    assert_eq!(
        recv(&mut host).await,
        ServerEvent::AnswerReceived {
            answered: 2,
            expected: 2
        }
    );
    for ws in [&mut host, &mut alice, &mut bob] {
        match recv(ws).await {
            ServerEvent::AllPlayersAnswered {
                question_index,
                scoreboard,
                correct_answer,
                ..
            } => {
                assert_eq!(question_index, 0);
                assert_eq!(correct_answer, "4");
                assert_eq!(
                    scores(&scoreboard),
                    vec![("Alice".to_string(), 1), ("Bob".to_string(), 0)]
                );
            }
            other => panic!("expected all_players_answered, got {other:?}"),
        }
    }

    send(&mut host, json!({"type": "start_next_question", "room_code": code})).await;
    for ws in [&mut host, &mut alice, &mut bob] {
        match recv(ws).await {
            ServerEvent::QuizFinished { scoreboard } => {
                assert_eq!(
                    scores(&scoreboard),
                    vec![("Alice".to_string(), 1), ("Bob".to_string(), 0)]
                );
            }
            other => panic!("expected quiz_finished, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_join_unknown_room() {
    let addr = start_server().await;
    let (mut ws, _) = connect(&addr).await;

    join(&mut ws, &RoomCode::new("NOPE00"), "Alice").await;
    assert_eq!(recv(&mut ws).await, ServerEvent::RoomNotFound);
}

#[tokio::test]
async fn test_join_full_room() {
    let addr = start_server_with(QuizroomServer::builder().default_settings(Settings {
        response_time_seconds: 15,
        max_players: 2,
    }))
    .await;
    let (mut host, _) = connect(&addr).await;
    let code = create_room(&mut host, "Host").await;

    let (mut a, _) = connect(&addr).await;
    join(&mut a, &code, "A").await;
    assert!(matches!(recv(&mut a).await, ServerEvent::PlayerJoinedRoom { .. }));
    let (mut b, _) = connect(&addr).await;
    join(&mut b, &code, "B").await;
    assert!(matches!(recv(&mut b).await, ServerEvent::PlayerJoinedRoom { .. }));

    let (mut c, _) = connect(&addr).await;
    join(&mut c, &code, "C").await;
    assert_eq!(recv(&mut c).await, ServerEvent::RoomFull);
}

#[tokio::test]
async fn test_non_host_cannot_start() {
    let addr = start_server().await;
    let (mut host, _) = connect(&addr).await;
    let code = create_room(&mut host, "Host").await;

    let (mut alice, _) = connect(&addr).await;
    join(&mut alice, &code, "Alice").await;
    recv(&mut alice).await;

    send(&mut alice, json!({"type": "start_game", "room_code": code})).await;
    match recv(&mut alice).await {
        ServerEvent::Error { message } => assert!(message.contains("may not")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_frame_reports_error_and_keeps_connection() {
    let addr = start_server().await;
    let (mut ws, _) = connect(&addr).await;

    ws.send(Message::Text("not json".into())).await.expect("send");
    match recv(&mut ws).await {
        ServerEvent::Error { message } => assert!(message.starts_with("invalid message")),
        other => panic!("expected error, got {other:?}"),
    }

    send(&mut ws, json!({"type": "list_quizzes"})).await;
    match recv(&mut ws).await {
        ServerEvent::QuizzesList { quizzes } => {
            assert_eq!(quizzes.len(), 1);
            assert_eq!(quizzes[0].id, "math");
            assert_eq!(quizzes[0].question_count, 1);
        }
        other => panic!("expected quizzes_list, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rooms_list_and_snapshot() {
    let addr = start_server().await;
    let (mut host, _) = connect(&addr).await;
    let code = create_room(&mut host, "Host").await;

    let (mut lobby, _) = connect(&addr).await;
    send(&mut lobby, json!({"type": "get_rooms"})).await;
    let rooms = recv_rooms(&mut lobby).await;
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].room_code, code);
    assert_eq!(rooms[0].host, "Host");
    assert_eq!(rooms[0].member_count, 0);

    send(&mut lobby, json!({"type": "get_room_snapshot", "room_code": code})).await;
    match recv(&mut lobby).await {
        ServerEvent::RoomSnapshot { snapshot } => {
            assert_eq!(snapshot.room_code, code);
            assert!(snapshot.players.is_empty());
            assert_eq!(snapshot.host.name, "Host");
        }
        other => panic!("expected room_snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_duplicate_answer_gets_no_reply() {
    let addr = start_server().await;
    let (mut host, _) = connect(&addr).await;
    let code = create_room(&mut host, "Host").await;
    let (mut alice, _) = connect(&addr).await;
    let (mut bob, _) = connect(&addr).await;
    join(&mut alice, &code, "Alice").await;
    recv(&mut alice).await;
    join(&mut bob, &code, "Bob").await;
    recv(&mut alice).await;
    recv(&mut bob).await;

    send(&mut host, json!({"type": "select_quiz", "room_code": code, "quiz_id": "math"})).await;
    recv(&mut alice).await;
    send(&mut host, json!({"type": "start_game", "room_code": code})).await;
    assert!(matches!(recv(&mut alice).await, ServerEvent::GameStarted { .. }));

    send(&mut alice, json!({"type": "player_answer", "room_code": code, "answer": "4"})).await;
    send(&mut alice, json!({"type": "player_answer", "room_code": code, "answer": "3"})).await;
    send(&mut alice, json!({"type": "list_quizzes"})).await;

    // The second answer is swallowed, so the next thing Alice sees is the
    // catalog listing.
    assert!(matches!(recv(&mut alice).await, ServerEvent::QuizzesList { .. }));
}

#[tokio::test]
async fn test_host_disconnect_closes_room() {
    let addr = start_server().await;
    let (mut host, _) = connect(&addr).await;
    let code = create_room(&mut host, "Host").await;

    let (mut alice, _) = connect(&addr).await;
    join(&mut alice, &code, "Alice").await;
    recv(&mut alice).await;

    host.send(Message::Close(None)).await.expect("close");

    match recv(&mut alice).await {
        ServerEvent::RoomClosed { room_code, .. } => assert_eq!(room_code, code),
        other => panic!("expected room_closed, got {other:?}"),
    }

    // Back in the lobby, Alice is told the room is gone and is free to host.
    assert!(recv_rooms(&mut alice).await.is_empty());
    create_room(&mut alice, "Alice").await;
}

#[tokio::test]
async fn test_cannot_join_second_room() {
    let addr = start_server().await;
    let (mut first, _) = connect(&addr).await;
    let a = create_room(&mut first, "First").await;
    let (mut second, _) = connect(&addr).await;
    let _b = create_room(&mut second, "Second").await;

    join(&mut second, &a, "Second").await;
    match recv(&mut second).await {
        ServerEvent::Error { message } => assert!(message.contains("already in room")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let addr = start_server_with(
        QuizroomServer::builder().idle_timeout(Duration::from_millis(100)),
    )
    .await;
    let (mut ws, _) = connect(&addr).await;

    let result = tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
    match result {
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {} // expected
        Ok(Some(Err(_))) => {}                           // also fine
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_limit() {
    let addr = start_server_with(QuizroomServer::builder().max_connections(1)).await;
    let (_first, _) = connect(&addr).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    match recv(&mut ws).await {
        ServerEvent::Error { message } => assert!(message.contains("limit")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_silent_socket_does_not_block_others() {
    let addr = start_server().await;

    // Connects over TCP but never sends the upgrade request.
    let _silent = tokio::net::TcpStream::connect(addr.as_str()).await.expect("tcp connect");

    let (_ws, _) = connect(&addr).await;
}

#[tokio::test]
async fn test_unfinished_handshake_is_dropped() {
    let addr = start_server_with(
        QuizroomServer::builder().handshake_timeout(Duration::from_millis(100)),
    )
    .await;
    let mut silent = tokio::net::TcpStream::connect(addr.as_str()).await.expect("tcp connect");

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), silent.read(&mut buf))
        .await
        .expect("server should hang up on the silent socket");
    assert!(matches!(read, Ok(0) | Err(_)), "expected EOF, got {read:?}");
}

#[tokio::test]
async fn test_lobby_receives_room_list_pushes() {
    let addr = start_server().await;
    let (mut lobby, _) = connect(&addr).await;
    let (mut host, _) = connect(&addr).await;

    let code = create_room(&mut host, "Host").await;
    let rooms = recv_rooms(&mut lobby).await;
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].room_code, code);
    assert_eq!(rooms[0].member_count, 0);

    let (mut alice, _) = connect(&addr).await;
    join(&mut alice, &code, "Alice").await;
    assert_eq!(recv_rooms(&mut lobby).await[0].member_count, 1);

    send(&mut alice, json!({"type": "leave_room", "room_code": code})).await;
    assert_eq!(recv_rooms(&mut lobby).await[0].member_count, 0);
    // Alice is back in the lobby and gets the same push.
    assert_eq!(recv_rooms(&mut alice).await[0].member_count, 0);

    send(&mut host, json!({"type": "leave_room", "room_code": code})).await;
    assert!(recv_rooms(&mut lobby).await.is_empty());
}

#[tokio::test]
async fn test_kicked_and_departed_players_can_create_rooms() {
    let addr = start_server().await;
    let (mut host, _) = connect(&addr).await;
    let code = create_room(&mut host, "Host").await;

    let (mut alice, alice_id) = connect(&addr).await;
    join(&mut alice, &code, "Alice").await;
    recv(&mut alice).await;
    let (mut bob, _) = connect(&addr).await;
    join(&mut bob, &code, "Bob").await;
    recv(&mut bob).await;

    send(
        &mut host,
        json!({"type": "kick_player", "room_code": code, "player_id": alice_id}),
    )
    .await;
    loop {
        match recv(&mut alice).await {
            ServerEvent::Kicked { room_code } => {
                assert_eq!(room_code, code);
                break;
            }
            ServerEvent::PlayerJoinedRoom { .. } => continue,
            other => panic!("expected kicked, got {other:?}"),
        }
    }
    // The lobby push follows the session release.
    recv_rooms(&mut alice).await;
    let alice_room = create_room(&mut alice, "Alice").await;
    assert_ne!(alice_room, code);

    match recv(&mut bob).await {
        ServerEvent::PlayerLeftRoom { players, .. } => assert_eq!(players.len(), 1),
        other => panic!("expected player_left_room, got {other:?}"),
    }
    send(&mut bob, json!({"type": "leave_room", "room_code": code})).await;
    send(&mut bob, json!({"type": "create_room", "player_name": "Bob"})).await;
    loop {
        match recv(&mut bob).await {
            ServerEvent::RoomCreated { room_code, .. } => {
                assert_ne!(room_code, code);
                break;
            }
            ServerEvent::PlayerLeftRoom { .. } => continue,
            other => panic!("expected room_created, got {other:?}"),
        }
    }

    for _ in 0..2 {
        assert!(matches!(recv(&mut host).await, ServerEvent::PlayerJoinedRoom { .. }));
    }
    let mut remaining = Vec::new();
    for _ in 0..2 {
        match recv(&mut host).await {
            ServerEvent::PlayerLeftRoom { players, .. } => remaining.push(players.len()),
            other => panic!("expected player_left_room, got {other:?}"),
        }
    }
    assert_eq!(remaining, vec![1, 0]);
}
