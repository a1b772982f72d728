//! Integration tests for room actors and the registry.
//!
//! Tests that involve deadlines run on paused Tokio time, so a 15 second
//! answer window elapses instantly and exactly.

use std::sync::Arc;
use std::time::Duration;

use quizroom_protocol::{
    ConnId, Player, Question, Quiz, Recipient, RoomCode, RoomStatus,
    ServerEvent, Settings,
};
use quizroom_room::{
    Departure, PlayerSender, RoomDefaults, RoomError, RoomHandle,
    RoomRegistry,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

const HOST: ConnId = ConnId(1);
const ALICE: ConnId = ConnId(2);
const BOB: ConnId = ConnId(3);

type Inbox = mpsc::UnboundedReceiver<ServerEvent>;

fn channel() -> (PlayerSender, Inbox) {
    mpsc::unbounded_channel()
}

fn quiz() -> Arc<Quiz> {
    Arc::new(Quiz {
        id: "math".into(),
        title: "Math".into(),
        description: String::new(),
        questions: vec![Question {
            text: "2+2?".into(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            correct_option_index: 1,
        }],
    })
}

/// Everything already queued for a connection.
fn drain(rx: &mut Inbox) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

struct Table {
    registry: RoomRegistry,
    room: RoomHandle,
    host: Inbox,
    alice: Inbox,
    bob: Inbox,
}

/// A registry with one room: host, Alice, Bob, quiz selected.
async fn table() -> Table {
    let registry = RoomRegistry::with_code_source(RoomDefaults::default(), || {
        RoomCode::from("R1")
    });
    let (host_tx, host) = channel();
    let room = registry
        .create_room(Player::new(HOST, "Host"), host_tx)
        .await
        .unwrap();

    let (alice_tx, alice) = channel();
    let (bob_tx, bob) = channel();
    room.join(ALICE, "Alice", alice_tx).await.unwrap();
    room.join(BOB, "Bob", bob_tx).await.unwrap();
    room.select_quiz(HOST, "math", Some(quiz())).await.unwrap();

    let mut table = Table {
        registry,
        room,
        host,
        alice,
        bob,
    };
    drain(&mut table.host);
    drain(&mut table.alice);
    drain(&mut table.bob);
    table
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_create_room_generates_code() {
    let registry = RoomRegistry::default();
    let (tx, _rx) = channel();
    let handle = registry
        .create_room(Player::new(HOST, "Host"), tx)
        .await
        .unwrap();

    assert_eq!(handle.code().as_str().len(), RoomCode::LENGTH);
    assert_eq!(registry.room_count().await, 1);
    assert!(registry.get_room(handle.code()).await.is_ok());
}

#[tokio::test]
async fn test_get_room_not_found() {
    let registry = RoomRegistry::default();
    let result = registry.get_room(&RoomCode::from("NOPE00")).await;
    assert!(matches!(result, Err(RoomError::NotFound(_))));
}

#[tokio::test]
async fn test_code_collisions_exhaust_retries() {
    let registry =
        RoomRegistry::with_code_source(RoomDefaults::default(), || {
            RoomCode::from("SAME00")
        });
    let (tx1, _rx1) = channel();
    let (tx2, _rx2) = channel();
    registry
        .create_room(Player::new(HOST, "Host"), tx1)
        .await
        .unwrap();
    let second = registry.create_room(Player::new(ALICE, "Alice"), tx2).await;
    assert!(matches!(second, Err(RoomError::CodeSpaceExhausted(_))));
    assert_eq!(registry.room_count().await, 1);
}

#[tokio::test]
async fn test_list_joinable_rooms_skips_started_games() {
    let t = table().await;
    let (tx, _rx) = channel();
    let other = t
        .registry
        .create_room(Player::new(ConnId(10), "Other"), tx)
        .await;
    // The fixed code source collides with R1.
    assert!(other.is_err());

    let listed = t.registry.list_joinable_rooms().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].room_code, RoomCode::from("R1"));
    assert_eq!(listed[0].member_count, 2);
    assert_eq!(listed[0].host, "Host");

    t.room.start_game(HOST).await.unwrap();
    assert!(t.registry.list_joinable_rooms().await.is_empty());
}

#[tokio::test]
async fn test_remove_room_stops_actor() {
    let t = table().await;
    t.registry.remove_room(t.room.code()).await.unwrap();

    assert_eq!(t.registry.room_count().await, 0);
    assert!(matches!(
        t.room.info().await,
        Err(RoomError::Unavailable(_))
    ));
    assert!(matches!(
        t.registry.remove_room(t.room.code()).await,
        Err(RoomError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_custom_defaults_apply_to_new_rooms() {
    let settings = Settings {
        response_time_seconds: 25,
        max_players: 2,
    };
    let registry = RoomRegistry::new(RoomDefaults {
        settings,
        ..RoomDefaults::default()
    });
    let (tx, _rx) = channel();
    let handle = registry
        .create_room(Player::new(HOST, "Host"), tx)
        .await
        .unwrap();
    assert_eq!(handle.info().await.unwrap().settings, settings);
}

// =========================================================================
// Actor delivery
// =========================================================================

#[tokio::test]
async fn test_join_delivers_to_everyone() {
    let registry = RoomRegistry::default();
    let (host_tx, mut host_rx) = channel();
    let room = registry
        .create_room(Player::new(HOST, "Host"), host_tx)
        .await
        .unwrap();

    let (alice_tx, mut alice_rx) = channel();
    room.join(ALICE, "Alice", alice_tx).await.unwrap();

    match drain(&mut host_rx).as_slice() {
        [ServerEvent::PlayerJoinedRoom { is_owner: true, players, .. }] => {
            assert_eq!(players.len(), 1);
        }
        other => panic!("host got {other:?}"),
    }
    assert!(matches!(
        drain(&mut alice_rx).as_slice(),
        [ServerEvent::PlayerJoinedRoom { is_owner: false, .. }]
    ));
}

#[tokio::test]
async fn test_rejected_join_registers_no_sender() {
    let mut t = table().await;
    t.room
        .update_settings(
            HOST,
            Settings {
                max_players: 2,
                ..Settings::default()
            },
        )
        .await
        .unwrap();
    drain(&mut t.host);

    let (carol_tx, mut carol_rx) = channel();
    let result = t.room.join(ConnId(4), "Carol", carol_tx).await;
    assert!(matches!(result, Err(RoomError::RoomFull(_))));

    t.room.start_game(HOST).await.unwrap();
    assert!(drain(&mut carol_rx).is_empty());
}

#[tokio::test]
async fn test_kicked_player_is_told_then_cut_off() {
    let mut t = table().await;
    t.room.kick(HOST, ALICE).await.unwrap();

    let events = drain(&mut t.alice);
    assert!(matches!(events[0], ServerEvent::Kicked { .. }));
    assert!(
        events
            .iter()
            .all(|e| !matches!(e, ServerEvent::PlayerLeftRoom { .. }))
    );

    t.room.start_game(HOST).await.unwrap();
    assert!(drain(&mut t.alice).is_empty());
    assert!(matches!(
        drain(&mut t.bob).as_slice(),
        [ServerEvent::PlayerLeftRoom { .. }, ServerEvent::GameStarted { .. }]
    ));
}

#[tokio::test]
async fn test_host_leave_closes_room_for_players() {
    let mut t = table().await;
    let departure = t.room.leave(HOST).await.unwrap();
    assert_eq!(departure, Departure::Dissolved);

    assert!(matches!(
        drain(&mut t.alice).as_slice(),
        [ServerEvent::RoomClosed { .. }]
    ));
    assert!(drain(&mut t.host).is_empty());

    // The actor stops on its own; later requests find it gone.
    assert!(matches!(
        t.room.start_game(HOST).await,
        Err(RoomError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_game_started_redacts_for_players() {
    let mut t = table().await;
    t.room.start_game(HOST).await.unwrap();

    match drain(&mut t.host).as_slice() {
        [ServerEvent::GameStarted { quiz, .. }] => {
            assert_eq!(quiz.questions[0].correct_option_index, Some(1));
        }
        other => panic!("host got {other:?}"),
    }
    match drain(&mut t.alice).as_slice() {
        [ServerEvent::GameStarted { quiz, players, .. }] => {
            assert_eq!(quiz.questions[0].correct_option_index, None);
            assert_eq!(players.len(), 2);
        }
        other => panic!("alice got {other:?}"),
    }
}

// =========================================================================
// Deadlines
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_deadline_closes_question_after_response_time() {
    let mut t = table().await;
    let start = Instant::now();
    t.room.start_game(HOST).await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    t.room.submit_answer(ALICE, "4").await.unwrap();
    drain(&mut t.host);
    drain(&mut t.alice);

    let reveal = t.alice.recv().await.unwrap();
    assert_eq!(Instant::now() - start, Duration::from_secs(15));
    let ServerEvent::AllPlayersAnswered {
        scoreboard,
        correct_answer,
        answers,
        ..
    } = reveal
    else {
        panic!("expected all_players_answered, got {reveal:?}");
    };
    assert_eq!(correct_answer, "4");
    let totals: Vec<_> = scoreboard.iter().map(|e| (e.player_id, e.score)).collect();
    assert_eq!(totals, vec![(ALICE, 1), (BOB, 0)]);
    let alice = answers.iter().find(|a| a.player_id == ALICE).unwrap();
    assert_eq!(alice.response_time_seconds, 2.0);

    t.room.advance_question(HOST).await.unwrap();
    match drain(&mut t.bob).as_slice() {
        [.., ServerEvent::QuizFinished { scoreboard }] => {
            let totals: Vec<_> =
                scoreboard.iter().map(|e| (e.player_id, e.score)).collect();
            assert_eq!(totals, vec![(ALICE, 1), (BOB, 0)]);
        }
        other => panic!("bob got {other:?}"),
    }
    assert_eq!(t.room.info().await.unwrap().status, RoomStatus::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_early_close_cancels_deadline() {
    let mut t = table().await;
    t.room.start_game(HOST).await.unwrap();
    t.room.submit_answer(ALICE, "4").await.unwrap();
    t.room.submit_answer(BOB, "5").await.unwrap();

    let reveals = |events: &[ServerEvent]| {
        events
            .iter()
            .filter(|e| matches!(e, ServerEvent::AllPlayersAnswered { .. }))
            .count()
    };
    assert_eq!(reveals(&drain(&mut t.host)), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(reveals(&drain(&mut t.host)), 0);
    assert_eq!(reveals(&drain(&mut t.alice)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_host_sees_answer_progress() {
    let mut t = table().await;
    t.room.start_game(HOST).await.unwrap();
    drain(&mut t.host);

    t.room.submit_answer(BOB, "3").await.unwrap();
    assert_eq!(
        drain(&mut t.host),
        vec![ServerEvent::AnswerReceived {
            answered: 1,
            expected: 2
        }]
    );
    assert!(drain(&mut t.alice).is_empty());

    assert!(matches!(
        t.room.submit_answer(BOB, "4").await,
        Err(RoomError::DuplicateAnswer(BOB))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_through_handle() {
    let t = table().await;
    let snapshot = t.room.snapshot().await.unwrap();
    assert_eq!(snapshot.room_code, RoomCode::from("R1"));
    assert_eq!(snapshot.status, RoomStatus::Waiting);
    assert_eq!(snapshot.players.len(), 2);
    assert!(
        snapshot.selected_quiz.unwrap().questions[0]
            .correct_option_index
            .is_none()
    );
}

#[test]
fn test_recipient_resolution_matches_protocol() {
    assert!(Recipient::AllExcept(HOST).includes(ALICE));
    assert!(!Recipient::AllExcept(HOST).includes(HOST));
}
